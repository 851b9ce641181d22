//! Response bodies that carry a cleanup guard.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::cleanup::CleanupGuard;

/// Wraps a body stream and releases its [`CleanupGuard`] once the stream
/// ends, or when the stream is dropped before that.
pub struct GuardedStream<S> {
    inner: S,
    cleanup: Option<CleanupGuard>,
}

impl<S> GuardedStream<S> {
    pub fn new(inner: S, cleanup: CleanupGuard) -> Self {
        Self {
            inner,
            cleanup: Some(cleanup),
        }
    }
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(None) = polled {
            self.cleanup.take();
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> std::fmt::Debug for GuardedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedStream")
            .field("cleanup", &self.cleanup)
            .finish()
    }
}
