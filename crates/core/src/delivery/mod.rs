//! Delete-after-send for delivered artifacts.
//!
//! A [`CleanupGuard`] removes an artifact, and its directory once empty, when
//! dropped. [`GuardedStream`] ties a guard to a response body so the files
//! go away as soon as the body completes or is dropped.

mod cleanup;
mod stream;

pub use cleanup::CleanupGuard;
pub use stream::GuardedStream;
