//! Error types for the admission module.

use thiserror::Error;

use super::types::PoolSnapshot;

/// Errors returned by [`AdmissionController::submit`](super::AdmissionController::submit).
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    /// Every slot is taken and the wait queue is full.
    #[error(
        "Pool '{}' is saturated ({} running, {} queued)",
        .0.name,
        .0.running,
        .0.queued
    )]
    Rejected(PoolSnapshot),

    /// The key is already running or waiting in this pool.
    #[error("Key is already admitted: {0}")]
    DuplicateKey(String),

    /// The slot handoff was abandoned before this waiter could start.
    #[error("Admission pool closed")]
    Closed,
}

impl AdmissionError {
    /// Whether the caller may retry the same submission later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
