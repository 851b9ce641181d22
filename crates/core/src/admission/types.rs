//! Types for the admission module.

use serde::{Deserialize, Serialize};

/// Point-in-time view of one admission pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool name (e.g., "retrieval", "transcode").
    pub name: String,
    /// Tasks currently holding a slot.
    pub running: usize,
    /// Tasks waiting for a slot.
    pub queued: usize,
    /// Maximum concurrently running tasks.
    pub capacity: usize,
    /// Maximum waiters; `None` means the queue is unbounded.
    pub max_queue_depth: Option<usize>,
    /// Tasks that finished (successfully or not) since startup.
    pub total_completed: u64,
    /// Submissions rejected since startup.
    pub total_rejected: u64,
}

/// Where a key currently sits in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyStatus {
    /// The key holds a slot; nothing is ahead of it.
    Active {
        /// Current queue length, for context.
        queued: usize,
    },
    /// The key is waiting in the queue.
    Queued {
        /// Tasks ahead of this key (running + earlier waiters).
        ahead: usize,
        /// 1-based position in the wait queue.
        position: usize,
        /// Current queue length.
        queued: usize,
    },
    /// The key is neither running nor waiting.
    NotFound,
}

impl KeyStatus {
    /// Returns true when the key is running or queued.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Handed to a task when it starts running.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Tasks that were running or queued when this task was submitted.
    pub queue_ahead: usize,
    /// Pool state at the moment the task started.
    pub pool: PoolSnapshot,
}
