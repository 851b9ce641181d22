//! Admission control for bounded resource pools.
//!
//! An [`AdmissionController`] runs at most `capacity` tasks at a time and
//! parks further submissions in a FIFO queue. When the queue is full the
//! submission fails immediately with [`AdmissionError::Rejected`], carrying a
//! [`PoolSnapshot`] the caller can surface as backpressure.
//!
//! The service builds two independent pools at startup: one for retrieval
//! jobs (bounded queue) and one for transcodes (unbounded queue).
//!
//! # Example
//!
//! ```ignore
//! use ytdls_core::admission::AdmissionController;
//!
//! let pool = AdmissionController::bounded("retrieval", 4, 10);
//!
//! let result = pool
//!     .submit(Some("job1"), |admission| async move {
//!         println!("{} jobs ahead", admission.queue_ahead);
//!         42
//!     })
//!     .await?;
//!
//! // Out-of-band polling
//! let status = pool.status_of("job1");
//! ```

mod controller;
mod error;
mod types;

pub use controller::AdmissionController;
pub use error::AdmissionError;
pub use types::{Admission, KeyStatus, PoolSnapshot};
