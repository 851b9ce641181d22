//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission pools (running/queued gauges, rejections)
//! - Jobs (terminal outcome by failure kind)
//! - External tools (retrieval and transcode durations)
//!
//! The gauges mirror pool state for scraping; the admission controllers
//! remain the only source of truth.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Admission Pools
// =============================================================================

/// Tasks currently running per pool.
pub static POOL_RUNNING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ytdls_pool_running", "Tasks currently running in the pool"),
        &["pool"], // "retrieval", "transcode"
    )
    .unwrap()
});

/// Tasks currently waiting per pool.
pub static POOL_QUEUED: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ytdls_pool_queued", "Tasks waiting in the pool queue"),
        &["pool"],
    )
    .unwrap()
});

/// Submissions rejected because the pool and its queue were full.
pub static ADMISSION_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ytdls_admission_rejections_total",
            "Submissions rejected by a saturated pool",
        ),
        &["pool"],
    )
    .unwrap()
});

// =============================================================================
// Jobs
// =============================================================================

/// Finished jobs by output kind and outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytdls_jobs_total", "Jobs by terminal outcome"),
        &["kind", "outcome"], // outcome: "success" or a failure kind
    )
    .unwrap()
});

/// Retrieval tool wall-clock duration.
pub static RETRIEVAL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ytdls_retrieval_duration_seconds",
            "Duration of the retrieval tool invocation",
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["kind"],
    )
    .unwrap()
});

/// Transcode wall-clock duration.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ytdls_transcode_duration_seconds",
            "Duration of the transcode tool invocation",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["kind", "result"],
    )
    .unwrap()
});

/// Returns all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(POOL_RUNNING.clone()),
        Box::new(POOL_QUEUED.clone()),
        Box::new(ADMISSION_REJECTIONS.clone()),
        Box::new(JOBS_TOTAL.clone()),
        Box::new(RETRIEVAL_DURATION.clone()),
        Box::new(TRANSCODE_DURATION.clone()),
    ]
}
