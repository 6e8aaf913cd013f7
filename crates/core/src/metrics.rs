//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Per-file conversions (results, durations)
//! - Batches (count, size, archives)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convertino_conversions_total", "Total file conversions"),
        &["result"], // "success", "failed", "tool_unavailable"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convertino_conversion_duration_seconds",
            "Duration of file conversions",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches processed total.
pub static BATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("convertino_batches_total", "Total conversion batches").unwrap()
});

/// Files per batch.
pub static BATCH_FILES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("convertino_batch_files", "Number of files per batch")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

/// Archives packed total.
pub static ARCHIVES_PACKED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_archives_packed_total",
        "Total zip archives packed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Conversions
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_FILES.clone()),
        Box::new(ARCHIVES_PACKED.clone()),
    ]
}
