//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ReelSense metrics
pub const METRICS_PREFIX: &str = "reelsense";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Classification metrics
    describe_counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        Unit::Count,
        "Total review texts classified"
    );

    describe_histogram!(
        format!("{}_classification_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Sentiment classification latency in seconds"
    );

    // Review metrics
    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews persisted"
    );

    describe_counter!(
        format!("{}_reviews_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews removed by moderation"
    );

    // Catalog metrics
    describe_counter!(
        format!("{}_catalog_lookups_total", METRICS_PREFIX),
        Unit::Count,
        "Total upstream catalog requests"
    );

    describe_histogram!(
        format!("{}_catalog_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Catalog lookup latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        Unit::Count,
        "Total explicit cache invalidations"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record classification metrics
pub fn record_classification(duration_secs: f64, label: &str) {
    counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        "label" => label.to_string()
    )
    .increment(1);

    histogram!(format!("{}_classification_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record a review submission or moderation deletion
pub fn record_review(deleted: bool) {
    let name = if deleted {
        format!("{}_reviews_deleted_total", METRICS_PREFIX)
    } else {
        format!("{}_reviews_submitted_total", METRICS_PREFIX)
    };
    counter!(name).increment(1);
}

/// Helper to record catalog lookup metrics
pub fn record_lookup(duration_secs: f64, kind: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_catalog_lookups_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_catalog_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record an explicit invalidation
pub fn record_invalidation(cache_name: &str) {
    counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        "cache" => cache_name.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (250ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/reviews");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
