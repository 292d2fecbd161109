//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions. The gateway
//! installs the exporter; libraries only record.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all FollowRank metrics
pub const METRICS_PREFIX: &str = "followrank";

/// Buckets for relay round trips (in seconds)
pub const RELAY_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s - fetch timeout
    10.00,  // 10s
    30.00,  // 30s
];

/// Buckets for whole job runs (in seconds)
pub const RUN_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Relay metrics
    describe_counter!(
        format!("{}_relay_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Relay subscriptions opened, by purpose and outcome"
    );

    describe_histogram!(
        format!("{}_relay_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Relay subscription lifetime in seconds"
    );

    describe_counter!(
        format!("{}_follow_list_resolutions_total", METRICS_PREFIX),
        Unit::Count,
        "Follow-list resolutions, by outcome (found, missing, failed)"
    );

    // Ranking metrics
    describe_counter!(
        format!("{}_job_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Background job runs, by job and status"
    );

    describe_histogram!(
        format!("{}_job_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Background job duration in seconds"
    );

    describe_gauge!(
        format!("{}_roster_size", METRICS_PREFIX),
        Unit::Count,
        "Participants in the last ranking roster"
    );

    describe_gauge!(
        format!("{}_follow_edges", METRICS_PREFIX),
        Unit::Count,
        "Roster-internal follow edges in the last graph"
    );

    describe_gauge!(
        format!("{}_pagerank_iterations", METRICS_PREFIX),
        Unit::Count,
        "Iterations used by the last PageRank computation"
    );

    describe_counter!(
        format!("{}_ranks_persisted_total", METRICS_PREFIX),
        Unit::Count,
        "Rank records written"
    );

    // Collector metrics
    describe_counter!(
        format!("{}_last_posts_recorded_total", METRICS_PREFIX),
        Unit::Count,
        "Last-post timestamps recorded"
    );

    describe_counter!(
        format!("{}_participants_discovered_total", METRICS_PREFIX),
        Unit::Count,
        "New participants added by discovery"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a relay subscription
pub fn record_relay_request(purpose: &str, status: &str, duration_secs: f64) {
    counter!(
        format!("{}_relay_requests_total", METRICS_PREFIX),
        "purpose" => purpose.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_relay_request_duration_seconds", METRICS_PREFIX),
        "purpose" => purpose.to_string()
    )
    .record(duration_secs);
}

/// Helper to record one follow-list resolution
pub fn record_resolution(outcome: &str) {
    counter!(
        format!("{}_follow_list_resolutions_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record a finished background job
pub fn record_job(job: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_job_runs_total", METRICS_PREFIX),
        "job" => job.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_job_duration_seconds", METRICS_PREFIX),
        "job" => job.to_string()
    )
    .record(duration_secs);
}

/// Helper to record the shape of a ranking run
pub fn record_ranking(roster_size: usize, edges: usize, iterations: usize, persisted: usize) {
    gauge!(format!("{}_roster_size", METRICS_PREFIX)).set(roster_size as f64);
    gauge!(format!("{}_follow_edges", METRICS_PREFIX)).set(edges as f64);
    gauge!(format!("{}_pagerank_iterations", METRICS_PREFIX)).set(iterations as f64);
    counter!(format!("{}_ranks_persisted_total", METRICS_PREFIX)).increment(persisted as u64);
}

/// Helper to record last-post collection
pub fn record_last_posts(recorded: usize) {
    counter!(format!("{}_last_posts_recorded_total", METRICS_PREFIX)).increment(recorded as u64);
}

/// Helper to record discovery
pub fn record_discovery(inserted: usize) {
    counter!(format!("{}_participants_discovered_total", METRICS_PREFIX)).increment(inserted as u64);
}
