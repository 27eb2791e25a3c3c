//! # Simulation Metrics
//!
//! Counters, histograms and gauges recorded through the `metrics` facade. The
//! crate installs no recorder of its own: a host process that installs one (a
//! Prometheus exporter, for example) picks these up, and without one every call
//! is a no-op.
//!
//! All metric names share the `lbsim_` prefix. The `lane` label names the
//! pipeline that produced the sample (`group-a`, `group-b`, `quick-a`,
//! `quick-b`, `dispatcher`).

use metrics::{counter, gauge, histogram};

pub const REQUESTS_TOTAL: &str = "lbsim_requests_total";
pub const REQUEST_ERRORS_TOTAL: &str = "lbsim_request_errors_total";
pub const UNSERVED_ATTEMPTS_TOTAL: &str = "lbsim_unserved_attempts_total";
pub const REQUEST_LATENCY_MS: &str = "lbsim_request_latency_ms";
pub const SELECTIONS_TOTAL: &str = "lbsim_selections_total";
pub const RUNS_TOTAL: &str = "lbsim_runs_total";
pub const ACTIVE_TARGETS: &str = "lbsim_active_targets";

/// Record one served request
pub fn record_served(lane: &'static str, server_id: &str, latency_ms: u64, is_error: bool) {
    counter!(REQUESTS_TOTAL, "lane" => lane, "server" => server_id.to_string()).increment(1);
    histogram!(REQUEST_LATENCY_MS, "lane" => lane).record(latency_ms as f64);
    if is_error {
        counter!(REQUEST_ERRORS_TOTAL, "lane" => lane, "server" => server_id.to_string())
            .increment(1);
    }
}

/// Record an attempt that found no active server
pub fn record_unserved(lane: &'static str) {
    counter!(UNSERVED_ATTEMPTS_TOTAL, "lane" => lane).increment(1);
}

/// Record a selector decision made outside a full request pipeline
pub fn record_selection(lane: &'static str, algorithm: &'static str) {
    counter!(SELECTIONS_TOTAL, "lane" => lane, "algorithm" => algorithm).increment(1);
}

/// Record an A/B run lifecycle event (`started`, `completed`, `stopped`, `quick-sim`)
pub fn record_run(event: &'static str) {
    counter!(RUNS_TOTAL, "event" => event).increment(1);
}

/// Publish how many servers a lane can currently select from
pub fn set_active_targets(lane: &'static str, count: usize) {
    gauge!(ACTIVE_TARGETS, "lane" => lane).set(count as f64);
}
