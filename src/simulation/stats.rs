//! # Run Statistics
//!
//! Accumulates raw per-request counters during a run and derives the summary
//! metrics (average, p95/p99, error rate, throughput) exactly once, when the run
//! ends. Derived fields stay at zero until [`RunStats::finalize`] is called, and
//! nothing is recorded after it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::core::types::Server;
use crate::load_balancing::Pool;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_latency: u64,
    pub avg_latency: u64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub p95_latency: u64,
    pub p99_latency: u64,
    pub throughput: f64,
    pub error_rate: f64,
    pub server_distribution: BTreeMap<String, u64>,
    pub latencies: Vec<u64>,
    /// Attempts that found no active server; not part of any total above
    pub unserved_attempts: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub finalized: bool,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty statistics with the run clock started now
    pub fn started_now() -> Self {
        Self {
            start_time: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Account one served request
    pub fn record_request(&mut self, latency_ms: u64, is_error: bool, server_id: &str) {
        if self.finalized {
            warn!(server_id, "Ignoring request recorded after finalization");
            return;
        }

        self.total_requests += 1;
        if is_error {
            self.failed_requests += 1;
        } else {
            self.successful_requests += 1;
        }

        self.latencies.push(latency_ms);
        self.total_latency += latency_ms;
        self.min_latency = if self.total_requests == 1 {
            latency_ms
        } else {
            self.min_latency.min(latency_ms)
        };
        self.max_latency = self.max_latency.max(latency_ms);

        *self
            .server_distribution
            .entry(server_id.to_string())
            .or_default() += 1;
    }

    /// Account an attempt that found no eligible server
    pub fn record_unserved(&mut self) {
        if !self.finalized {
            self.unserved_attempts += 1;
        }
    }

    /// Derive the summary metrics; later calls are no-ops
    pub fn finalize(&mut self, end_time: DateTime<Utc>) {
        if self.finalized {
            return;
        }
        self.end_time = Some(end_time);

        if self.total_requests > 0 {
            let n = self.total_requests as f64;
            self.avg_latency = (self.total_latency as f64 / n).round() as u64;
            self.p95_latency = percentile(&self.latencies, 95.0);
            self.p99_latency = percentile(&self.latencies, 99.0);
            self.error_rate = self.failed_requests as f64 / n;
            self.throughput = match self.start_time {
                Some(start) => {
                    let seconds = (end_time - start).num_milliseconds() as f64 / 1000.0;
                    if seconds > 0.0 {
                        n / seconds
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
        } else {
            self.avg_latency = 0;
            self.min_latency = 0;
            self.p95_latency = 0;
            self.p99_latency = 0;
            self.error_rate = 0.0;
            self.throughput = 0.0;
        }

        self.finalized = true;
    }

    /// Share of served requests handled by `server_id`, as a rounded percentage
    pub fn share_of(&self, server_id: &str) -> u64 {
        if self.total_requests == 0 {
            return 0;
        }
        let served = self.served_by(server_id);
        ((served as f64 / self.total_requests as f64) * 100.0).round() as u64
    }

    pub fn served_by(&self, server_id: &str) -> u64 {
        self.server_distribution.get(server_id).copied().unwrap_or(0)
    }
}

/// Nearest-rank percentile: `sorted[ceil(p/100 * n) - 1]`, 0 for no samples
pub fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}

/// Per-server share of a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerShare {
    pub served: u64,
    pub share: u64,
}

/// A pool server together with its share of the run
#[derive(Debug, Clone, Serialize)]
pub struct ServerReport {
    #[serde(flatten)]
    pub server: Server,
    pub stats: ServerShare,
}

/// Pair every server of `pool` with its share in `stats`, in pool order
pub fn server_reports(pool: &Pool, stats: &RunStats) -> Vec<ServerReport> {
    pool.servers()
        .iter()
        .map(|server| ServerReport {
            stats: ServerShare {
                served: stats.served_by(&server.id),
                share: stats.share_of(&server.id),
            },
            server: server.clone(),
        })
        .collect()
}
