//! Synchronous two-group comparison
//!
//! Group A always runs weighted round robin; group B runs the policy being
//! compared against it. Loads are released as soon as each request is
//! simulated, so `current_load` never builds up and the realistic latency model
//! only ever sees an idle pool.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::SimulatorConfig;
use crate::core::types::ServerSpec;
use crate::load_balancing::{Algorithm, Pool};
use crate::observability::metrics;
use crate::simulation::{DispatchRecord, RunStats, ServerReport, SimulationToggles};
use crate::traffic::lane::{Lane, LoadRelease};

pub const DEFAULT_QUICK_SIM_COUNT: u64 = 50;
const RECENT_WINDOW: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickSimRequest {
    /// Requests per group, at least 1
    pub count: Option<i64>,
    pub compare_algorithm: Option<Algorithm>,
    pub simulate_real_latency: Option<bool>,
    pub simulate_errors: Option<bool>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickSimGroup {
    pub algorithm: Algorithm,
    pub label: &'static str,
    pub stats: RunStats,
    pub servers: Vec<ServerReport>,
    /// Newest first
    pub recent_dispatches: Vec<DispatchRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickSimReport {
    pub request_count: u64,
    pub toggles: SimulationToggles,
    pub group_a: QuickSimGroup,
    pub group_b: QuickSimGroup,
}

/// Run `count` requests through each group and report both
pub fn run_quick_sim(template: &[ServerSpec], request: &QuickSimRequest) -> QuickSimReport {
    run(
        template,
        request,
        DEFAULT_QUICK_SIM_COUNT,
        Algorithm::SimpleRoundRobin,
        None,
    )
}

/// Like [`run_quick_sim`] over the configured pool, with configured fallbacks
pub fn run_configured_quick_sim(
    config: &SimulatorConfig,
    request: &QuickSimRequest,
) -> QuickSimReport {
    run(
        &config.pool,
        request,
        config.quick_sim.count,
        config.quick_sim.compare_algorithm,
        config.seed,
    )
}

fn run(
    template: &[ServerSpec],
    request: &QuickSimRequest,
    default_count: u64,
    default_compare: Algorithm,
    default_seed: Option<u64>,
) -> QuickSimReport {
    let count = request
        .count
        .map(|count| count.max(1) as u64)
        .unwrap_or(default_count.max(1));
    let compare = request.compare_algorithm.unwrap_or(default_compare);
    let toggles = SimulationToggles {
        simulate_real_latency: request.simulate_real_latency.unwrap_or(true),
        simulate_errors: request.simulate_errors.unwrap_or(true),
    };
    let seed = request.seed.or(default_seed);

    let pool = Pool::from_specs(template);
    let mut group_a = Lane::new(
        "quick-a",
        Algorithm::WeightedRoundRobin,
        pool.fresh_clone(),
        RECENT_WINDOW,
        seed,
    );
    let mut group_b = Lane::new(
        "quick-b",
        compare,
        pool.fresh_clone(),
        RECENT_WINDOW,
        seed.map(|s| s.wrapping_add(0x9e37_79b9)),
    );
    group_a.start_clock();
    group_b.start_clock();

    for request_id in 1..=count {
        for lane in [&mut group_a, &mut group_b] {
            if let Err(e) = lane.process(request_id, &toggles, LoadRelease::Immediate) {
                debug!(lane = lane.name(), request_id, error = %e, "Request not served");
            }
        }
    }

    let end = Utc::now();
    group_a.finalize(end);
    group_b.finalize(end);
    metrics::record_run("quick-sim");

    info!(
        count,
        compare = compare.as_str(),
        group_a_avg = group_a.stats().avg_latency,
        group_b_avg = group_b.stats().avg_latency,
        "Quick simulation finished"
    );

    QuickSimReport {
        request_count: count,
        toggles,
        group_a: report(&group_a),
        group_b: report(&group_b),
    }
}

fn report(lane: &Lane) -> QuickSimGroup {
    QuickSimGroup {
        algorithm: lane.algorithm(),
        label: lane.algorithm().label(),
        stats: lane.stats().clone(),
        servers: lane.server_reports(),
        recent_dispatches: lane.dispatches().recent(RECENT_WINDOW),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{default_upstream_pool, ServerStatus};

    #[test]
    fn test_defaults() {
        let report = run_quick_sim(&default_upstream_pool(), &QuickSimRequest::default());
        assert_eq!(report.request_count, 50);
        assert_eq!(report.group_a.algorithm, Algorithm::WeightedRoundRobin);
        assert_eq!(report.group_b.algorithm, Algorithm::SimpleRoundRobin);
        assert_eq!(report.group_a.stats.total_requests, 50);
        assert_eq!(report.group_b.stats.total_requests, 50);
        assert!(report.group_a.stats.finalized);
        assert_eq!(report.group_a.recent_dispatches.len(), 20);
        assert_eq!(report.group_a.recent_dispatches[0].request_id, 50);
        assert_eq!(report.group_a.recent_dispatches[19].request_id, 31);
    }

    #[test]
    fn test_group_a_is_always_weighted() {
        let request = QuickSimRequest {
            count: Some(10),
            compare_algorithm: Some(Algorithm::Random),
            seed: Some(5),
            ..Default::default()
        };
        let report = run_quick_sim(&default_upstream_pool(), &request);
        assert_eq!(report.group_a.algorithm, Algorithm::WeightedRoundRobin);
        assert_eq!(report.group_b.algorithm, Algorithm::Random);
        assert_eq!(report.group_a.stats.server_distribution["backend-1"], 5);
        assert_eq!(report.group_a.stats.server_distribution["backend-2"], 3);
        assert_eq!(report.group_a.stats.server_distribution["backend-3"], 2);
    }

    #[test]
    fn test_count_is_clamped() {
        let request = QuickSimRequest {
            count: Some(0),
            ..Default::default()
        };
        let report = run_quick_sim(&default_upstream_pool(), &request);
        assert_eq!(report.request_count, 1);
        assert_eq!(report.group_b.stats.total_requests, 1);
    }

    #[test]
    fn test_loads_are_released() {
        let report = run_quick_sim(&default_upstream_pool(), &QuickSimRequest::default());
        assert!(report
            .group_a
            .servers
            .iter()
            .all(|s| s.server.current_load == 0));
    }

    #[test]
    fn test_errors_disabled() {
        let request = QuickSimRequest {
            count: Some(200),
            simulate_errors: Some(false),
            ..Default::default()
        };
        let report = run_quick_sim(&default_upstream_pool(), &request);
        assert_eq!(report.group_a.stats.failed_requests, 0);
        assert_eq!(report.group_b.stats.failed_requests, 0);
        assert_eq!(report.group_a.stats.error_rate, 0.0);
    }

    #[test]
    fn test_all_down_pool_serves_nothing() {
        let mut template = default_upstream_pool();
        for spec in &mut template {
            spec.status = ServerStatus::Down;
        }
        let report = run_quick_sim(
            &template,
            &QuickSimRequest {
                count: Some(5),
                ..Default::default()
            },
        );
        assert_eq!(report.group_a.stats.total_requests, 0);
        assert_eq!(report.group_a.stats.unserved_attempts, 5);
        assert!(report.group_b.recent_dispatches.is_empty());
    }

    #[test]
    fn test_configured_fallbacks() {
        let mut config = SimulatorConfig::default();
        config.quick_sim.count = 12;
        config.quick_sim.compare_algorithm = Algorithm::Random;
        config.seed = Some(1);

        let report = run_configured_quick_sim(&config, &QuickSimRequest::default());
        assert_eq!(report.request_count, 12);
        assert_eq!(report.group_b.algorithm, Algorithm::Random);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let request = QuickSimRequest {
            count: Some(30),
            compare_algorithm: Some(Algorithm::Random),
            seed: Some(99),
            ..Default::default()
        };
        let first = run_quick_sim(&default_upstream_pool(), &request);
        let second = run_quick_sim(&default_upstream_pool(), &request);
        assert_eq!(first.group_b.stats.latencies, second.group_b.stats.latencies);
        assert_eq!(
            first.group_b.stats.server_distribution,
            second.group_b.stats.server_distribution
        );
    }
}
