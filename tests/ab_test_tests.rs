//! # A/B Session Integration Tests
//!
//! Drives full timed runs through the public API: lifecycle transitions, the
//! per-tick pairing of the two groups, and pool edits made while a run is live.

use lb_simulator::core::types::default_upstream_pool;
use lb_simulator::traffic::AbPhase;
use lb_simulator::{
    AbTestSession, AbTestUpdate, Algorithm, GroupId, PoolMutation, ServerPatch, ServerStatus,
    SimError, SimulatorConfig,
};
use std::time::Duration;

fn fast_update(request_count: i64) -> AbTestUpdate {
    AbTestUpdate {
        request_count: Some(request_count),
        requests_per_second: Some(100),
        ..Default::default()
    }
}

/// Weighted vs random over 200 requests, both groups fully served
#[tokio::test]
async fn test_weighted_vs_random_full_run() {
    let session = AbTestSession::with_seed(default_upstream_pool(), 42).unwrap();
    session
        .configure(AbTestUpdate {
            group_a_algorithm: Some(Algorithm::WeightedRoundRobin),
            group_b_algorithm: Some(Algorithm::Random),
            ..fast_update(200)
        })
        .unwrap();
    session.start().unwrap();

    tokio::time::timeout(Duration::from_secs(10), session.wait_until_finished())
        .await
        .expect("run should finish");

    let status = session.status();
    assert!(!status.is_running);
    assert_eq!(status.phase, AbPhase::Completed);
    assert!(status.completed_at.unwrap() >= status.started_at.unwrap());

    let a = &status.group_a.stats;
    let b = &status.group_b.stats;
    assert_eq!(a.total_requests, 200);
    assert_eq!(b.total_requests, 200);
    assert_eq!(a.successful_requests + a.failed_requests, 200);

    // whole weighted cycles of 10 split exactly 5:3:2
    assert_eq!(a.server_distribution["backend-1"], 100);
    assert_eq!(a.server_distribution["backend-2"], 60);
    assert_eq!(a.server_distribution["backend-3"], 40);
    assert_eq!(b.server_distribution.values().sum::<u64>(), 200);

    assert!(a.min_latency <= a.avg_latency && a.avg_latency <= a.max_latency);
    assert!(a.p95_latency <= a.p99_latency && a.p99_latency <= a.max_latency);
    assert!(a.throughput > 0.0);

    assert_eq!(status.group_a.recent_dispatches.len(), 20);
    assert_eq!(status.group_a.recent_dispatches[0].request_id, 200);

    let shares: u64 = status.group_a.servers.iter().map(|s| s.stats.share).sum();
    assert!((99..=101).contains(&shares));
}

/// Both groups see the same request ids in the same order
#[tokio::test]
async fn test_groups_share_request_ids() {
    let session = AbTestSession::with_seed(default_upstream_pool(), 1).unwrap();
    session.configure(fast_update(15)).unwrap();
    session.start().unwrap();
    session.wait_until_finished().await;

    let status = session.status();
    let ids_a: Vec<u64> = status.group_a.recent_dispatches.iter().map(|d| d.request_id).collect();
    let ids_b: Vec<u64> = status.group_b.recent_dispatches.iter().map(|d| d.request_id).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(ids_a.first(), Some(&15));
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let session = AbTestSession::new(default_upstream_pool()).unwrap();

    assert!(matches!(
        session.stop(),
        Err(SimError::InvalidConfiguration { .. })
    ));

    session.configure(fast_update(5_000)).unwrap();
    session.start().unwrap();

    assert!(matches!(
        session.start(),
        Err(SimError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        session.configure(AbTestUpdate::default()),
        Err(SimError::InvalidConfiguration { .. })
    ));

    session.stop().unwrap();
    assert_eq!(session.phase(), AbPhase::Completed);
    assert!(session.stop().is_err());

    // a completed session can be started again without a reset
    session.start().unwrap();
    assert!(session.is_running());
    session.reset();
    assert_eq!(session.phase(), AbPhase::Idle);
}

/// Weight 0 on a group's server mid-run: no further traffic reaches it
#[tokio::test]
async fn test_weight_zero_mid_run() {
    let session = AbTestSession::with_seed(default_upstream_pool(), 9).unwrap();
    session
        .configure(AbTestUpdate {
            requests_per_second: Some(50),
            request_count: Some(60),
            ..Default::default()
        })
        .unwrap();
    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    session
        .configure_pool(
            GroupId::A,
            PoolMutation::Patch {
                id: "backend-1".to_string(),
                patch: ServerPatch::weight(0.0),
            },
        )
        .unwrap();
    let served_at_patch = session
        .status()
        .group_a
        .stats
        .server_distribution
        .get("backend-1")
        .copied()
        .unwrap_or(0);

    session.wait_until_finished().await;
    let status = session.status();
    let served_after = status
        .group_a
        .stats
        .server_distribution
        .get("backend-1")
        .copied()
        .unwrap_or(0);

    assert_eq!(served_after, served_at_patch);
    assert_eq!(status.group_a.stats.total_requests, 60);
    // group B's pool is untouched
    assert_eq!(status.group_b.active_targets, 3);
    assert_eq!(status.group_a.active_targets, 2);
}

/// A group with every server down keeps ticking and counts unserved attempts
#[tokio::test]
async fn test_all_down_group_does_not_block_other_group() {
    let session = AbTestSession::new(default_upstream_pool()).unwrap();
    session.configure(fast_update(12)).unwrap();
    session.start().unwrap();

    for id in ["backend-1", "backend-2", "backend-3"] {
        session
            .configure_pool(
                GroupId::B,
                PoolMutation::Patch {
                    id: id.to_string(),
                    patch: ServerPatch::status(ServerStatus::Down),
                },
            )
            .unwrap();
    }

    session.wait_until_finished().await;
    let status = session.status();
    assert_eq!(status.group_a.stats.total_requests, 12);
    assert_eq!(
        status.group_b.stats.total_requests + status.group_b.stats.unserved_attempts,
        12
    );
    assert!(status.group_b.stats.unserved_attempts > 0);
}

#[tokio::test]
async fn test_reset_cancels_running_test() {
    let session = AbTestSession::new(default_upstream_pool()).unwrap();
    session
        .configure(AbTestUpdate {
            request_count: Some(1_000),
            requests_per_second: Some(20),
            ..Default::default()
        })
        .unwrap();
    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    session.reset();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = session.status();
    assert_eq!(status.phase, AbPhase::Idle);
    assert_eq!(status.processed_requests, 0);
    assert_eq!(status.group_a.stats.total_requests, 0);
    assert!(status.group_a.recent_dispatches.is_empty());
}

#[tokio::test]
async fn test_session_from_config() {
    let mut config = SimulatorConfig::default();
    config.ab_test.group_b_algorithm = Algorithm::Random;
    config.ab_test.request_count = 8;
    config.ab_test.requests_per_second = 100;
    config.seed = Some(3);

    let session = AbTestSession::from_config(&config).unwrap();
    assert_eq!(session.config().group_b_algorithm, Algorithm::Random);

    session.start().unwrap();
    session.wait_until_finished().await;
    assert_eq!(session.status().processed_requests, 8);
}

/// A new template takes effect on the next configure, never mid-run
#[tokio::test]
async fn test_replaced_template_feeds_next_run() {
    let session = AbTestSession::with_seed(default_upstream_pool(), 5).unwrap();
    let mut template = default_upstream_pool();
    template.truncate(1);
    template[0].id = "solo".to_string();
    template[0].label = "Solo".to_string();

    session.configure(fast_update(1_000)).unwrap();
    session.start().unwrap();
    assert!(matches!(
        session.set_template(template.clone()),
        Err(SimError::InvalidConfiguration { .. })
    ));
    session.stop().unwrap();

    let mut duplicated = template.clone();
    duplicated.push(template[0].clone());
    assert!(matches!(
        session.set_template(duplicated),
        Err(SimError::BadInput { .. })
    ));

    session.set_template(template).unwrap();
    session.configure(fast_update(10)).unwrap();
    session.start().unwrap();
    session.wait_until_finished().await;

    let status = session.status();
    for group in [&status.group_a, &status.group_b] {
        assert_eq!(group.servers.len(), 1);
        assert_eq!(group.stats.server_distribution["solo"], 10);
    }
}

#[test]
fn test_status_serializes_camel_case() {
    let session = AbTestSession::new(default_upstream_pool()).unwrap();
    let json = serde_json::to_value(session.status()).unwrap();

    assert_eq!(json["isRunning"], false);
    assert_eq!(json["phase"], "idle");
    assert_eq!(json["config"]["requestCount"], 100);
    assert_eq!(json["groupA"]["algorithm"], "weighted-round-robin");
    assert_eq!(json["groupB"]["algorithm"], "simple-round-robin");
    assert_eq!(json["groupA"]["servers"][0]["id"], "backend-1");
    assert_eq!(json["groupA"]["servers"][0]["stats"]["served"], 0);
    assert!(json["groupA"]["stats"]["serverDistribution"].is_object());
}
