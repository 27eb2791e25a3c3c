//! # Selector Integration Tests
//!
//! Exercises the three policies through the public `Selector` trait, including
//! pool edits between calls.

use lb_simulator::core::types::{default_upstream_pool, ServerPatch, ServerSpec, ServerStatus};
use lb_simulator::load_balancing::{create_balancer, create_seeded_balancer};
use lb_simulator::{algorithms, Algorithm, NewServer, Pool, PoolMutation, Selector, SimError};
use std::collections::HashMap;

fn spec(id: &str, weight: u32) -> ServerSpec {
    ServerSpec {
        id: id.to_string(),
        label: id.to_uppercase(),
        host: format!("{}.internal:8080", id),
        region: "test".to_string(),
        role: String::new(),
        weight,
        status: ServerStatus::Up,
        latency_ms: 20,
        capacity: 100,
        error_rate: 0.0,
    }
}

fn tally(pool: &Pool, algorithm: Algorithm, picks: usize) -> HashMap<String, usize> {
    let mut selector = create_seeded_balancer(algorithm, 17);
    let mut counts = HashMap::new();
    for _ in 0..picks {
        let index = selector.next(pool).expect("active server");
        *counts.entry(pool.servers()[index].id.clone()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_weighted_counts_match_weights_over_whole_cycles() {
    let pool = Pool::from_specs(&[spec("a", 4), spec("b", 2), spec("c", 6)]);
    // gcd 2, so one cycle is (4 + 2 + 6) / 2 = 6 picks
    let counts = tally(&pool, Algorithm::WeightedRoundRobin, 1_200);
    assert_eq!(counts["a"], 400);
    assert_eq!(counts["b"], 200);
    assert_eq!(counts["c"], 600);
}

#[test]
fn test_simple_round_robin_ignores_weights() {
    let pool = Pool::from_specs(&[spec("a", 10), spec("b", 1), spec("c", 1)]);
    let counts = tally(&pool, Algorithm::SimpleRoundRobin, 300);
    assert_eq!(counts["a"], 100);
    assert_eq!(counts["b"], 100);
    assert_eq!(counts["c"], 100);
}

#[test]
fn test_random_only_picks_active_servers() {
    let mut pool = Pool::from_specs(&default_upstream_pool());
    pool.patch("backend-2", &ServerPatch::status(ServerStatus::Down))
        .unwrap();

    let counts = tally(&pool, Algorithm::Random, 2_000);
    assert!(!counts.contains_key("backend-2"));
    assert!(counts["backend-1"] > 800);
    assert!(counts["backend-3"] > 800);
}

#[test]
fn test_every_policy_handles_empty_active_set() {
    let mut pool = Pool::from_specs(&default_upstream_pool());
    for id in ["backend-1", "backend-2", "backend-3"] {
        pool.patch(id, &ServerPatch::weight(0.0)).unwrap();
    }

    for algorithm in Algorithm::ALL {
        let mut selector = create_balancer(algorithm);
        for _ in 0..5 {
            assert_eq!(selector.next(&pool), None, "{} picked a server", algorithm);
        }
        assert_eq!(selector.active_count(&pool), 0);
    }
}

#[test]
fn test_selection_resumes_after_server_returns() {
    let mut pool = Pool::from_specs(&[spec("only", 3)]);
    let mut selector = create_balancer(Algorithm::WeightedRoundRobin);

    pool.patch("only", &ServerPatch::status(ServerStatus::Down))
        .unwrap();
    assert_eq!(selector.next(&pool), None);

    pool.patch("only", &ServerPatch::status(ServerStatus::Up))
        .unwrap();
    assert_eq!(selector.next(&pool), Some(0));
}

#[test]
fn test_added_server_joins_rotation() {
    let mut pool = Pool::from_specs(&[spec("a", 1), spec("b", 1)]);
    let mut selector = create_balancer(Algorithm::SimpleRoundRobin);
    selector.next(&pool);

    let added = pool
        .add_new(NewServer {
            label: "Late Joiner".to_string(),
            host: "10.0.0.7:80".to_string(),
            ..Default::default()
        })
        .unwrap();

    let mut seen: Vec<String> = (0..3)
        .map(|_| pool.servers()[selector.next(&pool).unwrap()].id.clone())
        .collect();
    seen.sort();
    let mut expected = vec!["a".to_string(), "b".to_string(), added.id];
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_invalid_patch_rejected_without_change() {
    let mut pool = Pool::from_specs(&default_upstream_pool());
    let version = pool.version();

    for bad in [-1.0, 1.5, f64::NAN, f64::INFINITY] {
        let err = pool
            .patch("backend-1", &ServerPatch::weight(bad))
            .unwrap_err();
        assert!(matches!(err, SimError::BadInput { .. }), "{} accepted", bad);
    }
    assert_eq!(pool.version(), version);
    assert_eq!(pool.find("backend-1").unwrap().weight, 5);
}

#[test]
fn test_pool_mutation_from_json() {
    let mut pool = Pool::from_specs(&default_upstream_pool());
    let mutation: PoolMutation =
        serde_json::from_str(r#"{"op":"patch","id":"backend-3","patch":{"status":"down"}}"#)
            .unwrap();
    pool.apply(mutation).unwrap();
    assert_eq!(pool.active_count(), 2);

    let mutation: PoolMutation =
        serde_json::from_str(r#"{"op":"remove","id":"backend-9"}"#).unwrap();
    assert_eq!(
        pool.apply(mutation).unwrap_err(),
        SimError::server_not_found("backend-9")
    );
}

#[test]
fn test_algorithm_catalog() {
    let catalog = algorithms();
    assert_eq!(catalog.len(), 3);
    let ids: Vec<&str> = catalog.iter().map(|info| info.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["weighted-round-robin", "simple-round-robin", "random"]
    );
    assert!("least-connections".parse::<Algorithm>().is_err());
    assert_eq!(
        "random".parse::<Algorithm>().unwrap(),
        Algorithm::Random
    );
}
