//! # Single-Pool Traffic Dispatcher
//!
//! One weighted-round-robin selector over one editable pool, driven in bulk:
//! `dispatch(n)` sends `n` requests at once and returns where each one went.
//! Unlike the A/B lanes, the dispatcher never simulates failures or load; it
//! only tracks how many requests each server took and the latency of the last
//! one.
//!
//! `reset` clears counters and the log but keeps the pool as edited.

use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::core::config::SimulatorConfig;
use crate::core::error::{SimError, SimResult};
use crate::core::types::{NewServer, Server, ServerPatch, ServerSpec};
use crate::load_balancing::{Algorithm, Pool, PoolMutation, Selector, WeightedRoundRobin};
use crate::observability::metrics;
use crate::simulation::{simulate_latency, DispatchLog, DispatchRecord, DISPATCHER_LOG_CAPACITY};

const LANE: &str = "dispatcher";
const DEFAULT_SNAPSHOT_WINDOW: usize = 24;

/// Per-server counters kept by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherServerStats {
    pub served: u64,
    pub last_latency_ms: Option<u64>,
    pub last_dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherServerView {
    #[serde(flatten)]
    pub server: Server,
    pub stats: DispatcherServerStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherTotals {
    pub requests: u64,
    pub active_targets: usize,
    pub algorithm: Algorithm,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSnapshot {
    pub servers: Vec<DispatcherServerView>,
    pub totals: DispatcherTotals,
    /// Newest first
    pub recent_dispatches: Vec<DispatchRecord>,
}

/// Result of one bulk dispatch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchBatch {
    /// In dispatch order
    pub dispatched: Vec<DispatchRecord>,
    #[serde(flatten)]
    pub snapshot: TrafficSnapshot,
}

pub struct TrafficDispatcher {
    pool: Pool,
    selector: WeightedRoundRobin,
    server_stats: HashMap<String, DispatcherServerStats>,
    total_requests: u64,
    request_cursor: u64,
    log: DispatchLog,
    snapshot_window: usize,
    rng: SmallRng,
}

impl TrafficDispatcher {
    pub fn new(template: &[ServerSpec]) -> SimResult<Self> {
        Self::build(template, DISPATCHER_LOG_CAPACITY, DEFAULT_SNAPSHOT_WINDOW, None)
    }

    pub fn from_config(config: &SimulatorConfig) -> SimResult<Self> {
        Self::build(
            &config.pool,
            config.dispatch_log.dispatcher_capacity,
            config.dispatch_log.dispatcher_window,
            config.seed,
        )
    }

    fn build(
        template: &[ServerSpec],
        log_capacity: usize,
        snapshot_window: usize,
        seed: Option<u64>,
    ) -> SimResult<Self> {
        let pool = Pool::try_from_specs(template)?;
        let server_stats = pool
            .servers()
            .iter()
            .map(|server| (server.id.clone(), DispatcherServerStats::default()))
            .collect();

        Ok(Self {
            pool,
            selector: WeightedRoundRobin::new(),
            server_stats,
            total_requests: 0,
            request_cursor: 0,
            log: DispatchLog::with_capacity(log_capacity),
            snapshot_window,
            rng: match seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_entropy(),
            },
        })
    }

    /// Send `count` requests (at least one)
    ///
    /// Stops at the first request that finds no active server and returns
    /// `NoActiveServers`; requests dispatched before that point stay counted.
    pub fn dispatch(&mut self, count: u64) -> SimResult<DispatchBatch> {
        let count = count.max(1);
        let mut dispatched = Vec::with_capacity(count.min(1_024) as usize);

        for _ in 0..count {
            let Some(index) = self.selector.next(&self.pool) else {
                metrics::record_unserved(LANE);
                warn!(
                    dispatched = dispatched.len(),
                    requested = count,
                    "Dispatch stopped: no active servers"
                );
                return Err(SimError::NoActiveServers);
            };
            let server = &self.pool.servers()[index];

            self.total_requests += 1;
            self.request_cursor += 1;

            let latency_ms = simulate_latency(server, false, &mut self.rng);
            let record = DispatchRecord::new(self.request_cursor, server, latency_ms, false);

            let stats = self.server_stats.entry(server.id.clone()).or_default();
            stats.served += 1;
            stats.last_latency_ms = Some(latency_ms);
            stats.last_dispatched_at = Some(record.at);

            metrics::record_served(LANE, &server.id, latency_ms, false);
            self.log.record(record.clone());
            dispatched.push(record);
        }

        debug!(count, total = self.total_requests, "Dispatched batch");
        Ok(DispatchBatch {
            dispatched,
            snapshot: self.snapshot(),
        })
    }

    /// Current servers, counters and recent dispatches
    pub fn snapshot(&self) -> TrafficSnapshot {
        let servers = self
            .pool
            .servers()
            .iter()
            .map(|server| DispatcherServerView {
                stats: self.server_stats.get(&server.id).cloned().unwrap_or_default(),
                server: server.clone(),
            })
            .collect();

        TrafficSnapshot {
            servers,
            totals: DispatcherTotals {
                requests: self.total_requests,
                active_targets: self.pool.active_count(),
                algorithm: self.selector.algorithm(),
            },
            recent_dispatches: self.log.recent(self.snapshot_window),
        }
    }

    /// Advance the selector without dispatching
    pub fn select_next(&mut self) -> Option<Server> {
        let server = self
            .selector
            .next(&self.pool)
            .and_then(|index| self.pool.get(index).cloned());
        if server.is_some() {
            metrics::record_selection(LANE, Algorithm::WeightedRoundRobin.as_str());
        }
        server
    }

    /// Add a server built from user input (defaults filled in, id generated)
    pub fn add_server(&mut self, request: NewServer) -> SimResult<TrafficSnapshot> {
        let spec = self.pool.add_new(request)?;
        info!(server_id = %spec.id, weight = spec.weight, "Server added");
        self.server_stats
            .insert(spec.id, DispatcherServerStats::default());
        Ok(self.snapshot())
    }

    pub fn patch_server(&mut self, id: &str, patch: ServerPatch) -> SimResult<TrafficSnapshot> {
        if self.pool.patch(id, &patch)? {
            info!(server_id = %id, ?patch, "Server updated");
        }
        Ok(self.snapshot())
    }

    pub fn remove_server(&mut self, id: &str) -> SimResult<TrafficSnapshot> {
        let removed = self.pool.remove(id)?;
        self.server_stats.remove(&removed.id);
        info!(server_id = %removed.id, "Server removed");
        Ok(self.snapshot())
    }

    /// Apply any pool mutation, keeping per-server counters in step
    pub fn configure_pool(&mut self, mutation: PoolMutation) -> SimResult<TrafficSnapshot> {
        self.pool.apply(mutation)?;
        let pool = &self.pool;
        self.server_stats.retain(|id, _| pool.find(id).is_some());
        for server in pool.servers() {
            self.server_stats.entry(server.id.clone()).or_default();
        }
        Ok(self.snapshot())
    }

    /// Zero every counter and clear the log; the pool is left as is
    pub fn reset(&mut self) -> TrafficSnapshot {
        for stats in self.server_stats.values_mut() {
            *stats = DispatcherServerStats::default();
        }
        self.total_requests = 0;
        self.request_cursor = 0;
        self.log.clear();
        self.selector.reset(&self.pool);
        info!("Dispatcher reset");
        self.snapshot()
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
