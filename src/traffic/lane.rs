//! # Request Lane
//!
//! One selection pipeline: a pool, the selector bound to it, run statistics, a
//! dispatch log and a private random source. The timed A/B run and quick-sim both
//! push every request through [`Lane::process`].
//!
//! ## Load bookkeeping
//!
//! The target's `current_load` / `active_connections` go up before the request
//! is simulated, so the simulator sees the request itself as in flight. They come
//! back down either immediately (quick-sim) or after the simulated latency has
//! elapsed, from a spawned tokio task. The deferred release carries the ticket
//! `acquire` handed out; if the pool has been replaced or the server removed in
//! the meantime (even if re-added under the same id), the release is dropped.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::error::{SimError, SimResult};
use crate::core::types::Server;
use crate::load_balancing::{
    create_balancer, create_seeded_balancer, Algorithm, Pool, PoolMutation, Selector, SharedPool,
};
use crate::observability::metrics;
use crate::simulation::{
    server_reports, simulate_request, DispatchLog, DispatchRecord, RunStats, ServerReport,
    SimulationToggles,
};

/// How a processed request gives back its load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRelease {
    /// Decrement as soon as the request has been simulated
    Immediate,
    /// Decrement after the simulated latency, from a tokio task
    Deferred,
}

pub struct Lane {
    name: &'static str,
    algorithm: Algorithm,
    pool: SharedPool,
    selector: Box<dyn Selector>,
    stats: RunStats,
    dispatches: DispatchLog,
    rng: SmallRng,
    seed: Option<u64>,
}

impl Lane {
    /// Build a lane over `pool`
    ///
    /// With a seed, both the simulator's draws and (for the random policy) the
    /// selector's draws are reproducible.
    pub fn new(
        name: &'static str,
        algorithm: Algorithm,
        pool: Pool,
        log_capacity: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            name,
            algorithm,
            pool: pool.shared(),
            selector: build_selector(algorithm, seed),
            stats: RunStats::new(),
            dispatches: DispatchLog::with_capacity(log_capacity),
            rng: build_rng(seed),
            seed,
        }
    }

    /// Start over on `pool` with `algorithm`: new selector, empty stats and log
    ///
    /// The shared pool handle is kept and its contents replaced, so any release
    /// still pending against the old contents sees a generation mismatch.
    pub fn rebuild(&mut self, algorithm: Algorithm, pool: Pool) {
        *self.pool.lock() = pool;
        self.algorithm = algorithm;
        self.selector = build_selector(algorithm, self.seed);
        self.rng = build_rng(self.seed);
        self.stats = RunStats::new();
        self.dispatches.clear();
    }

    /// Start the run clock
    pub fn start_clock(&mut self) {
        self.stats = RunStats::started_now();
    }

    /// Push one request through select → load → simulate → record → release
    ///
    /// `NoActiveServers` is counted as an unserved attempt and leaves every
    /// served-request counter untouched.
    pub fn process(
        &mut self,
        request_id: u64,
        toggles: &SimulationToggles,
        release: LoadRelease,
    ) -> SimResult<DispatchRecord> {
        let mut pool = self.pool.lock();

        let Some(index) = self.selector.next(&pool) else {
            self.stats.record_unserved();
            metrics::record_unserved(self.name);
            warn!(lane = self.name, request_id, "No active servers for request");
            return Err(SimError::NoActiveServers);
        };

        let Some(ticket) = pool.acquire(index) else {
            return Err(SimError::NoActiveServers);
        };
        let server = &pool.servers()[index];

        let outcome = simulate_request(server, toggles, &mut self.rng);
        self.stats
            .record_request(outcome.latency_ms, outcome.is_error, &server.id);
        let record = DispatchRecord::new(request_id, server, outcome.latency_ms, outcome.is_error);
        self.dispatches.record(record.clone());
        metrics::record_served(self.name, &server.id, outcome.latency_ms, outcome.is_error);

        debug!(
            lane = self.name,
            request_id,
            server_id = %server.id,
            latency_ms = outcome.latency_ms,
            is_error = outcome.is_error,
            current_load = server.current_load,
            algorithm = self.algorithm.as_str(),
            "Dispatched request"
        );

        match (release, tokio::runtime::Handle::try_current()) {
            (LoadRelease::Deferred, Ok(handle)) => {
                let shared = Arc::clone(&self.pool);
                let delay = Duration::from_millis(outcome.latency_ms);
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !shared.lock().release(&ticket) {
                        debug!(?ticket, "Dropped load release for replaced server");
                    }
                });
            }
            _ => {
                pool.release(&ticket);
            }
        }

        Ok(record)
    }

    /// Advance the selector without simulating or recording anything
    pub fn select_next(&mut self) -> Option<Server> {
        let pool = self.pool.lock();
        let server = self
            .selector
            .next(&pool)
            .and_then(|index| pool.get(index).cloned());
        if server.is_some() {
            metrics::record_selection(self.name, self.algorithm.as_str());
        }
        server
    }

    /// Apply a topology edit; the selector picks it up on its next call
    pub fn configure_pool(&mut self, mutation: PoolMutation) -> SimResult<()> {
        let mut pool = self.pool.lock();
        pool.apply(mutation)?;
        let active = self.selector.active_count(&pool);
        metrics::set_active_targets(self.name, active);
        Ok(())
    }

    /// Freeze the statistics
    pub fn finalize(&mut self, end_time: chrono::DateTime<chrono::Utc>) {
        self.stats.finalize(end_time);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn dispatches(&self) -> &DispatchLog {
        &self.dispatches
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn active_count(&mut self) -> usize {
        let pool = self.pool.lock();
        self.selector.active_count(&pool)
    }

    /// Every pool server with its share of this lane's run
    pub fn server_reports(&self) -> Vec<ServerReport> {
        let pool = self.pool.lock();
        server_reports(&pool, &self.stats)
    }
}

fn build_selector(algorithm: Algorithm, seed: Option<u64>) -> Box<dyn Selector> {
    match seed {
        Some(seed) => create_seeded_balancer(algorithm, seed.wrapping_add(1)),
        None => create_balancer(algorithm),
    }
}

fn build_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}
