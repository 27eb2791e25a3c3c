//! # Selector Module
//!
//! This module provides the three interchangeable selection policies the
//! simulator compares: weighted round robin, simple round robin and random.
//!
//! ## Rust Concepts Explained
//!
//! - A trait object (`Box<dyn Selector>`) lets a group swap its policy at runtime
//!   without the caller knowing which concrete type it holds
//! - `Send` on the trait lets a selector live inside a session that a tokio task
//!   drives
//! - Selectors never own the pool; every call borrows it (`&Pool`), so edits made
//!   between calls are always visible on the next one
//!
//! ## Selection Algorithms
//!
//! 1. **Weighted Round Robin**: the interleaved nginx/LVS algorithm; a server with
//!    weight 5 gets five turns per cycle, spread across the cycle
//! 2. **Simple Round Robin**: every active server in pool order, weight ignored
//! 3. **Random**: a uniform pick among active servers
//!
//! ## Usage Example
//!
//! ```rust
//! use lb_simulator::core::types::default_upstream_pool;
//! use lb_simulator::load_balancing::{Pool, Selector, WeightedRoundRobin};
//!
//! let pool = Pool::from_specs(&default_upstream_pool());
//! let mut selector = WeightedRoundRobin::new();
//! let index = selector.next(&pool).expect("pool has active servers");
//! assert_eq!(pool.servers()[index].id, "backend-1");
//! ```

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::pool::{Pool, SyncKey};
use super::strategies::Algorithm;
use super::weights::{gcd_of, max_of};

/// Core trait for selection policies
///
/// `next` returns an index into `pool.servers()`. Absence of an eligible server
/// is `None`, never a panic, and has no side effects beyond the policy's own
/// cursor.
pub trait Selector: Send {
    /// Rebuild the active view if the pool's topology changed since the last call
    fn sync(&mut self, pool: &Pool);

    /// Pick the next target
    fn next(&mut self, pool: &Pool) -> Option<usize>;

    /// Forget cursor state and resync from scratch
    fn reset(&mut self, pool: &Pool);

    /// Number of servers currently eligible for selection
    fn active_count(&mut self, pool: &Pool) -> usize;

    /// Which policy this is
    fn algorithm(&self) -> Algorithm;
}

/// Weighted round robin (interleaved, as in nginx and LVS)
///
/// The cursor sweeps the active list repeatedly. Each time it wraps, the
/// acceptance threshold `current_weight` drops by the GCD of the weights and is
/// refilled to the maximum weight once it reaches zero. A server is picked when
/// its weight meets the threshold, which spreads heavy servers across the cycle
/// instead of serving them in bursts.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    synced: Option<SyncKey>,
    active: Vec<usize>,
    weights: Vec<u32>,
    current_index: Option<usize>,
    current_weight: i64,
    max_weight: u32,
    gcd_weight: u32,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebuild(&mut self, pool: &Pool) {
        self.active = pool.active_indices();
        self.weights = self
            .active
            .iter()
            .filter_map(|&index| pool.get(index).map(|server| server.weight))
            .collect();
        self.max_weight = max_of(self.weights.iter().copied());
        self.gcd_weight = gcd_of(self.weights.iter().copied());
        self.current_index = None;
        self.current_weight = 0;
        self.synced = Some(pool.sync_key());

        debug!(
            active = self.active.len(),
            max_weight = self.max_weight,
            gcd_weight = self.gcd_weight,
            algorithm = "weighted-round-robin",
            "Rebuilt active view"
        );
    }
}

impl Selector for WeightedRoundRobin {
    fn sync(&mut self, pool: &Pool) {
        if self.synced != Some(pool.sync_key()) {
            self.rebuild(pool);
        }
    }

    fn next(&mut self, pool: &Pool) -> Option<usize> {
        self.sync(pool);
        let n = self.active.len();
        if n == 0 {
            return None;
        }

        // Active weights are all positive, so max_weight > 0 and the loop ends
        // within max_weight / gcd_weight sweeps.
        loop {
            let index = self.current_index.map_or(0, |i| (i + 1) % n);
            self.current_index = Some(index);

            if index == 0 {
                self.current_weight -= i64::from(self.gcd_weight);
                if self.current_weight <= 0 {
                    self.current_weight = i64::from(self.max_weight);
                    if self.current_weight == 0 {
                        return None;
                    }
                }
            }

            if i64::from(self.weights[index]) >= self.current_weight {
                return Some(self.active[index]);
            }
        }
    }

    fn reset(&mut self, pool: &Pool) {
        self.rebuild(pool);
    }

    fn active_count(&mut self, pool: &Pool) -> usize {
        self.sync(pool);
        self.active.len()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::WeightedRoundRobin
    }
}

/// Plain round robin over the active list, ignoring weight values
#[derive(Debug, Default)]
pub struct SimpleRoundRobin {
    synced: Option<SyncKey>,
    active: Vec<usize>,
    current_index: Option<usize>,
}

impl SimpleRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for SimpleRoundRobin {
    fn sync(&mut self, pool: &Pool) {
        if self.synced != Some(pool.sync_key()) {
            self.active = pool.active_indices();
            self.current_index = None;
            self.synced = Some(pool.sync_key());
        }
    }

    fn next(&mut self, pool: &Pool) -> Option<usize> {
        self.sync(pool);
        let n = self.active.len();
        if n == 0 {
            return None;
        }
        let index = self.current_index.map_or(0, |i| (i + 1) % n);
        self.current_index = Some(index);
        Some(self.active[index])
    }

    fn reset(&mut self, pool: &Pool) {
        self.synced = None;
        self.sync(pool);
    }

    fn active_count(&mut self, pool: &Pool) -> usize {
        self.sync(pool);
        self.active.len()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::SimpleRoundRobin
    }
}

/// Uniform random pick among active servers
#[derive(Debug)]
pub struct RandomSelection {
    synced: Option<SyncKey>,
    active: Vec<usize>,
    rng: SmallRng,
}

impl RandomSelection {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic sequence for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            synced: None,
            active: Vec::new(),
            rng,
        }
    }
}

impl Default for RandomSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RandomSelection {
    fn sync(&mut self, pool: &Pool) {
        if self.synced != Some(pool.sync_key()) {
            self.active = pool.active_indices();
            self.synced = Some(pool.sync_key());
        }
    }

    fn next(&mut self, pool: &Pool) -> Option<usize> {
        self.sync(pool);
        if self.active.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.active.len());
        Some(self.active[index])
    }

    fn reset(&mut self, pool: &Pool) {
        self.synced = None;
        self.sync(pool);
    }

    fn active_count(&mut self, pool: &Pool) -> usize {
        self.sync(pool);
        self.active.len()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Random
    }
}
