//! # Load Balancer Simulator - Core Library Crate
//!
//! Simulates how requests spread over a pool of backend servers under three
//! selection policies (smooth weighted round robin, plain round robin and
//! uniform random), and compares two policies side by side on identical pools.
//!
//! ## Module Layout
//!
//! - `core`: error type, server data types and configuration loading
//! - `load_balancing`: pools, selectors and the policy catalog
//! - `simulation`: per-request latency/error model, run statistics, dispatch log
//! - `traffic`: the drivers (timed A/B session, quick-sim, bulk dispatcher)
//! - `observability`: tracing subscriber setup and `metrics` instrumentation
//!
//! ## Rust Concepts Explained
//!
//! ### Re-exports
//! - `pub use` lifts the commonly used types to the crate root, so callers can
//!   write `lb_simulator::AbTestSession` instead of the full module path
//!
//! ### Shared State
//! - Pools that a background task must reach are `Arc<parking_lot::Mutex<_>>`
//! - Everything else is owned by one driver and borrowed, not shared
//!
//! ### Errors
//! - Every fallible operation returns `SimResult<T>`; nothing panics on bad input
//!
//! ## Example
//!
//! ```
//! use lb_simulator::{default_upstream_pool, run_quick_sim, Algorithm, QuickSimRequest};
//!
//! let report = run_quick_sim(
//!     &default_upstream_pool(),
//!     &QuickSimRequest {
//!         count: Some(20),
//!         compare_algorithm: Some(Algorithm::Random),
//!         ..Default::default()
//!     },
//! );
//! assert_eq!(report.group_a.stats.total_requests, 20);
//! ```

/// Core functionality including error types, configuration, and server types
pub mod core;

/// Server pools, selection policies and the policy catalog
pub mod load_balancing;

/// Request outcome model and run statistics
pub mod simulation;

/// Drivers that push simulated traffic through the selectors
pub mod traffic;

/// Logging setup and metrics instrumentation
pub mod observability;

pub use crate::core::config::{AbTestConfig, SimulatorConfig};
pub use crate::core::error::{SimError, SimResult};
pub use crate::core::types::{
    default_upstream_pool, NewServer, Server, ServerPatch, ServerSpec, ServerStatus,
};
pub use load_balancing::{algorithms, Algorithm, Pool, PoolMutation, Selector};
pub use simulation::{RunStats, SimulationToggles};
pub use traffic::{
    run_quick_sim, AbTestSession, AbTestUpdate, GroupId, QuickSimRequest, TrafficDispatcher,
};
