//! Synthetic request outcomes, run statistics and dispatch logs.

pub mod dispatch;
pub mod simulator;
pub mod stats;

pub use dispatch::{DispatchLog, DispatchRecord, DISPATCHER_LOG_CAPACITY, GROUP_LOG_CAPACITY};
pub use simulator::{simulate_latency, simulate_request, SimulatedRequest, SimulationToggles};
pub use stats::{percentile, server_reports, RunStats, ServerReport, ServerShare};
