//! # Traffic Module
//!
//! Everything that drives requests through the selectors:
//!
//! - `Lane`: one selector + pool + statistics pipeline, shared by the modes below
//! - `AbTestSession`: timed side-by-side comparison of two policies
//! - `run_quick_sim`: the same comparison, synchronous and without load build-up
//! - `TrafficDispatcher`: a single weighted pool driven in bulk

pub mod dispatcher;
pub mod lane;
pub mod quick_sim;

pub use ab_test::{
    AbPhase, AbTestAck, AbTestSession, AbTestStatus, AbTestUpdate, GroupId, GroupStatus,
};
pub use dispatcher::{
    DispatchBatch, DispatcherServerStats, DispatcherServerView, DispatcherTotals,
    TrafficDispatcher, TrafficSnapshot,
};
pub use lane::{Lane, LoadRelease};
pub use quick_sim::{
    run_configured_quick_sim, run_quick_sim, QuickSimGroup, QuickSimReport, QuickSimRequest,
};
