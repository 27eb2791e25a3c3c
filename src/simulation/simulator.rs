//! # Request Simulator
//!
//! Produces a synthetic latency and error outcome for one request against one
//! server. The function is pure with respect to the server: load bookkeeping is
//! the caller's job (see `traffic::lane`).
//!
//! ## Latency model
//!
//! - Plain mode: `base ± 7ms`, uniformly.
//! - Realistic mode: `base + load + jitter + spike`, where load adds up to half
//!   the base at full capacity, jitter is ±20% of base, and 5% of requests spike
//!   to 2x-3x base on top.
//!
//! Both modes round to whole milliseconds and never go below 8ms.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::Server;

/// Floor applied to every simulated latency
pub const MIN_LATENCY_MS: u64 = 8;

const PLAIN_JITTER_MS: f64 = 7.0;
const JITTER_FRACTION: f64 = 0.2;
const LOAD_LATENCY_FACTOR: f64 = 0.5;
const SPIKE_PROBABILITY: f64 = 0.05;
const ERROR_LOAD_MULTIPLIER: f64 = 2.0;

/// Feature toggles for one simulated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationToggles {
    pub simulate_real_latency: bool,
    pub simulate_errors: bool,
}

impl Default for SimulationToggles {
    fn default() -> Self {
        Self {
            simulate_real_latency: true,
            simulate_errors: true,
        }
    }
}

/// Outcome of one simulated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedRequest {
    pub latency_ms: u64,
    pub is_error: bool,
}

/// Simulate one request against `server`
pub fn simulate_request<R: Rng + ?Sized>(
    server: &Server,
    toggles: &SimulationToggles,
    rng: &mut R,
) -> SimulatedRequest {
    let latency_ms = simulate_latency(server, toggles.simulate_real_latency, rng);
    let is_error = toggles.simulate_errors && rng.gen_bool(effective_error_rate(server));
    SimulatedRequest {
        latency_ms,
        is_error,
    }
}

/// Synthetic latency in milliseconds
pub fn simulate_latency<R: Rng + ?Sized>(server: &Server, realistic: bool, rng: &mut R) -> u64 {
    let base = server.latency_ms as f64;

    let raw = if realistic {
        let load_latency = base * server.load_factor() * LOAD_LATENCY_FACTOR;
        let jitter = base * rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let spike = if rng.gen_bool(SPIKE_PROBABILITY) {
            base * (1.0 + rng.gen_range(0.0..=2.0))
        } else {
            0.0
        };
        base + load_latency + jitter + spike
    } else {
        base + rng.gen_range(-PLAIN_JITTER_MS..=PLAIN_JITTER_MS)
    };

    clamp_latency(raw)
}

/// Error probability after load degradation, capped at 1
pub fn effective_error_rate(server: &Server) -> f64 {
    let rate = server.error_rate * (1.0 + server.load_factor() * ERROR_LOAD_MULTIPLIER);
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn clamp_latency(raw: f64) -> u64 {
    let rounded = raw.round();
    if rounded.is_finite() && rounded > MIN_LATENCY_MS as f64 {
        rounded as u64
    } else {
        MIN_LATENCY_MS
    }
}
