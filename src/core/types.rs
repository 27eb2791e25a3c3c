//! # Core Types
//!
//! Backend descriptors shared by the pool, the selectors and the simulator.
//!
//! A [`ServerSpec`] is the configuration-time shape of a backend (what the config
//! file and the default pool contain). A [`Server`] is the materialized descriptor
//! living inside a pool: a `ServerSpec` plus the two runtime counters the simulation
//! pipeline maintains while requests are "in flight".

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::error::{SimError, SimResult};

/// Administrative status of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Eligible for selection (when its weight is positive)
    #[default]
    Up,
    /// Drained; never selected
    Down,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration-time description of a backend server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Unique server identifier
    pub id: String,

    /// Human-readable name
    pub label: String,

    /// Host and port the server would be reached at
    pub host: String,

    /// Deployment region
    #[serde(default = "default_region")]
    pub region: String,

    /// Free-text description of the server's role in the pool
    #[serde(default)]
    pub role: String,

    /// Selection weight; 0 disables the server
    pub weight: u32,

    /// Administrative status
    #[serde(default)]
    pub status: ServerStatus,

    /// Baseline latency in milliseconds
    #[serde(alias = "latency_ms")]
    pub latency_ms: u64,

    /// Soft ceiling of concurrent requests before latency and errors degrade
    pub capacity: u32,

    /// Baseline error probability in [0, 1]
    #[serde(alias = "error_rate")]
    pub error_rate: f64,
}

fn default_region() -> String {
    "Custom".to_string()
}

impl ServerSpec {
    /// Check the invariants a spec must satisfy before it can join a pool
    pub fn validate(&self) -> SimResult<()> {
        if self.id.trim().is_empty() {
            return Err(SimError::bad_input("id", "server id is required"));
        }
        if self.label.trim().is_empty() {
            return Err(SimError::bad_input("label", "server label is required"));
        }
        if self.host.trim().is_empty() {
            return Err(SimError::bad_input("host", "server host is required"));
        }
        if !self.error_rate.is_finite() || !(0.0..=1.0).contains(&self.error_rate) {
            return Err(SimError::bad_input(
                "errorRate",
                format!("must be within [0, 1], got {}", self.error_rate),
            ));
        }
        Ok(())
    }
}

static NEXT_INCARNATION: AtomicU64 = AtomicU64::new(1);

/// A backend descriptor as it lives inside a pool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub label: String,
    pub host: String,
    pub region: String,
    pub role: String,
    pub weight: u32,
    pub status: ServerStatus,
    pub latency_ms: u64,
    pub capacity: u32,
    pub error_rate: f64,

    /// Requests currently "in flight" against this server
    pub current_load: u32,

    /// Open connections; tracked alongside `current_load`
    pub active_connections: u32,

    /// Stamped per materialization, so a re-added id is a different server
    #[serde(skip)]
    pub(crate) incarnation: u64,
}

impl Server {
    /// Materialize a spec with idle runtime counters
    pub fn from_spec(spec: &ServerSpec) -> Self {
        Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            host: spec.host.clone(),
            region: spec.region.clone(),
            role: spec.role.clone(),
            weight: spec.weight,
            status: spec.status,
            latency_ms: spec.latency_ms,
            capacity: spec.capacity,
            error_rate: spec.error_rate,
            current_load: 0,
            active_connections: 0,
            incarnation: NEXT_INCARNATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A server is selectable iff it is up and has a positive weight
    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Up && self.weight > 0
    }

    /// Ratio of in-flight requests to capacity, capped at 1
    pub fn load_factor(&self) -> f64 {
        let capacity = self.capacity.max(1) as f64;
        (self.current_load as f64 / capacity).min(1.0)
    }

    pub(crate) fn acquire(&mut self) {
        self.current_load = self.current_load.saturating_add(1);
        self.active_connections = self.active_connections.saturating_add(1);
    }

    pub(crate) fn release(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
        self.active_connections = self.active_connections.saturating_sub(1);
    }
}

/// Request to add a server to a pool
///
/// Numeric fields arrive as `f64` because that is what an external JSON layer
/// hands over; they are validated before anything touches the pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub label: String,
    pub host: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

/// Capacity assigned to servers added at runtime
pub const ADDED_SERVER_CAPACITY: u32 = 500;
/// Error rate assigned to servers added at runtime
pub const ADDED_SERVER_ERROR_RATE: f64 = 0.05;
const ADDED_SERVER_MIN_LATENCY_MS: u64 = 10;
const ADDED_SERVER_DEFAULT_LATENCY_MS: u64 = 50;

impl NewServer {
    /// Turn the request into a spec under the given id
    ///
    /// Weight defaults to 1 and is raised to at least 1; latency defaults to 50ms
    /// and is raised to at least 10ms.
    pub fn into_spec(self, id: String) -> SimResult<ServerSpec> {
        let label = self.label.trim().to_string();
        let host = self.host.trim().to_string();
        if label.is_empty() {
            return Err(SimError::bad_input("label", "label and host are required"));
        }
        if host.is_empty() {
            return Err(SimError::bad_input("host", "label and host are required"));
        }

        let weight = match self.weight {
            Some(raw) => parse_weight(raw)?.max(1),
            None => 1,
        };
        let latency_ms = match self.latency_ms {
            Some(raw) if !raw.is_finite() || raw < 0.0 => {
                return Err(SimError::bad_input(
                    "latencyMs",
                    format!("must be a non-negative number, got {}", raw),
                ));
            }
            Some(raw) if raw == 0.0 => ADDED_SERVER_DEFAULT_LATENCY_MS,
            Some(raw) => (raw.round() as u64).max(ADDED_SERVER_MIN_LATENCY_MS),
            None => ADDED_SERVER_DEFAULT_LATENCY_MS,
        };

        Ok(ServerSpec {
            id,
            label,
            host,
            region: self
                .region
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(default_region),
            role: self
                .role
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Custom server".to_string()),
            weight,
            status: ServerStatus::Up,
            latency_ms,
            capacity: ADDED_SERVER_CAPACITY,
            error_rate: ADDED_SERVER_ERROR_RATE,
        })
    }
}

/// Partial update of a server's weight and/or status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPatch {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub status: Option<ServerStatus>,
}

impl ServerPatch {
    pub fn weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            status: None,
        }
    }

    pub fn status(status: ServerStatus) -> Self {
        Self {
            weight: None,
            status: Some(status),
        }
    }
}

/// Validate a raw weight value
///
/// Weights must be finite, non-negative whole numbers that fit in `u32`; the
/// weighted round robin cursor steps by the GCD of the weights, so fractional
/// values are rejected rather than truncated.
pub fn parse_weight(raw: f64) -> SimResult<u32> {
    if !raw.is_finite() {
        return Err(SimError::bad_input("weight", "must be a finite number"));
    }
    if raw < 0.0 {
        return Err(SimError::bad_input(
            "weight",
            format!("must not be negative, got {}", raw),
        ));
    }
    if raw.fract() != 0.0 {
        return Err(SimError::bad_input(
            "weight",
            format!("must be a whole number, got {}", raw),
        ));
    }
    if raw > u32::MAX as f64 {
        return Err(SimError::bad_input("weight", "value is too large"));
    }
    Ok(raw as u32)
}

/// The three-backend pool every session starts from unless configured otherwise
pub fn default_upstream_pool() -> Vec<ServerSpec> {
    vec![
        ServerSpec {
            id: "backend-1".to_string(),
            label: "Backend Server 1".to_string(),
            host: "backend1:4000".to_string(),
            region: "Tencent Cloud VPS".to_string(),
            role: "Primary Backend - High Capacity".to_string(),
            weight: 5,
            status: ServerStatus::Up,
            latency_ms: 45,
            capacity: 1000,
            error_rate: 0.02,
        },
        ServerSpec {
            id: "backend-2".to_string(),
            label: "Backend Server 2".to_string(),
            host: "backend2:4000".to_string(),
            region: "Tencent Cloud VPS".to_string(),
            role: "Secondary Backend - Medium Capacity".to_string(),
            weight: 3,
            status: ServerStatus::Up,
            latency_ms: 48,
            capacity: 600,
            error_rate: 0.025,
        },
        ServerSpec {
            id: "backend-3".to_string(),
            label: "Backend Server 3".to_string(),
            host: "backend3:4000".to_string(),
            region: "Tencent Cloud VPS".to_string(),
            role: "Tertiary Backend - Low Capacity".to_string(),
            weight: 2,
            status: ServerStatus::Up,
            latency_ms: 52,
            capacity: 400,
            error_rate: 0.03,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_up_and_weight() {
        let pool = default_upstream_pool();
        let mut server = Server::from_spec(&pool[0]);
        assert!(server.is_active());

        server.weight = 0;
        assert!(!server.is_active());

        server.weight = 3;
        server.status = ServerStatus::Down;
        assert!(!server.is_active());
    }

    #[test]
    fn test_load_factor_is_capped() {
        let mut server = Server::from_spec(&default_upstream_pool()[2]);
        assert_eq!(server.load_factor(), 0.0);

        server.current_load = 200;
        assert!((server.load_factor() - 0.5).abs() < f64::EPSILON);

        server.current_load = 4000;
        assert_eq!(server.load_factor(), 1.0);

        server.capacity = 0;
        server.current_load = 1;
        assert_eq!(server.load_factor(), 1.0);
    }

    #[test]
    fn test_release_never_underflows() {
        let mut server = Server::from_spec(&default_upstream_pool()[0]);
        server.release();
        assert_eq!(server.current_load, 0);
        server.acquire();
        server.acquire();
        server.release();
        assert_eq!(server.current_load, 1);
        assert_eq!(server.active_connections, 1);
    }

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight(0.0).unwrap(), 0);
        assert_eq!(parse_weight(7.0).unwrap(), 7);
        assert!(parse_weight(-1.0).is_err());
        assert!(parse_weight(2.5).is_err());
        assert!(parse_weight(f64::NAN).is_err());
        assert!(parse_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn test_new_server_defaults() {
        let spec = NewServer {
            label: "Edge Node".to_string(),
            host: "edge:4000".to_string(),
            ..Default::default()
        }
        .into_spec("edge-node-1".to_string())
        .unwrap();

        assert_eq!(spec.weight, 1);
        assert_eq!(spec.latency_ms, 50);
        assert_eq!(spec.region, "Custom");
        assert_eq!(spec.role, "Custom server");
        assert_eq!(spec.capacity, ADDED_SERVER_CAPACITY);
        assert_eq!(spec.status, ServerStatus::Up);
    }

    #[test]
    fn test_new_server_clamps_and_rejects() {
        let spec = NewServer {
            label: "Slow".to_string(),
            host: "slow:4000".to_string(),
            weight: Some(0.0),
            latency_ms: Some(3.0),
            ..Default::default()
        }
        .into_spec("slow".to_string())
        .unwrap();
        assert_eq!(spec.weight, 1);
        assert_eq!(spec.latency_ms, 10);

        let missing_host = NewServer {
            label: "No host".to_string(),
            ..Default::default()
        }
        .into_spec("x".to_string());
        assert!(matches!(missing_host, Err(SimError::BadInput { .. })));

        let negative = NewServer {
            label: "Neg".to_string(),
            host: "neg:1".to_string(),
            weight: Some(-4.0),
            ..Default::default()
        }
        .into_spec("neg".to_string());
        assert!(matches!(negative, Err(SimError::BadInput { .. })));
    }

    #[test]
    fn test_spec_validation() {
        let mut spec = default_upstream_pool().remove(0);
        assert!(spec.validate().is_ok());
        spec.error_rate = 1.5;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_server_serializes_camel_case() {
        let server = Server::from_spec(&default_upstream_pool()[0]);
        let json = serde_json::to_value(&server).unwrap();
        assert_eq!(json["latencyMs"], 45);
        assert_eq!(json["currentLoad"], 0);
        assert_eq!(json["status"], "up");
    }
}
