//! # Configuration Module
//!
//! Loads the simulator's settings from YAML or JSON, layers `LBSIM_*`
//! environment variables on top and validates the result in one pass.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support
//! - Validation that reports every problem at once
//!
//! Every section has defaults, so an empty file (or no file at all) yields the
//! built-in three-server pool with a 100-request, 10 rps A/B run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{SimError, SimResult};
use crate::core::types::{default_upstream_pool, ServerSpec};
use crate::load_balancing::Algorithm;
use crate::observability::{LogConfig, LogFormat};
use crate::simulation::{SimulationToggles, DISPATCHER_LOG_CAPACITY, GROUP_LOG_CAPACITY};

/// Upper bound on the A/B tick rate
pub const MAX_REQUESTS_PER_SECOND: u32 = 100;

/// Complete simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Template pool every run starts from
    pub pool: Vec<ServerSpec>,

    /// Initial settings of the timed A/B session
    pub ab_test: AbTestConfig,

    /// Defaults for the synchronous comparison
    pub quick_sim: QuickSimDefaults,

    /// Dispatch log sizes
    pub dispatch_log: DispatchLogConfig,

    pub logging: LogConfig,

    /// Fixed seed for every random source; entropy when absent
    pub seed: Option<u64>,
}

/// Settings of one timed A/B run
///
/// Serialized camelCase since it is echoed back in session status; the
/// snake_case spellings are accepted when reading a config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AbTestConfig {
    #[serde(alias = "group_a_algorithm")]
    pub group_a_algorithm: Algorithm,
    #[serde(alias = "group_b_algorithm")]
    pub group_b_algorithm: Algorithm,
    #[serde(alias = "request_count")]
    pub request_count: u64,
    #[serde(alias = "requests_per_second")]
    pub requests_per_second: u32,
    #[serde(alias = "simulate_real_latency")]
    pub simulate_real_latency: bool,
    #[serde(alias = "simulate_errors")]
    pub simulate_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickSimDefaults {
    /// Requests per group; also the batch size of the binary's `dispatch` mode
    pub count: u64,
    pub compare_algorithm: Algorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchLogConfig {
    /// Entries retained per A/B group
    pub group_capacity: usize,
    /// Entries retained by the single-pool dispatcher
    pub dispatcher_capacity: usize,
    /// Entries returned per group by a status query and by quick-sim
    pub status_window: usize,
    /// Entries returned by a dispatcher snapshot
    pub dispatcher_window: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            pool: default_upstream_pool(),
            ab_test: AbTestConfig::default(),
            quick_sim: QuickSimDefaults::default(),
            dispatch_log: DispatchLogConfig::default(),
            logging: LogConfig::default(),
            seed: None,
        }
    }
}

impl Default for AbTestConfig {
    fn default() -> Self {
        Self {
            group_a_algorithm: Algorithm::WeightedRoundRobin,
            group_b_algorithm: Algorithm::SimpleRoundRobin,
            request_count: 100,
            requests_per_second: 10,
            simulate_real_latency: true,
            simulate_errors: true,
        }
    }
}

impl AbTestConfig {
    pub fn toggles(&self) -> SimulationToggles {
        SimulationToggles {
            simulate_real_latency: self.simulate_real_latency,
            simulate_errors: self.simulate_errors,
        }
    }

    /// Pause between ticks: one request per group every `1000 / rps` ms
    pub fn tick_interval(&self) -> std::time::Duration {
        let rps = self.requests_per_second.clamp(1, MAX_REQUESTS_PER_SECOND);
        std::time::Duration::from_millis(1000 / u64::from(rps))
    }
}

impl Default for QuickSimDefaults {
    fn default() -> Self {
        Self {
            count: 50,
            compare_algorithm: Algorithm::SimpleRoundRobin,
        }
    }
}

impl Default for DispatchLogConfig {
    fn default() -> Self {
        Self {
            group_capacity: GROUP_LOG_CAPACITY,
            dispatcher_capacity: DISPATCHER_LOG_CAPACITY,
            status_window: 20,
            dispatcher_window: 24,
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SimError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: SimulatorConfig = serde_yaml::from_str(&content)
            .map_err(|e| SimError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SimError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: SimulatorConfig = serde_json::from_str(&content)
            .map_err(|e| SimError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.json` as JSON, anything else as YAML
    pub async fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let is_json = path
            .as_ref()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::load_from_json(path).await
        } else {
            Self::load_from_file(path).await
        }
    }

    /// Built-in defaults with environment overrides applied
    pub fn from_env() -> SimResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Variables follow the pattern `LBSIM_<FIELD>`, e.g. `LBSIM_REQUEST_COUNT=500`.
    pub fn apply_env_overrides(&mut self) -> SimResult<()> {
        use std::env;

        if let Ok(count) = env::var("LBSIM_REQUEST_COUNT") {
            self.ab_test.request_count = count
                .parse()
                .map_err(|e| SimError::config(format!("Invalid LBSIM_REQUEST_COUNT: {}", e)))?;
        }

        if let Ok(rps) = env::var("LBSIM_REQUESTS_PER_SECOND") {
            self.ab_test.requests_per_second = rps.parse().map_err(|e| {
                SimError::config(format!("Invalid LBSIM_REQUESTS_PER_SECOND: {}", e))
            })?;
        }

        if let Ok(enabled) = env::var("LBSIM_SIMULATE_REAL_LATENCY") {
            self.ab_test.simulate_real_latency = enabled.parse().map_err(|e| {
                SimError::config(format!("Invalid LBSIM_SIMULATE_REAL_LATENCY: {}", e))
            })?;
        }

        if let Ok(enabled) = env::var("LBSIM_SIMULATE_ERRORS") {
            self.ab_test.simulate_errors = enabled
                .parse()
                .map_err(|e| SimError::config(format!("Invalid LBSIM_SIMULATE_ERRORS: {}", e)))?;
        }

        if let Ok(algorithm) = env::var("LBSIM_GROUP_A_ALGORITHM") {
            self.ab_test.group_a_algorithm = algorithm
                .parse()
                .map_err(|e| SimError::config(format!("Invalid LBSIM_GROUP_A_ALGORITHM: {}", e)))?;
        }

        if let Ok(algorithm) = env::var("LBSIM_GROUP_B_ALGORITHM") {
            self.ab_test.group_b_algorithm = algorithm
                .parse()
                .map_err(|e| SimError::config(format!("Invalid LBSIM_GROUP_B_ALGORITHM: {}", e)))?;
        }

        if let Ok(level) = env::var("LBSIM_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("LBSIM_LOG_FORMAT") {
            self.logging.format = format
                .parse::<LogFormat>()
                .map_err(|e| SimError::config(format!("Invalid LBSIM_LOG_FORMAT: {}", e)))?;
        }

        if let Ok(seed) = env::var("LBSIM_SEED") {
            self.seed = Some(
                seed.parse()
                    .map_err(|e| SimError::config(format!("Invalid LBSIM_SEED: {}", e)))?,
            );
        }

        Ok(())
    }

    /// Validate every section, reporting all problems together
    pub fn validate(&self) -> SimResult<()> {
        let mut errors = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for spec in &self.pool {
            if let Err(e) = spec.validate() {
                errors.push(format!("pool server '{}': {}", spec.id, e));
            }
            if !seen.insert(spec.id.as_str()) {
                errors.push(format!("pool server id '{}' is duplicated", spec.id));
            }
        }

        if self.ab_test.request_count == 0 {
            errors.push("ab_test.request_count must be greater than 0".to_string());
        }

        if self.ab_test.requests_per_second == 0
            || self.ab_test.requests_per_second > MAX_REQUESTS_PER_SECOND
        {
            errors.push(format!(
                "ab_test.requests_per_second must be between 1 and {}",
                MAX_REQUESTS_PER_SECOND
            ));
        }

        if self.quick_sim.count == 0 {
            errors.push("quick_sim.count must be greater than 0".to_string());
        }

        let logs = &self.dispatch_log;
        if logs.group_capacity == 0 || logs.dispatcher_capacity == 0 {
            errors.push("dispatch_log capacities must be greater than 0".to_string());
        }
        if logs.status_window > logs.group_capacity {
            errors.push("dispatch_log.status_window cannot exceed group_capacity".to_string());
        }
        if logs.dispatcher_window > logs.dispatcher_capacity {
            errors.push(
                "dispatch_log.dispatcher_window cannot exceed dispatcher_capacity".to_string(),
            );
        }

        if self.logging.level.trim().is_empty() {
            errors.push("logging.level cannot be empty".to_string());
        }

        if !errors.is_empty() {
            return Err(SimError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        Ok(())
    }
}
