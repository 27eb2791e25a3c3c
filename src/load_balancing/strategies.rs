use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::balancer::{RandomSelection, Selector, SimpleRoundRobin, WeightedRoundRobin};
use crate::core::error::SimError;

/// Selection policies a group can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    WeightedRoundRobin,
    SimpleRoundRobin,
    Random,
}

/// Catalog entry describing one policy
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub id: Algorithm,
    pub label: &'static str,
    pub description: &'static str,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::WeightedRoundRobin,
        Algorithm::SimpleRoundRobin,
        Algorithm::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedRoundRobin => "weighted-round-robin",
            Self::SimpleRoundRobin => "simple-round-robin",
            Self::Random => "random",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::WeightedRoundRobin => "Weighted Round Robin",
            Self::SimpleRoundRobin => "Simple Round Robin",
            Self::Random => "Random Selection",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::WeightedRoundRobin => {
                "Distributes traffic based on server weights. Higher weight = more traffic."
            }
            Self::SimpleRoundRobin => {
                "Distributes traffic evenly across all servers regardless of capacity."
            }
            Self::Random => "Randomly selects a server for each request. Simple but unpredictable.",
        }
    }

    pub fn info(&self) -> AlgorithmInfo {
        AlgorithmInfo {
            id: *self,
            label: self.label(),
            description: self.description(),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "weighted-round-robin" => Ok(Self::WeightedRoundRobin),
            "simple-round-robin" => Ok(Self::SimpleRoundRobin),
            "random" => Ok(Self::Random),
            other => Err(SimError::bad_input(
                "algorithm",
                format!("unknown load balancing algorithm: {}", other),
            )),
        }
    }
}

/// Every policy the simulator knows, for listing to callers
pub fn algorithms() -> Vec<AlgorithmInfo> {
    Algorithm::ALL.iter().map(Algorithm::info).collect()
}

/// Build a fresh selector for the given policy
pub fn create_balancer(algorithm: Algorithm) -> Box<dyn Selector> {
    match algorithm {
        Algorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        Algorithm::SimpleRoundRobin => Box::new(SimpleRoundRobin::new()),
        Algorithm::Random => Box::new(RandomSelection::new()),
    }
}

/// Like [`create_balancer`], with a fixed seed for policies that draw randomness
pub fn create_seeded_balancer(algorithm: Algorithm, seed: u64) -> Box<dyn Selector> {
    match algorithm {
        Algorithm::Random => Box::new(RandomSelection::with_seed(seed)),
        other => create_balancer(other),
    }
}
