pub mod balancer;
pub mod pool;
pub mod strategies;
pub mod weights;

pub use balancer::{RandomSelection, Selector, SimpleRoundRobin, WeightedRoundRobin};
pub use pool::{Pool, PoolMutation, SharedPool, SyncKey};
pub use strategies::{
    algorithms, create_balancer, create_seeded_balancer, Algorithm, AlgorithmInfo,
};
