pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{LogConfig, LogFormat};
pub use logging::init_logging;
