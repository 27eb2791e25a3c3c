//! # Error Handling Module
//!
//! This module provides the error type for the simulation core using the `thiserror` crate.
//! Every fallible operation in the crate returns [`SimResult`], and every error is a
//! local, recoverable condition handed back to the immediate caller: nothing in here
//! is allowed to tear down a running A/B test.
//!
//! ## Error Taxonomy
//!
//! - `NoActiveServers`: a selector found no eligible target for one request. The
//!   orchestrator counts it as an unserved attempt and keeps going.
//! - `InvalidConfiguration`: a lifecycle operation arrived in the wrong state
//!   (configure while running, stop while idle, ...). State is left unchanged.
//! - `BadInput`: a pool mutation carried an unusable value (negative weight,
//!   missing host, ...). The pool is left unchanged.
//! - `ServerNotFound`: a pool mutation referenced an unknown server id.
//! - `Configuration` / `Io` / `Json` / `Yaml`: loading the simulator configuration.
//!
//! ### Enum-Based Error Types
//! Rust uses enums to represent different error cases, unlike exception hierarchies:
//! - Each variant represents a different error condition
//! - Pattern matching ensures all error cases are handled
//! - `thiserror` derives `Display` and `std::error::Error` from the attributes

use thiserror::Error;

/// Main result type used throughout the simulator
pub type SimResult<T> = Result<T, SimError>;

/// Error types for the simulation core
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display` with the
/// given message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// No server in the pool is up with a positive weight
    #[error("No active servers available for selection")]
    NoActiveServers,

    /// Operation rejected because of the current session state
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A pool mutation carried an unusable value
    #[error("Bad input for '{field}': {reason}")]
    BadInput { field: String, reason: String },

    /// A pool mutation referenced a server id that does not exist
    #[error("Server not found: {id}")]
    ServerNotFound { id: String },

    /// Configuration file errors (invalid values, unreadable file, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O errors while reading configuration
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl SimError {
    /// Create an invalid-configuration error with a custom reason
    pub fn invalid_configuration<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create a bad-input error for the given field
    pub fn bad_input<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::BadInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a server-not-found error
    pub fn server_not_found<S: Into<String>>(id: S) -> Self {
        Self::ServerNotFound { id: id.into() }
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the condition only affects a single request
    ///
    /// Per-request failures are absorbed by the run loop; everything else is a
    /// rejected operation reported to whoever issued it.
    pub fn is_per_request(&self) -> bool {
        matches!(self, Self::NoActiveServers)
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NoActiveServers => "no_active_servers",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::BadInput { .. } => "bad_input",
            Self::ServerNotFound { .. } => "server_not_found",
            Self::Configuration { .. } => "configuration_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
        }
    }
}

/// Implement conversion from std::io::Error
impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Implement conversion from serde_json::Error
impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Implement conversion from serde_yaml::Error
impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}
