//! Error types for the autoscaler

use thiserror::Error;

/// Result type for autoscaler operations
pub type Result<T> = std::result::Result<T, AutoscaleError>;

/// Errors that can occur in the autoscaler
#[derive(Error, Debug)]
pub enum AutoscaleError {
    /// Metrics collection error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Scaling strategy error
    #[error("Strategy error: {0}")]
    Strategy(String),

    /// Capacity probe error
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Policy hook error
    #[error("Policy error: {0}")]
    Policy(String),

    /// Worker spawn error
    #[error("Spawn error for {connection}:{queue}: {message}")]
    Spawn {
        /// Connection the worker was meant to serve
        connection: String,
        /// Queue the worker was meant to serve
        queue: String,
        /// Underlying failure
        message: String,
    },

    /// Worker termination error
    #[error("Terminate error for pid {pid}: {message}")]
    Terminate {
        /// Process id of the worker
        pid: u32,
        /// Underlying failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("Autoscale error: {0}")]
    Other(#[from] anyhow::Error),
}
