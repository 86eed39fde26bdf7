//! Error types for the registry client

use std::time::Duration;
use thiserror::Error;

/// Registry client error type
#[derive(Error, Debug)]
pub enum Error {
    /// No persisted profile state exists
    #[error("hydra-cli is not configured. Use `hydra-cli config <name>` to create a profile")]
    ConfigAbsent,

    /// Persisted profile state could not be parsed
    #[error("Profile state is corrupt: {0}")]
    ConfigCorrupt(String),

    /// The registry did not answer before the connect timeout
    #[error(
        "Timed out after {}s connecting to registry at {host}:{port}. \
         Check the profile or switch with `hydra-cli use <name>`",
        timeout.as_secs()
    )]
    ConnectionTimeout {
        /// Registry host
        host: String,
        /// Registry port
        port: u16,
        /// Time waited before giving up
        timeout: Duration,
    },

    /// The registry refused or broke the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Profile, config label, node or instance not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The registry or message transport reported an error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Redis error
    #[error("Upstream error: {0}")]
    Redis(#[from] redis::RedisError),

    /// HTTP transport error
    #[error("Upstream error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
