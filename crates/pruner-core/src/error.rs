//! Error types for the pruning engine.

use thiserror::Error;

/// Errors raised by a [`HostDocument`](crate::HostDocument) operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Node is not attached to the document")]
    Detached,

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Markup could not be parsed: {0}")]
    Parse(String),

    #[error("DOM operation failed: {0}")]
    Dom(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Umbrella error for session construction.
#[derive(Error, Debug)]
pub enum PrunerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, PrunerError>;
