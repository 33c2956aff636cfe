//! Central error types for the syncer operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use std::time::Duration;

use thiserror::Error;

/// Central error type for the syncer operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Malformed resource reference (API version, kind or name)
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Property path does not resolve inside a fetched object
    #[error("Invalid pointer '{pointer}': {reason}")]
    InvalidPointer { pointer: String, reason: String },

    /// Partial update of a target object was rejected or timed out
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// Writing a binding back to the store failed (finalizer add/remove)
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Malformed or non-positive poll interval
    #[error("Invalid interval '{interval}': {reason}")]
    InvalidInterval { interval: String, reason: String },

    /// A sync loop did not wind down within the allotted time
    #[error("Sync loop for {binding} did not stop within {timeout:?}")]
    StopTimeout { binding: String, timeout: Duration },

    /// A call to the cluster did not answer in time
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Binding spec validation error
    #[error("Binding validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check if this error type should trigger a quick retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::KubeError(_)
                | Error::PersistenceFailed(_)
                | Error::UpdateFailed(_)
                | Error::Timeout { .. }
        )
    }

    /// Whether the error points at a mistake in the binding itself
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidReference(_)
                | Error::InvalidPointer { .. }
                | Error::InvalidInterval { .. }
                | Error::ValidationError(_)
        )
    }
}
