//! Error types for bridge operations.

use crate::destination::DestinationDescriptor;
use thiserror::Error;

/// Backend-level failure reported by the broker client
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("destination not found: {name}")]
    DestinationNotFound { name: String },

    #[error("declaring '{name}' failed: {message}")]
    DeclareFailed { name: String, message: String },

    #[error("receipt handle is no longer valid: {receipt}")]
    HandleExpired { receipt: String },

    #[error("operation not supported by this backend: {operation}")]
    Unsupported { operation: String },

    #[error("backend error: {0}")]
    Other(#[from] anyhow::Error),
}

impl BackendError {
    /// Check if the failure is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::DestinationNotFound { .. } => false,
            Self::DeclareFailed { .. } => false,
            Self::HandleExpired { .. } => false,
            Self::Unsupported { .. } => false,
            Self::Other(_) => true,
        }
    }

    /// Check if re-provisioning the destination's topology could remedy the failure
    pub fn is_missing_topology(&self) -> bool {
        matches!(self, Self::DestinationNotFound { .. })
    }
}

/// Send-path failure carrying the destination descriptor it was attempting to reach
#[derive(Debug, Error)]
#[error("transport fault reaching {descriptor}: {cause}")]
pub struct TransportFault {
    pub descriptor: DestinationDescriptor,
    #[source]
    pub cause: BackendError,
}

impl TransportFault {
    /// Create a fault for the given descriptor
    pub fn new(descriptor: DestinationDescriptor, cause: BackendError) -> Self {
        Self { descriptor, cause }
    }

    /// Get the backend failure that triggered the fault
    pub fn cause(&self) -> &BackendError {
        &self.cause
    }
}

/// Configuration errors raised at construction, before any backend interaction
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("a queue name or a topic name is required")]
    MissingDestination,

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Validation errors for destination names and other constrained values
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Errors during message encoding/decoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("codec failure: {0}")]
    Other(String),
}

/// Opaque failure raised by the downstream message bus
#[derive(Debug, Error)]
#[error("bus error: {0}")]
pub struct BusError(#[from] pub anyhow::Error);

impl BusError {
    /// Wrap an arbitrary failure message
    pub fn message(message: impl Into<String>) -> Self {
        Self(anyhow::anyhow!(message.into()))
    }
}

/// Errors surfaced by the producer-side send path
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] CodecError),

    #[error("sending failed: {fault}")]
    SendingFailed {
        #[source]
        fault: TransportFault,
    },
}

/// Errors that terminate a receive loop
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("{0}")]
    Transport(#[from] TransportFault),

    #[error("failed to decode inbound message: {0}")]
    Decode(#[source] CodecError),

    #[error("message disposition failed: {0}")]
    Disposition(#[source] BackendError),

    #[error("backend receive failed: {0}")]
    Backend(#[source] BackendError),
}

/// Errors surfaced by the push-style processor bridge
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to decode inbound message: {0}")]
    Decode(#[source] CodecError),

    #[error("bus dispatch failed: {0}")]
    Dispatch(#[source] BusError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
