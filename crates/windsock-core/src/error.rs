//! Error types for windsock-core.
//!
//! Transport failures during connect/read/write are the only category the
//! supervisor retries automatically (via backoff reconnect). Parse errors are
//! per-frame and self-healing, since the next frame arrives independently,
//! and permission problems are surfaced to the operator without retrying.

use thiserror::Error;

use crate::transport::DeviceDescriptor;

/// Errors that can occur while supervising a station link.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Underlying socket I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A connect attempt (including its fallback) failed.
    #[error("connection to {device} failed: {reason}")]
    ConnectionFailed {
        /// The device the attempt targeted.
        device: DeviceDescriptor,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Operation attempted without a live session.
    #[error("not connected to a station")]
    NotConnected,

    /// The platform denied access to the hardware API.
    ///
    /// Surfaced to the operator as a notice; never auto-retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Operation was cancelled (superseded connect, explicit stop).
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A frame payload failed to decode.
    #[error(transparent)]
    Parse(#[from] windsock_types::ParseError),
}

impl Error {
    /// Create a connection failure with context.
    pub fn connection_failed(device: DeviceDescriptor, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            device,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error is a platform permission problem.
    ///
    /// Permission failures are reported to the operator and excluded from the
    /// automatic reconnect policy.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::PermissionDenied(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

/// Result type alias using windsock-core's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;
