//! Error types for the Umbra renderer
//!
//! One error enum covers the whole deferred pipeline: resource creation,
//! format probing, GPU synchronization and streaming-buffer capacity.

use std::fmt;

/// Result type for Umbra operations
pub type Result<T> = std::result::Result<T, Error>;

/// Umbra errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, binding, etc.)
    InvalidResource(String),

    /// Initialization failed (renderer, attachments, pipelines)
    InitializationFailed(String),

    /// No candidate format supports the requested features
    FormatNotSupported(String),

    /// A fence wait timed out or the device stopped responding
    DeviceLost(String),

    /// A write larger than the streaming buffer's logical frame size
    CapacityExceeded {
        requested: u64,
        capacity: u64,
    },

    /// An operation was called in the wrong order
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::CapacityExceeded { requested, capacity } => write!(
                f,
                "Capacity exceeded: requested {} bytes, capacity is {} bytes",
                requested, capacity
            ),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for errors the frame driver must treat as non-recoverable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::CapacityExceeded { .. } | Error::InvalidState(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
