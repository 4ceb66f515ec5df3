//! # Serial Link Error Handling
//!
//! This module defines the LinkError enum, which represents the different error
//! types that can occur while discovering, locking, opening and driving a serial link.

use thiserror::Error;

/// Represents the different error types that can occur in the servo-serial crate.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device node does not exist, or "auto" selection found no adapter.
    #[error("Serial device not found: {0}")]
    DeviceNotFound(String),

    /// Another instance already owns the device lock.
    #[error("Serial device is locked by another instance: {0}")]
    LockHeld(String),

    /// The device exists but could not be opened or configured.
    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    /// A receive did not complete within its timeout budget.
    #[error("Timeout: expected {expected} bytes, received {received}")]
    Timeout { expected: usize, received: usize },

    /// A transfer was attempted on a link that is not open.
    #[error("Serial link is not open")]
    NotOpen,

    /// Unexpected failure mid-transfer (device unplugged, driver error, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    pub(crate) fn open_failed(path: &str, reason: impl ToString) -> Self {
        LinkError::OpenFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
