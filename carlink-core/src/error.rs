//! Domain-specific error types for the CarLink session layer.
//!
//! All fallible operations return `Result<T, LinkError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the session layer.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A session state transition was requested from an invalid phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// The protocol worker was handed its channel endpoints twice.
    #[error("protocol worker already initialised")]
    AlreadyInitialised,

    // ── Channel Errors ───────────────────────────────────────────
    /// A media channel endpoint was taken after it had already been
    /// transferred to its owning worker.
    #[error("channel endpoint already transferred: {0}")]
    EndpointMoved(&'static str),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Device Errors ────────────────────────────────────────────
    /// The OS-level device query or open failed.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dongle was found but could not be accessed (permissions).
    #[error("device access denied: {0}")]
    DeviceAccess(String),

    // ── Audio Errors ─────────────────────────────────────────────
    /// Building or starting an audio output stream failed.
    #[error("audio output error: {0}")]
    Audio(String),

    /// Microphone acquisition or capture failed.
    #[error("microphone error: {0}")]
    Microphone(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for LinkError {
    fn from(s: String) -> Self {
        LinkError::Other(s)
    }
}

impl From<&str> for LinkError {
    fn from(s: &str) -> Self {
        LinkError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for LinkError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        LinkError::ChannelClosed
    }
}
