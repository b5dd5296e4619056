// Remote engine error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Remote error code constants
///
/// Single source of truth for codes surfaced to the host container.
///
/// Error code range: 3001-3004
pub struct RemoteErrorCodes {}

impl RemoteErrorCodes {
    /// A remote call could not complete (transport failure)
    pub const TRANSPORT: i32 = 3001;

    /// A remote call did not answer within its bounded wait
    pub const TIMEOUT: i32 = 3002;

    /// The session file could not be read locally
    pub const SESSION_IO: i32 = 3003;

    /// The engine refused the audio resource request
    pub const AUDIO_DENIED: i32 = 3004;
}

/// Log a remote error with structured context
///
/// Emits the numeric code, the component and the human-readable message.
/// Never panics.
pub fn log_remote_error(err: &RemoteError, context: &str) {
    error!(
        "Remote error in {}: code={}, component=RemoteConnection, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by calls into the remote audio engine
///
/// Transport-class errors (`Transport`, `Timeout`) presume the connection
/// is unusable. `SessionIo` is a local failure: the connection may still
/// be fine but the session cannot proceed.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Remote call failed in transit
    Transport { operation: String, details: String },

    /// Remote call exceeded its bounded wait
    Timeout { operation: String, timeout_ms: u64 },

    /// Session file unreadable on the local side
    SessionIo { path: String, details: String },

    /// Audio request returned a nonzero status
    AudioDenied { code: i32 },
}

impl RemoteError {
    /// Shorthand for a transport failure on `operation`.
    pub fn transport(operation: &str, details: impl Into<String>) -> Self {
        RemoteError::Transport {
            operation: operation.to_string(),
            details: details.into(),
        }
    }

    /// True for failures that leave the connection presumptively unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::Transport { .. } | RemoteError::Timeout { .. }
        )
    }

    /// True for local I/O failures that do not implicate the connection.
    pub fn is_local_io(&self) -> bool {
        matches!(self, RemoteError::SessionIo { .. })
    }
}

impl ErrorCode for RemoteError {
    fn code(&self) -> i32 {
        match self {
            RemoteError::Transport { .. } => RemoteErrorCodes::TRANSPORT,
            RemoteError::Timeout { .. } => RemoteErrorCodes::TIMEOUT,
            RemoteError::SessionIo { .. } => RemoteErrorCodes::SESSION_IO,
            RemoteError::AudioDenied { .. } => RemoteErrorCodes::AUDIO_DENIED,
        }
    }

    fn message(&self) -> String {
        match self {
            RemoteError::Transport { operation, details } => {
                format!("Remote call {} failed: {}", operation, details)
            }
            RemoteError::Timeout {
                operation,
                timeout_ms,
            } => {
                format!("Remote call {} timed out after {}ms", operation, timeout_ms)
            }
            RemoteError::SessionIo { path, details } => {
                format!("Unable to open session {}: {}", path, details)
            }
            RemoteError::AudioDenied { code } => {
                format!("Audio request denied (status {})", code)
            }
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RemoteError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RemoteError {}
