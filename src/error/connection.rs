// Connection lifecycle error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Connection error code constants
///
/// Error code range: 4001-4004
pub struct ConnectionErrorCodes {}

impl ConnectionErrorCodes {
    /// A bind is already outstanding or established
    pub const ALREADY_BOUND: i32 = 4001;

    /// A previous connection is still releasing its resources
    pub const DISCONNECTING: i32 = 4002;

    /// The platform refused the bind request
    pub const BIND_FAILED: i32 = 4003;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 4004;
}

/// Log a connection error with structured context
pub fn log_connection_error(err: &ConnectionError, context: &str) {
    error!(
        "Connection error in {}: code={}, component=RemoteConnection, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors returned by `RemoteConnection::connect`
///
/// Everything after the bind request is handled inside the connection and
/// never surfaces here.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Bind already requested or connected
    AlreadyBound,

    /// Release of the previous connection still in progress
    Disconnecting,

    /// Binder refused the request
    BindFailed { details: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for ConnectionError {
    fn code(&self) -> i32 {
        match self {
            ConnectionError::AlreadyBound => ConnectionErrorCodes::ALREADY_BOUND,
            ConnectionError::Disconnecting => ConnectionErrorCodes::DISCONNECTING,
            ConnectionError::BindFailed { .. } => ConnectionErrorCodes::BIND_FAILED,
            ConnectionError::LockPoisoned { .. } => ConnectionErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ConnectionError::AlreadyBound => {
                "Already bound to the audio engine. Call teardown() first.".to_string()
            }
            ConnectionError::Disconnecting => {
                "Previous connection is still being released".to_string()
            }
            ConnectionError::BindFailed { details } => {
                format!("Unable to bind to the audio engine: {}", details)
            }
            ConnectionError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConnectionError {}
