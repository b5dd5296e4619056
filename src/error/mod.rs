// Error types for the scene player
//
// This module defines custom error types for remote engine calls and the
// connection lifecycle, with error codes suitable for the host container.

mod connection;
mod remote;

pub use connection::{log_connection_error, ConnectionError, ConnectionErrorCodes};
pub use remote::{log_remote_error, RemoteError, RemoteErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
