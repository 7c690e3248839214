//! Error types for beanline.

use thiserror::Error;

/// Main error type for all beanline operations.
#[derive(Debug, Error)]
pub enum BeanlineError {
    /// I/O error while connecting, writing, or reading the socket.
    /// Fatal to the connection; the core never reconnects.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation was issued through a [`Job`](crate::Job) whose
    /// owning connection has already been closed or dropped.
    #[error("connection closed")]
    ConnectionClosed,

    /// The broker answered with a recognized failure status
    /// (e.g. `NOT_FOUND`, `NOT_IGNORED`, `JOB_TOO_BIG`, `BURIED`,
    /// `DRAINING`, `TIMED_OUT`, `DEADLINE_SOON`).
    ///
    /// Recoverable: callers that care about a particular status can
    /// match on it; everything the core does not downgrade itself is
    /// propagated unchanged.
    #[error("command failed: {status}")]
    Command {
        /// Status token as sent by the broker.
        status: String,
        /// Remaining tokens of the status line.
        args: Vec<String>,
    },

    /// The broker answered with a status token the caller did not
    /// declare as success or failure. Always a protocol
    /// desynchronization; never silently ignored.
    #[error("unexpected response: {status}")]
    Unexpected {
        /// Status token as sent by the broker.
        status: String,
        /// Remaining tokens of the status line.
        args: Vec<String>,
    },

    /// Malformed frame: a non-numeric id/length field, a missing CRLF
    /// terminator after a declared-length body, or similar.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BeanlineError {
    /// True if this is a [`Command`](Self::Command) failure with the
    /// given status token.
    pub fn is_failure(&self, token: &str) -> bool {
        matches!(self, Self::Command { status, .. } if status == token)
    }
}

/// Result type alias using BeanlineError.
pub type Result<T> = std::result::Result<T, BeanlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_failure_matches_status() {
        let err = BeanlineError::Command {
            status: "NOT_FOUND".to_string(),
            args: vec![],
        };
        assert!(err.is_failure("NOT_FOUND"));
        assert!(!err.is_failure("TIMED_OUT"));
    }

    #[test]
    fn test_is_failure_ignores_other_kinds() {
        let err = BeanlineError::Unexpected {
            status: "NOT_FOUND".to_string(),
            args: vec![],
        };
        assert!(!err.is_failure("NOT_FOUND"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: BeanlineError = io.into();
        assert!(matches!(err, BeanlineError::Io(_)));
    }
}
