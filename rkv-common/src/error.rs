//! # Error Taxonomy
//!
//! One error type is shared by the pool, the executors and the facade so a
//! caller never has to juggle nested error enums.
//!
//! ## Propagation
//! - Nothing is retried; every variant surfaces to the immediate caller.
//! - `Io` and `Protocol` mark the connection as broken so the pool drops it.
//! - `Decode` is only produced by strict reads; lenient reads log and yield
//!   `None` instead.

use std::time::Duration;

use thiserror::Error;

/// Result alias used across the workspace.
pub type RkvResult<T> = Result<T, RkvError>;

/// Errors surfaced by RemoteKV.
#[derive(Debug, Error)]
pub enum RkvError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Store returned an error reply.
    #[error("server error: {0}")]
    Server(String),
    /// Reply type did not match the command that was sent.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// No pooled resource became available within the configured wait.
    #[error("connection pool exhausted after waiting {0:?}")]
    PoolExhausted(Duration),
    /// Address could not be parsed into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Command cannot be executed safely by this executor.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// Stored value could not be decoded into the requested shape.
    #[error("decode failure: {0}")]
    Decode(String),
    /// Value could not be encoded by the codec.
    #[error("encode failure: {0}")]
    Encode(String),
}

impl RkvError {
    /// Returns true when the connection that produced this error must not be
    /// handed out again.
    #[inline]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, RkvError::Io(_) | RkvError::Protocol)
    }

    /// Returns true for `Unsupported`.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RkvError::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_classified() {
        let io = RkvError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_connection_error());
        assert!(RkvError::Protocol.is_connection_error());
        assert!(!RkvError::Server("ERR wrong type".into()).is_connection_error());
        assert!(!RkvError::Unsupported("RENAME").is_connection_error());
    }

    #[test]
    fn display_includes_context() {
        let err = RkvError::PoolExhausted(Duration::from_millis(250));
        assert_eq!(err.to_string(), "connection pool exhausted after waiting 250ms");
        assert_eq!(
            RkvError::Unsupported("SINTER").to_string(),
            "unsupported operation: SINTER"
        );
    }
}
