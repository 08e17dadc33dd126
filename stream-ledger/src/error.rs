//! Error types for the stream ledger

use crate::types::{Address, StreamId, Timestamp};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Start time is not strictly before end time
    #[error("Invalid time range: start {start_time} must be before end {end_time}")]
    InvalidTimeRange {
        /// Requested start time
        start_time: Timestamp,
        /// Requested end time
        end_time: Timestamp,
    },

    /// Rate per second must be positive
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Null or otherwise unusable address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Deposit cannot be streamed evenly over the window
    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    /// Arithmetic overflow on token amounts
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Caller may not act on this stream
    #[error("Unauthorized: {caller} may not cancel stream {stream_id}")]
    Unauthorized {
        /// Stream the caller tried to act on
        stream_id: StreamId,
        /// Rejected caller
        caller: Address,
    },

    /// Unknown or already cancelled stream
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    /// Escrow gateway rejected a pull or payout
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Store already holds a record under this id
    #[error("Duplicate stream id: {0}")]
    DuplicateId(StreamId),

    /// Address index does not agree with the store
    #[error("Index inconsistency: {0}")]
    IndexInconsistency(String),

    /// Allocator ran out of ids
    #[error("Stream id space exhausted")]
    IdSpaceExhausted,

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse error classes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input
    Validation,
    /// Caller identity not permitted
    Authorization,
    /// Unknown or cancelled stream
    NotFound,
    /// Escrow pull or payout rejected
    Transfer,
    /// Internal failure
    Internal,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTimeRange { .. }
            | Error::InvalidRate(_)
            | Error::InvalidAddress(_)
            | Error::InvalidDeposit(_)
            | Error::AmountOverflow(_) => ErrorKind::Validation,
            Error::Unauthorized { .. } => ErrorKind::Authorization,
            Error::StreamNotFound(_) => ErrorKind::NotFound,
            Error::Transfer(_) => ErrorKind::Transfer,
            Error::DuplicateId(_)
            | Error::IndexInconsistency(_)
            | Error::IdSpaceExhausted
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Internal => "internal",
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidRate("zero".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::Unauthorized {
                stream_id: 100_000,
                caller: Address::new("0xbob"),
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(Error::StreamNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Transfer("nope".into()).kind(), ErrorKind::Transfer);
        assert_eq!(Error::IdSpaceExhausted.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidTimeRange {
            start_time: 10,
            end_time: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid time range: start 10 must be before end 10"
        );
        assert_eq!(Error::from("boom").to_string(), "boom");
    }
}
