//! Core types for the stream ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer token base units, no floating point)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stream identifier (allocated from a fixed base, strictly increasing)
pub type StreamId = u64;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Token amount in base units
pub type Amount = u128;

/// Hex form of the all-zero address
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Account or token address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create new address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The null address
    pub fn zero() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty or all-zero address
    pub fn is_null(&self) -> bool {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return true;
        }
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        digits.chars().all(|c| c == '0')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Stream status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamStatus {
    /// Escrowed and vesting
    Active = 1,
    /// Settled early and removed from the ledger (terminal)
    Cancelled = 2,
}

/// Escrowed token transfer vesting linearly over `[start_time, end_time]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream ID
    pub id: StreamId,

    /// Payer
    pub sender: Address,

    /// Payee
    pub receiver: Address,

    /// Token being streamed
    pub token: Address,

    /// Base units released per second
    pub rate_per_second: Amount,

    /// Vesting start (unix seconds)
    pub start_time: Timestamp,

    /// Vesting end (unix seconds)
    pub end_time: Timestamp,

    /// `rate_per_second * (end_time - start_time)`, escrowed at creation
    pub deposit_total: Amount,

    /// Current status
    pub status: StreamStatus,
}

impl Stream {
    /// Length of the vesting window in seconds
    pub fn duration(&self) -> u64 {
        self.end_time.abs_diff(self.start_time)
    }

    /// Check if stream is still active
    pub fn is_active(&self) -> bool {
        self.status == StreamStatus::Active
    }
}

/// Request to open a rate-denominated stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Payee
    pub receiver: Address,

    /// Base units released per second
    pub rate_per_second: Amount,

    /// Token being streamed
    pub token: Address,

    /// Vesting start
    pub start_time: Timestamp,

    /// Vesting end
    pub end_time: Timestamp,
}

/// Request to open a deposit-denominated stream
///
/// The rate is derived as `deposit / (end_time - start_time)`; the deposit
/// must divide evenly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Payee
    pub receiver: Address,

    /// Total amount to escrow
    pub deposit: Amount,

    /// Token being streamed
    pub token: Address,

    /// Vesting start
    pub start_time: Timestamp,

    /// Vesting end
    pub end_time: Timestamp,
}

/// Index role of an address relative to a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Address receives the stream
    Incoming,
    /// Address funds the stream
    Outgoing,
}

/// Accrued incoming balance for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Token
    pub token: Address,

    /// Vested amount across all incoming streams of this token
    pub incoming_balance: Amount,
}

/// One page of streams plus the offset to resume from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPage {
    /// Resumption offset; equals the request offset once exhausted
    pub new_offset: usize,

    /// Streams in this page
    pub streams: Vec<Stream>,
}

/// Outcome of a cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReceipt {
    /// Final stream record (status `Cancelled`)
    pub stream: Stream,

    /// Amount paid to the receiver
    pub receiver_payout: Amount,

    /// Amount refunded to the sender
    pub sender_refund: Amount,

    /// Timestamp the split was computed at
    pub cancelled_at: Timestamp,
}
