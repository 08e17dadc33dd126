//! Stream Ledger
//!
//! Continuous payment streams: a sender escrows a token deposit that vests
//! linearly to a receiver over a time window. Either side of the split can
//! be settled at any time by cancelling.
//!
//! # Architecture
//!
//! - **Single Writer**: One write lock (or the actor mailbox) orders all mutations
//! - **Escrow Gateway**: Token movement goes through [`TokenGateway`]
//! - **Address Indices**: Per-address incoming and outgoing id lists with paging
//! - **Journal**: Hash-chained record of every create and cancel
//!
//! # Invariants
//!
//! - Conservation: vested + remaining == deposit_total at every instant
//! - Ids are issued monotonically and never reused
//! - A stream id is in both indices exactly while its record is live
//! - Failed mutations leave no trace

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accrual;
pub mod actor;
pub mod balance;
pub mod clock;
pub mod config;
pub mod error;
pub mod escrow;
pub mod index;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod store;
pub mod types;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CancelPolicy, Config};
pub use error::{Error, ErrorKind, Result};
pub use escrow::{InMemoryTokenGateway, Payout, TokenGateway};
pub use journal::{EventKind, JournalEvent};
pub use ledger::StreamLedger;
pub use metrics::Metrics;
pub use types::{
    Address, Amount, CancelReceipt, DepositRequest, Role, Stream, StreamId, StreamPage,
    StreamRequest, StreamStatus, Timestamp, TokenBalance,
};
