//! Append-only lifecycle journal
//!
//! Every committed create and cancel is recorded as a [`JournalEvent`]. Each
//! event carries the hash of its predecessor, so the chain can be re-derived
//! and checked with [`Journal::verify_chain`].
//!
//! Hashes are SHA-256 over the bincode encoding of the event with its own
//! `hash` field zeroed.

use crate::{
    error::Result,
    types::{Address, Amount, Stream, StreamId, Timestamp},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash of the (empty) chain before the first event
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Stream opened and deposit escrowed
    Created {
        /// Record as inserted
        stream: Stream,
    },

    /// Stream cancelled and escrow split
    Cancelled {
        /// Cancelled stream
        stream_id: StreamId,
        /// Payer
        sender: Address,
        /// Payee
        receiver: Address,
        /// Token
        token: Address,
        /// Paid to the receiver
        receiver_payout: Amount,
        /// Refunded to the sender
        sender_refund: Amount,
    },
}

impl EventKind {
    /// Stream this event is about
    pub fn stream_id(&self) -> StreamId {
        match self {
            EventKind::Created { stream } => stream.id,
            EventKind::Cancelled { stream_id, .. } => *stream_id,
        }
    }
}

/// One journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Position in the journal, starting at 0
    pub sequence: u64,

    /// Ledger time the event was committed at
    pub recorded_at: Timestamp,

    /// Payload
    pub kind: EventKind,

    /// Hash of the preceding event
    pub previous_hash: [u8; 32],

    /// Hash of this event
    pub hash: [u8; 32],
}

impl JournalEvent {
    /// Canonical bytes for hashing (own hash zeroed)
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut unsealed = self.clone();
        unsealed.hash = [0u8; 32];
        Ok(bincode::serialize(&unsealed)?)
    }

    /// Compute this event's hash
    pub fn compute_hash(&self) -> Result<[u8; 32]> {
        Ok(hash_bytes(&self.canonical_bytes()?))
    }
}

/// Hash raw bytes (SHA-256)
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash-chained event log
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Vec<JournalEvent>,
}

impl Journal {
    /// Create empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next event without recording it
    ///
    /// Lets callers surface serialization failures before committing any
    /// other state; pair with [`commit`](Self::commit).
    pub fn seal(&self, kind: EventKind, recorded_at: Timestamp) -> Result<JournalEvent> {
        let mut event = JournalEvent {
            event_id: Uuid::now_v7(),
            sequence: self.events.len() as u64,
            recorded_at,
            kind,
            previous_hash: self.head(),
            hash: [0u8; 32],
        };
        event.hash = event.compute_hash()?;
        Ok(event)
    }

    /// Record a sealed event
    pub fn commit(&mut self, event: JournalEvent) {
        debug_assert_eq!(event.sequence, self.events.len() as u64);
        debug_assert_eq!(event.previous_hash, self.head());

        tracing::debug!(
            event_id = %event.event_id,
            sequence = event.sequence,
            stream_id = event.kind.stream_id(),
            "Journal event recorded"
        );
        self.events.push(event);
    }

    /// Seal and record in one step
    pub fn append(&mut self, kind: EventKind, recorded_at: Timestamp) -> Result<&JournalEvent> {
        let event = self.seal(kind, recorded_at)?;
        self.commit(event);
        Ok(&self.events[self.events.len() - 1])
    }

    /// Hash of the latest event
    pub fn head(&self) -> [u8; 32] {
        self.events.last().map(|e| e.hash).unwrap_or(GENESIS_HASH)
    }

    /// All events, oldest first
    pub fn events(&self) -> &[JournalEvent] {
        &self.events
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if journal is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Re-derive every hash and link
    pub fn verify_chain(&self) -> Result<bool> {
        let mut previous = GENESIS_HASH;
        for (position, event) in self.events.iter().enumerate() {
            if event.sequence != position as u64
                || event.previous_hash != previous
                || event.compute_hash()? != event.hash
            {
                return Ok(false);
            }
            previous = event.hash;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled(stream_id: StreamId) -> EventKind {
        EventKind::Cancelled {
            stream_id,
            sender: Address::new("0xa11ce"),
            receiver: Address::new("0xb0b"),
            token: Address::new("0xusdc"),
            receiver_payout: 3,
            sender_refund: 7,
        }
    }

    #[test]
    fn test_hash_bytes() {
        let hash1 = hash_bytes(b"stream");
        let hash2 = hash_bytes(b"stream");
        let hash3 = hash_bytes(b"streams");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_empty_journal() {
        let journal = Journal::new();
        assert!(journal.is_empty());
        assert_eq!(journal.head(), GENESIS_HASH);
        assert!(journal.verify_chain().unwrap());
    }

    #[test]
    fn test_append_links_events() {
        let mut journal = Journal::new();
        let first_hash = journal.append(cancelled(1), 10).unwrap().hash;
        let second = journal.append(cancelled(2), 11).unwrap().clone();

        assert_eq!(journal.len(), 2);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.previous_hash, first_hash);
        assert_eq!(journal.head(), second.hash);
        assert_eq!(second.kind.stream_id(), 2);
        assert!(journal.verify_chain().unwrap());
    }

    #[test]
    fn test_tampering_breaks_chain() {
        let mut journal = Journal::new();
        journal.append(cancelled(1), 10).unwrap();
        journal.append(cancelled(2), 11).unwrap();

        journal.events[0].recorded_at = 99;
        assert!(!journal.verify_chain().unwrap());
    }

    #[test]
    fn test_seal_does_not_record() {
        let journal = Journal::new();
        let event = journal.seal(cancelled(1), 10).unwrap();
        assert_eq!(event.sequence, 0);
        assert!(journal.is_empty());
    }
}
