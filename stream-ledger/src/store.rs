//! Stream store and id allocator
//!
//! The store owns every live [`Stream`] record. Indices elsewhere hold ids
//! only and resolve them through [`StreamStore::get`].

use crate::{
    error::{Error, Result},
    types::{Stream, StreamId},
};
use std::collections::HashMap;

/// Default first stream id
pub const DEFAULT_STREAM_ID_BASE: StreamId = 100_000;

/// Monotonic id source; ids are never reused or reset
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: StreamId,
}

impl IdAllocator {
    /// Create allocator starting at `base`
    pub fn new(base: StreamId) -> Self {
        Self { next: base }
    }

    /// Id the next call to [`allocate`](Self::allocate) will return
    ///
    /// Fails exactly when that call would fail.
    pub fn peek(&self) -> Result<StreamId> {
        self.next.checked_add(1).ok_or(Error::IdSpaceExhausted)?;
        Ok(self.next)
    }

    /// Issue the next id
    pub fn allocate(&mut self) -> Result<StreamId> {
        let id = self.next;
        self.next = id.checked_add(1).ok_or(Error::IdSpaceExhausted)?;
        Ok(id)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_ID_BASE)
    }
}

/// Canonical stream records keyed by id
#[derive(Debug, Default)]
pub struct StreamStore {
    streams: HashMap<StreamId, Stream>,
    allocator: IdAllocator,
}

impl StreamStore {
    /// Create empty store whose ids start at `base`
    pub fn new(base: StreamId) -> Self {
        Self {
            streams: HashMap::new(),
            allocator: IdAllocator::new(base),
        }
    }

    /// Id that will be allocated next
    pub fn next_id(&self) -> Result<StreamId> {
        self.allocator.peek()
    }

    /// Issue a fresh id
    pub fn allocate(&mut self) -> Result<StreamId> {
        self.allocator.allocate()
    }

    /// Insert a record under its own id
    pub fn insert(&mut self, stream: Stream) -> Result<()> {
        if self.streams.contains_key(&stream.id) {
            return Err(Error::DuplicateId(stream.id));
        }

        tracing::debug!(stream_id = stream.id, "Stream record stored");
        self.streams.insert(stream.id, stream);
        Ok(())
    }

    /// Get record by id
    pub fn get(&self, id: StreamId) -> Result<&Stream> {
        self.streams.get(&id).ok_or(Error::StreamNotFound(id))
    }

    /// Delete record, returning it
    pub fn remove(&mut self, id: StreamId) -> Result<Stream> {
        self.streams.remove(&id).ok_or(Error::StreamNotFound(id))
    }

    /// Check whether a record exists
    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, StreamStatus};

    fn stream_with_id(id: StreamId) -> Stream {
        Stream {
            id,
            sender: Address::new("0xa11ce"),
            receiver: Address::new("0xb0b"),
            token: Address::new("0xusdc"),
            rate_per_second: 1,
            start_time: 0,
            end_time: 10,
            deposit_total: 10,
            status: StreamStatus::Active,
        }
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let mut allocator = IdAllocator::default();
        assert_eq!(allocator.peek().unwrap(), DEFAULT_STREAM_ID_BASE);

        let first = allocator.allocate().unwrap();
        let second = allocator.allocate().unwrap();
        assert_eq!(first, 100_000);
        assert_eq!(second, 100_001);
        assert_eq!(allocator.peek().unwrap(), 100_002);
    }

    #[test]
    fn test_allocator_exhaustion() {
        let mut allocator = IdAllocator::new(StreamId::MAX);
        assert!(matches!(allocator.peek(), Err(Error::IdSpaceExhausted)));
        assert!(matches!(allocator.allocate(), Err(Error::IdSpaceExhausted)));
        // Failed allocation does not move the cursor
        assert!(matches!(allocator.peek(), Err(Error::IdSpaceExhausted)));
    }

    #[test]
    fn test_insert_get_remove() {
        let mut store = StreamStore::new(7);
        assert_eq!(store.next_id().unwrap(), 7);
        let id = store.allocate().unwrap();
        assert_eq!(id, 7);

        store.insert(stream_with_id(id)).unwrap();
        assert!(store.contains(id));
        assert_eq!(store.get(id).unwrap().deposit_total, 10);
        assert_eq!(store.len(), 1);

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(store.is_empty());
        assert!(matches!(store.get(id), Err(Error::StreamNotFound(7))));
        assert!(matches!(store.remove(id), Err(Error::StreamNotFound(7))));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = StreamStore::default();
        store.insert(stream_with_id(100_000)).unwrap();
        let result = store.insert(stream_with_id(100_000));
        assert!(matches!(result, Err(Error::DuplicateId(100_000))));
    }

    #[test]
    fn test_removed_id_not_reissued() {
        let mut store = StreamStore::default();
        let id = store.allocate().unwrap();
        store.insert(stream_with_id(id)).unwrap();
        store.remove(id).unwrap();

        assert!(store.allocate().unwrap() > id);
    }
}
