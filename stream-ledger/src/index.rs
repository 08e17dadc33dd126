//! Per-address stream indices
//!
//! Each [`AddressIndex`] maps an address to the ids of the streams it takes
//! part in under one [`Role`]. Appends preserve creation order. Removal swaps
//! the last id into the vacated slot, so order is only stable until the next
//! cancellation touching the same address; pagination offsets are consistent
//! within one snapshot.

use crate::{
    error::{Error, Result},
    types::{Address, Role, StreamId},
};
use std::collections::HashMap;

/// Role-scoped registry of stream ids per address
#[derive(Debug, Clone)]
pub struct AddressIndex {
    role: Role,
    entries: HashMap<Address, Vec<StreamId>>,
}

impl AddressIndex {
    /// Create empty index for `role`
    pub fn new(role: Role) -> Self {
        Self {
            role,
            entries: HashMap::new(),
        }
    }

    /// Role this index tracks
    pub fn role(&self) -> Role {
        self.role
    }

    /// Append `id` to the end of `address`'s sequence
    pub fn append(&mut self, address: &Address, id: StreamId) {
        self.entries.entry(address.clone()).or_default().push(id);
    }

    /// Remove one occurrence of `id` from `address`'s sequence
    pub fn remove_id(&mut self, address: &Address, id: StreamId) -> Result<()> {
        let role = self.role;
        let ids = self.entries.get_mut(address).ok_or_else(|| {
            Error::IndexInconsistency(format!(
                "{:?} index has no entry for {} (stream {})",
                role, address, id
            ))
        })?;
        let position = ids
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or_else(|| {
                Error::IndexInconsistency(format!(
                    "{:?} index of {} has no stream {}",
                    role, address, id
                ))
            })?;

        ids.swap_remove(position);
        if ids.is_empty() {
            self.entries.remove(address);
        }

        Ok(())
    }

    /// Full current sequence for `address`
    pub fn all(&self, address: &Address) -> &[StreamId] {
        self.entries.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Window of `address`'s sequence starting at `offset`
    ///
    /// Returns the resumption offset with the ids. Once `offset` reaches the
    /// end of the sequence the offset is echoed back with an empty page.
    pub fn page(&self, address: &Address, limit: usize, offset: usize) -> (usize, &[StreamId]) {
        let ids = self.all(address);
        if offset >= ids.len() {
            return (offset, &[]);
        }

        let end = offset.saturating_add(limit).min(ids.len());
        (end, &ids[offset..end])
    }

    /// Number of ids held for `address`
    pub fn len(&self, address: &Address) -> usize {
        self.all(address).len()
    }

    /// Check whether `address` holds `id`
    pub fn contains(&self, address: &Address, id: StreamId) -> bool {
        self.all(address).contains(&id)
    }
}
