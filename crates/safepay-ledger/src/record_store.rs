//! Escrow record storage.
//!
//! Records are kept in their packed byte layout and decoded on every read,
//! so a corrupted account surfaces as `AccountDataCorrupt` instead of a
//! silently wrong record. A closed record is never removed: it stays as a
//! tombstone so its identity triple cannot be opened again.

use std::collections::HashMap;

use safepay_types::{EscrowRecord, Pubkey, Result, SafepayError};

use crate::transactional::Transactional;

/// Keyed persistence of escrow records.
pub trait RecordStore: Transactional + Send {
    /// The record at `address`, if any.
    ///
    /// # Errors
    /// Returns `AccountDataCorrupt` if the stored bytes fail validation.
    fn load(&self, address: &Pubkey) -> Result<Option<EscrowRecord>>;

    /// Create a record at an unused address.
    ///
    /// # Errors
    /// Returns `RecordAlreadyExists` if anything, open or closed, is
    /// stored at `address`.
    fn insert(&mut self, address: Pubkey, record: &EscrowRecord) -> Result<()>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    /// Returns `RecordNotFound` if nothing is stored at `address`.
    fn update(&mut self, address: Pubkey, record: &EscrowRecord) -> Result<()>;
}

/// Record store backed by a `HashMap` of packed accounts.
pub struct InMemoryRecordStore {
    accounts: HashMap<Pubkey, Vec<u8>>,
    checkpoint: Option<HashMap<Pubkey, Vec<u8>>>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            checkpoint: None,
        }
    }

    /// Number of stored records, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Overwrite the raw bytes at `address`. Test-only: lets a test plant
    /// a corrupted account.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn put_raw(&mut self, address: Pubkey, data: Vec<u8>) {
        self.accounts.insert(address, data);
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, address: &Pubkey) -> Result<Option<EscrowRecord>> {
        self.accounts
            .get(address)
            .map(|data| EscrowRecord::unpack(data.as_slice()))
            .transpose()
    }

    fn insert(&mut self, address: Pubkey, record: &EscrowRecord) -> Result<()> {
        if self.accounts.contains_key(&address) {
            return Err(SafepayError::RecordAlreadyExists(address));
        }
        self.accounts.insert(address, record.pack());
        tracing::debug!(record = %address.short(), state = %record.state, "Record created");
        Ok(())
    }

    fn update(&mut self, address: Pubkey, record: &EscrowRecord) -> Result<()> {
        let slot = self
            .accounts
            .get_mut(&address)
            .ok_or(SafepayError::RecordNotFound(address))?;
        *slot = record.pack();
        tracing::debug!(record = %address.short(), state = %record.state, "Record updated");
        Ok(())
    }
}

impl Transactional for InMemoryRecordStore {
    fn checkpoint(&mut self) {
        self.checkpoint = Some(self.accounts.clone());
    }

    fn commit(&mut self) {
        self.checkpoint = None;
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.checkpoint.take() {
            self.accounts = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use safepay_types::EscrowState;

    use super::*;

    #[test]
    fn insert_then_load() {
        let mut store = InMemoryRecordStore::new();
        let address = Pubkey::new_unique();
        let record = EscrowRecord::dummy(500);
        store.insert(address, &record).unwrap();
        assert_eq!(store.load(&address).unwrap(), Some(record));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_missing_is_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.load(&Pubkey::new_unique()).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn double_insert_rejected() {
        let mut store = InMemoryRecordStore::new();
        let address = Pubkey::new_unique();
        store.insert(address, &EscrowRecord::dummy(1)).unwrap();
        let err = store.insert(address, &EscrowRecord::dummy(2)).unwrap_err();
        assert_eq!(err, SafepayError::RecordAlreadyExists(address));
    }

    #[test]
    fn closed_record_still_blocks_insert() {
        let mut store = InMemoryRecordStore::new();
        let address = Pubkey::new_unique();
        let mut record = EscrowRecord::dummy(1);
        store.insert(address, &record).unwrap();
        record.close(address).unwrap();
        store.update(address, &record).unwrap();
        assert_eq!(
            store.load(&address).unwrap().map(|r| r.state),
            Some(EscrowState::Closed)
        );
        assert!(store.insert(address, &EscrowRecord::dummy(1)).is_err());
    }

    #[test]
    fn update_missing_rejected() {
        let mut store = InMemoryRecordStore::new();
        let address = Pubkey::new_unique();
        let err = store.update(address, &EscrowRecord::dummy(1)).unwrap_err();
        assert_eq!(err, SafepayError::RecordNotFound(address));
    }

    #[test]
    fn corrupted_bytes_fail_on_read() {
        let mut store = InMemoryRecordStore::new();
        let address = Pubkey::new_unique();
        let mut data = EscrowRecord::dummy(1).pack();
        data[0] ^= 0xff;
        store.put_raw(address, data);
        assert!(matches!(
            store.load(&address).unwrap_err(),
            SafepayError::AccountDataCorrupt { .. }
        ));
    }

    #[test]
    fn rollback_discards_insert() {
        let mut store = InMemoryRecordStore::new();
        let kept = Pubkey::new_unique();
        store.insert(kept, &EscrowRecord::dummy(1)).unwrap();

        store.checkpoint();
        let dropped = Pubkey::new_unique();
        store.insert(dropped, &EscrowRecord::dummy(2)).unwrap();
        store.rollback();

        assert!(store.load(&kept).unwrap().is_some());
        assert!(store.load(&dropped).unwrap().is_none());
    }

    #[test]
    fn commit_keeps_changes() {
        let mut store = InMemoryRecordStore::new();
        store.checkpoint();
        let address = Pubkey::new_unique();
        store.insert(address, &EscrowRecord::dummy(3)).unwrap();
        store.commit();
        store.rollback();
        assert!(store.load(&address).unwrap().is_some());
    }
}
