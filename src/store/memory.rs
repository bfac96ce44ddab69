//! In-memory store implementation for development and testing.
//!
//! For production use, hosts implement the store traits over their own
//! persistence engine.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::store::{
    PreKeyRecord, PreKeyStore, SignedPreKeyRecord, SignedPreKeyStore, StoreError, StoreResult,
};

/// In-memory implementation of both pre-key store traits.
pub struct MemoryStore {
    pre_keys: RwLock<HashMap<u32, PreKeyRecord>>,
    signed_pre_keys: RwLock<HashMap<u32, SignedPreKeyRecord>>,
    current_signed: RwLock<Option<u32>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            pre_keys: RwLock::new(HashMap::new()),
            signed_pre_keys: RwLock::new(HashMap::new()),
            current_signed: RwLock::new(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(_: impl std::fmt::Debug) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl PreKeyStore for MemoryStore {
    fn put(&self, record: &PreKeyRecord) -> StoreResult<()> {
        let mut pre_keys = self.pre_keys.write().map_err(poisoned)?;
        if pre_keys.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        pre_keys.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: u32) -> StoreResult<PreKeyRecord> {
        let pre_keys = self.pre_keys.read().map_err(poisoned)?;
        pre_keys.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn remove(&self, id: u32) -> StoreResult<()> {
        let mut pre_keys = self.pre_keys.write().map_err(poisoned)?;
        pre_keys.remove(&id);
        Ok(())
    }

    fn all_unconsumed(&self) -> StoreResult<Vec<PreKeyRecord>> {
        let pre_keys = self.pre_keys.read().map_err(poisoned)?;
        let mut records: Vec<_> = pre_keys.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn unuploaded(&self) -> StoreResult<Vec<PreKeyRecord>> {
        let pre_keys = self.pre_keys.read().map_err(poisoned)?;
        let mut records: Vec<_> = pre_keys.values().filter(|r| !r.uploaded).cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn mark_uploaded(&self, ids: &[u32]) -> StoreResult<()> {
        let mut pre_keys = self.pre_keys.write().map_err(poisoned)?;
        for id in ids {
            if let Some(record) = pre_keys.get_mut(id) {
                record.uploaded = true;
            }
        }
        Ok(())
    }
}

impl SignedPreKeyStore for MemoryStore {
    fn put(&self, record: &SignedPreKeyRecord) -> StoreResult<()> {
        let mut signed = self.signed_pre_keys.write().map_err(poisoned)?;
        if signed.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        signed.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: u32) -> StoreResult<SignedPreKeyRecord> {
        let signed = self.signed_pre_keys.read().map_err(poisoned)?;
        signed.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn remove(&self, id: u32) -> StoreResult<()> {
        let mut signed = self.signed_pre_keys.write().map_err(poisoned)?;
        signed.remove(&id);
        let mut current = self.current_signed.write().map_err(poisoned)?;
        if *current == Some(id) {
            *current = None;
        }
        Ok(())
    }

    fn all(&self) -> StoreResult<Vec<SignedPreKeyRecord>> {
        let signed = self.signed_pre_keys.read().map_err(poisoned)?;
        let mut records: Vec<_> = signed.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn current_id(&self) -> StoreResult<Option<u32>> {
        Ok(*self.current_signed.read().map_err(poisoned)?)
    }

    fn set_current(&self, id: u32) -> StoreResult<()> {
        let signed = self.signed_pre_keys.read().map_err(poisoned)?;
        if !signed.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let mut current = self.current_signed.write().map_err(poisoned)?;
        *current = Some(id);
        Ok(())
    }

    fn mark_uploaded(&self, id: u32) -> StoreResult<()> {
        let mut signed = self.signed_pre_keys.write().map_err(poisoned)?;
        match signed.get_mut(&id) {
            Some(record) => {
                record.uploaded = true;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;
    use chrono::Utc;

    #[test]
    fn test_pre_key_put_get_remove() {
        let store = MemoryStore::new();
        let record = PreKeyRecord::generate(1);

        PreKeyStore::put(&store, &record).unwrap();
        assert_eq!(PreKeyStore::get(&store, 1).unwrap(), record);

        PreKeyStore::remove(&store, 1).unwrap();
        assert_eq!(PreKeyStore::get(&store, 1), Err(StoreError::NotFound));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = MemoryStore::new();
        PreKeyStore::put(&store, &PreKeyRecord::generate(9)).unwrap();

        assert_eq!(
            PreKeyStore::put(&store, &PreKeyRecord::generate(9)),
            Err(StoreError::DuplicateId(9))
        );
    }

    #[test]
    fn test_uploaded_tracking() {
        let store = MemoryStore::new();
        for id in [3, 1, 2] {
            PreKeyStore::put(&store, &PreKeyRecord::generate(id)).unwrap();
        }

        let pending: Vec<u32> = store.unuploaded().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(pending, vec![1, 2, 3]);

        PreKeyStore::mark_uploaded(&store, &[1, 3]).unwrap();
        let pending: Vec<u32> = store.unuploaded().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(pending, vec![2]);
        assert_eq!(store.all_unconsumed().unwrap().len(), 3);
    }

    #[test]
    fn test_signed_pre_key_current_marker() {
        let store = MemoryStore::new();
        let identity = IdentityKeyPair::generate();

        assert_eq!(store.current_id().unwrap(), None);
        assert_eq!(store.set_current(1), Err(StoreError::NotFound));

        let record = SignedPreKeyRecord::generate(1, &identity, Utc::now());
        SignedPreKeyStore::put(&store, &record).unwrap();
        store.set_current(1).unwrap();
        assert_eq!(store.current_id().unwrap(), Some(1));

        // Removing the current record clears the marker.
        SignedPreKeyStore::remove(&store, 1).unwrap();
        assert_eq!(store.current_id().unwrap(), None);
    }

    #[test]
    fn test_signed_pre_key_uploaded_tracking() {
        let store = MemoryStore::new();
        let identity = IdentityKeyPair::generate();

        let record = SignedPreKeyRecord::generate(2, &identity, Utc::now());
        SignedPreKeyStore::put(&store, &record).unwrap();
        assert!(!SignedPreKeyStore::get(&store, 2).unwrap().uploaded);

        SignedPreKeyStore::mark_uploaded(&store, 2).unwrap();
        assert!(SignedPreKeyStore::get(&store, 2).unwrap().uploaded);

        assert_eq!(
            SignedPreKeyStore::mark_uploaded(&store, 9),
            Err(StoreError::NotFound)
        );
    }
}
