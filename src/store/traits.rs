//! Store traits for the account's pre-key material.
//!
//! The host application owns the store handles and their lifetime; the core
//! receives them at construction. Implementations decide the persistence
//! engine; an in-memory implementation ships for development and tests.

use crate::store::{PreKeyRecord, SignedPreKeyRecord};

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record under the requested id.
    NotFound,
    /// A record with this id already exists.
    DuplicateId(u32),
    /// The backing engine failed.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::DuplicateId(id) => write!(f, "record id {} already in use", id),
            StoreError::Backend(e) => write!(f, "store backend error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable mapping of pre-key id to one-time pre-key record.
///
/// Removal is the only way ids disappear; consumption is authoritative on
/// the remote directory, and the local store's role is to hold material not
/// yet reported consumed.
pub trait PreKeyStore: Send + Sync {
    /// Store a record. Fails with [`StoreError::DuplicateId`] if the id is
    /// already in use.
    fn put(&self, record: &PreKeyRecord) -> StoreResult<()>;

    /// Fetch a record by id.
    fn get(&self, id: u32) -> StoreResult<PreKeyRecord>;

    /// Remove a record by id.
    fn remove(&self, id: u32) -> StoreResult<()>;

    /// All unconsumed records, sorted by id.
    fn all_unconsumed(&self) -> StoreResult<Vec<PreKeyRecord>>;

    /// Records not yet acknowledged by the remote directory, sorted by id.
    fn unuploaded(&self) -> StoreResult<Vec<PreKeyRecord>>;

    /// Flip the uploaded flag on the given ids. Ids without a record are
    /// ignored; they may have been consumed in the meantime.
    fn mark_uploaded(&self, ids: &[u32]) -> StoreResult<()>;
}

/// Durable mapping of signed-pre-key id to record, tracking the single
/// current id.
pub trait SignedPreKeyStore: Send + Sync {
    /// Store a record. Fails with [`StoreError::DuplicateId`] if the id is
    /// already in use.
    fn put(&self, record: &SignedPreKeyRecord) -> StoreResult<()>;

    /// Fetch a record by id.
    fn get(&self, id: u32) -> StoreResult<SignedPreKeyRecord>;

    /// Remove a record by id. Clears the current marker if it pointed here.
    fn remove(&self, id: u32) -> StoreResult<()>;

    /// All retained records, sorted by id.
    fn all(&self) -> StoreResult<Vec<SignedPreKeyRecord>>;

    /// Id of the current record, if one has been marked.
    fn current_id(&self) -> StoreResult<Option<u32>>;

    /// Mark the record under `id` as current. Fails with
    /// [`StoreError::NotFound`] if no such record exists.
    fn set_current(&self, id: u32) -> StoreResult<()>;

    /// Flip the uploaded flag on the record under `id` once the remote
    /// directory has accepted it. Fails with [`StoreError::NotFound`] if no
    /// such record exists.
    fn mark_uploaded(&self, id: u32) -> StoreResult<()>;
}
