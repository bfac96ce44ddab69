//! Storage for the account's pre-key material.
//!
//! Provides the record types, the store traits the host implements, and an
//! in-memory implementation.

mod memory;
mod records;
mod traits;

pub use memory::MemoryStore;
pub use records::{PreKeyRecord, SignedPreKeyRecord};
pub use traits::{PreKeyStore, SignedPreKeyStore, StoreError, StoreResult};
