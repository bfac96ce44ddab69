//! Keylink: account key material management for asynchronous messaging.
//!
//! Manages the cryptographic key material an end-to-end-encrypted messaging
//! account publishes so that other parties can start secure sessions with it
//! without both sides being online, and transfers the account identity to a
//! newly linked device over an untrusted relay.
//!
//! ## Modules
//!
//! - `crypto` - Key pairs, HKDF, and the provisioning cipher
//! - `store` - Pre-key record types, store traits, in-memory store
//! - `lifecycle` - Pre-key replenishment and signed-pre-key rotation
//! - `linking` - The device-provisioning handshake coordinator
//! - `remote` - The remote directory collaborator contract
//!
//! All operations are synchronous. Hosts serialize lifecycle calls per
//! account and run at most one linking attempt at a time.

pub mod crypto;
pub mod proto;
pub mod store;

mod config;
mod error;
mod lifecycle;
mod linking;
mod remote;

pub use config::PreKeyPolicy;
pub use error::Error;
pub use lifecycle::PreKeyLifecycleManager;
pub use linking::{DeviceLinkCoordinator, LinkState};
pub use remote::{DeviceId, RemoteDirectory};

pub use crypto::{IdentityKeyPair, KeyPair, ProvisioningCipher, ProvisioningCipherText};
pub use proto::ProvisionMessage;
pub use store::{MemoryStore, PreKeyRecord, PreKeyStore, SignedPreKeyRecord, SignedPreKeyStore};
