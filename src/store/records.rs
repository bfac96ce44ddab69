//! Pre-key record types held by the stores.

use chrono::{DateTime, Utc};

use crate::crypto::{IdentityKeyPair, KeyPair, SIGNATURE_LEN};
use crate::error::Error;

/// A one-time pre-key.
///
/// The local store holds only records not yet reported consumed by the
/// remote directory. `uploaded` marks records the directory has acknowledged;
/// records generated for an upload that later failed stay unuploaded and are
/// offered again on the next replenishment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyRecord {
    /// Record id, unique within the store, bounded by the policy's id space.
    pub id: u32,
    /// The one-time key pair.
    pub key_pair: KeyPair,
    /// Whether the remote directory has acknowledged this record.
    pub uploaded: bool,
}

impl PreKeyRecord {
    /// Generate a fresh one-time pre-key under the given id.
    pub fn generate(id: u32) -> Self {
        Self {
            id,
            key_pair: KeyPair::generate(),
            uploaded: false,
        }
    }
}

/// A signed pre-key.
///
/// Exactly one record is current at a time; superseded records are kept for
/// a retire interval to validate handshakes that started before rotation.
/// A rotated record stays unuploaded until the remote directory accepts it,
/// so a failed upload is retried on the next sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPreKeyRecord {
    /// Record id; each rotation assigns the next id in the space.
    pub id: u32,
    /// The medium-lived key pair.
    pub key_pair: KeyPair,
    /// Identity-key signature over the public key.
    pub signature: [u8; SIGNATURE_LEN],
    /// When this record was generated.
    pub created_at: DateTime<Utc>,
    /// Whether the remote directory has acknowledged this record.
    pub uploaded: bool,
}

impl SignedPreKeyRecord {
    /// Generate a fresh signed pre-key, signed by the account identity.
    pub fn generate(id: u32, identity: &IdentityKeyPair, now: DateTime<Utc>) -> Self {
        let key_pair = KeyPair::generate();
        let signature = identity.sign_public_key(&key_pair.public);
        Self {
            id,
            key_pair,
            signature,
            created_at: now,
            uploaded: false,
        }
    }

    /// Verify this record's signature against an identity public key.
    pub fn verify_signature(&self, identity_public: &[u8; 32]) -> Result<(), Error> {
        IdentityKeyPair::verify_public_key(identity_public, &self.key_pair.public, &self.signature)
    }
}
