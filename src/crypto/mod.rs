//! Cryptographic primitives for the account core.
//!
//! - Key pair generation, ECDH agreement, and identity signatures
//! - HKDF-SHA256 key derivation
//! - The provisioning authenticated-encryption codec

mod hkdf;
mod keypair;
mod provisioning;

pub use hkdf::{derive_provisioning_keys, Hkdf};
pub use keypair::{IdentityKeyPair, KeyPair, KEY_LEN, SIGNATURE_LEN};
pub use provisioning::{
    ProvisioningCipher, ProvisioningCipherText, ProvisioningError, MAC_LEN, MIN_FRAME_LEN,
    NONCE_LEN, PROVISIONING_VERSION, TAG_LEN,
};
