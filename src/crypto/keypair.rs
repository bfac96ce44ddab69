//! Elliptic-curve key pairs for the account key material.
//!
//! `KeyPair` is a Curve25519 (X25519) pair used for one-time pre-keys,
//! signed pre-keys, and the ephemeral provisioning agreement. `IdentityKeyPair`
//! is the long-lived Ed25519 pair that identifies the account and signs
//! signed pre-keys.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::Error;

/// Length of a serialized Curve25519/Ed25519 public or private key.
pub const KEY_LEN: usize = 32;
/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Key type byte prefixed to public keys before signing (DJB curve type).
const DJB_TYPE: u8 = 0x05;

/// An X25519 key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Public key (32 bytes)
    pub public: [u8; KEY_LEN],
    /// Private key (32 bytes)
    pub private: [u8; KEY_LEN],
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut private = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut private);

        // Clamp as per the Curve25519 spec
        private[0] &= 248;
        private[31] &= 127;
        private[31] |= 64;

        Self::from_private_key(private)
    }

    /// Create a key pair from an existing private key.
    pub fn from_private_key(private: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);

        Self {
            public: *public.as_bytes(),
            private,
        }
    }

    /// Perform X25519 Diffie-Hellman agreement with another party's public key.
    pub fn agree(&self, their_public: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
        let secret = StaticSecret::from(self.private);
        let shared = secret.diffie_hellman(&PublicKey::from(*their_public));
        *shared.as_bytes()
    }
}

impl Zeroize for KeyPair {
    fn zeroize(&mut self) {
        self.private.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// The account's long-lived Ed25519 identity key pair.
///
/// Owned by the host application. The lifecycle manager borrows it to sign
/// signed pre-keys; the link coordinator borrows it to build the provisioning
/// payload. It is created once per account and never rotated.
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing: SigningKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity key pair. Called once, at account creation.
    pub fn generate() -> Self {
        let mut seed = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut seed);
        let signing = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing }
    }

    /// Restore an identity key pair from its serialized private key.
    pub fn from_private_key(private: &[u8; KEY_LEN]) -> Self {
        Self {
            signing: SigningKey::from_bytes(private),
        }
    }

    /// Serialized public key.
    pub fn public_bytes(&self) -> [u8; KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    /// Serialized private key. Never log this or hand it to anything but the
    /// host's key store and the provisioning payload.
    pub fn private_bytes(&self) -> [u8; KEY_LEN] {
        self.signing.to_bytes()
    }

    /// Sign a public key, producing the signature carried by a signed pre-key.
    ///
    /// The signed message is `0x05 ‖ public`, the wire convention for
    /// DJB-type keys.
    pub fn sign_public_key(&self, public: &[u8; KEY_LEN]) -> [u8; SIGNATURE_LEN] {
        let mut message = [0u8; KEY_LEN + 1];
        message[0] = DJB_TYPE;
        message[1..].copy_from_slice(public);
        self.signing.sign(&message).to_bytes()
    }

    /// Verify a signed pre-key signature against an identity public key.
    pub fn verify_public_key(
        identity_public: &[u8; KEY_LEN],
        signed_public: &[u8; KEY_LEN],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<(), Error> {
        let verifying = VerifyingKey::from_bytes(identity_public)
            .map_err(|e| Error::Crypto(format!("invalid identity public key: {}", e)))?;

        let mut message = [0u8; KEY_LEN + 1];
        message[0] = DJB_TYPE;
        message[1..].copy_from_slice(signed_public);

        verifying
            .verify(&message, &Signature::from_bytes(signature))
            .map_err(|_| Error::Crypto("signed pre-key signature rejected".into()))
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &hex::encode(self.public_bytes()))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_ne!(kp.public, [0u8; 32]);
        assert_ne!(kp.private, [0u8; 32]);
    }

    #[test]
    fn test_agreement_is_symmetric() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        assert_eq!(alice.agree(&bob.public), bob.agree(&alice.public));
    }

    #[test]
    fn test_identity_sign_verify() {
        let identity = IdentityKeyPair::generate();
        let pre_key = KeyPair::generate();

        let signature = identity.sign_public_key(&pre_key.public);
        IdentityKeyPair::verify_public_key(&identity.public_bytes(), &pre_key.public, &signature)
            .unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let identity = IdentityKeyPair::generate();
        let pre_key = KeyPair::generate();
        let other = KeyPair::generate();

        let signature = identity.sign_public_key(&pre_key.public);
        let result = IdentityKeyPair::verify_public_key(
            &identity.public_bytes(),
            &other.public,
            &signature,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_restore_round_trip() {
        let identity = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_private_key(&identity.private_bytes());
        assert_eq!(identity.public_bytes(), restored.public_bytes());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let kp = KeyPair::generate();
        let rendered = format!("{:?}", kp);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(&hex::encode(kp.private)));
    }
}
