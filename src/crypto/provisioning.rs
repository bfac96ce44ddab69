//! Authenticated-encryption codec for the device-provisioning payload.
//!
//! Seals a [`ProvisionMessage`] to a newly linking device using a fresh
//! ephemeral X25519 agreement with the device's public key. The plaintext
//! carries the account's private identity key, so the frame MAC is verified
//! in constant time before any decryption work.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::{Hmac, Mac};
use prost::Message;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::hkdf::derive_provisioning_keys;
use crate::crypto::keypair::{KeyPair, KEY_LEN};
use crate::proto::ProvisionMessage;

type HmacSha256 = Hmac<Sha256>;

/// Provisioning wire format version.
pub const PROVISIONING_VERSION: u8 = 1;
/// Length of the AES-GCM nonce.
pub const NONCE_LEN: usize = 12;
/// Length of the AES-GCM authentication tag (trails the ciphertext).
pub const TAG_LEN: usize = 16;
/// Length of the HMAC-SHA256 frame MAC.
pub const MAC_LEN: usize = 32;
/// Shortest well-formed wire frame: version, ephemeral key, nonce, empty
/// ciphertext plus AEAD tag, frame MAC.
pub const MIN_FRAME_LEN: usize = 1 + KEY_LEN + NONCE_LEN + TAG_LEN + MAC_LEN;

/// Provisioning codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Key agreement or cipher setup failed. Fatal; not retried.
    Crypto(String),
    /// Frame MAC or AEAD tag mismatch: tampering or wrong key.
    Authentication,
    /// The frame or decrypted payload is malformed.
    Decoding(String),
    /// Unrecognized wire format version byte.
    UnsupportedVersion(u8),
}

impl std::fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningError::Crypto(e) => write!(f, "crypto failure: {}", e),
            ProvisioningError::Authentication => write!(f, "ciphertext failed authentication"),
            ProvisioningError::Decoding(e) => write!(f, "malformed provisioning payload: {}", e),
            ProvisioningError::UnsupportedVersion(v) => {
                write!(f, "unsupported provisioning version {}", v)
            }
        }
    }
}

impl std::error::Error for ProvisioningError {}

/// A sealed provisioning payload.
///
/// Wire layout: `version:1 ‖ ephemeral-public:32 ‖ nonce:12 ‖
/// ciphertext:variable ‖ mac:32`, where the ciphertext includes the trailing
/// 16-byte AEAD tag and the MAC covers everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningCipherText {
    /// Wire format version.
    pub version: u8,
    /// Ephemeral public key of the sending side.
    pub ephemeral_public: [u8; KEY_LEN],
    /// AEAD nonce.
    pub nonce: [u8; NONCE_LEN],
    /// AEAD output (ciphertext plus tag).
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over `version ‖ ephemeral-public ‖ nonce ‖ ciphertext`.
    pub mac: [u8; MAC_LEN],
}

impl ProvisioningCipherText {
    /// Serialize to the flat wire frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = self.mac_input();
        frame.extend_from_slice(&self.mac);
        frame
    }

    /// Parse a wire frame. Rejects frames of impossible length before any
    /// cryptographic work; version and MAC are checked at decrypt time.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, ProvisioningError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(ProvisioningError::Decoding(format!(
                "frame is {} bytes, minimum is {}",
                frame.len(),
                MIN_FRAME_LEN
            )));
        }

        let version = frame[0];

        let mut ephemeral_public = [0u8; KEY_LEN];
        ephemeral_public.copy_from_slice(&frame[1..1 + KEY_LEN]);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&frame[1 + KEY_LEN..1 + KEY_LEN + NONCE_LEN]);

        let ciphertext = frame[1 + KEY_LEN + NONCE_LEN..frame.len() - MAC_LEN].to_vec();

        let mut mac = [0u8; MAC_LEN];
        mac.copy_from_slice(&frame[frame.len() - MAC_LEN..]);

        Ok(Self {
            version,
            ephemeral_public,
            nonce,
            ciphertext,
            mac,
        })
    }

    /// Encode the wire frame as base64 for text transports.
    pub fn to_base64(&self) -> String {
        base64::encode(self.to_bytes())
    }

    /// Parse a base64-encoded wire frame.
    pub fn from_base64(encoded: &str) -> Result<Self, ProvisioningError> {
        let frame = base64::decode(encoded)
            .map_err(|e| ProvisioningError::Decoding(format!("invalid base64: {}", e)))?;
        Self::from_bytes(&frame)
    }

    /// The MAC'd portion of the frame.
    fn mac_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(1 + KEY_LEN + NONCE_LEN + self.ciphertext.len());
        input.push(self.version);
        input.extend_from_slice(&self.ephemeral_public);
        input.extend_from_slice(&self.nonce);
        input.extend_from_slice(&self.ciphertext);
        input
    }
}

/// One-shot authenticated encryption toward a linking device's public key.
pub struct ProvisioningCipher {
    their_public: [u8; KEY_LEN],
}

impl ProvisioningCipher {
    /// Create a cipher sealing to the given device public key.
    pub fn new(their_public: [u8; KEY_LEN]) -> Self {
        Self { their_public }
    }

    /// Seal a provisioning message.
    ///
    /// Generates a fresh ephemeral key pair, agrees with the recipient key,
    /// derives the cipher and MAC keys under distinct labels, encrypts with
    /// AES-256-GCM under a random nonce, and MACs the whole frame.
    pub fn encrypt(&self, message: &ProvisionMessage) -> Result<ProvisioningCipherText, ProvisioningError> {
        let mut ephemeral = KeyPair::generate();
        let mut shared = ephemeral.agree(&self.their_public);
        let (mut cipher_key, mut mac_key) = derive_provisioning_keys(&shared);

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut plaintext = message.encode_to_vec();
        let encrypted = Aes256Gcm::new_from_slice(&cipher_key)
            .map_err(|_| ProvisioningError::Crypto("invalid cipher key length".into()))
            .and_then(|cipher| {
                cipher
                    .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
                    .map_err(|_| ProvisioningError::Crypto("AEAD encryption failed".into()))
            });
        plaintext.zeroize();

        // Capture the outcome first; the interim secrets are wiped on the
        // error path too.
        let sealed = encrypted.and_then(|ciphertext| {
            let sealed = ProvisioningCipherText {
                version: PROVISIONING_VERSION,
                ephemeral_public: ephemeral.public,
                nonce,
                ciphertext,
                mac: [0u8; MAC_LEN],
            };
            let mac = frame_mac(&mac_key, &sealed.mac_input())?;
            Ok(ProvisioningCipherText { mac, ..sealed })
        });

        ephemeral.zeroize();
        shared.zeroize();
        cipher_key.zeroize();
        mac_key.zeroize();

        sealed
    }

    /// Open a sealed provisioning payload with the recipient's key pair.
    ///
    /// Checks, in order: version byte, constant-time frame MAC, AEAD tag,
    /// payload decoding. The MAC must pass before any plaintext exists.
    pub fn decrypt(
        recipient: &KeyPair,
        sealed: &ProvisioningCipherText,
    ) -> Result<ProvisionMessage, ProvisioningError> {
        if sealed.version != PROVISIONING_VERSION {
            return Err(ProvisioningError::UnsupportedVersion(sealed.version));
        }

        let mut shared = recipient.agree(&sealed.ephemeral_public);
        let (mut cipher_key, mut mac_key) = derive_provisioning_keys(&shared);
        shared.zeroize();

        let opened = verify_frame_mac(&mac_key, &sealed.mac_input(), &sealed.mac).and_then(|()| {
            Aes256Gcm::new_from_slice(&cipher_key)
                .map_err(|_| ProvisioningError::Crypto("invalid cipher key length".into()))
                .and_then(|cipher| {
                    cipher
                        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
                        .map_err(|_| ProvisioningError::Authentication)
                })
        });
        mac_key.zeroize();
        cipher_key.zeroize();
        let mut plaintext = opened?;

        let message = ProvisionMessage::decode(plaintext.as_slice())
            .map_err(|e| ProvisioningError::Decoding(e.to_string()));
        plaintext.zeroize();
        message
    }
}

fn frame_mac(mac_key: &[u8; 32], input: &[u8]) -> Result<[u8; MAC_LEN], ProvisioningError> {
    // Qualified: `aes_gcm::aead::KeyInit` also offers `new_from_slice` here.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| ProvisioningError::Crypto("invalid MAC key length".into()))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().into())
}

fn verify_frame_mac(
    mac_key: &[u8; 32],
    input: &[u8],
    expected: &[u8; MAC_LEN],
) -> Result<(), ProvisioningError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| ProvisioningError::Crypto("invalid MAC key length".into()))?;
    mac.update(input);
    // verify_slice is a constant-time comparison
    mac.verify_slice(expected)
        .map_err(|_| ProvisioningError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn sample_message() -> ProvisionMessage {
        ProvisionMessage {
            identity_key_public: Some(vec![0x11; 32]),
            identity_key_private: Some(vec![0x22; 32]),
            number: Some("+14151234567".into()),
            provisioning_code: Some("482913".into()),
        }
    }

    #[test]
    fn test_round_trip() {
        let device = KeyPair::generate();
        let message = sample_message();

        let sealed = ProvisioningCipher::new(device.public).encrypt(&message).unwrap();
        let opened = ProvisioningCipher::decrypt(&device, &sealed).unwrap();

        assert_eq!(opened, message);
    }

    #[test]
    fn test_wire_round_trip() {
        let device = KeyPair::generate();
        let sealed = ProvisioningCipher::new(device.public)
            .encrypt(&sample_message())
            .unwrap();

        let reparsed = ProvisioningCipherText::from_bytes(&sealed.to_bytes()).unwrap();
        assert_eq!(reparsed, sealed);

        let from_b64 = ProvisioningCipherText::from_base64(&sealed.to_base64()).unwrap();
        assert_eq!(from_b64, sealed);
    }

    #[test]
    fn test_wrong_recipient_key_fails_authentication() {
        let device = KeyPair::generate();
        let eavesdropper = KeyPair::generate();

        let sealed = ProvisioningCipher::new(device.public)
            .encrypt(&sample_message())
            .unwrap();

        assert_eq!(
            ProvisioningCipher::decrypt(&eavesdropper, &sealed),
            Err(ProvisioningError::Authentication)
        );
    }

    #[test]
    fn test_any_bit_flip_fails_authentication() {
        let device = KeyPair::generate();
        let sealed = ProvisioningCipher::new(device.public)
            .encrypt(&sample_message())
            .unwrap();
        let frame = sealed.to_bytes();

        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            // Skip the version byte; it is checked before the MAC.
            let byte = rng.gen_range(1..frame.len());
            let bit = rng.gen_range(0..8);

            let mut tampered = frame.clone();
            tampered[byte] ^= 1 << bit;

            let parsed = ProvisioningCipherText::from_bytes(&tampered).unwrap();
            assert_eq!(
                ProvisioningCipher::decrypt(&device, &parsed),
                Err(ProvisioningError::Authentication)
            );
        }
    }

    #[test]
    fn test_unknown_version_rejected_before_mac() {
        let device = KeyPair::generate();
        let sealed = ProvisioningCipher::new(device.public)
            .encrypt(&sample_message())
            .unwrap();

        let mut frame = sealed.to_bytes();
        frame[0] = 0x33;

        let parsed = ProvisioningCipherText::from_bytes(&frame).unwrap();
        assert_eq!(
            ProvisioningCipher::decrypt(&device, &parsed),
            Err(ProvisioningError::UnsupportedVersion(0x33))
        );
    }

    #[test]
    fn test_short_frame_rejected_without_crypto() {
        let short = vec![PROVISIONING_VERSION; MIN_FRAME_LEN - 1];
        assert!(matches!(
            ProvisioningCipherText::from_bytes(&short),
            Err(ProvisioningError::Decoding(_))
        ));
    }
}
