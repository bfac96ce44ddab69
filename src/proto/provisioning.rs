//! Provisioning payload protobuf definition.
//!
//! The plaintext handed to a newly linking device. It exists only for the
//! duration of one provisioning call and is zeroized afterwards.

use prost::Message;
use zeroize::Zeroize;

/// Identity key material and verification code for a newly linking device.
#[derive(Clone, PartialEq, Message)]
pub struct ProvisionMessage {
    /// Account identity public key.
    #[prost(bytes, optional, tag = "1")]
    pub identity_key_public: Option<Vec<u8>>,
    /// Account identity private key.
    #[prost(bytes, optional, tag = "2")]
    pub identity_key_private: Option<Vec<u8>>,
    /// Account identifier.
    #[prost(string, optional, tag = "3")]
    pub number: Option<String>,
    /// Short-lived device verification code.
    #[prost(string, optional, tag = "4")]
    pub provisioning_code: Option<String>,
}

impl ProvisionMessage {
    /// Clear the secret fields in place. Called once the ciphertext has been
    /// produced; the plaintext must not outlive the provisioning call.
    pub fn zeroize(&mut self) {
        if let Some(private) = self.identity_key_private.as_mut() {
            private.zeroize();
        }
        if let Some(public) = self.identity_key_public.as_mut() {
            public.zeroize();
        }
        if let Some(code) = self.provisioning_code.as_mut() {
            code.zeroize();
        }
        self.identity_key_private = None;
        self.identity_key_public = None;
        self.provisioning_code = None;
        self.number = None;
    }
}
