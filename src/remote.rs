//! Remote directory collaborator contract.
//!
//! The network surface that stores pre-key material server-side and relays
//! provisioning ciphertext. Transport mechanics (HTTP, retries, auth) belong
//! to the host; the core only consumes this trait. The host passes a store
//! handle per account rather than reaching a shared socket singleton.

use std::time::Duration;

use crate::crypto::ProvisioningCipherText;
use crate::error::Error;
use crate::store::{PreKeyRecord, SignedPreKeyRecord};

/// Identifier of a linking device, opaque to the core.
pub type DeviceId = String;

/// The remote directory the account registers its key material with.
///
/// Every method takes a caller-supplied timeout; implementations must not
/// block past it and should return [`Error::Timeout`] when it elapses.
/// Other transport or server faults map to [`Error::Remote`].
pub trait RemoteDirectory {
    /// Number of unconsumed one-time pre-keys the directory still holds.
    fn report_pre_key_inventory(&self, timeout: Duration) -> Result<usize, Error>;

    /// Register a batch of one-time pre-keys together with the identity
    /// public key and the current signed pre-key.
    fn upload_pre_keys(
        &self,
        identity_public: &[u8; 32],
        signed_pre_key: &SignedPreKeyRecord,
        records: &[PreKeyRecord],
        timeout: Duration,
    ) -> Result<(), Error>;

    /// Replace the directory's current signed pre-key.
    fn upload_signed_pre_key(
        &self,
        signed_pre_key: &SignedPreKeyRecord,
        timeout: Duration,
    ) -> Result<(), Error>;

    /// Obtain a short-lived verification code for linking a new device.
    fn fetch_provisioning_code(&self, timeout: Duration) -> Result<String, Error>;

    /// Obtain the linking device's identifier and ephemeral public key,
    /// established out of band by the new device.
    fn fetch_linking_device_key(&self, timeout: Duration) -> Result<(DeviceId, [u8; 32]), Error>;

    /// Relay the sealed provisioning payload to the linking device.
    fn deliver_provisioning_ciphertext(
        &self,
        device: &DeviceId,
        ciphertext: &ProvisioningCipherText,
        timeout: Duration,
    ) -> Result<(), Error>;
}
