//! Crate-level error taxonomy.

use thiserror::Error;

use crate::crypto::ProvisioningError;
use crate::store::StoreError;

/// Failures surfaced by the lifecycle manager and link coordinator.
///
/// `Remote` and `Timeout` are safe to retry for replenishment and rotation,
/// since no local state is marked delivered until the remote call succeeds.
/// The one-shot linking flow must restart from the beginning instead, because
/// the verification code is single-use. `ExhaustedIdSpace` is a configuration
/// invariant violation and requires operator intervention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("malformed payload: {0}")]
    Decoding(String),
    #[error("unsupported provisioning version {0}")]
    UnsupportedVersion(u8),
    #[error("remote directory call failed: {0}")]
    Remote(String),
    #[error("remote directory call timed out")]
    Timeout,
    #[error("pre-key id space exhausted; widen the id space or purge stale records")]
    ExhaustedIdSpace,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        match e {
            ProvisioningError::Crypto(msg) => Error::Crypto(msg),
            ProvisioningError::Authentication => Error::Authentication,
            ProvisioningError::Decoding(msg) => Error::Decoding(msg),
            ProvisioningError::UnsupportedVersion(v) => Error::UnsupportedVersion(v),
        }
    }
}
