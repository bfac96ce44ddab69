//! Device-linking handshake coordination.
//!
//! Drives the one-shot provisioning flow end to end: obtain a verification
//! code, obtain the new device's ephemeral public key, seal the account's
//! identity key material with the provisioning cipher, and hand the
//! ciphertext to the remote directory for delivery.
//!
//! The flow is linear with no back-edges. Any step's failure lands in
//! [`LinkState::Failed`] with the specific reason; there is no retry inside
//! the coordinator. A fresh [`DeviceLinkCoordinator::run`] restarts from the
//! beginning, because the verification code is single-use. Only one linking
//! attempt may run at a time for an account.

use std::time::Duration;

use log::{debug, info};

use crate::crypto::{IdentityKeyPair, ProvisioningCipher};
use crate::error::Error;
use crate::proto::ProvisionMessage;
use crate::remote::RemoteDirectory;

/// Where a linking attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Obtaining the provisioning verification code.
    AwaitingCode,
    /// Obtaining the new device's identifier and ephemeral public key.
    AwaitingDeviceKey,
    /// Building and sealing the provisioning payload.
    Encrypting,
    /// Handing the ciphertext to the directory for delivery.
    Transmitting,
    /// The ciphertext was delivered.
    Done,
    /// A step failed; the attempt is over.
    Failed(Error),
}

/// Orchestrates the provisioning handshake for one linking attempt.
pub struct DeviceLinkCoordinator<R: RemoteDirectory> {
    remote: R,
    timeout: Duration,
    state: LinkState,
}

impl<R: RemoteDirectory> DeviceLinkCoordinator<R> {
    /// Create a coordinator over the remote directory. `timeout` bounds each
    /// network-dependent step.
    pub fn new(remote: R, timeout: Duration) -> Self {
        Self {
            remote,
            timeout,
            state: LinkState::AwaitingCode,
        }
    }

    /// Current state of the attempt.
    pub fn state(&self) -> &LinkState {
        &self.state
    }

    /// Run one linking attempt to completion.
    ///
    /// Borrows the account identity read-only; the plaintext payload built
    /// from it is zeroized before this returns, whatever the outcome.
    pub fn run(&mut self, identity: &IdentityKeyPair, account_id: &str) -> Result<(), Error> {
        match self.try_run(identity, account_id) {
            Ok(()) => {
                self.state = LinkState::Done;
                info!("device link complete");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Failed(e.clone());
                Err(e)
            }
        }
    }

    fn try_run(&mut self, identity: &IdentityKeyPair, account_id: &str) -> Result<(), Error> {
        self.state = LinkState::AwaitingCode;
        let code = self.remote.fetch_provisioning_code(self.timeout)?;

        self.state = LinkState::AwaitingDeviceKey;
        let (device, device_key) = self.remote.fetch_linking_device_key(self.timeout)?;
        debug!("linking device {}", device);

        self.state = LinkState::Encrypting;
        let mut message = ProvisionMessage {
            identity_key_public: Some(identity.public_bytes().to_vec()),
            identity_key_private: Some(identity.private_bytes().to_vec()),
            number: Some(account_id.to_string()),
            provisioning_code: Some(code),
        };
        let sealed = ProvisioningCipher::new(device_key).encrypt(&message);
        message.zeroize();
        let sealed = sealed?;

        self.state = LinkState::Transmitting;
        self.remote
            .deliver_provisioning_ciphertext(&device, &sealed, self.timeout)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, ProvisioningCipherText};
    use crate::remote::DeviceId;
    use crate::store::{PreKeyRecord, SignedPreKeyRecord};
    use std::sync::Mutex;

    /// Remote directory double for the linking flow.
    struct FakeRelay {
        device_key: KeyPair,
        fail_at_delivery: Option<Error>,
        delivered: Mutex<Option<(DeviceId, ProvisioningCipherText)>>,
    }

    impl FakeRelay {
        fn new() -> Self {
            Self {
                device_key: KeyPair::generate(),
                fail_at_delivery: None,
                delivered: Mutex::new(None),
            }
        }
    }

    impl RemoteDirectory for FakeRelay {
        fn report_pre_key_inventory(&self, _timeout: Duration) -> Result<usize, Error> {
            unimplemented!("not part of the linking flow")
        }

        fn upload_pre_keys(
            &self,
            _identity_public: &[u8; 32],
            _signed_pre_key: &SignedPreKeyRecord,
            _records: &[PreKeyRecord],
            _timeout: Duration,
        ) -> Result<(), Error> {
            unimplemented!("not part of the linking flow")
        }

        fn upload_signed_pre_key(
            &self,
            _signed_pre_key: &SignedPreKeyRecord,
            _timeout: Duration,
        ) -> Result<(), Error> {
            unimplemented!("not part of the linking flow")
        }

        fn fetch_provisioning_code(&self, _timeout: Duration) -> Result<String, Error> {
            Ok("913842".to_string())
        }

        fn fetch_linking_device_key(
            &self,
            _timeout: Duration,
        ) -> Result<(DeviceId, [u8; 32]), Error> {
            Ok(("device-7".to_string(), self.device_key.public))
        }

        fn deliver_provisioning_ciphertext(
            &self,
            device: &DeviceId,
            ciphertext: &ProvisioningCipherText,
            _timeout: Duration,
        ) -> Result<(), Error> {
            if let Some(e) = &self.fail_at_delivery {
                return Err(e.clone());
            }
            *self.delivered.lock().unwrap() = Some((device.clone(), ciphertext.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_successful_link_delivers_decryptable_payload() {
        let identity = IdentityKeyPair::generate();
        let relay = FakeRelay::new();
        let device_key = relay.device_key.clone();

        let mut coordinator = DeviceLinkCoordinator::new(relay, Duration::from_secs(10));
        coordinator.run(&identity, "+14151234567").unwrap();
        assert_eq!(*coordinator.state(), LinkState::Done);

        let delivered = coordinator.remote.delivered.lock().unwrap().take().unwrap();
        assert_eq!(delivered.0, "device-7");

        // The new device can open the payload and recover the identity.
        let message = ProvisioningCipher::decrypt(&device_key, &delivered.1).unwrap();
        assert_eq!(
            message.identity_key_public.as_deref(),
            Some(identity.public_bytes().as_slice())
        );
        assert_eq!(
            message.identity_key_private.as_deref(),
            Some(identity.private_bytes().as_slice())
        );
        assert_eq!(message.number.as_deref(), Some("+14151234567"));
        assert_eq!(message.provisioning_code.as_deref(), Some("913842"));
    }

    #[test]
    fn test_expired_code_at_delivery_fails_terminally() {
        let identity = IdentityKeyPair::generate();
        let mut relay = FakeRelay::new();
        relay.fail_at_delivery = Some(Error::Remote("verification code expired".into()));

        let mut coordinator = DeviceLinkCoordinator::new(relay, Duration::from_secs(10));
        let result = coordinator.run(&identity, "+14151234567");

        assert!(matches!(result, Err(Error::Remote(_))));
        assert!(matches!(coordinator.state(), LinkState::Failed(Error::Remote(_))));
        assert!(coordinator.remote.delivered.lock().unwrap().is_none());
    }

    #[test]
    fn test_timeout_surfaces_as_failed_timeout() {
        let identity = IdentityKeyPair::generate();
        let mut relay = FakeRelay::new();
        relay.fail_at_delivery = Some(Error::Timeout);

        let mut coordinator = DeviceLinkCoordinator::new(relay, Duration::from_millis(50));
        assert_eq!(
            coordinator.run(&identity, "+14151234567"),
            Err(Error::Timeout)
        );
        assert_eq!(*coordinator.state(), LinkState::Failed(Error::Timeout));
    }

    #[test]
    fn test_fresh_run_restarts_from_awaiting_code() {
        let identity = IdentityKeyPair::generate();
        let mut relay = FakeRelay::new();
        relay.fail_at_delivery = Some(Error::Remote("verification code expired".into()));

        let mut coordinator = DeviceLinkCoordinator::new(relay, Duration::from_secs(10));
        coordinator.run(&identity, "+14151234567").unwrap_err();

        // A new user action retries the whole sequence with a fresh code.
        coordinator.remote.fail_at_delivery = None;
        coordinator.run(&identity, "+14151234567").unwrap();
        assert_eq!(*coordinator.state(), LinkState::Done);
    }
}
