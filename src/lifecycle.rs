//! Pre-key replenishment and signed-pre-key rotation policy.
//!
//! The manager decides when to generate new one-time pre-keys and when to
//! rotate the signed pre-key, based on the remote directory's reported
//! inventory and local record age. The decision operations are pure local
//! computations; callers push the returned records to the directory and call
//! [`PreKeyLifecycleManager::mark_delivered`] only after the upload succeeds,
//! so a communication fault leaves the same surplus to retry.
//!
//! Concurrent invocation must be serialized per account; the operations
//! read-then-write the stores without a compare-and-swap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::PreKeyPolicy;
use crate::crypto::IdentityKeyPair;
use crate::error::Error;
use crate::remote::RemoteDirectory;
use crate::store::{PreKeyRecord, PreKeyStore, SignedPreKeyRecord, SignedPreKeyStore, StoreError};

/// Manages the account's pre-key pool and signed pre-key.
pub struct PreKeyLifecycleManager {
    pre_keys: Arc<dyn PreKeyStore>,
    signed_pre_keys: Arc<dyn SignedPreKeyStore>,
    policy: PreKeyPolicy,
    next_pre_key_id: u32,
}

impl PreKeyLifecycleManager {
    /// Create a manager over the given store handles. The host owns the
    /// stores and the concurrency guard around manager calls.
    pub fn new(
        pre_keys: Arc<dyn PreKeyStore>,
        signed_pre_keys: Arc<dyn SignedPreKeyStore>,
        policy: PreKeyPolicy,
    ) -> Self {
        Self {
            pre_keys,
            signed_pre_keys,
            policy,
            next_pre_key_id: 1,
        }
    }

    /// Restore the pre-key id counter persisted by the host.
    pub fn with_next_pre_key_id(mut self, id: u32) -> Self {
        self.next_pre_key_id = id.min(self.policy.max_pre_key_id);
        self
    }

    /// The id the next generated pre-key would take. Hosts persist this
    /// across restarts.
    pub fn next_pre_key_id(&self) -> u32 {
        self.next_pre_key_id
    }

    /// Generate replacement one-time pre-keys if the directory is running low.
    ///
    /// Returns an empty batch when `remote_remaining` is at or above the
    /// low-water mark. Otherwise returns the not-yet-acknowledged local
    /// surplus first, then enough fresh records to bring the directory back
    /// to the target pool size. Fresh records take monotonically increasing
    /// ids modulo the id space, skipping ids still present locally; they are
    /// written to the store before being returned.
    pub fn replenish_if_needed(
        &mut self,
        remote_remaining: usize,
    ) -> Result<Vec<PreKeyRecord>, Error> {
        if remote_remaining >= self.policy.low_water_mark {
            return Ok(Vec::new());
        }

        let mut batch = self.pre_keys.unuploaded()?;
        let mut taken: HashSet<u32> = self
            .pre_keys
            .all_unconsumed()?
            .iter()
            .map(|r| r.id)
            .collect();

        let needed = self
            .policy
            .target_pool_size
            .saturating_sub(remote_remaining + batch.len());
        debug!(
            "replenishing pre-keys: remote has {}, retrying {} pending, generating {}",
            remote_remaining,
            batch.len(),
            needed
        );

        // Reserve the whole id range before touching the store, so an
        // exhausted id space leaves nothing half-written.
        let mut fresh_ids = Vec::with_capacity(needed);
        for _ in 0..needed {
            let id = self.next_free_id(&taken)?;
            taken.insert(id);
            fresh_ids.push(id);
        }

        for id in fresh_ids {
            let record = PreKeyRecord::generate(id);
            self.pre_keys.put(&record)?;
            batch.push(record);
        }

        Ok(batch)
    }

    /// Advance the id counter to the next id not present locally.
    fn next_free_id(&mut self, taken: &HashSet<u32>) -> Result<u32, Error> {
        let span = self.policy.max_pre_key_id as u64 + 1;
        for _ in 0..span {
            let id = self.next_pre_key_id;
            self.next_pre_key_id = if id >= self.policy.max_pre_key_id {
                0
            } else {
                id + 1
            };
            if !taken.contains(&id) {
                return Ok(id);
            }
        }
        Err(Error::ExhaustedIdSpace)
    }

    /// Record that the remote directory accepted an uploaded batch. Must not
    /// be called before the upload succeeds.
    pub fn mark_delivered(&self, records: &[PreKeyRecord]) -> Result<(), Error> {
        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        self.pre_keys.mark_uploaded(&ids)?;
        Ok(())
    }

    /// Rotate the signed pre-key if the current one has aged past the
    /// rotation interval (or none exists yet).
    ///
    /// The new record takes the next id, is signed with the identity key,
    /// and is marked current; the superseded record is retained. Every call
    /// also removes non-current records older than the retire interval, so
    /// stale material ages out even between rotations.
    pub fn rotate_signed_pre_key_if_due(
        &mut self,
        identity: &IdentityKeyPair,
        now: DateTime<Utc>,
    ) -> Result<Option<SignedPreKeyRecord>, Error> {
        let current = match self.signed_pre_keys.current_id()? {
            Some(id) => Some(self.signed_pre_keys.get(id)?),
            None => None,
        };

        let due = current
            .as_ref()
            .map_or(true, |c| now - c.created_at >= self.policy.rotation_interval());

        let rotated = if due {
            let id = match &current {
                Some(c) if c.id >= self.policy.max_pre_key_id => 1,
                Some(c) => c.id + 1,
                None => 1,
            };
            let record = SignedPreKeyRecord::generate(id, identity, now);
            self.signed_pre_keys.put(&record)?;
            if let Err(e) = self.signed_pre_keys.set_current(id) {
                // Keep the store consistent: a record that never became
                // current must not linger.
                let _ = self.signed_pre_keys.remove(id);
                return Err(e.into());
            }
            info!("rotated signed pre-key to id {}", id);
            Some(record)
        } else {
            None
        };

        self.retire_old_signed_pre_keys(now)?;
        Ok(rotated)
    }

    fn retire_old_signed_pre_keys(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let current = self.signed_pre_keys.current_id()?;
        for record in self.signed_pre_keys.all()? {
            if Some(record.id) != current
                && now - record.created_at > self.policy.retire_interval()
            {
                debug!("retiring signed pre-key {}", record.id);
                self.signed_pre_keys.remove(record.id)?;
            }
        }
        Ok(())
    }

    /// The current signed pre-key record, if one has been generated.
    pub fn current_signed_pre_key(&self) -> Result<Option<SignedPreKeyRecord>, Error> {
        match self.signed_pre_keys.current_id()? {
            Some(id) => Ok(Some(self.signed_pre_keys.get(id)?)),
            None => Ok(None),
        }
    }

    /// Full refresh against the remote directory: rotate if due, replenish
    /// against the reported inventory, upload what changed, and mark records
    /// delivered only after the directory accepts them.
    ///
    /// A signed pre-key whose upload failed on an earlier sync is still
    /// unacknowledged locally and is re-uploaded here, even when rotation is
    /// not due.
    pub fn sync_with_remote(
        &mut self,
        remote: &dyn RemoteDirectory,
        identity: &IdentityKeyPair,
        now: DateTime<Utc>,
        timeout: StdDuration,
    ) -> Result<(), Error> {
        self.rotate_signed_pre_key_if_due(identity, now)?;
        let remaining = remote.report_pre_key_inventory(timeout)?;
        let batch = self.replenish_if_needed(remaining)?;

        if !batch.is_empty() {
            let signed = self
                .current_signed_pre_key()?
                .ok_or(Error::Store(StoreError::NotFound))?;
            remote.upload_pre_keys(&identity.public_bytes(), &signed, &batch, timeout)?;
            self.mark_delivered(&batch)?;
            self.signed_pre_keys.mark_uploaded(signed.id)?;
        } else if let Some(signed) = self.current_signed_pre_key()? {
            if !signed.uploaded {
                remote.upload_signed_pre_key(&signed, timeout)?;
                self.signed_pre_keys.mark_uploaded(signed.id)?;
            }
        }

        Ok(())
    }
}
