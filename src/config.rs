use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Policy constants governing pre-key replenishment and signed-pre-key
/// rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreKeyPolicy {
    /// Number of one-time pre-keys the remote directory should hold.
    pub target_pool_size: usize,
    /// Remote count at which replenishment kicks in.
    pub low_water_mark: usize,
    /// Largest usable pre-key id; the counter wraps past it.
    pub max_pre_key_id: u32,
    /// Age in days after which the current signed pre-key is rotated.
    pub rotation_days: i64,
    /// Age in days after which superseded signed pre-keys are removed.
    pub retire_days: i64,
}

impl Default for PreKeyPolicy {
    fn default() -> Self {
        Self {
            target_pool_size: 100,
            low_water_mark: 10,
            max_pre_key_id: 0xFF_FFFF,
            rotation_days: 2,
            retire_days: 30,
        }
    }
}

impl PreKeyPolicy {
    /// Override the target pool size.
    pub fn with_target_pool_size(mut self, size: usize) -> Self {
        self.target_pool_size = size;
        self
    }

    /// Override the low-water mark.
    pub fn with_low_water_mark(mut self, mark: usize) -> Self {
        self.low_water_mark = mark;
        self
    }

    /// Override the pre-key id space bound.
    pub fn with_max_pre_key_id(mut self, max: u32) -> Self {
        self.max_pre_key_id = max;
        self
    }

    /// Override the signed-pre-key rotation age in days.
    pub fn with_rotation_days(mut self, days: i64) -> Self {
        self.rotation_days = days;
        self
    }

    /// Override the signed-pre-key retire age in days.
    pub fn with_retire_days(mut self, days: i64) -> Self {
        self.retire_days = days;
        self
    }

    /// Signed-pre-key rotation interval.
    pub fn rotation_interval(&self) -> Duration {
        Duration::days(self.rotation_days)
    }

    /// Superseded signed-pre-key retire interval.
    pub fn retire_interval(&self) -> Duration {
        Duration::days(self.retire_days)
    }
}
