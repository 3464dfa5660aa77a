//! Mapping from wall-clock timestamps to staking days.

use serde::{Deserialize, Serialize};
use tide_core::error::StakingError;
use tide_core::types::Day;

/// Day 0 begins at `launch_time`; each day lasts `day_length_secs`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayCalendar {
    pub launch_time: u64,
    pub day_length_secs: u64,
}

impl DayCalendar {
    pub fn new(launch_time: u64, day_length_secs: u64) -> Result<Self, StakingError> {
        if day_length_secs == 0 {
            return Err(StakingError::ZeroDayLength);
        }
        Ok(Self {
            launch_time,
            day_length_secs,
        })
    }

    /// `floor((now - launch) / day_length)`.
    pub fn day_at(&self, now: u64) -> Result<Day, StakingError> {
        let elapsed = now.checked_sub(self.launch_time).ok_or(StakingError::LaunchInFuture {
            now,
            launch: self.launch_time,
        })?;
        Ok(elapsed / self.day_length_secs)
    }

    /// Timestamp at which `day` begins.
    pub fn day_start(&self, day: Day) -> Option<u64> {
        day.checked_mul(self.day_length_secs)?
            .checked_add(self.launch_time)
    }
}
