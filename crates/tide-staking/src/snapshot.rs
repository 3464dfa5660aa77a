//! Snapshot store and global account.
//!
//! [`SnapshotLedger`] keeps a sparse map of per-day aggregates (absent days
//! read as zero) next to the pool-wide [`GlobalState`]. The global
//! `last_finalized_day` is the boundary: days at or before it are history
//! and only the advancer writes them, days after it are schedule and accept
//! decay/activation/penalty writes from position operations.
//!
//! Nothing here advances days or enumerates positions; every operation is a
//! single map access.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tide_core::error::StakingError;
use tide_core::math;
use tide_core::types::{Day, GlobalState, Snapshot};

/// One write against the schedule of a not-yet-finalized day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleEdit {
    AddDecay(Day, u128),
    RemoveDecay(Day, u128),
    AddActivation(Day, u128),
    RemoveActivation(Day, u128),
    AddPenalty(Day, u128),
}

impl ScheduleEdit {
    fn day(&self) -> Day {
        match *self {
            ScheduleEdit::AddDecay(day, _)
            | ScheduleEdit::RemoveDecay(day, _)
            | ScheduleEdit::AddActivation(day, _)
            | ScheduleEdit::RemoveActivation(day, _)
            | ScheduleEdit::AddPenalty(day, _) => day,
        }
    }

    fn apply_to(&self, snap: &mut Snapshot) -> Result<(), StakingError> {
        match *self {
            ScheduleEdit::AddDecay(_, n) => snap.scheduled_decay = math::add(snap.scheduled_decay, n)?,
            ScheduleEdit::RemoveDecay(_, n) => snap.scheduled_decay = math::sub(snap.scheduled_decay, n)?,
            ScheduleEdit::AddActivation(_, n) => {
                snap.scheduled_activation = math::add(snap.scheduled_activation, n)?
            }
            ScheduleEdit::RemoveActivation(_, n) => {
                snap.scheduled_activation = math::sub(snap.scheduled_activation, n)?
            }
            ScheduleEdit::AddPenalty(_, n) => snap.penalties = math::add(snap.penalties, n)?,
        }
        Ok(())
    }
}

/// Validated batch of schedule edits, ready to [`commit`](SnapshotLedger::commit).
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SchedulePlan {
    days: Vec<(Day, Snapshot)>,
}

/// Values written when a day is finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FinalizedDay {
    pub active_shares: u128,
    pub inflation_amount: u128,
    pub pool_amount: u128,
    pub reward_per_share: u128,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SnapshotLedger {
    global: GlobalState,
    days: HashMap<Day, Snapshot>,
}

impl SnapshotLedger {
    pub fn new(initial_share_price: u128) -> Self {
        Self {
            global: GlobalState::new(initial_share_price),
            days: HashMap::new(),
        }
    }

    pub fn global(&self) -> &GlobalState {
        &self.global
    }

    pub(crate) fn global_mut(&mut self) -> &mut GlobalState {
        &mut self.global
    }

    /// Snapshot for `day`; all-zero when nothing was recorded.
    pub fn read(&self, day: Day) -> Snapshot {
        self.days.get(&day).copied().unwrap_or_default()
    }

    /// Number of days holding any data.
    pub fn stored_days(&self) -> usize {
        self.days.len()
    }

    fn ensure_open(&self, day: Day) -> Result<(), StakingError> {
        match self.global.last_finalized_day {
            Some(last) if day <= last => Err(StakingError::AlreadyFinalized {
                day,
                last_finalized: last,
            }),
            _ => Ok(()),
        }
    }

    /// Check a batch of edits without writing anything.
    ///
    /// Fails on the first edit that targets a finalized day or would
    /// overflow/underflow a counter; the ledger is unchanged either way.
    pub fn plan(&self, edits: &[ScheduleEdit]) -> Result<SchedulePlan, StakingError> {
        let mut days: Vec<(Day, Snapshot)> = Vec::with_capacity(edits.len());
        for edit in edits {
            let day = edit.day();
            self.ensure_open(day)?;
            let idx = match days.iter().position(|(d, _)| *d == day) {
                Some(idx) => idx,
                None => {
                    days.push((day, self.read(day)));
                    days.len() - 1
                }
            };
            edit.apply_to(&mut days[idx].1)?;
        }
        Ok(SchedulePlan { days })
    }

    /// Write a plan produced by [`plan`](Self::plan). Days that end up all
    /// zero are dropped from the map.
    pub fn commit(&mut self, plan: SchedulePlan) {
        for (day, snap) in plan.days {
            if snap == Snapshot::default() {
                self.days.remove(&day);
            } else {
                self.days.insert(day, snap);
            }
        }
    }

    /// Plan and commit in one step.
    pub fn apply(&mut self, edits: &[ScheduleEdit]) -> Result<(), StakingError> {
        let plan = self.plan(edits)?;
        self.commit(plan);
        Ok(())
    }

    /// Schedule `shares` to leave the pool at the start of `day`.
    pub fn add_scheduled_decay(&mut self, day: Day, shares: u128) -> Result<(), StakingError> {
        self.apply(&[ScheduleEdit::AddDecay(day, shares)])
    }

    /// Reverse an earlier [`add_scheduled_decay`](Self::add_scheduled_decay).
    pub fn remove_scheduled_decay(&mut self, day: Day, shares: u128) -> Result<(), StakingError> {
        self.apply(&[ScheduleEdit::RemoveDecay(day, shares)])
    }

    /// Move scheduled decay from `from` to `to`, e.g. from maturity to an
    /// early close day. Both days must still be open.
    pub fn move_scheduled_decay(&mut self, from: Day, to: Day, shares: u128) -> Result<(), StakingError> {
        self.apply(&[
            ScheduleEdit::RemoveDecay(from, shares),
            ScheduleEdit::AddDecay(to, shares),
        ])
    }

    /// Schedule `shares` to join the pool at the start of `day`.
    pub fn add_scheduled_activation(&mut self, day: Day, shares: u128) -> Result<(), StakingError> {
        self.apply(&[ScheduleEdit::AddActivation(day, shares)])
    }

    /// Record an early-exit penalty in `day`'s pool.
    pub fn add_penalty(&mut self, day: Day, amount: u128) -> Result<(), StakingError> {
        self.apply(&[ScheduleEdit::AddPenalty(day, amount)])
    }

    /// Finalize exactly the next unfinalized day.
    pub(crate) fn finalize(&mut self, day: Day, values: FinalizedDay) -> Result<(), StakingError> {
        self.ensure_open(day)?;
        let expected = self.global.next_unfinalized_day();
        if day != expected {
            return Err(StakingError::InvalidDayRange {
                day,
                min: expected,
                max: expected,
            });
        }
        let snap = self.days.entry(day).or_default();
        snap.active_shares = values.active_shares;
        snap.inflation_amount = values.inflation_amount;
        snap.pool_amount = values.pool_amount;
        snap.reward_per_share = values.reward_per_share;
        self.global.active_shares = values.active_shares;
        self.global.last_finalized_day = Some(day);
        Ok(())
    }

    /// Cumulative reward per share over all finalized days strictly before
    /// `day`. Days past the finalized boundary contribute nothing yet.
    pub fn reward_per_share_before(&self, day: Day) -> u128 {
        let Some(last) = self.global.last_finalized_day else {
            return 0;
        };
        if day == 0 {
            return 0;
        }
        self.read((day - 1).min(last)).reward_per_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tide_core::constants::INITIAL_SHARE_PRICE;

    fn ledger() -> SnapshotLedger {
        SnapshotLedger::new(INITIAL_SHARE_PRICE)
    }

    fn finalize_empty(l: &mut SnapshotLedger, day: Day) {
        l.finalize(day, FinalizedDay::default()).unwrap();
    }

    #[test]
    fn unknown_day_reads_zero() {
        let l = ledger();
        assert_eq!(l.read(12_345), Snapshot::default());
        assert_eq!(l.stored_days(), 0);
    }

    #[test]
    fn future_writes_always_legal() {
        let mut l = ledger();
        l.add_scheduled_decay(500, 10).unwrap();
        l.add_scheduled_activation(3, 7).unwrap();
        l.add_penalty(500, 4).unwrap();
        let snap = l.read(500);
        assert_eq!(snap.scheduled_decay, 10);
        assert_eq!(snap.penalties, 4);
        assert_eq!(l.read(3).scheduled_activation, 7);
    }

    #[test]
    fn finalized_day_rejects_writes() {
        let mut l = ledger();
        finalize_empty(&mut l, 0);
        finalize_empty(&mut l, 1);
        assert_eq!(
            l.add_scheduled_decay(1, 1),
            Err(StakingError::AlreadyFinalized { day: 1, last_finalized: 1 })
        );
        assert!(l.add_penalty(0, 1).is_err());
        assert!(l.add_penalty(2, 1).is_ok());
    }

    #[test]
    fn finalize_must_be_sequential() {
        let mut l = ledger();
        assert_eq!(
            l.finalize(1, FinalizedDay::default()),
            Err(StakingError::InvalidDayRange { day: 1, min: 0, max: 0 })
        );
        finalize_empty(&mut l, 0);
        assert!(matches!(
            l.finalize(0, FinalizedDay::default()),
            Err(StakingError::AlreadyFinalized { .. })
        ));
    }

    #[test]
    fn finalize_keeps_schedule_fields() {
        let mut l = ledger();
        l.add_scheduled_decay(0, 3).unwrap();
        l.finalize(
            0,
            FinalizedDay { active_shares: 9, inflation_amount: 2, pool_amount: 2, reward_per_share: 5 },
        )
        .unwrap();
        let snap = l.read(0);
        assert_eq!(snap.scheduled_decay, 3);
        assert_eq!(snap.active_shares, 9);
        assert_eq!(l.global().active_shares, 9);
        assert_eq!(l.global().last_finalized_day, Some(0));
    }

    #[test]
    fn remove_more_than_scheduled_fails_cleanly() {
        let mut l = ledger();
        l.add_scheduled_decay(4, 2).unwrap();
        assert_eq!(l.remove_scheduled_decay(4, 3), Err(StakingError::ArithmeticOverflow));
        assert_eq!(l.read(4).scheduled_decay, 2);
    }

    #[test]
    fn move_decay_and_prune_empty_days() {
        let mut l = ledger();
        l.add_scheduled_decay(20, 6).unwrap();
        l.move_scheduled_decay(20, 5, 6).unwrap();
        assert_eq!(l.read(5).scheduled_decay, 6);
        assert_eq!(l.read(20), Snapshot::default());
        assert_eq!(l.stored_days(), 1);
    }

    #[test]
    fn move_into_finalized_day_changes_nothing() {
        let mut l = ledger();
        finalize_empty(&mut l, 0);
        l.add_scheduled_decay(20, 6).unwrap();
        assert!(l.move_scheduled_decay(20, 0, 6).is_err());
        assert_eq!(l.read(20).scheduled_decay, 6);
    }

    #[test]
    fn failed_plan_writes_nothing() {
        let mut l = ledger();
        l.add_scheduled_decay(9, 5).unwrap();
        let edits = [
            ScheduleEdit::AddPenalty(3, 1),
            ScheduleEdit::AddActivation(4, 2),
            ScheduleEdit::RemoveDecay(9, 6),
        ];
        assert_eq!(l.apply(&edits), Err(StakingError::ArithmeticOverflow));
        assert_eq!(l.read(3), Snapshot::default());
        assert_eq!(l.read(4), Snapshot::default());
        assert_eq!(l.read(9).scheduled_decay, 5);
    }

    #[test]
    fn plan_accumulates_edits_on_same_day() {
        let mut l = ledger();
        let plan = l
            .plan(&[
                ScheduleEdit::AddDecay(7, 10),
                ScheduleEdit::RemoveDecay(7, 4),
                ScheduleEdit::AddPenalty(7, 3),
            ])
            .unwrap();
        assert_eq!(l.read(7), Snapshot::default());
        l.commit(plan);
        assert_eq!(l.read(7).scheduled_decay, 6);
        assert_eq!(l.read(7).penalties, 3);
    }

    #[test]
    fn reward_per_share_before_clamps_to_finalized() {
        let mut l = ledger();
        assert_eq!(l.reward_per_share_before(10), 0);
        for (day, rps) in [(0u64, 4u128), (1, 9)] {
            l.finalize(day, FinalizedDay { reward_per_share: rps, ..Default::default() })
                .unwrap();
        }
        assert_eq!(l.reward_per_share_before(0), 0);
        assert_eq!(l.reward_per_share_before(1), 4);
        assert_eq!(l.reward_per_share_before(2), 9);
        assert_eq!(l.reward_per_share_before(50), 9);
    }
}
