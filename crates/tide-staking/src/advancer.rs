//! Snapshot advancer.
//!
//! Walks forward from the first unfinalized day to the day before "now",
//! one day at a time:
//!
//! 1. `active(d) = carried + scheduled_activation(d) - scheduled_decay(d)`
//! 2. empty pool: no inflation, the day's penalties are carried forward
//! 3. otherwise: pool = inflation + penalties(d) + carried penalties,
//!    accumulator += pool * PRECISION / active(d)
//! 4. finalize the day and carry `active(d)` into the next one
//!
//! Every day in range is visited, including empty ones, so the cost is
//! linear in elapsed days and never depends on how many positions exist.
//! A batch is computed in full before anything is written: either the whole
//! batch is finalized or the ledger is left as it was.
//!
//! The share-price ratchet also lives here; the engine calls it when a
//! position closes.

use tracing::debug;

use tide_core::error::StakingError;
use tide_core::math;
use tide_core::types::{AdvanceReport, Day};

use crate::inflation::{daily_inflation, reward_per_share};
use crate::snapshot::{FinalizedDay, SnapshotLedger};

/// Stateless driver over a [`SnapshotLedger`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAdvancer;

impl SnapshotAdvancer {
    pub fn new() -> Self {
        Self
    }

    /// Days still to finalize before `current_day` is fully caught up.
    pub fn days_behind(&self, ledger: &SnapshotLedger, current_day: Day) -> u64 {
        current_day.saturating_sub(ledger.global().next_unfinalized_day())
    }

    /// Finalize up to `max_days` days before `current_day` (all of them when
    /// `max_days` is `None`).
    ///
    /// Running it again for the same `current_day` once caught up finalizes
    /// nothing.
    pub fn advance(
        &self,
        ledger: &mut SnapshotLedger,
        current_day: Day,
        max_days: Option<u64>,
    ) -> Result<AdvanceReport, StakingError> {
        let first = ledger.global().next_unfinalized_day();
        let behind = self.days_behind(ledger, current_day);
        let batch = max_days.map_or(behind, |limit| behind.min(limit));

        if batch == 0 {
            return Ok(AdvanceReport {
                days_finalized: 0,
                last_finalized_day: ledger.global().last_finalized_day,
                caught_up: behind == 0,
            });
        }

        let global = ledger.global();
        let total_principal = global.total_principal;
        let mut carried_shares = global.active_shares;
        let mut carried_penalties = global.carried_penalties;
        let mut total_inflation = global.total_inflation;
        let mut acc = ledger.reward_per_share_before(first);

        // Inflation depends only on principal, which is constant across the batch.
        let inflation_if_active = daily_inflation(total_principal)?;

        let mut staged = Vec::with_capacity(batch.min(4_096) as usize);
        for day in first..first + batch {
            let snap = ledger.read(day);
            let active = math::sub(
                math::add(carried_shares, snap.scheduled_activation)?,
                snap.scheduled_decay,
            )?;

            let (inflation, pool) = if active == 0 {
                carried_penalties = math::add(carried_penalties, snap.penalties)?;
                (0, 0)
            } else {
                let pool = math::add(
                    math::add(inflation_if_active, snap.penalties)?,
                    carried_penalties,
                )?;
                carried_penalties = 0;
                acc = math::add(acc, reward_per_share(pool, active)?)?;
                (inflation_if_active, pool)
            };
            total_inflation = math::add(total_inflation, inflation)?;

            staged.push((
                day,
                FinalizedDay {
                    active_shares: active,
                    inflation_amount: inflation,
                    pool_amount: pool,
                    reward_per_share: acc,
                },
            ));
            carried_shares = active;
        }

        for (day, values) in staged {
            ledger.finalize(day, values)?;
        }
        let global = ledger.global_mut();
        global.carried_penalties = carried_penalties;
        global.total_inflation = total_inflation;

        let last = global.last_finalized_day;
        let caught_up = batch == behind;
        debug!(
            first,
            days = batch,
            active_shares = global.active_shares,
            caught_up,
            "finalized snapshots"
        );

        Ok(AdvanceReport {
            days_finalized: batch,
            last_finalized_day: last,
            caught_up,
        })
    }

    /// Raise the share price to `candidate` if it is higher.
    ///
    /// Returns `(old, new)` when the price moved.
    pub fn ratchet_share_price(&self, ledger: &mut SnapshotLedger, candidate: u128) -> Option<(u128, u128)> {
        let global = ledger.global_mut();
        if candidate > global.share_price {
            let old = global.share_price;
            global.share_price = candidate;
            Some((old, candidate))
        } else {
            None
        }
    }
}
