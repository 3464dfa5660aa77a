//! Position lifecycle engine.
//!
//! [`StakingEngine`] owns the whole staking state and is the only type that
//! mutates it. Every operation follows the same shape:
//!
//! 1. map `now` to a day and finalize every day before it (retained even if
//!    the operation later fails, since it depends only on time)
//! 2. validate and compute the new position/link records on copies and turn
//!    the snapshot writes into a checked [`SchedulePlan`](crate::snapshot::SchedulePlan)
//! 3. call the balance ledger (the only external step that can fail)
//! 4. commit
//!
//! A failure in steps 2 or 3 leaves positions, links, snapshots and the
//! global account exactly as they were.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tide_core::constants::{INITIAL_SHARE_PRICE, PRECISION};
use tide_core::error::StakingError;
use tide_core::math::{self, mul_div, mul_div_ceil};
use tide_core::traits::{BalanceLedger, ReferralRegistry};
use tide_core::types::{
    AccountId, AdvanceReport, BootstrapSignal, CloseReceipt, Day, GlobalState, OpenReceipt, Position,
    PositionView, ReferralLink, ReferralView, Snapshot, StakingEvent, WithdrawAmount, WithdrawReceipt,
};

use crate::advancer::SnapshotAdvancer;
use crate::calendar::DayCalendar;
use crate::penalty::{close_penalty, net_of_penalty};
use crate::position::{self, quote_shares, PositionBook};
use crate::referral::{self, ReferralBook};
use crate::snapshot::{ScheduleEdit, SnapshotLedger};

/// Everything the engine persists. The balance ledger and referral registry
/// are external collaborators and not part of it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StakingState {
    pub ledger: SnapshotLedger,
    pub positions: PositionBook,
    pub referrals: ReferralBook,
    /// `None` until staking has been opened.
    pub calendar: Option<DayCalendar>,
}

impl StakingState {
    pub fn new() -> Self {
        Self {
            ledger: SnapshotLedger::new(INITIAL_SHARE_PRICE),
            positions: PositionBook::new(),
            referrals: ReferralBook::new(),
            calendar: None,
        }
    }
}

impl Default for StakingState {
    fn default() -> Self {
        Self::new()
    }
}

/// The staking state machine over a balance ledger `L` and a referral
/// registry `R`.
pub struct StakingEngine<L, R> {
    state: StakingState,
    balances: L,
    registry: R,
    advancer: SnapshotAdvancer,
    day_length_secs: u64,
    /// Most days a position operation may finalize before running; `None`
    /// means unlimited.
    max_advance_days: Option<u64>,
    events: Vec<StakingEvent>,
}

impl<L: BalanceLedger, R: ReferralRegistry> StakingEngine<L, R> {
    pub fn new(balances: L, registry: R, day_length_secs: u64) -> Self {
        Self::from_parts(StakingState::new(), balances, registry, day_length_secs)
    }

    /// Resume from a saved state. The day length recorded at launch wins over
    /// `day_length_secs` once staking is open.
    pub fn from_parts(state: StakingState, balances: L, registry: R, day_length_secs: u64) -> Self {
        let day_length_secs = state
            .calendar
            .map_or(day_length_secs, |c| c.day_length_secs);
        Self {
            state,
            balances,
            registry,
            advancer: SnapshotAdvancer::new(),
            day_length_secs,
            max_advance_days: None,
            events: Vec::new(),
        }
    }

    pub fn with_max_advance_days(mut self, max_advance_days: Option<u64>) -> Self {
        self.max_advance_days = max_advance_days;
        self
    }

    pub fn state(&self) -> &StakingState {
        &self.state
    }

    pub fn balances(&self) -> &L {
        &self.balances
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn is_open(&self) -> bool {
        self.state.calendar.is_some()
    }

    /// Take every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<StakingEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    /// Open staking. Records day 0, mints the initial allocations and
    /// forwards referral credits. Runs once.
    pub fn open_staking(&mut self, signal: BootstrapSignal) -> Result<(), StakingError> {
        if self.is_open() {
            return Err(StakingError::StakingAlreadyOpen);
        }
        let calendar = DayCalendar::new(signal.launch_time, self.day_length_secs)?;
        let initial_supply = signal
            .allocations
            .iter()
            .try_fold(0u128, |sum, (_, amount)| math::add(sum, *amount))?;

        for (i, (account, amount)) in signal.allocations.iter().enumerate() {
            if let Err(err) = self.balances.mint(account, *amount) {
                self.unwind_allocations(&signal.allocations[..i]);
                return Err(err.into());
            }
        }
        for (account, shares) in &signal.referral_credits {
            self.registry.credit_referrer_shares(account, *shares);
        }

        self.state.calendar = Some(calendar);
        info!(
            launch_time = signal.launch_time,
            accounts = signal.allocations.len(),
            initial_supply,
            "staking opened"
        );
        self.events.push(StakingEvent::StakingOpened {
            launch_time: signal.launch_time,
            initial_supply,
        });
        Ok(())
    }

    fn unwind_allocations(&mut self, minted: &[(AccountId, u128)]) {
        for (account, amount) in minted {
            if let Err(err) = self.balances.burn(account, *amount) {
                warn!(account = %account, amount, %err, "failed to unwind allocation");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    pub fn calendar(&self) -> Result<&DayCalendar, StakingError> {
        self.state.calendar.as_ref().ok_or(StakingError::StakingNotOpen)
    }

    pub fn current_day(&self, now: u64) -> Result<Day, StakingError> {
        self.calendar()?.day_at(now)
    }

    /// Finalize up to `max_days` days before the day of `now`, or up to the
    /// configured budget when `max_days` is `None`. Safe to call at any time;
    /// repeated calls at the same day do nothing.
    pub fn force_advance(&mut self, now: u64, max_days: Option<u64>) -> Result<AdvanceReport, StakingError> {
        let day = self.current_day(now)?;
        let limit = max_days.or(self.max_advance_days);
        self.advancer.advance(&mut self.state.ledger, day, limit)
    }

    /// Bring the ledger fully up to date for `now`, or fail without touching
    /// anything when the gap exceeds the per-call budget.
    fn catch_up(&mut self, now: u64) -> Result<Day, StakingError> {
        let day = self.current_day(now)?;
        let behind = self.advancer.days_behind(&self.state.ledger, day);
        if let Some(limit) = self.max_advance_days {
            if behind > limit {
                return Err(StakingError::CatchUpRequired {
                    last_finalized: self.state.ledger.global().last_finalized_day,
                    target: day - 1,
                });
            }
        }
        self.advancer.advance(&mut self.state.ledger, day, None)?;
        Ok(day)
    }

    // -----------------------------------------------------------------------
    // Position lifecycle
    // -----------------------------------------------------------------------

    /// Lock `principal` of `owner` for `lock_days`, starting tomorrow.
    ///
    /// A referrer equal to the owner is ignored.
    pub fn open_position(
        &mut self,
        owner: &AccountId,
        principal: u128,
        lock_days: u64,
        referrer: Option<&AccountId>,
        now: u64,
    ) -> Result<OpenReceipt, StakingError> {
        let day = self.catch_up(now)?;
        let referrer = referrer.filter(|r| *r != owner).cloned();

        let global = self.state.ledger.global();
        let quote = quote_shares(principal, lock_days, global.share_price, referrer.is_some())?;
        let shares = quote.shares();
        let pool_shares = math::add(shares, quote.referrer_shares)?;
        let total_principal = math::add(global.total_principal, principal)?;
        let start_day = day.checked_add(1).ok_or(StakingError::ArithmeticOverflow)?;
        let maturity_day = start_day
            .checked_add(lock_days)
            .ok_or(StakingError::ArithmeticOverflow)?;

        let plan = self.state.ledger.plan(&[
            ScheduleEdit::AddActivation(start_day, pool_shares),
            ScheduleEdit::AddDecay(maturity_day, pool_shares),
        ])?;
        self.balances.burn(owner, principal)?;

        self.state.ledger.commit(plan);
        self.state.ledger.global_mut().total_principal = total_principal;

        let id = self.state.positions.next_id(owner);
        let referral_id = referrer.as_ref().map(|r| {
            let link_id = self.state.referrals.next_id(r);
            self.state.referrals.upsert(ReferralLink {
                referrer: r.clone(),
                id: link_id,
                referee: owner.clone(),
                position_id: id,
                shares: quote.referrer_shares,
                start_day,
                end_day: maturity_day,
                withdrawn_reward: 0,
                pending_reward: 0,
                settled_day: start_day,
            });
            self.registry.credit_referrer_shares(r, quote.referrer_shares);
            link_id
        });

        self.state.positions.upsert(Position {
            owner: owner.clone(),
            id,
            principal,
            shares,
            referrer_shares: quote.referrer_shares,
            referrer,
            referral_id,
            start_day,
            lock_days,
            maturity_day,
            close_day: None,
            withdrawn_reward: 0,
            penalty_paid: 0,
            pending_reward: 0,
            settled_day: start_day,
            is_open: true,
        });

        info!(
            owner = %owner,
            id,
            principal,
            shares,
            referrer_shares = quote.referrer_shares,
            start_day,
            lock_days,
            "position opened"
        );
        self.events.push(StakingEvent::PositionOpened {
            owner: owner.clone(),
            id,
            principal,
            shares,
            referrer_shares: quote.referrer_shares,
            start_day,
            lock_days,
        });

        Ok(OpenReceipt {
            id,
            shares,
            referrer_shares: quote.referrer_shares,
            start_day,
            maturity_day,
        })
    }

    /// Withdraw accrued interest from an open position.
    ///
    /// The whole amount is minted to the owner. A mature position keeps its
    /// shares. An immature one gives up the amount's share-equivalent at the
    /// current share price (rounded up), and those shares leave the pool
    /// today. A withdrawal worth every remaining share is rejected.
    ///
    /// [`WithdrawAmount::All`] with nothing pending succeeds and pays zero.
    pub fn withdraw_interest(
        &mut self,
        owner: &AccountId,
        id: u64,
        amount: WithdrawAmount,
        now: u64,
    ) -> Result<WithdrawReceipt, StakingError> {
        let day = self.catch_up(now)?;
        let current = self.state.positions.get_open(owner, id)?;
        let mut next = position::settled(current, &self.state.ledger, day)?;
        let pending = next.pending_reward;

        let amount = match amount {
            WithdrawAmount::Exact(0) => return Err(StakingError::ZeroAmount),
            WithdrawAmount::Exact(x) => x,
            WithdrawAmount::All => pending,
        };
        if amount > pending {
            return Err(StakingError::RewardExceedsAccrued {
                requested: amount,
                available: pending,
            });
        }

        let mut edits = Vec::new();
        let forfeited = if amount == 0 || next.is_mature_at(day) {
            0
        } else {
            let share_price = self.state.ledger.global().share_price;
            let forfeited = mul_div_ceil(amount, PRECISION, share_price)?;
            if forfeited >= next.shares {
                return Err(StakingError::PenaltyExceedsValue {
                    value: next.shares,
                    penalty: forfeited,
                });
            }
            edits.push(ScheduleEdit::RemoveDecay(next.maturity_day, forfeited));
            edits.push(ScheduleEdit::AddDecay(day, forfeited));
            forfeited
        };

        next.shares -= forfeited;
        next.pending_reward = pending - amount;
        next.withdrawn_reward = math::add(next.withdrawn_reward, amount)?;
        let remaining_shares = next.shares;

        let plan = self.state.ledger.plan(&edits)?;
        self.balances.mint(owner, amount)?;
        self.state.ledger.commit(plan);
        self.state.positions.upsert(next);

        info!(owner = %owner, id, amount, forfeited, day, "interest withdrawn");
        self.events.push(StakingEvent::InterestWithdrawn {
            owner: owner.clone(),
            id,
            amount,
            forfeited_shares: forfeited,
        });

        Ok(WithdrawReceipt {
            amount,
            forfeited_shares: forfeited,
            remaining_shares,
        })
    }

    /// Close an open position, paying out principal plus pending interest
    /// minus any early-exit penalty.
    ///
    /// Closing before the start day refunds the principal. An immature close
    /// moves the position's decay from maturity to today so the freed shares
    /// leave the pool immediately.
    pub fn close_position(&mut self, owner: &AccountId, id: u64, now: u64) -> Result<CloseReceipt, StakingError> {
        let day = self.catch_up(now)?;
        let current = self.state.positions.get_open(owner, id)?;
        let mut next = position::settled(current, &self.state.ledger, day)?;
        let reward = next.pending_reward;
        let pool_shares = math::add(next.shares, next.referrer_shares)?;

        let started = day >= next.start_day;
        let mut edits = Vec::new();
        let mut link_end = None;
        let penalty = if !started {
            edits.push(ScheduleEdit::RemoveActivation(next.start_day, pool_shares));
            edits.push(ScheduleEdit::RemoveDecay(next.maturity_day, pool_shares));
            link_end = Some(next.start_day);
            0
        } else if !next.is_mature_at(day) {
            let penalty = close_penalty(&next, day)?;
            edits.push(ScheduleEdit::RemoveDecay(next.maturity_day, pool_shares));
            edits.push(ScheduleEdit::AddDecay(day, pool_shares));
            if penalty > 0 {
                edits.push(ScheduleEdit::AddPenalty(day, penalty));
            }
            link_end = Some(day);
            penalty
        } else {
            0
        };

        let payout = net_of_penalty(math::add(next.principal, reward)?, penalty)?;
        let total_principal = math::sub(self.state.ledger.global().total_principal, next.principal)?;
        let candidate_price = if started {
            let realized = math::add(
                math::sub(next.principal, penalty)?,
                math::add(next.withdrawn_reward, reward)?,
            )?;
            Some(mul_div(realized, PRECISION, next.shares)?)
        } else {
            None
        };
        let withdrawn_reward = math::add(next.withdrawn_reward, reward)?;
        let penalty_paid = math::add(next.penalty_paid, penalty)?;
        let link = match (&next.referrer, next.referral_id, link_end) {
            (Some(referrer), Some(link_id), Some(end)) => {
                let mut link = self.state.referrals.get_or_err(referrer, link_id)?.clone();
                link.end_day = link.end_day.min(end);
                Some(link)
            }
            _ => None,
        };

        let plan = self.state.ledger.plan(&edits)?;
        self.balances.mint(owner, payout)?;

        self.state.ledger.commit(plan);
        self.state.ledger.global_mut().total_principal = total_principal;
        if let Some(candidate) = candidate_price {
            if let Some((old_price, new_price)) =
                self.advancer.ratchet_share_price(&mut self.state.ledger, candidate)
            {
                info!(old_price, new_price, day, "share price raised");
                self.events.push(StakingEvent::SharePriceRaised {
                    old_price,
                    new_price,
                    day,
                });
            }
        }
        if let Some(link) = link {
            self.state.referrals.upsert(link);
        }

        let principal = next.principal;
        next.withdrawn_reward = withdrawn_reward;
        next.pending_reward = 0;
        next.penalty_paid = penalty_paid;
        next.close_day = Some(day);
        next.is_open = false;
        self.state.positions.upsert(next);

        info!(owner = %owner, id, principal, reward, penalty, payout, day, "position closed");
        self.events.push(StakingEvent::PositionClosed {
            owner: owner.clone(),
            id,
            principal,
            reward,
            penalty,
            close_day: day,
        });

        Ok(CloseReceipt {
            principal,
            reward,
            penalty,
            payout,
            close_day: day,
        })
    }

    /// Pay out everything a referral link has accrued. No penalty applies.
    pub fn withdraw_referral_interest(
        &mut self,
        referrer: &AccountId,
        id: u64,
        now: u64,
    ) -> Result<u128, StakingError> {
        let day = self.catch_up(now)?;
        let current = self.state.referrals.get_or_err(referrer, id)?;
        let mut next = referral::settled(current, &self.state.ledger, day)?;
        let amount = next.pending_reward;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        next.withdrawn_reward = math::add(next.withdrawn_reward, amount)?;
        next.pending_reward = 0;

        self.balances.mint(referrer, amount)?;
        self.state.referrals.upsert(next);

        info!(referrer = %referrer, id, amount, day, "referral interest withdrawn");
        self.events.push(StakingEvent::ReferralInterestWithdrawn {
            referrer: referrer.clone(),
            id,
            amount,
        });
        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn global_state(&self) -> &GlobalState {
        self.state.ledger.global()
    }

    pub fn snapshot(&self, day: Day) -> Snapshot {
        self.state.ledger.read(day)
    }

    /// Computed view of a position, open or closed, as of `now`.
    ///
    /// Pending interest covers finalized days only; call
    /// [`force_advance`](Self::force_advance) first for an up-to-date figure.
    pub fn position_view(&self, owner: &AccountId, id: u64, now: u64) -> Result<PositionView, StakingError> {
        let day = self.current_day(now)?;
        let p = self
            .state
            .positions
            .get(owner, id)
            .ok_or_else(|| StakingError::PositionNotFound {
                owner: owner.clone(),
                id,
            })?;
        position::view(p, &self.state.ledger, day)
    }

    /// Every position of `owner`, open and closed, ordered by id.
    pub fn positions(&self, owner: &AccountId) -> Vec<Position> {
        self.state.positions.owned_by(owner).cloned().collect()
    }

    pub fn referral_view(&self, referrer: &AccountId, id: u64, now: u64) -> Result<ReferralView, StakingError> {
        let day = self.current_day(now)?;
        let link = self.state.referrals.get_or_err(referrer, id)?;
        referral::view(link, &self.state.ledger, day)
    }

    pub fn referral_links(&self, referrer: &AccountId) -> Vec<ReferralLink> {
        self.state.referrals.links_of(referrer).cloned().collect()
    }
}
