//! Serialized staking host.
//!
//! [`StakingService`] puts the engine behind a single `parking_lot::Mutex`:
//! every operation, including snapshot catch-up, holds the lock from start to
//! finish, so operations never interleave. Events queued by the engine are
//! drained under the lock and fanned out on a `tokio::sync::broadcast`
//! channel after it is released.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use tide_core::error::StakingError;
use tide_core::traits::{BalanceLedger, ReferralRegistry};
use tide_core::types::{
    AccountId, AdvanceReport, BootstrapSignal, CloseReceipt, Day, GlobalState, OpenReceipt, Position,
    PositionView, ReferralView, Snapshot, StakingEvent, WithdrawAmount, WithdrawReceipt,
};
use tide_staking::{StakingEngine, StakingState};

use crate::checkpoint;
use crate::clock::Clock;
use crate::config::StakingConfig;
use crate::error::ServiceError;

pub struct StakingService<L, R> {
    engine: Mutex<StakingEngine<L, R>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<StakingEvent>,
    config: StakingConfig,
}

impl<L, R> StakingService<L, R>
where
    L: BalanceLedger + 'static,
    R: ReferralRegistry + 'static,
{
    pub fn new(config: StakingConfig, balances: L, registry: R, clock: Arc<dyn Clock>) -> Self {
        Self::with_state(config, StakingState::new(), balances, registry, clock)
    }

    /// Resume from an existing engine state.
    pub fn with_state(
        config: StakingConfig,
        state: StakingState,
        balances: L,
        registry: R,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = StakingEngine::from_parts(state, balances, registry, config.day_length_secs)
            .with_max_advance_days(config.max_advance_days);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            engine: Mutex::new(engine),
            clock,
            events,
            config,
        }
    }

    /// Resume from the configured checkpoint if one exists, else start fresh.
    pub fn restore(config: StakingConfig, balances: L, registry: R, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        let state = checkpoint::load(&config.checkpoint_path)?;
        if state.is_some() {
            info!(path = %config.checkpoint_path.display(), "restored staking state");
        }
        Ok(Self::with_state(config, state.unwrap_or_default(), balances, registry, clock))
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StakingEvent> {
        self.events.subscribe()
    }

    /// Run `op` under the lock, then publish whatever events it queued.
    fn run<T>(
        &self,
        name: &'static str,
        op: impl FnOnce(&mut StakingEngine<L, R>, u64) -> Result<T, StakingError>,
    ) -> Result<T, StakingError> {
        let now = self.clock.now();
        let (result, events) = {
            let mut engine = self.engine.lock();
            let result = op(&mut *engine, now);
            (result, engine.drain_events())
        };
        if let Err(err) = &result {
            warn!(op = name, now, %err, "staking operation rejected");
        }
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        result
    }

    pub fn open_staking(&self, signal: BootstrapSignal) -> Result<(), StakingError> {
        self.run("open_staking", |e, _| e.open_staking(signal))
    }

    pub fn open_position(
        &self,
        owner: &AccountId,
        principal: u128,
        lock_days: u64,
        referrer: Option<&AccountId>,
    ) -> Result<OpenReceipt, StakingError> {
        self.run("open_position", |e, now| {
            e.open_position(owner, principal, lock_days, referrer, now)
        })
    }

    pub fn withdraw_interest(
        &self,
        owner: &AccountId,
        id: u64,
        amount: WithdrawAmount,
    ) -> Result<WithdrawReceipt, StakingError> {
        self.run("withdraw_interest", |e, now| e.withdraw_interest(owner, id, amount, now))
    }

    pub fn close_position(&self, owner: &AccountId, id: u64) -> Result<CloseReceipt, StakingError> {
        self.run("close_position", |e, now| e.close_position(owner, id, now))
    }

    pub fn withdraw_referral_interest(&self, referrer: &AccountId, id: u64) -> Result<u128, StakingError> {
        self.run("withdraw_referral_interest", |e, now| {
            e.withdraw_referral_interest(referrer, id, now)
        })
    }

    /// One bounded advancer step.
    pub fn force_advance(&self, max_days: Option<u64>) -> Result<AdvanceReport, StakingError> {
        self.run("force_advance", |e, now| e.force_advance(now, max_days))
    }

    /// Advance in budget-sized steps until every day before today is
    /// finalized. Each step takes the lock separately.
    pub fn catch_up(&self) -> Result<AdvanceReport, StakingError> {
        let mut total = 0;
        loop {
            let report = self.force_advance(None)?;
            total += report.days_finalized;
            if report.caught_up {
                return Ok(AdvanceReport {
                    days_finalized: total,
                    ..report
                });
            }
        }
    }

    /// Background task calling [`catch_up`](Self::catch_up) every `period`
    /// until `shutdown` flips to `true`.
    pub fn spawn_advancer(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.is_open() {
                            match self.catch_up() {
                                Ok(report) if report.days_finalized > 0 => {
                                    debug!(days = report.days_finalized, "background catch-up");
                                }
                                Ok(_) => {}
                                Err(err) => warn!(%err, "background catch-up failed"),
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn is_open(&self) -> bool {
        self.engine.lock().is_open()
    }

    pub fn current_day(&self) -> Result<Day, StakingError> {
        self.engine.lock().current_day(self.clock.now())
    }

    pub fn global_state(&self) -> GlobalState {
        self.engine.lock().global_state().clone()
    }

    pub fn snapshot(&self, day: Day) -> Snapshot {
        self.engine.lock().snapshot(day)
    }

    pub fn position_view(&self, owner: &AccountId, id: u64) -> Result<PositionView, StakingError> {
        self.engine.lock().position_view(owner, id, self.clock.now())
    }

    pub fn positions(&self, owner: &AccountId) -> Vec<Position> {
        self.engine.lock().positions(owner)
    }

    pub fn referral_view(&self, referrer: &AccountId, id: u64) -> Result<ReferralView, StakingError> {
        self.engine.lock().referral_view(referrer, id, self.clock.now())
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.engine.lock().balances().balance_of(account)
    }

    pub fn state(&self) -> StakingState {
        self.engine.lock().state().clone()
    }

    /// Write the engine state to the configured checkpoint path.
    pub fn checkpoint(&self) -> Result<(), ServiceError> {
        self.checkpoint_to(&self.config.checkpoint_path)
    }

    pub fn checkpoint_to(&self, path: &Path) -> Result<(), ServiceError> {
        let state = self.state();
        checkpoint::save(&state, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tide_core::constants::TOKEN;
    use tide_core::ledger::{MemoryLedger, MemoryReferralBook};

    use crate::clock::ManualClock;

    const DAY: u64 = 86_400;

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn service(config: StakingConfig) -> (Arc<StakingService<MemoryLedger, MemoryReferralBook>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let svc = StakingService::new(config, MemoryLedger::new(), MemoryReferralBook::new(), clock.clone());
        svc.open_staking(BootstrapSignal {
            launch_time: 0,
            allocations: vec![(alice(), 1_000 * TOKEN)],
            referral_credits: vec![],
        })
        .unwrap();
        (Arc::new(svc), clock)
    }

    #[test]
    fn events_reach_subscribers() {
        let (svc, _clock) = service(StakingConfig::default());
        let mut rx = svc.subscribe();
        svc.open_position(&alice(), 10 * TOKEN, 30, None).unwrap();
        match rx.try_recv().unwrap() {
            StakingEvent::PositionOpened { owner, principal, .. } => {
                assert_eq!(owner, alice());
                assert_eq!(principal, 10 * TOKEN);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn uses_clock_for_days() {
        let (svc, clock) = service(StakingConfig::default());
        svc.open_position(&alice(), 10 * TOKEN, 30, None).unwrap();
        clock.advance(5 * DAY);
        assert_eq!(svc.current_day().unwrap(), 5);
        let w = svc.withdraw_interest(&alice(), 1, WithdrawAmount::All).unwrap();
        assert!(w.amount > 0);
        assert_eq!(svc.global_state().last_finalized_day, Some(4));
    }

    #[test]
    fn budget_forces_explicit_catch_up() {
        let config = StakingConfig {
            max_advance_days: Some(7),
            ..StakingConfig::default()
        };
        let (svc, clock) = service(config);
        svc.open_position(&alice(), 10 * TOKEN, 100, None).unwrap();
        clock.advance(40 * DAY);

        assert!(matches!(
            svc.close_position(&alice(), 1),
            Err(StakingError::CatchUpRequired { target: 39, .. })
        ));
        let report = svc.catch_up().unwrap();
        assert_eq!(report.days_finalized, 40);
        assert!(report.caught_up);
        assert!(svc.close_position(&alice(), 1).is_ok());
    }

    #[test]
    fn checkpoint_round_trip_through_restore() {
        let dir = tempfile::tempdir().unwrap();
        let config = StakingConfig {
            checkpoint_path: dir.path().join("staking.bin"),
            ..StakingConfig::default()
        };
        let (svc, clock) = service(config.clone());
        svc.open_position(&alice(), 10 * TOKEN, 30, None).unwrap();
        clock.advance(3 * DAY);
        svc.catch_up().unwrap();
        svc.checkpoint().unwrap();

        let restored = StakingService::restore(
            config,
            MemoryLedger::new(),
            MemoryReferralBook::new(),
            Arc::new(ManualClock::new(3 * DAY)),
        )
        .unwrap();
        assert_eq!(restored.state(), svc.state());
        assert_eq!(restored.positions(&alice()).len(), 1);
    }

    #[tokio::test]
    async fn background_advancer_catches_up() {
        let (svc, clock) = service(StakingConfig::default());
        svc.open_position(&alice(), 10 * TOKEN, 30, None).unwrap();
        clock.advance(12 * DAY);

        let (tx, rx) = watch::channel(false);
        let handle = svc.clone().spawn_advancer(Duration::from_millis(5), rx);
        for _ in 0..200 {
            if svc.global_state().last_finalized_day == Some(11) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(svc.global_state().last_finalized_day, Some(11));
    }
}
