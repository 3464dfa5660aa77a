//! End-to-end integration tests for Tide staking.
//!
//! Each test opens staking, runs whole position lifecycles through the
//! engine or the service, and checks balances, snapshots and the global
//! account against hand-computed figures.

use std::sync::Arc;

use tide_core::constants::*;
use tide_core::error::StakingError;
use tide_core::ledger::{MemoryLedger, MemoryReferralBook};
use tide_core::traits::BalanceLedger;
use tide_core::types::*;
use tide_service::{ManualClock, StakingConfig, StakingService};
use tide_staking::inflation::{accrued_reward, accrued_reward_by_days, daily_inflation};
use tide_staking::position::quote_shares;
use tide_tests::helpers::*;

// ---------------------------------------------------------------------------
// Share pricing
// ---------------------------------------------------------------------------

/// `time_bonus(100 tokens, 1825 days) - 250 tokens`.
const BONUS_DUST_5Y_100_TOKENS: u128 = 11_500;

#[test]
fn one_year_position_reads_back_its_shares() {
    let mut engine = engine_with(&[("alice", 1_000)]);
    let alice = account("alice");
    let price = engine.global_state().share_price;
    assert_eq!(price, INITIAL_SHARE_PRICE);

    let receipt = engine.open_position(&alice, 100 * TOKEN, 365, None, at(0)).unwrap();
    let expected = 100 * TOKEN * PRECISION / price + 10 * 365 * DAILY_BONUS;
    assert_eq!(receipt.shares, expected);

    let view = engine.position_view(&alice, receipt.id, at(0)).unwrap();
    assert_eq!(view.position.shares, expected);
    assert_eq!(view.position.start_day, 1);
    assert_eq!(view.position.maturity_day, 366);
}

#[test]
fn snapshot_holds_referral_and_bonus_shares() {
    let mut engine = engine_with(&[("alice", 1_000)]);
    let alice = account("alice");
    let bob = account("bob");

    engine.open_position(&alice, 100 * TOKEN, 1_825, Some(&bob), at(0)).unwrap();
    engine.force_advance(at(2), None).unwrap();

    // 1000 base + 250 bonus + 100 referral. DAILY_BONUS is 1/73 of a share
    // rounded up at 10^-19, so 73 of them overshoot 10^18 by 46 units and a
    // 100-token five-year bonus carries 11_500 units of dust.
    assert_eq!(engine.snapshot(1).active_shares, 1_350 * TOKEN + BONUS_DUST_5Y_100_TOKENS);
    assert_eq!(engine.snapshot(0).active_shares, 0);
}

// ---------------------------------------------------------------------------
// Penalties
// ---------------------------------------------------------------------------

#[test]
fn fifteen_day_lock_closed_three_days_in() {
    let mut engine = engine_with(&[("alice", 1_000), ("bob", 1_000)]);
    let alice = account("alice");
    engine.open_position(&account("bob"), 10 * TOKEN, 100, None, at(0)).unwrap();
    let r = engine.open_position(&alice, 100 * TOKEN, 15, None, at(0)).unwrap();

    // Start day 1, maturity 16; day 4 leaves 12 of 15 days.
    let close = engine.close_position(&alice, r.id, at(4)).unwrap();
    assert_eq!(close.penalty, 74 * TOKEN);
    assert_eq!(close.payout, 26 * TOKEN + close.reward);
}

#[test]
fn closing_on_maturity_day_is_free() {
    let mut engine = engine_with(&[("alice", 1_000)]);
    let alice = account("alice");
    let r = engine.open_position(&alice, 100 * TOKEN, 15, None, at(0)).unwrap();
    let close = engine.close_position(&alice, r.id, at(r.maturity_day)).unwrap();
    assert_eq!(close.penalty, 0);

    let r = engine.open_position(&alice, 50 * TOKEN, 3, None, at(20)).unwrap();
    let close = engine.close_position(&alice, r.id, at(r.maturity_day + 4_000)).unwrap();
    assert_eq!(close.penalty, 0);
}

#[test]
fn early_exit_enriches_patient_holder() {
    let run = |alice_leaves_early: bool| {
        let mut engine = engine_with(&[("alice", 1_000), ("bob", 1_000)]);
        let alice = account("alice");
        let bob = account("bob");
        engine.open_position(&alice, 100 * TOKEN, 100, None, at(0)).unwrap();
        engine.open_position(&bob, 100 * TOKEN, 100, None, at(0)).unwrap();
        if alice_leaves_early {
            engine.close_position(&alice, 1, at(10)).unwrap();
        }
        engine.close_position(&bob, 1, at(200)).unwrap().reward
    };
    let shared = run(false);
    let alone = run(true);
    // Bob collects alice's 82.8% penalty on day 10.
    assert!(alone > shared + 80 * TOKEN, "alone {alone}, shared {shared}");
}

#[test]
fn withdrawal_worth_more_than_the_stake_is_rejected() {
    let mut engine = engine_with(&[("alice", 1_000), ("bob", 1_000)]);
    let alice = account("alice");
    let bob = account("bob");
    let a = engine.open_position(&alice, 10 * TOKEN, 100, None, at(0)).unwrap();
    engine.open_position(&bob, 900 * TOKEN, 100, None, at(0)).unwrap();
    // Bob's 89.2% penalty lands on day 2, when alice holds every active share.
    engine.close_position(&bob, 1, at(2)).unwrap();
    engine.force_advance(at(5), None).unwrap();

    let pending = engine.position_view(&alice, a.id, at(5)).unwrap().pending_reward;
    assert!(pending > 800 * TOKEN, "pending {pending}");
    let state = engine.state().clone();
    let balance = engine.balances().balance_of(&alice);

    // At the launch price that interest is worth ~8000 shares; alice has ~101.
    match engine.withdraw_interest(&alice, a.id, WithdrawAmount::All, at(5)) {
        Err(StakingError::PenaltyExceedsValue { value, penalty }) => {
            assert_eq!(value, a.shares);
            assert_eq!(penalty, pending * 10);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(engine.state(), &state);
    assert_eq!(engine.balances().balance_of(&alice), balance);

    // A slice worth less than the stake is paid in full.
    let w = engine
        .withdraw_interest(&alice, a.id, WithdrawAmount::Exact(5 * TOKEN), at(5))
        .unwrap();
    assert_eq!(w.amount, 5 * TOKEN);
    assert_eq!(w.forfeited_shares, 50 * TOKEN);
    assert_eq!(w.remaining_shares, a.shares - 50 * TOKEN);
    assert_eq!(engine.balances().balance_of(&alice), balance + 5 * TOKEN);
}

// ---------------------------------------------------------------------------
// Advancer behaviour over long horizons
// ---------------------------------------------------------------------------

#[test]
fn empty_pool_mints_nothing_until_reactivated() {
    let mut engine = engine_with(&[("alice", 1_000)]);
    let alice = account("alice");
    engine.open_position(&alice, 100 * TOKEN, 5, None, at(0)).unwrap();
    engine.open_position(&alice, 100 * TOKEN, 10, None, at(30)).unwrap();
    engine.force_advance(at(50), None).unwrap();

    let per_day = daily_inflation(200 * TOKEN).unwrap();
    for day in 6..=30 {
        let snap = engine.snapshot(day);
        assert_eq!(snap.active_shares, 0, "day {day}");
        assert_eq!(snap.inflation_amount, 0, "day {day}");
    }
    assert!(engine.snapshot(31).active_shares > 0);
    assert_eq!(engine.snapshot(31).inflation_amount, per_day);
}

#[test]
fn thousands_of_idle_days_settle_exactly() {
    let mut engine = engine_with(&[("alice", 10_000), ("bob", 10_000)]);
    let alice = account("alice");
    let bob = account("bob");
    let a = engine.open_position(&alice, 5_000 * TOKEN, 3_650, None, at(0)).unwrap();
    engine.open_position(&bob, 700 * TOKEN, 10_000, Some(&alice), at(3)).unwrap();

    // Bob's open already finalized days 0..3.
    let report = engine.force_advance(at(6_000), None).unwrap();
    assert_eq!(report.days_finalized, 5_997);
    assert_eq!(report.last_finalized_day, Some(5_999));

    let ledger = &engine.state().ledger;
    let fast = accrued_reward(ledger, a.shares, a.start_day, a.maturity_day).unwrap();
    let slow = accrued_reward_by_days(ledger, a.shares, a.start_day, a.maturity_day).unwrap();
    assert_eq!(fast, slow);

    let close = engine.close_position(&alice, a.id, at(6_000)).unwrap();
    assert_eq!(close.reward, fast);
    assert_eq!(close.penalty, 0);
}

#[test]
fn share_price_only_rises() {
    let mut engine = engine_with(&[("alice", 10_000), ("bob", 10_000)]);
    let alice = account("alice");
    let bob = account("bob");
    let mut price = engine.global_state().share_price;
    let mut day = 0;
    for round in 0..6u64 {
        engine.open_position(&alice, 100 * TOKEN, 10 + round, None, at(day)).unwrap();
        engine.open_position(&bob, 50 * TOKEN, 3, None, at(day)).unwrap();
        day += 2;
        // Bob's close is early, alice's later one is mature.
        engine.close_position(&bob, round + 1, at(day)).unwrap();
        day += 20;
        engine.close_position(&alice, round + 1, at(day)).unwrap();
        let now = engine.global_state().share_price;
        assert!(now >= price);
        price = now;
    }
    assert!(price > INITIAL_SHARE_PRICE);

    // Later positions buy fewer base shares.
    let q = quote_shares(100 * TOKEN, 10, price, false).unwrap();
    let r = engine.open_position(&alice, 100 * TOKEN, 10, None, at(day)).unwrap();
    assert_eq!(r.shares, q.shares());
    assert!(q.base_shares < 1_000 * TOKEN);
}

#[test]
fn conservation_through_full_lifecycle() {
    let initial = 3_000 * TOKEN;
    let mut engine = engine_with(&[("alice", 1_000), ("bob", 1_000), ("carol", 1_000)]);
    let (alice, bob, carol) = (account("alice"), account("bob"), account("carol"));

    engine.open_position(&alice, 400 * TOKEN, 60, Some(&carol), at(0)).unwrap();
    engine.open_position(&bob, 300 * TOKEN, 30, None, at(2)).unwrap();
    engine.open_position(&carol, 200 * TOKEN, 90, Some(&alice), at(5)).unwrap();
    engine.withdraw_interest(&alice, 1, WithdrawAmount::All, at(12)).unwrap();
    engine.close_position(&carol, 1, at(20)).unwrap();
    engine.withdraw_referral_interest(&carol, 1, at(25)).unwrap();
    engine.close_position(&bob, 1, at(40)).unwrap();
    engine.withdraw_interest(&alice, 1, WithdrawAmount::All, at(70)).unwrap();

    engine.force_advance(at(71), None).unwrap();
    let dust = conservation_dust(&engine, initial, at(71));
    assert!(dust < TOKEN / 1_000_000, "dust {dust}");

    engine.close_position(&alice, 1, at(80)).unwrap();
    engine.force_advance(at(81), None).unwrap();
    let dust = conservation_dust(&engine, initial, at(81));
    assert!(dust < TOKEN / 1_000_000, "dust {dust}");
    assert_eq!(engine.global_state().total_principal, 0);
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

fn service(
    config: StakingConfig,
    clock: Arc<ManualClock>,
) -> StakingService<MemoryLedger, MemoryReferralBook> {
    let svc = StakingService::new(config, MemoryLedger::new(), MemoryReferralBook::new(), clock);
    svc.open_staking(BootstrapSignal {
        launch_time: 0,
        allocations: vec![(account("alice"), 1_000 * TOKEN), (account("bob"), 1_000 * TOKEN)],
        referral_credits: vec![],
    })
    .unwrap();
    svc
}

#[test]
fn restored_service_continues_identically() {
    let dir = tempfile::tempdir().unwrap();
    let config = StakingConfig {
        checkpoint_path: dir.path().join("state.bin"),
        ..StakingConfig::default()
    };
    let alice = account("alice");
    let bob = account("bob");

    let clock = Arc::new(ManualClock::new(0));
    let live = service(config.clone(), clock.clone());
    live.open_position(&alice, 100 * TOKEN, 50, Some(&bob)).unwrap();
    live.open_position(&bob, 80 * TOKEN, 20, None).unwrap();
    clock.set(10 * DAY);
    live.catch_up().unwrap();
    live.checkpoint().unwrap();

    // The restored copy needs the same balances; replay them by hand.
    let state = live.state();
    let copy_clock = Arc::new(ManualClock::new(10 * DAY));
    let mut balances = MemoryLedger::new();
    balances.mint(&alice, live.balance_of(&alice)).unwrap();
    balances.mint(&bob, live.balance_of(&bob)).unwrap();
    let restored =
        StakingService::restore(config, balances, MemoryReferralBook::new(), copy_clock.clone()).unwrap();
    assert_eq!(restored.state(), state);

    clock.set(30 * DAY);
    copy_clock.set(30 * DAY);
    let a = live.close_position(&alice, 1).unwrap();
    let b = restored.close_position(&alice, 1).unwrap();
    assert_eq!(a, b);
    assert_eq!(live.state(), restored.state());
}
