//! Shared test helpers for E2E and adversarial tests.

use tide_core::constants::TOKEN;
use tide_core::ledger::{MemoryLedger, MemoryReferralBook};
use tide_core::types::{AccountId, BootstrapSignal};
use tide_staking::{position, referral, StakingEngine};

pub type TestEngine = StakingEngine<MemoryLedger, MemoryReferralBook>;

pub const DAY: u64 = 86_400;
pub const LAUNCH: u64 = 1_600_000_000;

/// Timestamp at the start of `day`.
pub fn at(day: u64) -> u64 {
    LAUNCH + day * DAY
}

pub fn account(name: &str) -> AccountId {
    AccountId::from(name)
}

/// Engine opened at [`LAUNCH`] with `tokens` whole tokens for each name.
pub fn engine_with(accounts: &[(&str, u64)]) -> TestEngine {
    let mut engine = StakingEngine::new(MemoryLedger::new(), MemoryReferralBook::new(), DAY);
    engine
        .open_staking(BootstrapSignal {
            launch_time: LAUNCH,
            allocations: accounts
                .iter()
                .map(|(name, tokens)| (account(name), *tokens as u128 * TOKEN))
                .collect(),
            referral_credits: vec![],
        })
        .unwrap();
    engine
}

/// Interest owed but not yet paid, over positions and referral links,
/// counting finalized days only.
pub fn outstanding_interest(engine: &TestEngine, now: u64) -> u128 {
    let day = engine.current_day(now).unwrap();
    let state = engine.state();
    let positions: u128 = state
        .positions
        .iter()
        .filter(|p| p.is_open)
        .map(|p| position::view(p, &state.ledger, day).unwrap().pending_reward)
        .sum();
    let links: u128 = state
        .referrals
        .iter()
        .map(|l| referral::view(l, &state.ledger, day).unwrap().pending_reward)
        .sum();
    positions + links
}

/// Conservation check. Everything minted (initial supply plus inflation)
/// is either on a balance, locked as principal, owed as interest, or
/// waiting as carried penalties; the remainder is rounding dust, which is
/// never negative.
///
/// Assumes every penalty-bearing day is finalized, i.e. the ledger has been
/// advanced past the last operation's day. Returns the dust.
pub fn conservation_dust(engine: &TestEngine, initial_supply: u128, now: u64) -> u128 {
    let global = engine.global_state();
    let minted = initial_supply + global.total_inflation;
    let held = engine.balances().total_supply()
        + global.total_principal
        + outstanding_interest(engine, now)
        + global.carried_penalties;
    assert!(
        held <= minted,
        "value created from nothing: held {held} > minted {minted}"
    );
    minted - held
}
