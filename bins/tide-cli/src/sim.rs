//! Scripted staking simulation.
//!
//! A script lists initial allocations and a sequence of steps, each pinned to
//! a staking day. Steps run in order against an in-memory service with a
//! manual clock; rejected steps are recorded, not fatal.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tide_core::constants::TOKEN;
use tide_core::ledger::{MemoryLedger, MemoryReferralBook};
use tide_core::types::{AccountId, BootstrapSignal, GlobalState, Position, StakingEvent, WithdrawAmount};
use tide_service::{ManualClock, StakingConfig, StakingService};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};

/// Amounts in scripts are whole tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub allocations: Vec<(String, u64)>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Open {
        day: u64,
        owner: String,
        tokens: u64,
        lock_days: u64,
        #[serde(default)]
        referrer: Option<String>,
    },
    /// Withdraw `tokens` of interest, or everything when omitted.
    Withdraw {
        day: u64,
        owner: String,
        id: u64,
        #[serde(default)]
        tokens: Option<u64>,
    },
    Close {
        day: u64,
        owner: String,
        id: u64,
    },
    WithdrawReferral {
        day: u64,
        referrer: String,
        id: u64,
    },
    Advance {
        day: u64,
        #[serde(default)]
        max_days: Option<u64>,
    },
}

impl Step {
    fn day(&self) -> u64 {
        match self {
            Step::Open { day, .. }
            | Step::Withdraw { day, .. }
            | Step::Close { day, .. }
            | Step::WithdrawReferral { day, .. }
            | Step::Advance { day, .. } => *day,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub day: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub events: Vec<StakingEvent>,
    pub global: GlobalState,
    pub positions: Vec<Position>,
    pub balances: Vec<(String, u128)>,
}

/// Two stakers, one early exit, one referral.
pub fn demo_script() -> Result<Script> {
    let json = r#"{
        "allocations": [["alice", 1000], ["bob", 1000], ["carol", 10]],
        "steps": [
            {"op": "open", "day": 0, "owner": "alice", "tokens": 100, "lock_days": 365, "referrer": "carol"},
            {"op": "open", "day": 0, "owner": "bob", "tokens": 100, "lock_days": 30},
            {"op": "withdraw", "day": 40, "owner": "alice", "id": 1},
            {"op": "close", "day": 45, "owner": "bob", "id": 1},
            {"op": "withdraw_referral", "day": 50, "referrer": "carol", "id": 1},
            {"op": "close", "day": 400, "owner": "alice", "id": 1}
        ]
    }"#;
    Ok(serde_json::from_str(json)?)
}

fn to_json<T: Serialize>(value: T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

pub fn run(script: &Script, config: StakingConfig) -> Result<Report> {
    config.validate()?;
    let day_length = config.day_length_secs;
    let clock = Arc::new(ManualClock::new(0));
    let service = StakingService::new(config, MemoryLedger::new(), MemoryReferralBook::new(), clock.clone());
    let mut rx = service.subscribe();

    service.open_staking(BootstrapSignal {
        launch_time: 0,
        allocations: script
            .allocations
            .iter()
            .map(|(name, tokens)| (AccountId::new(name.as_str()), *tokens as u128 * TOKEN))
            .collect(),
        referral_credits: vec![],
    })?;

    let mut accounts: BTreeSet<String> = script.allocations.iter().map(|(n, _)| n.clone()).collect();
    let mut outcomes = Vec::with_capacity(script.steps.len());
    let mut last_day = 0;

    for (i, step) in script.steps.iter().enumerate() {
        let day = step.day();
        if day < last_day {
            bail!("step {i} goes back in time: day {day} after day {last_day}");
        }
        last_day = day;
        clock.set(day * day_length);
        debug!(step = i, day, "running step");

        let result = match step {
            Step::Open { owner, tokens, lock_days, referrer, .. } => {
                accounts.insert(owner.clone());
                let referrer = referrer.as_deref().map(AccountId::from);
                service
                    .open_position(&AccountId::from(owner.as_str()), *tokens as u128 * TOKEN, *lock_days, referrer.as_ref())
                    .map(to_json)
            }
            Step::Withdraw { owner, id, tokens, .. } => {
                let amount = tokens.map_or(WithdrawAmount::All, |t| WithdrawAmount::Exact(t as u128 * TOKEN));
                service
                    .withdraw_interest(&AccountId::from(owner.as_str()), *id, amount)
                    .map(to_json)
            }
            Step::Close { owner, id, .. } => service.close_position(&AccountId::from(owner.as_str()), *id).map(to_json),
            Step::WithdrawReferral { referrer, id, .. } => {
                accounts.insert(referrer.clone());
                service
                    .withdraw_referral_interest(&AccountId::from(referrer.as_str()), *id)
                    .map(to_json)
            }
            Step::Advance { max_days, .. } => service.force_advance(*max_days).map(to_json),
        };

        outcomes.push(match result {
            Ok(value) => Outcome { step: i, day, result: value, error: None },
            Err(err) => Outcome { step: i, day, result: None, error: Some(err.to_string()) },
        });
    }

    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(missed)) => warn!(missed, "event buffer overflowed"),
            Err(_) => break,
        }
    }

    let positions = accounts
        .iter()
        .flat_map(|name| service.positions(&AccountId::from(name.as_str())))
        .collect();
    let balances = accounts
        .iter()
        .map(|name| (name.clone(), service.balance_of(&AccountId::from(name.as_str()))))
        .collect();

    Ok(Report {
        outcomes,
        events,
        global: service.global_state(),
        positions,
        balances,
    })
}
