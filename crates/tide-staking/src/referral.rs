//! Referral links.
//!
//! A position opened with a referrer creates a [`ReferralLink`] under the
//! referrer's account. The link's shares sit in the pool next to the
//! position's own shares for `[start_day, end_day)` and accrue through the
//! same reward accumulator; the referrer withdraws that interest separately,
//! without penalty.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tide_core::error::StakingError;
use tide_core::math;
use tide_core::types::{AccountId, Day, ReferralLink, ReferralView};

use crate::inflation::settle;
use crate::snapshot::SnapshotLedger;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferralBook {
    links: HashMap<AccountId, BTreeMap<u64, ReferralLink>>,
    next_ids: HashMap<AccountId, u64>,
}

impl ReferralBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next link under `referrer` will get.
    pub fn next_id(&self, referrer: &AccountId) -> u64 {
        self.next_ids.get(referrer).copied().unwrap_or(1)
    }

    pub fn get(&self, referrer: &AccountId, id: u64) -> Option<&ReferralLink> {
        self.links.get(referrer)?.get(&id)
    }

    pub(crate) fn get_or_err(&self, referrer: &AccountId, id: u64) -> Result<&ReferralLink, StakingError> {
        self.get(referrer, id).ok_or_else(|| StakingError::PositionNotFound {
            owner: referrer.clone(),
            id,
        })
    }

    /// All links of `referrer`, ordered by id.
    pub fn links_of(&self, referrer: &AccountId) -> impl Iterator<Item = &ReferralLink> {
        self.links.get(referrer).into_iter().flat_map(|m| m.values())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferralLink> {
        self.links.values().flat_map(|m| m.values())
    }

    /// Insert a new link or replace an existing one with the same id.
    pub(crate) fn upsert(&mut self, link: ReferralLink) {
        let next = self.next_ids.entry(link.referrer.clone()).or_insert(1);
        if link.id >= *next {
            *next = link.id + 1;
        }
        self.links
            .entry(link.referrer.clone())
            .or_default()
            .insert(link.id, link);
    }
}

/// Copy of `link` with interest settled up to `current_day`.
pub fn settled(
    link: &ReferralLink,
    ledger: &SnapshotLedger,
    current_day: Day,
) -> Result<ReferralLink, StakingError> {
    let (reward, to) = settle(ledger, link.shares, link.settled_day, link.end_day, current_day)?;
    let mut next = link.clone();
    next.pending_reward = math::add(next.pending_reward, reward)?;
    next.settled_day = to;
    Ok(next)
}

pub fn view(link: &ReferralLink, ledger: &SnapshotLedger, current_day: Day) -> Result<ReferralView, StakingError> {
    let pending_reward = settled(link, ledger, current_day)?.pending_reward;
    Ok(ReferralView {
        link: link.clone(),
        pending_reward,
    })
}
