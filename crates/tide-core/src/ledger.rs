//! In-memory collaborator implementations.
//!
//! [`MemoryLedger`] and [`MemoryReferralBook`] keep everything in `HashMap`s
//! with no persistence. They back tests and the CLI simulation; a deployment
//! plugs in the real token ledger instead.

use std::collections::HashMap;

use crate::error::LedgerError;
use crate::traits::{BalanceLedger, ReferralRegistry};
use crate::types::AccountId;

/// In-memory balance ledger tracking total supply.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }
}

impl BalanceLedger for MemoryLedger {
    fn mint(&mut self, account: &AccountId, amount: u128) -> Result<(), LedgerError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.clone()))?;
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.clone()))?;
        self.total_supply = supply;
        Ok(())
    }

    fn burn(&mut self, account: &AccountId, amount: u128) -> Result<(), LedgerError> {
        let have = self.balance_of(account);
        if have < amount {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }
        if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
        }
        self.total_supply -= amount;
        Ok(())
    }

    fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }
}

/// In-memory referral registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryReferralBook {
    credits: HashMap<AccountId, u128>,
}

impl MemoryReferralBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferralRegistry for MemoryReferralBook {
    fn credit_referrer_shares(&mut self, account: &AccountId, shares: u128) {
        let entry = self.credits.entry(account.clone()).or_insert(0);
        *entry = entry.saturating_add(shares);
    }

    fn referrer_shares_of(&self, account: &AccountId) -> u128 {
        self.credits.get(account).copied().unwrap_or(0)
    }
}
