//! Collaborator interfaces consumed by the staking engine.
//!
//! - [`BalanceLedger`]: token balances (mint/burn), owned by the token contract
//! - [`ReferralRegistry`]: referral/critical-mass bookkeeping, owned by the
//!   bootstrap collaborator
//!
//! The engine holds no other dependency on the bootstrap phase.

use crate::error::LedgerError;
use crate::types::AccountId;

/// Token balance ledger.
pub trait BalanceLedger: Send {
    /// Credit `amount` new tokens to `account`.
    fn mint(&mut self, account: &AccountId, amount: u128) -> Result<(), LedgerError>;

    /// Destroy `amount` tokens held by `account`.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] and changes nothing
    /// when the balance is too small.
    fn burn(&mut self, account: &AccountId, amount: u128) -> Result<(), LedgerError>;

    /// Current balance of `account`; zero for unknown accounts.
    fn balance_of(&self, account: &AccountId) -> u128;

    /// Whether `burn(account, amount)` would succeed.
    ///
    /// Default implementation compares against [`balance_of`](Self::balance_of).
    fn can_burn(&self, account: &AccountId, amount: u128) -> bool {
        self.balance_of(account) >= amount
    }
}

/// Narrow capability for crediting referrer shares.
pub trait ReferralRegistry: Send {
    /// Record that `account` earned `shares` referrer shares.
    fn credit_referrer_shares(&mut self, account: &AccountId, shares: u128);

    /// Total referrer shares credited to `account` so far.
    fn referrer_shares_of(&self, account: &AccountId) -> u128;
}
