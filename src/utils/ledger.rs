//! Per-actor token balances
//!
//! Holdings are created lazily with zero balances. The ledger is a plain
//! value: every debit/credit returns a new ledger and leaves the input
//! untouched, so alternate orderings can replay from the same baseline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::AmmError;

/// Identifier of a simulated participant (e.g. "victim", "attacker")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ActorId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ActorId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One of the two pool assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    A,
    B,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::A => f.write_str("TKA"),
            Asset::B => f.write_str("TKB"),
        }
    }
}

/// Holdings of a single actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    pub a: u128,
    pub b: u128,
}

impl Holdings {
    pub fn new(a: u128, b: u128) -> Self {
        Self { a, b }
    }

    pub fn get(&self, asset: Asset) -> u128 {
        match asset {
            Asset::A => self.a,
            Asset::B => self.b,
        }
    }

    fn slot_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::A => &mut self.a,
            Asset::B => &mut self.b,
        }
    }
}

/// Balances of every actor that has touched the simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    holdings: BTreeMap<ActorId, Holdings>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holdings of `actor`, zero if the actor has never been seen
    pub fn holdings(&self, actor: &ActorId) -> Holdings {
        self.holdings.get(actor).copied().unwrap_or_default()
    }

    pub fn balance(&self, actor: &ActorId, asset: Asset) -> u128 {
        self.holdings(actor).get(asset)
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorId> {
        self.holdings.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, &Holdings)> {
        self.holdings.iter()
    }

    /// Mint tokens out of thin air (harness funding, like `MockERC20.mint`)
    pub fn mint(&self, actor: &ActorId, a: u128, b: u128) -> Result<Self, AmmError> {
        self.credit(actor, Asset::A, a)?.credit(actor, Asset::B, b)
    }

    pub fn credit(&self, actor: &ActorId, asset: Asset, amount: u128) -> Result<Self, AmmError> {
        let mut next = self.clone();
        let entry = next.holdings.entry(actor.clone()).or_default();
        let slot = entry.slot_mut(asset);
        *slot = slot.checked_add(amount).ok_or(AmmError::Overflow)?;
        Ok(next)
    }

    pub fn debit(&self, actor: &ActorId, asset: Asset, amount: u128) -> Result<Self, AmmError> {
        let available = self.balance(actor, asset);
        if available < amount {
            return Err(AmmError::InsufficientBalance {
                actor: actor.clone(),
                asset,
                required: amount,
                available,
            });
        }

        let mut next = self.clone();
        let entry = next.holdings.entry(actor.clone()).or_default();
        *entry.slot_mut(asset) = available - amount;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_zero_balances() {
        let ledger = Ledger::new();
        let ghost = ActorId::from("ghost");

        assert_eq!(ledger.holdings(&ghost), Holdings::default());
        assert_eq!(ledger.actors().count(), 0);
    }

    #[test]
    fn test_credit_and_debit_return_new_ledger() {
        let alice = ActorId::from("alice");
        let ledger = Ledger::new().mint(&alice, 100, 50).unwrap();

        let spent = ledger.debit(&alice, Asset::A, 40).unwrap();

        assert_eq!(spent.holdings(&alice), Holdings::new(60, 50));
        // Original snapshot is untouched
        assert_eq!(ledger.holdings(&alice), Holdings::new(100, 50));
    }

    #[test]
    fn test_overdraft_rejected() {
        let alice = ActorId::from("alice");
        let ledger = Ledger::new().mint(&alice, 10, 0).unwrap();

        let err = ledger.debit(&alice, Asset::B, 1).unwrap_err();
        assert_eq!(
            err,
            AmmError::InsufficientBalance {
                actor: alice,
                asset: Asset::B,
                required: 1,
                available: 0,
            }
        );
    }
}
