//! Normal Trader Bot
//!
//! A regular user swapping directly against the pool. Its minimum output is
//! derived from the quote it sees when submitting, which is exactly the
//! window a sandwich attacker exploits.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AmmError;
use crate::simulation::operation::{Operation, Role, SwapAmount};
use crate::utils::amm_math::{Direction, PoolState};
use crate::utils::ledger::{ActorId, Ledger};

/// Outcome of one victim swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    pub trader: ActorId,
    pub amount_in: u128,
    pub direction: Direction,
    /// Output quoted before anyone else traded
    pub expected_out: u128,
    /// Output received, `None` if the swap reverted
    pub actual_out: Option<u128>,
    pub was_attacked: bool,
}

impl TradeResult {
    /// Shortfall versus the quote; a reverted swap lost nothing
    pub fn slippage_loss(&self) -> u128 {
        self.actual_out
            .map(|out| self.expected_out.saturating_sub(out))
            .unwrap_or(0)
    }

    /// Calculate loss percentage
    pub fn loss_percentage(&self) -> f64 {
        if self.expected_out == 0 {
            return 0.0;
        }
        (self.slippage_loss() as f64 / self.expected_out as f64) * 100.0
    }
}

/// Normal trader that makes direct AMM swaps
#[derive(Debug, Clone)]
pub struct NormalTrader {
    actor: ActorId,
    /// Tolerance used to derive `min_amount_out`
    slippage_bps: u16,
}

impl NormalTrader {
    pub fn new(actor: impl Into<ActorId>, slippage_bps: u16) -> Self {
        Self {
            actor: actor.into(),
            slippage_bps,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Check if trader has sufficient balance for a swap
    pub fn can_trade(&self, balances: &Ledger, direction: Direction, amount: u128) -> bool {
        balances.balance(&self.actor, direction.input()) >= amount
    }

    /// Output if nobody trades first
    pub fn expected_out(&self, pool: &PoolState, direction: Direction, amount: u128) -> Result<u128, AmmError> {
        Ok(pool.quote(direction, amount)?.amount_out)
    }

    /// Minimum output the trader signs: the quote less `slippage_bps`
    pub fn min_out_for(&self, pool: &PoolState, direction: Direction, amount: u128) -> Result<u128, AmmError> {
        pool.min_output_with_slippage(direction, amount, self.slippage_bps)
    }

    /// Pending victim swap as it would land in the mempool
    pub fn swap_op(
        &self,
        id: u32,
        submitted_at: u64,
        pool: &PoolState,
        direction: Direction,
        amount: u128,
    ) -> Result<Operation, AmmError> {
        let min_out = self.min_out_for(pool, direction, amount)?;
        debug!(
            "{} submits {:?} swap of {} (min out {})",
            self.actor, direction, amount, min_out
        );
        Ok(Operation::swap(
            id,
            self.actor.clone(),
            Role::Victim,
            submitted_at,
            direction,
            SwapAmount::Exact(amount),
            min_out,
        ))
    }
}

/// Generate a random trade amount within the configured range
pub fn random_trade_amount<R: Rng>(rng: &mut R, min: u128, max: u128) -> u128 {
    rng.gen_range(min..=max)
}

/// Generate a random trade direction
pub fn random_direction<R: Rng>(rng: &mut R) -> Direction {
    if rng.gen_bool(0.5) {
        Direction::AToB
    } else {
        Direction::BToA
    }
}
