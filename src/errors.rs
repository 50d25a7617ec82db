//! Error types for the AMM engine and the simulation harness

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::ledger::{ActorId, Asset};

/// Errors raised by the AMM engine.
///
/// Every variant is locally recoverable: a failing call leaves its inputs
/// untouched and the caller decides what to do next.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AmmError {
    #[error("Invalid amount: input must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Slippage tolerance exceeded: wanted at least {min_amount_out}, got {amount_out}")]
    SlippageExceeded { min_amount_out: u128, amount_out: u128 },

    #[error("Deposit ratio {amount_a}:{amount_b} does not match pool ratio {reserve_a}:{reserve_b} within {tolerance_bps} bps")]
    RatioMismatch {
        amount_a: u128,
        amount_b: u128,
        reserve_a: u128,
        reserve_b: u128,
        tolerance_bps: u16,
    },

    #[error("Invalid share {share}: must be in (0, 1e18]")]
    InvalidShare { share: u128 },

    #[error("Invalid fee: {fee_bps} bps")]
    InvalidFee { fee_bps: u16 },

    #[error("Insufficient balance for {actor}: needs {required} of {asset}, has {available}")]
    InsufficientBalance {
        actor: ActorId,
        asset: Asset,
        required: u128,
        available: u128,
    },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Constant product decreased: k {k_before} -> {k_after}")]
    InvariantViolation { k_before: String, k_after: String },
}

/// Errors raised while validating configuration or scenario input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid fee: {0} bps (max 10000)")]
    InvalidFee(u16),

    #[error("Invalid ratio tolerance: {0} bps (max 10000)")]
    InvalidTolerance(u16),

    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),

    #[error("Invalid swap range: min {min} > max {max}")]
    InvalidSwapRange { min: u128, max: u128 },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
}
