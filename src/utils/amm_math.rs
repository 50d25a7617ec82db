//! AMM Math Utilities
//!
//! Implements constant-product (x * y = k) AMM calculations on fixed-point
//! integer amounts. Every function is pure: pools are `Copy` snapshots and
//! each operation returns a new snapshot instead of mutating its input.
//!
//! Rounding always truncates toward zero, which favors the pool.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::errors::AmmError;
use crate::utils::ledger::{ActorId, Asset, Ledger};
use crate::utils::units::WAD;

/// Basis point denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Highest accepted swap fee
pub const MAX_FEE_BPS: u16 = 10_000;

/// Default tolerance for proportional deposits (0.5%)
pub const DEFAULT_RATIO_TOLERANCE_BPS: u16 = 50;

/// Swap direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sell asset A for asset B
    AToB,
    /// Sell asset B for asset A
    BToA,
}

impl Direction {
    pub fn input(self) -> Asset {
        match self {
            Direction::AToB => Asset::A,
            Direction::BToA => Asset::B,
        }
    }

    pub fn output(self) -> Asset {
        match self {
            Direction::AToB => Asset::B,
            Direction::BToA => Asset::A,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::AToB => Direction::BToA,
            Direction::BToA => Direction::AToB,
        }
    }
}

/// Represents the current state of an AMM pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Reserve of token A in base units
    pub reserve_a: u128,
    /// Reserve of token B in base units
    pub reserve_b: u128,
    /// Fee in basis points taken from the input leg (e.g., 30 = 0.3%)
    pub fee_bps: u16,
    /// Allowed deviation from the pool ratio for deposits
    pub ratio_tolerance_bps: u16,
}

/// Detailed quote for a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    /// Amount of output tokens
    pub amount_out: u128,
    /// Fee withheld from the input, in input tokens
    pub fee: u128,
    /// Shortfall versus the spot price, in basis points
    pub price_impact_bps: u64,
}

/// `a * b / denominator` with a 256-bit intermediate, truncating
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, AmmError> {
    if denominator == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denominator);
    u128::try_from(quotient).map_err(|_| AmmError::Overflow)
}

/// Output of a swap using the constant product formula
///
/// `after_fee = amount_in * (10000 - fee_bps) / 10000`
/// `amount_out = reserve_out * after_fee / (reserve_in + after_fee)`
pub fn quote_swap(
    amount_in: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee_bps: u16,
) -> Result<u128, AmmError> {
    if fee_bps > MAX_FEE_BPS {
        return Err(AmmError::InvalidFee { fee_bps });
    }
    if amount_in == 0 {
        return Err(AmmError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }

    let amount_in_after_fee = mul_div(
        amount_in,
        BPS_DENOMINATOR - fee_bps as u128,
        BPS_DENOMINATOR,
    )?;
    let denominator = reserve_in
        .checked_add(amount_in_after_fee)
        .ok_or(AmmError::Overflow)?;

    mul_div(reserve_out, amount_in_after_fee, denominator)
}

impl PoolState {
    /// Create a pool state with the default deposit tolerance
    pub fn new(reserve_a: u128, reserve_b: u128, fee_bps: u16) -> Result<Self, AmmError> {
        Self::with_tolerance(reserve_a, reserve_b, fee_bps, DEFAULT_RATIO_TOLERANCE_BPS)
    }

    pub fn with_tolerance(
        reserve_a: u128,
        reserve_b: u128,
        fee_bps: u16,
        ratio_tolerance_bps: u16,
    ) -> Result<Self, AmmError> {
        if fee_bps > MAX_FEE_BPS {
            return Err(AmmError::InvalidFee { fee_bps });
        }
        Ok(Self {
            reserve_a,
            reserve_b,
            fee_bps,
            ratio_tolerance_bps: ratio_tolerance_bps.min(MAX_FEE_BPS),
        })
    }

    /// A pool with no liquidity yet
    pub fn empty(fee_bps: u16, ratio_tolerance_bps: u16) -> Result<Self, AmmError> {
        Self::with_tolerance(0, 0, fee_bps, ratio_tolerance_bps)
    }

    pub fn is_empty(&self) -> bool {
        self.reserve_a == 0 && self.reserve_b == 0
    }

    /// Calculate the constant product k
    pub fn k(&self) -> U256 {
        U256::from(self.reserve_a) * U256::from(self.reserve_b)
    }

    /// `(reserve_in, reserve_out)` for a swap direction
    pub fn reserves_for(&self, direction: Direction) -> (u128, u128) {
        match direction {
            Direction::AToB => (self.reserve_a, self.reserve_b),
            Direction::BToA => (self.reserve_b, self.reserve_a),
        }
    }

    fn with_reserves(&self, direction: Direction, reserve_in: u128, reserve_out: u128) -> Self {
        let (reserve_a, reserve_b) = match direction {
            Direction::AToB => (reserve_in, reserve_out),
            Direction::BToA => (reserve_out, reserve_in),
        };
        Self {
            reserve_a,
            reserve_b,
            ..*self
        }
    }

    /// Price of A in B as a WAD fixed-point ratio (`reserve_b / reserve_a`)
    pub fn get_price(&self) -> Result<u128, AmmError> {
        if self.reserve_a == 0 {
            return Err(AmmError::InsufficientLiquidity);
        }
        mul_div(self.reserve_b, WAD, self.reserve_a)
    }

    /// Calculate the current price of A in terms of B
    pub fn price_a_in_b(&self) -> f64 {
        if self.reserve_a == 0 {
            return 0.0;
        }
        self.reserve_b as f64 / self.reserve_a as f64
    }

    /// Calculate the current price of B in terms of A
    pub fn price_b_in_a(&self) -> f64 {
        if self.reserve_b == 0 {
            return 0.0;
        }
        self.reserve_a as f64 / self.reserve_b as f64
    }

    /// Quote a swap without touching the pool
    pub fn quote(&self, direction: Direction, amount_in: u128) -> Result<SwapQuote, AmmError> {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        let amount_out = quote_swap(amount_in, reserve_in, reserve_out, self.fee_bps)?;

        let amount_in_after_fee = mul_div(
            amount_in,
            BPS_DENOMINATOR - self.fee_bps as u128,
            BPS_DENOMINATOR,
        )?;
        let fee = amount_in - amount_in_after_fee;

        // Ideal output (no impact) = amount_in_after_fee * (reserve_out / reserve_in)
        let ideal_output = mul_div(amount_in_after_fee, reserve_out, reserve_in)?;
        let price_impact_bps = if ideal_output > 0 {
            mul_div(ideal_output - amount_out, BPS_DENOMINATOR, ideal_output)? as u64
        } else {
            0
        };

        Ok(SwapQuote {
            amount_out,
            fee,
            price_impact_bps,
        })
    }

    /// Execute a swap, returning the new pool and the output amount
    ///
    /// All-or-nothing: on `SlippageExceeded` the caller still holds the
    /// unchanged input snapshot.
    pub fn execute_swap(
        &self,
        direction: Direction,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<(PoolState, u128), AmmError> {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        let amount_out = quote_swap(amount_in, reserve_in, reserve_out, self.fee_bps)?;

        if amount_out < min_amount_out {
            return Err(AmmError::SlippageExceeded {
                min_amount_out,
                amount_out,
            });
        }

        let new_reserve_in = reserve_in.checked_add(amount_in).ok_or(AmmError::Overflow)?;
        let new_reserve_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(AmmError::InsufficientLiquidity)?;
        let next = self.with_reserves(direction, new_reserve_in, new_reserve_out);

        let (k_before, k_after) = (self.k(), next.k());
        if k_after < k_before {
            return Err(AmmError::InvariantViolation {
                k_before: k_before.to_string(),
                k_after: k_after.to_string(),
            });
        }

        Ok((next, amount_out))
    }

    /// Deposit both assets
    ///
    /// The first deposit sets the price. Later deposits must match the
    /// current ratio within `ratio_tolerance_bps`.
    pub fn add_liquidity(&self, amount_a: u128, amount_b: u128) -> Result<PoolState, AmmError> {
        if amount_a == 0 || amount_b == 0 {
            return Err(AmmError::InvalidAmount);
        }

        if !self.is_empty() {
            if self.reserve_a == 0 || self.reserve_b == 0 {
                return Err(AmmError::InsufficientLiquidity);
            }
            self.check_ratio(amount_a, amount_b)?;
        }

        Ok(Self {
            reserve_a: self.reserve_a.checked_add(amount_a).ok_or(AmmError::Overflow)?,
            reserve_b: self.reserve_b.checked_add(amount_b).ok_or(AmmError::Overflow)?,
            ..*self
        })
    }

    // |a * rB - b * rA| * 10000 <= tolerance * a * rB
    fn check_ratio(&self, amount_a: u128, amount_b: u128) -> Result<(), AmmError> {
        let expected = U256::from(amount_a) * U256::from(self.reserve_b);
        let offered = U256::from(amount_b) * U256::from(self.reserve_a);
        let diff = if expected > offered {
            expected - offered
        } else {
            offered - expected
        };

        let scaled_diff = diff
            .checked_mul(U256::from(BPS_DENOMINATOR))
            .ok_or(AmmError::Overflow)?;
        let allowed = expected
            .checked_mul(U256::from(self.ratio_tolerance_bps))
            .ok_or(AmmError::Overflow)?;

        if scaled_diff > allowed {
            return Err(AmmError::RatioMismatch {
                amount_a,
                amount_b,
                reserve_a: self.reserve_a,
                reserve_b: self.reserve_b,
                tolerance_bps: self.ratio_tolerance_bps,
            });
        }
        Ok(())
    }

    /// Withdraw `share` (WAD fraction, 0 < share <= 1e18) of both reserves
    pub fn remove_liquidity(&self, share: u128) -> Result<(PoolState, u128, u128), AmmError> {
        if share == 0 || share > WAD {
            return Err(AmmError::InvalidShare { share });
        }
        if self.is_empty() {
            return Err(AmmError::InsufficientLiquidity);
        }

        let amount_a = mul_div(self.reserve_a, share, WAD)?;
        let amount_b = mul_div(self.reserve_b, share, WAD)?;

        let next = Self {
            reserve_a: self.reserve_a - amount_a,
            reserve_b: self.reserve_b - amount_b,
            ..*self
        };
        Ok((next, amount_a, amount_b))
    }

    /// Calculate minimum output with slippage tolerance
    pub fn min_output_with_slippage(
        &self,
        direction: Direction,
        amount_in: u128,
        slippage_bps: u16,
    ) -> Result<u128, AmmError> {
        let quote = self.quote(direction, amount_in)?;
        let slippage = mul_div(quote.amount_out, slippage_bps as u128, BPS_DENOMINATOR)?;
        Ok(quote.amount_out.saturating_sub(slippage))
    }
}

/// Swap on behalf of `actor`: debits the input asset and credits the output
pub fn swap(
    pool: &PoolState,
    balances: &Ledger,
    actor: &ActorId,
    direction: Direction,
    amount_in: u128,
    min_amount_out: u128,
) -> Result<(PoolState, Ledger, u128), AmmError> {
    let debited = balances.debit(actor, direction.input(), amount_in)?;
    let (next_pool, amount_out) = pool.execute_swap(direction, amount_in, min_amount_out)?;
    let credited = debited.credit(actor, direction.output(), amount_out)?;
    Ok((next_pool, credited, amount_out))
}

/// Deposit liquidity on behalf of `actor`, debiting both assets
pub fn add_liquidity(
    pool: &PoolState,
    balances: &Ledger,
    actor: &ActorId,
    amount_a: u128,
    amount_b: u128,
) -> Result<(PoolState, Ledger), AmmError> {
    let next_pool = pool.add_liquidity(amount_a, amount_b)?;
    let next_balances = balances
        .debit(actor, Asset::A, amount_a)?
        .debit(actor, Asset::B, amount_b)?;
    Ok((next_pool, next_balances))
}

/// Withdraw a share of the pool on behalf of `actor`, crediting both assets
pub fn remove_liquidity(
    pool: &PoolState,
    balances: &Ledger,
    actor: &ActorId,
    share: u128,
) -> Result<(PoolState, Ledger, u128, u128), AmmError> {
    let (next_pool, amount_a, amount_b) = pool.remove_liquidity(share)?;
    let next_balances = balances
        .credit(actor, Asset::A, amount_a)?
        .credit(actor, Asset::B, amount_b)?;
    Ok((next_pool, next_balances, amount_a, amount_b))
}
