//! Replay of one total ordering
//!
//! Folds an ordered operation list over a baseline pool and ledger. Every
//! step produces new snapshots; the baseline is never touched. The first
//! failing operation halts the replay and the result is marked partial.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AmmError;
use crate::simulation::operation::{OpId, Operation, OperationKind, Role, SwapAmount};
use crate::utils::amm_math::{self, mul_div, Direction, PoolState};
use crate::utils::ledger::{ActorId, Ledger};

/// Which ordering a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingKind {
    Natural,
    Sandwich,
}

impl fmt::Display for OrderingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingKind::Natural => f.write_str("natural"),
            OrderingKind::Sandwich => f.write_str("sandwich"),
        }
    }
}

/// Why a step could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReplayError {
    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error("Operation {op} spends the output of {depends_on}, which has not executed")]
    UnresolvedAmount { op: OpId, depends_on: OpId },
}

/// Amounts that actually moved in a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Swap {
        direction: Direction,
        amount_in: u128,
        amount_out: u128,
    },
    AddLiquidity {
        amount_a: u128,
        amount_b: u128,
    },
    RemoveLiquidity {
        amount_a: u128,
        amount_b: u128,
    },
}

impl Fill {
    /// Output paid to the actor by a swap
    pub fn amount_out(&self) -> Option<u128> {
        match self {
            Fill::Swap { amount_out, .. } => Some(*amount_out),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub operation: Operation,
    pub pool_before: PoolState,
    pub pool_after: PoolState,
    pub fill: Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub index: usize,
    pub operation: Operation,
    /// Pool at the moment of failure (unchanged by the failed operation)
    pub pool: PoolState,
    pub error: ReplayError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Complete,
    Partial,
}

/// Price used to value holdings of B in units of A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub reserve_a: u128,
    pub reserve_b: u128,
}

impl ReferencePrice {
    pub fn from_pool(pool: &PoolState) -> Self {
        Self {
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
        }
    }

    /// Price of the first snapshot holding both assets
    ///
    /// A replay that starts from an empty pool is valued at the price its
    /// first deposit sets.
    pub fn first_priced(initial: &PoolState, steps: &[StepRecord]) -> Self {
        std::iter::once(initial)
            .chain(steps.iter().map(|s| &s.pool_after))
            .find(|pool| pool.reserve_a > 0 && pool.reserve_b > 0)
            .map_or_else(|| Self::from_pool(initial), Self::from_pool)
    }

    pub fn is_priced(&self) -> bool {
        self.reserve_a > 0 && self.reserve_b > 0
    }

    /// Signed value of `(delta_a, delta_b)` in asset A, truncating toward zero
    ///
    /// Without a price B cannot be valued and only `delta_a` counts; a
    /// replay never reaches that case once any liquidity was added.
    pub fn value_in_a(&self, delta_a: i128, delta_b: i128) -> i128 {
        if !self.is_priced() {
            return delta_a;
        }
        let b_in_a = mul_div(delta_b.unsigned_abs(), self.reserve_a, self.reserve_b)
            .map(|v| v.min(i128::MAX as u128) as i128)
            .unwrap_or(i128::MAX);
        let b_in_a = if delta_b < 0 { -b_in_a } else { b_in_a };
        delta_a.saturating_add(b_in_a)
    }
}

/// Net change of one actor's holdings over a replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDelta {
    pub actor: ActorId,
    pub role: Role,
    pub delta_a: i128,
    pub delta_b: i128,
    /// Both deltas valued in asset A at the reference price
    pub value_in_a: i128,
}

/// Everything one ordering produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub ordering: OrderingKind,
    /// Operations in the order they were replayed
    pub operations: Vec<Operation>,
    pub initial_pool: PoolState,
    pub final_pool: PoolState,
    pub initial_balances: Ledger,
    pub final_balances: Ledger,
    pub steps: Vec<StepRecord>,
    pub failure: Option<StepFailure>,
    pub status: ReplayStatus,
    pub reference: ReferencePrice,
    pub roles: BTreeMap<ActorId, Role>,
}

impl SimulationResult {
    pub fn is_partial(&self) -> bool {
        self.status == ReplayStatus::Partial
    }

    pub fn order(&self) -> Vec<OpId> {
        self.operations.iter().map(|op| op.id).collect()
    }

    /// Operations that were tried, including the failing one
    pub fn attempted(&self) -> usize {
        self.steps.len() + usize::from(self.failure.is_some())
    }

    pub fn step(&self, op: OpId) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.operation.id == op)
    }

    /// Output a swap paid out, if it executed
    pub fn output_of(&self, op: OpId) -> Option<u128> {
        self.step(op).and_then(|s| s.fill.amount_out())
    }

    pub fn role_of(&self, actor: &ActorId) -> Role {
        self.roles.get(actor).copied().unwrap_or(Role::Neutral)
    }

    /// Every actor with a role or a balance
    pub fn actors(&self) -> BTreeSet<ActorId> {
        self.roles
            .keys()
            .chain(self.initial_balances.actors())
            .chain(self.final_balances.actors())
            .cloned()
            .collect()
    }

    pub fn net_profit(&self, actor: &ActorId) -> ActorDelta {
        let start = self.initial_balances.holdings(actor);
        let end = self.final_balances.holdings(actor);
        let delta_a = signed_delta(start.a, end.a);
        let delta_b = signed_delta(start.b, end.b);

        ActorDelta {
            actor: actor.clone(),
            role: self.role_of(actor),
            delta_a,
            delta_b,
            value_in_a: self.reference.value_in_a(delta_a, delta_b),
        }
    }

    pub fn net_profits(&self) -> Vec<ActorDelta> {
        self.actors().iter().map(|actor| self.net_profit(actor)).collect()
    }
}

/// `end - start`, saturating at the `i128` range
fn signed_delta(start: u128, end: u128) -> i128 {
    if end >= start {
        i128::try_from(end - start).unwrap_or(i128::MAX)
    } else {
        i128::try_from(start - end).map_or(i128::MIN, |d| -d)
    }
}

/// First role each actor is tagged with
pub fn roles_of(ops: &[Operation]) -> BTreeMap<ActorId, Role> {
    let mut roles = BTreeMap::new();
    for op in ops {
        roles.entry(op.actor.clone()).or_insert(op.role);
    }
    roles
}

/// Replay `ordered_ops` from the baseline, one operation at a time
pub fn replay(
    pool: &PoolState,
    balances: &Ledger,
    ordered_ops: &[Operation],
    ordering: OrderingKind,
) -> SimulationResult {
    let mut current_pool = *pool;
    let mut current_balances = balances.clone();
    let mut steps: Vec<StepRecord> = Vec::with_capacity(ordered_ops.len());
    let mut failure = None;

    for (index, op) in ordered_ops.iter().enumerate() {
        match apply(&current_pool, &current_balances, op, &steps) {
            Ok((next_pool, next_balances, fill)) => {
                debug!("[{}] step {}: {} -> {:?}", ordering, index, op.label(), fill);
                steps.push(StepRecord {
                    index,
                    operation: op.clone(),
                    pool_before: current_pool,
                    pool_after: next_pool,
                    fill,
                });
                current_pool = next_pool;
                current_balances = next_balances;
            }
            Err(error) => {
                warn!("[{}] halted at step {}: {} failed: {}", ordering, index, op.label(), error);
                failure = Some(StepFailure {
                    index,
                    operation: op.clone(),
                    pool: current_pool,
                    error,
                });
                break;
            }
        }
    }

    let status = if failure.is_some() {
        ReplayStatus::Partial
    } else {
        ReplayStatus::Complete
    };
    let reference = ReferencePrice::first_priced(pool, &steps);

    SimulationResult {
        ordering,
        operations: ordered_ops.to_vec(),
        initial_pool: *pool,
        final_pool: current_pool,
        initial_balances: balances.clone(),
        final_balances: current_balances,
        steps,
        failure,
        status,
        reference,
        roles: roles_of(ordered_ops),
    }
}

fn apply(
    pool: &PoolState,
    balances: &Ledger,
    op: &Operation,
    executed: &[StepRecord],
) -> Result<(PoolState, Ledger, Fill), ReplayError> {
    match op.kind {
        OperationKind::Swap {
            direction,
            amount_in,
            min_amount_out,
        } => {
            let amount_in = resolve_amount(op, amount_in, direction, balances, executed)?;
            let (next_pool, next_balances, amount_out) =
                amm_math::swap(pool, balances, &op.actor, direction, amount_in, min_amount_out)?;
            Ok((
                next_pool,
                next_balances,
                Fill::Swap {
                    direction,
                    amount_in,
                    amount_out,
                },
            ))
        }
        OperationKind::AddLiquidity { amount_a, amount_b } => {
            let (next_pool, next_balances) =
                amm_math::add_liquidity(pool, balances, &op.actor, amount_a, amount_b)?;
            Ok((next_pool, next_balances, Fill::AddLiquidity { amount_a, amount_b }))
        }
        OperationKind::RemoveLiquidity { share } => {
            let (next_pool, next_balances, amount_a, amount_b) =
                amm_math::remove_liquidity(pool, balances, &op.actor, share)?;
            Ok((next_pool, next_balances, Fill::RemoveLiquidity { amount_a, amount_b }))
        }
    }
}

fn resolve_amount(
    op: &Operation,
    amount: SwapAmount,
    direction: Direction,
    balances: &Ledger,
    executed: &[StepRecord],
) -> Result<u128, ReplayError> {
    match amount {
        SwapAmount::Exact(amount) => Ok(amount),
        SwapAmount::EntireBalance => Ok(balances.balance(&op.actor, direction.input())),
        SwapAmount::OutputOf(depends_on) => executed
            .iter()
            .find(|s| s.operation.id == depends_on && s.operation.actor == op.actor)
            .and_then(|s| s.fill.amount_out())
            .ok_or(ReplayError::UnresolvedAmount {
                op: op.id,
                depends_on,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ledger::Asset;
    use crate::utils::units::WAD;

    const TOKEN: u128 = WAD;

    fn baseline() -> (PoolState, Ledger) {
        let pool = PoolState::new(1000 * TOKEN, 2000 * TOKEN, 0).unwrap();
        let ledger = Ledger::new()
            .mint(&"victim".into(), 500 * TOKEN, 1000 * TOKEN)
            .unwrap()
            .mint(&"attacker".into(), 100 * TOKEN, 200 * TOKEN)
            .unwrap();
        (pool, ledger)
    }

    fn frontrun() -> Operation {
        Operation::swap(2, "attacker", Role::Attacker, 2, Direction::AToB, SwapAmount::Exact(50 * TOKEN), 0)
            .frontrun()
    }

    fn victim(min_out: u128) -> Operation {
        Operation::swap(1, "victim", Role::Victim, 1, Direction::AToB, SwapAmount::Exact(100 * TOKEN), min_out)
    }

    fn backrun() -> Operation {
        Operation::swap(3, "attacker", Role::Attacker, 3, Direction::BToA, SwapAmount::OutputOf(OpId(2)), 0)
            .backrun()
    }

    #[test]
    fn test_full_sandwich_replay() {
        let (pool, ledger) = baseline();
        let ops = vec![frontrun(), victim(150 * TOKEN), backrun()];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Sandwich);

        assert_eq!(result.status, ReplayStatus::Complete);
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.initial_pool, pool);
        // Steps chain: each after-snapshot is the next before-snapshot
        for pair in result.steps.windows(2) {
            assert_eq!(pair[0].pool_after, pair[1].pool_before);
        }

        // Backrun sells exactly what the frontrun bought
        let bought = result.output_of(OpId(2)).unwrap();
        match result.step(OpId(3)).unwrap().fill {
            Fill::Swap { amount_in, .. } => assert_eq!(amount_in, bought),
            other => panic!("unexpected fill {:?}", other),
        }

        let attacker = result.net_profit(&"attacker".into());
        assert_eq!(attacker.delta_b, 0);
        assert!(attacker.delta_a > 0);
    }

    #[test]
    fn test_partial_replay_stops_at_first_failure() {
        let (pool, ledger) = baseline();
        let ops = vec![frontrun(), victim(170 * TOKEN), backrun()];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Sandwich);

        assert!(result.is_partial());
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.attempted(), 2);

        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.operation.id, OpId(1));
        assert!(matches!(
            failure.error,
            ReplayError::Amm(AmmError::SlippageExceeded { .. })
        ));
        assert!(result.step(OpId(3)).is_none());

        // Frontrun is not rolled back
        assert_eq!(result.final_pool, result.steps[0].pool_after);
        assert_eq!(failure.pool, result.final_pool);
        assert_eq!(result.final_balances.balance(&"attacker".into(), Asset::A), 50 * TOKEN);
    }

    #[test]
    fn test_output_reference_must_execute_first() {
        let (pool, ledger) = baseline();
        let ops = vec![backrun(), frontrun()];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Natural);

        assert_eq!(result.steps.len(), 0);
        assert_eq!(
            result.failure.unwrap().error,
            ReplayError::UnresolvedAmount {
                op: OpId(3),
                depends_on: OpId(2),
            }
        );
        assert_eq!(result.final_pool, pool);
    }

    #[test]
    fn test_entire_balance_swap_and_liquidity_ops() {
        let (pool, ledger) = baseline();
        let ops = vec![
            Operation::swap(1, "attacker", Role::Attacker, 1, Direction::BToA, SwapAmount::EntireBalance, 0),
            Operation::new(2, "victim", Role::Neutral, 2, OperationKind::AddLiquidity {
                amount_a: 10 * TOKEN,
                amount_b: 10 * TOKEN,
            }),
        ];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Natural);

        match result.steps[0].fill {
            Fill::Swap { amount_in, .. } => assert_eq!(amount_in, 200 * TOKEN),
            other => panic!("unexpected fill {:?}", other),
        }
        // 1:1 deposit into a ~1:2.4 pool is rejected
        assert!(matches!(
            result.failure.unwrap().error,
            ReplayError::Amm(AmmError::RatioMismatch { .. })
        ));
    }

    #[test]
    fn test_baseline_is_never_mutated() {
        let (pool, ledger) = baseline();
        let ops = vec![frontrun(), victim(0), backrun()];

        let first = replay(&pool, &ledger, &ops, OrderingKind::Sandwich);
        let second = replay(&pool, &ledger, &ops, OrderingKind::Sandwich);

        assert_eq!(first.final_pool, second.final_pool);
        assert_eq!(first.final_balances, second.final_balances);
        assert_eq!(pool, baseline().0);
    }

    #[test]
    fn test_reference_price_valuation() {
        let price = ReferencePrice {
            reserve_a: 1000,
            reserve_b: 2000,
        };

        assert_eq!(price.value_in_a(10, 20), 20);
        assert_eq!(price.value_in_a(10, -20), 0);
        assert_eq!(price.value_in_a(-5, 3), -4);
    }

    #[test]
    fn test_remove_liquidity_credits_actor() {
        let (pool, ledger) = baseline();
        let ops = vec![Operation::new(1, "victim", Role::Neutral, 1, OperationKind::RemoveLiquidity {
            share: WAD / 10,
        })];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Natural);

        assert_eq!(result.status, ReplayStatus::Complete);
        assert_eq!(
            result.steps[0].fill,
            Fill::RemoveLiquidity {
                amount_a: 100 * TOKEN,
                amount_b: 200 * TOKEN,
            }
        );
        assert_eq!(result.final_pool.reserve_a, 900 * TOKEN);
        assert_eq!(result.final_pool.reserve_b, 1800 * TOKEN);

        let victim = result.final_balances.holdings(&"victim".into());
        assert_eq!(victim.a, 600 * TOKEN);
        assert_eq!(victim.b, 1200 * TOKEN);
        assert_eq!(result.net_profit(&"victim".into()).value_in_a, 200 * TOKEN as i128);
    }

    #[test]
    fn test_empty_pool_valued_at_first_deposit_price() {
        let pool = PoolState::empty(0, 50).unwrap();
        let ledger = Ledger::new().mint(&"lp".into(), 1000 * TOKEN, 2000 * TOKEN).unwrap();
        let ops = vec![Operation::new(1, "lp", Role::Neutral, 1, OperationKind::AddLiquidity {
            amount_a: 1000 * TOKEN,
            amount_b: 2000 * TOKEN,
        })];

        let result = replay(&pool, &ledger, &ops, OrderingKind::Natural);

        assert_eq!(
            result.reference,
            ReferencePrice {
                reserve_a: 1000 * TOKEN,
                reserve_b: 2000 * TOKEN,
            }
        );
        let lp = result.net_profit(&"lp".into());
        assert_eq!(lp.delta_a, -(1000 * TOKEN as i128));
        assert_eq!(lp.delta_b, -(2000 * TOKEN as i128));
        assert_eq!(lp.value_in_a, -(2000 * TOKEN as i128));
    }

    #[test]
    fn test_net_profit_saturates_huge_balances() {
        let (pool, ledger) = baseline();
        let mut result = replay(&pool, &ledger, &[], OrderingKind::Natural);
        let whale: ActorId = "whale".into();

        result.final_balances = Ledger::new().mint(&whale, u128::MAX, 0).unwrap();
        assert_eq!(result.net_profit(&whale).delta_a, i128::MAX);

        result.initial_balances = result.final_balances.clone();
        result.final_balances = Ledger::new();
        assert_eq!(result.net_profit(&whale).delta_a, i128::MIN);

        assert_eq!(signed_delta(10, 4), -6);
        assert_eq!(signed_delta(4, 10), 6);
    }
}
