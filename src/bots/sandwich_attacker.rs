//! Sandwich Attack Bot
//!
//! Watches a pending victim swap and wraps it: a frontrun in the victim's
//! direction, then a backrun selling what the frontrun bought. Candidate
//! attacks are judged by replaying both orderings, never by estimate.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BackrunSizing;
use crate::simulation::operation::{OpId, Operation, OperationKind, PriorityHint, Role, SwapAmount};
use crate::simulation::orchestrator::{run_orderings, OrderingRun};
use crate::utils::amm_math::{mul_div, Direction, PoolState};
use crate::utils::ledger::{ActorId, Ledger};

/// Halvings tried before giving up on a victim
const MAX_SIZING_ATTEMPTS: usize = 8;

/// Frontrun never exceeds this share of the input reserve (10%)
const MAX_RESERVE_SHARE_BPS: u128 = 1_000;

/// A profitable sandwich ready to be submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPlan {
    pub victim: OpId,
    pub frontrun_amount: u128,
    /// Frontrun and backrun operations
    pub operations: Vec<Operation>,
    pub expected_profit: i128,
    pub expected_victim_loss: i128,
}

/// Outcome of one candidate frontrun size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub frontrun_amount: u128,
    pub attacker_profit: i128,
    pub victim_loss: i128,
    /// Victim's output in the sandwich ordering
    pub victim_out: Option<u128>,
    /// Whether the sandwich ordering replayed without failure
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub victim: OpId,
    pub capital: u128,
    pub candidates: Vec<SweepPoint>,
    /// Most profitable completed candidate
    pub best: Option<SweepPoint>,
}

/// Sandwich attack bot
#[derive(Debug, Clone)]
pub struct SandwichAttacker {
    actor: ActorId,
    backrun: BackrunSizing,
}

impl SandwichAttacker {
    pub fn new(actor: impl Into<ActorId>, backrun: BackrunSizing) -> Self {
        Self {
            actor: actor.into(),
            backrun,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Attacker's balance of the asset the victim sells
    pub fn capital(&self, balances: &Ledger, victim: &Operation) -> u128 {
        victim_swap(victim, balances)
            .map(|(direction, _)| balances.balance(&self.actor, direction.input()))
            .unwrap_or(0)
    }

    /// Half the victim's size, capped by capital and 10% of the input reserve
    pub fn heuristic_frontrun(&self, pool: &PoolState, balances: &Ledger, victim: &Operation) -> Option<u128> {
        let (direction, victim_amount) = victim_swap(victim, balances)?;
        let (reserve_in, _) = pool.reserves_for(direction);
        let reserve_cap = mul_div(reserve_in, MAX_RESERVE_SHARE_BPS, 10_000).ok()?;

        let amount = (victim_amount / 2)
            .min(self.capital(balances, victim))
            .min(reserve_cap);
        (amount > 0).then_some(amount)
    }

    /// Frontrun and backrun around `victim`, with ids starting at `next_id`
    pub fn plan(&self, victim: &Operation, frontrun_amount: u128, next_id: u32) -> Option<Vec<Operation>> {
        let direction = match victim.kind {
            OperationKind::Swap { direction, .. } => direction,
            _ => return None,
        };

        let frontrun = Operation::swap(
            next_id,
            self.actor.clone(),
            Role::Attacker,
            victim.submitted_at.saturating_add(1),
            direction,
            SwapAmount::Exact(frontrun_amount),
            0,
        )
        .with_priority(PriorityHint::Frontrun {
            target: Some(victim.id),
        });

        let backrun_amount = match self.backrun {
            BackrunSizing::Received => SwapAmount::OutputOf(frontrun.id),
            BackrunSizing::EntireBalance => SwapAmount::EntireBalance,
        };
        let backrun = Operation::swap(
            next_id + 1,
            self.actor.clone(),
            Role::Attacker,
            victim.submitted_at.saturating_add(2),
            direction.reverse(),
            backrun_amount,
            0,
        )
        .with_priority(PriorityHint::Backrun {
            target: Some(victim.id),
        });

        Some(vec![frontrun, backrun])
    }

    /// Replay `pending` with a sandwich of `frontrun_amount` around `victim`
    pub fn evaluate(
        &self,
        pool: &PoolState,
        balances: &Ledger,
        pending: &[Operation],
        victim: &Operation,
        frontrun_amount: u128,
    ) -> Option<OrderingRun> {
        let attack = self.plan(victim, frontrun_amount, next_id(pending))?;
        let mut ops = pending.to_vec();
        ops.extend(attack);
        Some(run_orderings(pool, balances, &ops, &self.actor))
    }

    /// Size a profitable sandwich, halving the heuristic size until the
    /// victim still executes and the attacker comes out ahead
    pub fn should_attack(
        &self,
        pool: &PoolState,
        balances: &Ledger,
        pending: &[Operation],
        victim: &Operation,
    ) -> Option<AttackPlan> {
        let mut amount = self.heuristic_frontrun(pool, balances, victim)?;

        for _ in 0..MAX_SIZING_ATTEMPTS {
            if amount == 0 {
                break;
            }
            let operations = self.plan(victim, amount, next_id(pending))?;
            let mut ops = pending.to_vec();
            ops.extend(operations.iter().cloned());
            let run = run_orderings(pool, balances, &ops, &self.actor);

            if !run.sandwich.is_partial() && run.comparison.attacker_profit > 0 {
                debug!(
                    "Profitable sandwich on {}: frontrun {} for profit {}",
                    victim.id, amount, run.comparison.attacker_profit
                );
                return Some(AttackPlan {
                    victim: victim.id,
                    frontrun_amount: amount,
                    operations,
                    expected_profit: run.comparison.attacker_profit,
                    expected_victim_loss: run.comparison.victim_loss,
                });
            }
            amount /= 2;
        }

        debug!("Sandwich on {} not profitable, skipping", victim.id);
        None
    }

    /// Replay `steps` frontrun sizes from `capital / steps` up to `capital`
    pub fn sweep(
        &self,
        pool: &PoolState,
        balances: &Ledger,
        pending: &[Operation],
        victim: &Operation,
        steps: u32,
    ) -> SweepResult {
        let capital = self.capital(balances, victim);
        let steps = steps.max(1);
        let sizes: Vec<u128> = (1..=steps)
            .filter_map(|i| mul_div(capital, i as u128, steps as u128).ok())
            .filter(|amount| *amount > 0)
            .collect();

        let candidates: Vec<SweepPoint> = sizes
            .par_iter()
            .filter_map(|&amount| {
                let run = self.evaluate(pool, balances, pending, victim, amount)?;
                Some(SweepPoint {
                    frontrun_amount: amount,
                    attacker_profit: run.comparison.attacker_profit,
                    victim_loss: run.comparison.victim_loss,
                    victim_out: run.sandwich.output_of(victim.id),
                    completed: !run.sandwich.is_partial(),
                })
            })
            .collect();

        let best = candidates
            .iter()
            .filter(|p| p.completed)
            .max_by_key(|p| p.attacker_profit)
            .cloned();

        if let Some(best) = &best {
            info!(
                "Best frontrun for {}: {} (profit {})",
                victim.id, best.frontrun_amount, best.attacker_profit
            );
        }

        SweepResult {
            victim: victim.id,
            capital,
            candidates,
            best,
        }
    }
}

fn victim_swap(victim: &Operation, balances: &Ledger) -> Option<(Direction, u128)> {
    match victim.kind {
        OperationKind::Swap {
            direction,
            amount_in,
            ..
        } => match amount_in {
            SwapAmount::Exact(amount) => Some((direction, amount)),
            SwapAmount::EntireBalance => Some((direction, balances.balance(&victim.actor, direction.input()))),
            SwapAmount::OutputOf(_) => None,
        },
        _ => None,
    }
}

fn next_id(pending: &[Operation]) -> u32 {
    pending.iter().map(|op| op.id.0).max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::units::WAD;

    fn setup() -> (PoolState, Ledger, Operation) {
        let pool = PoolState::new(1_000 * WAD, 2_000 * WAD, 0).unwrap();
        let balances = Ledger::new()
            .mint(&"victim".into(), 500 * WAD, 1_000 * WAD)
            .unwrap()
            .mint(&"attacker".into(), 100 * WAD, 200 * WAD)
            .unwrap();
        let victim = Operation::swap(
            1,
            "victim",
            Role::Victim,
            1,
            Direction::AToB,
            SwapAmount::Exact(100 * WAD),
            150 * WAD,
        );
        (pool, balances, victim)
    }

    #[test]
    fn test_heuristic_frontrun() {
        let (pool, balances, victim) = setup();
        let attacker = SandwichAttacker::new("attacker", BackrunSizing::Received);

        // min(100 / 2, 100 capital, 1000 / 10)
        assert_eq!(attacker.heuristic_frontrun(&pool, &balances, &victim), Some(50 * WAD));

        let broke = SandwichAttacker::new("nobody", BackrunSizing::Received);
        assert_eq!(broke.heuristic_frontrun(&pool, &balances, &victim), None);
    }

    #[test]
    fn test_plan_targets_victim() {
        let (_, _, victim) = setup();
        let attacker = SandwichAttacker::new("attacker", BackrunSizing::Received);

        let ops = attacker.plan(&victim, 50 * WAD, 2).unwrap();

        assert_eq!(ops[0].priority, Some(PriorityHint::Frontrun { target: Some(OpId(1)) }));
        assert_eq!(ops[1].priority, Some(PriorityHint::Backrun { target: Some(OpId(1)) }));
        assert!(matches!(
            ops[1].kind,
            OperationKind::Swap {
                direction: Direction::BToA,
                amount_in: SwapAmount::OutputOf(OpId(2)),
                ..
            }
        ));
    }

    #[test]
    fn test_should_attack_reference_victim() {
        let (pool, balances, victim) = setup();
        let attacker = SandwichAttacker::new("attacker", BackrunSizing::Received);

        let plan = attacker
            .should_attack(&pool, &balances, &[victim.clone()], &victim)
            .unwrap();

        assert_eq!(plan.frontrun_amount, 50 * WAD);
        assert!(plan.expected_profit > 0);
        assert!(plan.expected_victim_loss > 0);
    }

    #[test]
    fn test_tight_victim_forces_smaller_frontrun() {
        let (pool, balances, _) = setup();
        // Only ~165.6 is left for the victim after a 50 TKA frontrun
        let victim = Operation::swap(
            1,
            "victim",
            Role::Victim,
            1,
            Direction::AToB,
            SwapAmount::Exact(100 * WAD),
            170 * WAD,
        );
        let attacker = SandwichAttacker::new("attacker", BackrunSizing::Received);

        let plan = attacker
            .should_attack(&pool, &balances, &[victim.clone()], &victim)
            .unwrap();

        assert!(plan.frontrun_amount < 50 * WAD);
        assert!(plan.expected_profit > 0);
    }

    #[test]
    fn test_sweep_finds_best_completed_size() {
        let (pool, balances, victim) = setup();
        let attacker = SandwichAttacker::new("attacker", BackrunSizing::Received);

        let result = attacker.sweep(&pool, &balances, &[victim.clone()], &victim, 10);

        assert_eq!(result.capital, 100 * WAD);
        assert_eq!(result.candidates.len(), 10);
        let best = result.best.unwrap();
        assert!(best.completed);
        assert!(result
            .candidates
            .iter()
            .filter(|p| p.completed)
            .all(|p| p.attacker_profit <= best.attacker_profit));
        assert!(best.victim_out.unwrap() >= 150 * WAD);
    }
}
