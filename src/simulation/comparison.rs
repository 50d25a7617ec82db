//! Natural vs. sandwich comparison

use serde::{Deserialize, Serialize};

use crate::simulation::operation::{OpId, OperationKind, Role};
use crate::simulation::replay::{ActorDelta, OrderingKind, ReplayStatus, SimulationResult};
use crate::utils::amm_math::PoolState;
use crate::utils::ledger::ActorId;

/// One actor's outcome under both orderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorComparison {
    pub actor: ActorId,
    pub role: Role,
    pub natural: ActorDelta,
    pub sandwich: ActorDelta,
    /// sandwich - natural
    pub difference_a: i128,
    pub difference_b: i128,
    pub difference_value: i128,
}

/// What a victim swap paid out under each ordering (`None` = did not execute)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictimFill {
    pub op: OpId,
    pub actor: ActorId,
    pub natural_out: Option<u128>,
    pub sandwich_out: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSummary {
    pub ordering: OrderingKind,
    pub status: ReplayStatus,
    pub order: Vec<OpId>,
    pub steps_executed: usize,
    pub failure: Option<String>,
    pub final_pool: PoolState,
}

impl OrderingSummary {
    fn of(result: &SimulationResult) -> Self {
        Self {
            ordering: result.ordering,
            status: result.status,
            order: result.order(),
            steps_executed: result.steps.len(),
            failure: result
                .failure
                .as_ref()
                .map(|f| format!("{} failed: {}", f.operation.label(), f.error)),
            final_pool: result.final_pool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub natural: OrderingSummary,
    pub sandwich: OrderingSummary,
    pub actors: Vec<ActorComparison>,
    pub victim_fills: Vec<VictimFill>,
    /// Attacker value gained by reordering, in asset A
    pub attacker_profit: i128,
    /// Victim value lost to reordering, in asset A
    pub victim_loss: i128,
}

impl ComparisonReport {
    pub fn actor(&self, actor: &ActorId) -> Option<&ActorComparison> {
        self.actors.iter().find(|a| &a.actor == actor)
    }

    pub fn is_profitable(&self) -> bool {
        self.attacker_profit > 0
    }
}

/// Per-actor deltas between the two orderings
pub fn compare_orderings(natural: &SimulationResult, sandwich: &SimulationResult) -> ComparisonReport {
    let mut actors_seen = natural.actors();
    actors_seen.extend(sandwich.actors());

    let actors: Vec<ActorComparison> = actors_seen
        .into_iter()
        .map(|actor| {
            let n = natural.net_profit(&actor);
            let s = sandwich.net_profit(&actor);
            let role = match sandwich.roles.get(&actor) {
                Some(role) => *role,
                None => natural.role_of(&actor),
            };
            ActorComparison {
                difference_a: s.delta_a - n.delta_a,
                difference_b: s.delta_b - n.delta_b,
                difference_value: s.value_in_a - n.value_in_a,
                actor,
                role,
                natural: n,
                sandwich: s,
            }
        })
        .collect();

    let attacker_profit = actors
        .iter()
        .filter(|a| a.role == Role::Attacker)
        .map(|a| a.difference_value)
        .sum();
    let victim_loss = -actors
        .iter()
        .filter(|a| a.role == Role::Victim)
        .map(|a| a.difference_value)
        .sum::<i128>();

    let victim_fills = natural
        .operations
        .iter()
        .filter(|op| op.is_victim() && matches!(op.kind, OperationKind::Swap { .. }))
        .map(|op| VictimFill {
            op: op.id,
            actor: op.actor.clone(),
            natural_out: natural.output_of(op.id),
            sandwich_out: sandwich.output_of(op.id),
        })
        .collect();

    ComparisonReport {
        natural: OrderingSummary::of(natural),
        sandwich: OrderingSummary::of(sandwich),
        actors,
        victim_fills,
        attacker_profit,
        victim_loss,
    }
}
