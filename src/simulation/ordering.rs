//! Transaction ordering
//!
//! Simulating the mempool comes down to picking one total order over a
//! static set of pending operations. Two orders are produced: the honest
//! first-come-first-served order and the attacker's sandwich order.

use tracing::debug;

use crate::simulation::operation::{OpId, Operation, PriorityHint};
use crate::utils::ledger::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Before(OpId),
    After(OpId),
}

/// Stable sort by submission timestamp
pub fn natural_order(ops: &[Operation]) -> Vec<Operation> {
    let mut ordered = ops.to_vec();
    ordered.sort_by_key(|op| op.submitted_at);
    ordered
}

/// Sandwich order for `attacker`
///
/// Starting from the natural order, each frontrun-hinted operation of the
/// attacker moves immediately before its target victim operation and each
/// backrun-hinted one immediately after it. Without an explicit target a
/// frontrun aims at the next victim operation (falling back to the earliest)
/// and a backrun at the last one. Everything else keeps its natural order.
pub fn attacker_reorder(ops: &[Operation], attacker: &ActorId) -> Vec<Operation> {
    let natural = natural_order(ops);

    let is_victim_op = |id: OpId| natural.iter().any(|op| op.id == id && op.is_victim());
    let first_victim = natural.iter().find(|op| op.is_victim()).map(|op| op.id);
    let last_victim = natural.iter().rev().find(|op| op.is_victim()).map(|op| op.id);

    let slots: Vec<Option<Slot>> = natural
        .iter()
        .enumerate()
        .map(|(idx, op)| {
            if &op.actor != attacker || op.is_victim() {
                return None;
            }
            match op.priority? {
                PriorityHint::Frontrun { target } => target
                    .filter(|t| is_victim_op(*t))
                    .or_else(|| natural[idx + 1..].iter().find(|o| o.is_victim()).map(|o| o.id))
                    .or(first_victim)
                    .map(Slot::Before),
                PriorityHint::Backrun { target } => target
                    .filter(|t| is_victim_op(*t))
                    .or(last_victim)
                    .map(Slot::After),
            }
        })
        .collect();

    let placed = |slot: Slot| {
        natural
            .iter()
            .zip(&slots)
            .filter(move |(_, s)| **s == Some(slot))
            .map(|(op, _)| op.clone())
    };

    let mut ordered = Vec::with_capacity(natural.len());
    for (op, slot) in natural.iter().zip(&slots) {
        if slot.is_some() {
            continue;
        }
        ordered.extend(placed(Slot::Before(op.id)));
        ordered.push(op.clone());
        ordered.extend(placed(Slot::After(op.id)));
    }

    debug!(
        "Sandwich order for {}: {:?}",
        attacker,
        ordered.iter().map(|op| op.id.0).collect::<Vec<_>>()
    );
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::operation::{Role, SwapAmount};
    use crate::utils::amm_math::Direction;

    fn op(id: u32, actor: &str, role: Role, at: u64) -> Operation {
        Operation::swap(id, actor, role, at, Direction::AToB, SwapAmount::Exact(1), 0)
    }

    fn ids(ops: &[Operation]) -> Vec<u32> {
        ops.iter().map(|op| op.id.0).collect()
    }

    #[test]
    fn test_natural_order_is_stable() {
        let ops = vec![
            op(1, "a", Role::Neutral, 5),
            op(2, "b", Role::Neutral, 1),
            op(3, "c", Role::Neutral, 5),
            op(4, "d", Role::Neutral, 1),
        ];

        assert_eq!(ids(&natural_order(&ops)), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_reference_sandwich() {
        let ops = vec![
            op(1, "victim", Role::Victim, 1),
            op(2, "attacker", Role::Attacker, 2).frontrun(),
            op(3, "attacker", Role::Attacker, 3).backrun(),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&natural_order(&ops)), vec![1, 2, 3]);
        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![2, 1, 3]);
    }

    #[test]
    fn test_neutral_operations_keep_their_place() {
        let ops = vec![
            op(1, "lp", Role::Neutral, 0),
            op(2, "victim", Role::Victim, 1),
            op(3, "trader", Role::Neutral, 2),
            op(4, "attacker", Role::Attacker, 3).frontrun(),
            op(5, "attacker", Role::Attacker, 4).backrun(),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![1, 4, 2, 5, 3]);
    }

    #[test]
    fn test_early_frontrun_targets_next_victim() {
        let ops = vec![
            op(1, "attacker", Role::Attacker, 0).frontrun(),
            op(2, "trader", Role::Neutral, 1),
            op(3, "victim", Role::Victim, 2),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![2, 1, 3]);
    }

    #[test]
    fn test_explicit_targets() {
        let ops = vec![
            op(1, "v1", Role::Victim, 1),
            op(2, "v2", Role::Victim, 2),
            op(3, "attacker", Role::Attacker, 3)
                .with_priority(PriorityHint::Frontrun { target: Some(OpId(2)) }),
            op(4, "attacker", Role::Attacker, 4)
                .with_priority(PriorityHint::Backrun { target: Some(OpId(1)) }),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![1, 4, 3, 2]);
    }

    #[test]
    fn test_without_victims_nothing_moves() {
        let ops = vec![
            op(1, "trader", Role::Neutral, 1),
            op(2, "attacker", Role::Attacker, 2).frontrun(),
            op(3, "attacker", Role::Attacker, 3).backrun(),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![1, 2, 3]);
    }

    #[test]
    fn test_other_actors_hints_ignored() {
        let ops = vec![
            op(1, "victim", Role::Victim, 1),
            op(2, "copycat", Role::Attacker, 2).frontrun(),
            op(3, "attacker", Role::Attacker, 3).frontrun(),
        ];
        let attacker = ActorId::from("attacker");

        assert_eq!(ids(&attacker_reorder(&ops, &attacker)), vec![3, 1, 2]);
    }
}
