//! Pending operations
//!
//! An operation is what an actor intends to do against the pool. The AMM
//! engine never sees roles or priority hints; those only drive ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::amm_math::Direction;
use crate::utils::ledger::ActorId;

/// Identifier of an operation within a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(pub u32);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role an actor plays in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Victim,
    Attacker,
    Neutral,
}

/// Where an attacker wants an operation placed relative to a victim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityHint {
    /// Immediately before the target (default: next victim operation)
    Frontrun { target: Option<OpId> },
    /// Immediately after the target (default: last victim operation)
    Backrun { target: Option<OpId> },
}

/// How much a swap spends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapAmount {
    Exact(u128),
    /// The actor's whole balance of the input asset at execution time
    EntireBalance,
    /// Exactly what an earlier operation paid out
    OutputOf(OpId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Swap {
        direction: Direction,
        amount_in: SwapAmount,
        min_amount_out: u128,
    },
    AddLiquidity {
        amount_a: u128,
        amount_b: u128,
    },
    /// `share` is a WAD fraction of both reserves
    RemoveLiquidity { share: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OpId,
    pub actor: ActorId,
    pub role: Role,
    /// Logical submission timestamp
    pub submitted_at: u64,
    #[serde(default)]
    pub priority: Option<PriorityHint>,
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(id: u32, actor: impl Into<ActorId>, role: Role, submitted_at: u64, kind: OperationKind) -> Self {
        Self {
            id: OpId(id),
            actor: actor.into(),
            role,
            submitted_at,
            priority: None,
            kind,
        }
    }

    pub fn swap(
        id: u32,
        actor: impl Into<ActorId>,
        role: Role,
        submitted_at: u64,
        direction: Direction,
        amount_in: SwapAmount,
        min_amount_out: u128,
    ) -> Self {
        Self::new(
            id,
            actor,
            role,
            submitted_at,
            OperationKind::Swap {
                direction,
                amount_in,
                min_amount_out,
            },
        )
    }

    pub fn with_priority(mut self, priority: PriorityHint) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn frontrun(self) -> Self {
        self.with_priority(PriorityHint::Frontrun { target: None })
    }

    pub fn backrun(self) -> Self {
        self.with_priority(PriorityHint::Backrun { target: None })
    }

    pub fn is_victim(&self) -> bool {
        self.role == Role::Victim
    }

    /// Short human label for logs and reports
    pub fn label(&self) -> String {
        let what = match &self.kind {
            OperationKind::Swap { direction, .. } => match direction {
                Direction::AToB => "swap A->B",
                Direction::BToA => "swap B->A",
            },
            OperationKind::AddLiquidity { .. } => "add liquidity",
            OperationKind::RemoveLiquidity { .. } => "remove liquidity",
        };
        match self.priority {
            Some(PriorityHint::Frontrun { .. }) => format!("{} {} {} (frontrun)", self.id, self.actor, what),
            Some(PriorityHint::Backrun { .. }) => format!("{} {} {} (backrun)", self.id, self.actor, what),
            None => format!("{} {} {}", self.id, self.actor, what),
        }
    }
}
