//! Scenario description
//!
//! A scenario is everything needed to reproduce a comparison: pool
//! parameters, who funds the pool, actor balances and the pending
//! operation set. Scenarios load from JSON or are built from a config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::config::{BackrunSizing, SimulationConfig};
use crate::errors::{AmmError, ConfigError};
use crate::simulation::operation::{OpId, Operation, Role, SwapAmount};
use crate::utils::amm_math::{self, Direction, PoolState, MAX_FEE_BPS};
use crate::utils::ledger::{ActorId, Ledger};

pub const LIQUIDITY_PROVIDER: &str = "deployer";
pub const VICTIM: &str = "victim";
pub const ATTACKER: &str = "attacker";

/// Starting balances of one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorFunding {
    pub actor: ActorId,
    pub role: Role,
    pub amount_a: u128,
    pub amount_b: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub fee_bps: u16,
    pub ratio_tolerance_bps: u16,
    /// Seeds the pool with the first deposit
    pub liquidity_provider: ActorId,
    pub initial_liquidity_a: u128,
    pub initial_liquidity_b: u128,
    pub funding: Vec<ActorFunding>,
    /// Actor whose priority hints the sandwich ordering honours
    pub attacker: ActorId,
    pub operations: Vec<Operation>,
}

impl Scenario {
    /// Frontrun, victim swap and backrun against a freshly seeded pool
    pub fn reference(config: &SimulationConfig) -> Self {
        let backrun_amount = match config.backrun {
            BackrunSizing::Received => SwapAmount::OutputOf(OpId(2)),
            BackrunSizing::EntireBalance => SwapAmount::EntireBalance,
        };

        let operations = vec![
            Operation::swap(
                1,
                VICTIM,
                Role::Victim,
                1,
                Direction::AToB,
                SwapAmount::Exact(config.victim_swap),
                config.victim_min_out,
            ),
            Operation::swap(
                2,
                ATTACKER,
                Role::Attacker,
                2,
                Direction::AToB,
                SwapAmount::Exact(config.frontrun_amount),
                0,
            )
            .frontrun(),
            Operation::swap(3, ATTACKER, Role::Attacker, 3, Direction::BToA, backrun_amount, 0).backrun(),
        ];

        Self {
            name: "reference sandwich".to_string(),
            fee_bps: config.fee_bps,
            ratio_tolerance_bps: config.ratio_tolerance_bps,
            liquidity_provider: LIQUIDITY_PROVIDER.into(),
            initial_liquidity_a: config.initial_pool_a,
            initial_liquidity_b: config.initial_pool_b,
            funding: vec![
                ActorFunding {
                    actor: VICTIM.into(),
                    role: Role::Victim,
                    amount_a: config.victim_a,
                    amount_b: config.victim_b,
                },
                ActorFunding {
                    actor: ATTACKER.into(),
                    role: Role::Attacker,
                    amount_a: config.attacker_a,
                    amount_b: config.attacker_b,
                },
            ],
            attacker: ATTACKER.into(),
            operations,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidFee(self.fee_bps));
        }
        if self.ratio_tolerance_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidTolerance(self.ratio_tolerance_bps));
        }
        if self.operations.is_empty() {
            return Err(ConfigError::InvalidScenario("no operations".to_string()));
        }

        let mut seen = BTreeSet::new();
        for op in &self.operations {
            if !seen.insert(op.id) {
                return Err(ConfigError::InvalidScenario(format!("duplicate operation id {}", op.id)));
            }
        }
        Ok(())
    }

    /// Pool and balances every ordering starts from
    pub fn baseline(&self) -> Result<(PoolState, Ledger), AmmError> {
        let empty = PoolState::empty(self.fee_bps, self.ratio_tolerance_bps)?;
        let lp = &self.liquidity_provider;

        let funded = Ledger::new().mint(lp, self.initial_liquidity_a, self.initial_liquidity_b)?;
        let (pool, mut balances) = amm_math::add_liquidity(
            &empty,
            &funded,
            lp,
            self.initial_liquidity_a,
            self.initial_liquidity_b,
        )?;

        for funding in &self.funding {
            balances = balances.mint(&funding.actor, funding.amount_a, funding.amount_b)?;
        }

        debug!(
            "Baseline for '{}': {} / {} with {} funded actors",
            self.name,
            pool.reserve_a,
            pool.reserve_b,
            self.funding.len()
        );
        Ok((pool, balances))
    }

    /// Operations not submitted by the attacker
    pub fn pending(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| op.actor != self.attacker)
            .cloned()
            .collect()
    }

    /// First victim operation by submission time
    pub fn victim_operation(&self) -> Option<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.is_victim())
            .min_by_key(|op| op.submitted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ledger::Holdings;
    use crate::utils::units::WAD;

    #[test]
    fn test_reference_baseline() {
        let scenario = Scenario::reference(&SimulationConfig::reference());
        let (pool, balances) = scenario.baseline().unwrap();

        assert_eq!(pool.reserve_a, 1_000 * WAD);
        assert_eq!(pool.reserve_b, 2_000 * WAD);
        assert_eq!(pool.get_price().unwrap(), 2 * WAD);
        // Deployer's tokens all went into the pool
        assert_eq!(balances.holdings(&LIQUIDITY_PROVIDER.into()), Holdings::default());
        assert_eq!(balances.holdings(&ATTACKER.into()), Holdings::new(100 * WAD, 200 * WAD));
    }

    #[test]
    fn test_backrun_sizing() {
        let received = Scenario::reference(&SimulationConfig::reference());
        let entire = Scenario::reference(&SimulationConfig {
            backrun: BackrunSizing::EntireBalance,
            ..SimulationConfig::reference()
        });

        assert!(matches!(
            received.operations[2].kind,
            crate::simulation::operation::OperationKind::Swap {
                amount_in: SwapAmount::OutputOf(OpId(2)),
                ..
            }
        ));
        assert!(matches!(
            entire.operations[2].kind,
            crate::simulation::operation::OperationKind::Swap {
                amount_in: SwapAmount::EntireBalance,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut scenario = Scenario::reference(&SimulationConfig::reference());
        scenario.operations[2].id = OpId(1);

        assert!(matches!(scenario.validate(), Err(ConfigError::InvalidScenario(_))));
    }

    #[test]
    fn test_pending_excludes_attacker() {
        let scenario = Scenario::reference(&SimulationConfig::reference());

        let pending = scenario.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, OpId(1));
        assert_eq!(scenario.victim_operation().unwrap().id, OpId(1));
    }

    #[test]
    fn test_json_round_trip() {
        let scenario = Scenario::reference(&SimulationConfig::reference());
        let json = serde_json::to_string(&scenario).unwrap();
        let parsed: Scenario = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, scenario);
    }
}
