//! Simulation configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;
use crate::utils::amm_math::{DEFAULT_RATIO_TOLERANCE_BPS, MAX_FEE_BPS};
use crate::utils::units::WAD;

/// How the backrun leg is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackrunSizing {
    /// Exactly the output of the frontrun
    Received,
    /// The attacker's whole balance of the bought asset
    EntireBalance,
}

/// Main simulation configuration
///
/// All amounts are 18-decimal base units, the same scale the engine uses
/// for prices and shares. `Default` is the reference scenario: a
/// 1000 TKA / 2000 TKB pool with no fee. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// AMM fee in basis points (30 = 0.3%)
    pub fee_bps: u16,

    /// Allowed deviation from the pool ratio for deposits
    pub ratio_tolerance_bps: u16,

    /// Initial pool reserve of token A
    pub initial_pool_a: u128,

    /// Initial pool reserve of token B
    pub initial_pool_b: u128,

    /// Victim starting balances
    pub victim_a: u128,
    pub victim_b: u128,

    /// Attacker starting balances
    pub attacker_a: u128,
    pub attacker_b: u128,

    /// Victim's A -> B swap size
    pub victim_swap: u128,

    /// Victim's minimum acceptable output
    pub victim_min_out: u128,

    /// Attacker's A -> B frontrun size
    pub frontrun_amount: u128,

    pub backrun: BackrunSizing,

    /// Settings for `batch` runs
    pub batch: BatchConfig,

    /// Output directory for logs and reports
    pub output_dir: String,
}

/// Multi-round randomized run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Number of victim swaps to simulate
    pub rounds: u32,

    /// Probability that the attacker will attempt to sandwich a trade (0.0 - 1.0)
    pub attack_probability: f64,

    /// Number of victim accounts trading in rotation
    pub num_victims: u32,

    /// Minimum swap amount
    pub min_swap: u128,

    /// Maximum swap amount
    pub max_swap: u128,

    /// Slippage tolerance victims derive their minimum output from
    pub slippage_bps: u16,

    /// RNG seed, so batch runs are reproducible
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fee_bps: 0,
            ratio_tolerance_bps: DEFAULT_RATIO_TOLERANCE_BPS,
            initial_pool_a: 1_000 * WAD,
            initial_pool_b: 2_000 * WAD,
            victim_a: 500 * WAD,
            victim_b: 1_000 * WAD,
            attacker_a: 100 * WAD,
            attacker_b: 200 * WAD,
            victim_swap: 100 * WAD,
            victim_min_out: 150 * WAD,
            frontrun_amount: 50 * WAD,
            backrun: BackrunSizing::Received,
            batch: BatchConfig::default(),
            output_dir: "output".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            attack_probability: 0.8,
            num_victims: 5,
            min_swap: WAD,       // 1 TKA
            max_swap: 50 * WAD,  // 50 TKA
            slippage_bps: 1_000, // 10%
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// The canonical 1000/2000 sandwich scenario
    pub fn reference() -> Self {
        Self::default()
    }

    /// Create config for a quick test run
    pub fn quick_test() -> Self {
        Self {
            batch: BatchConfig {
                rounds: 10,
                ..BatchConfig::default()
            },
            ..Self::reference()
        }
    }

    /// Load a JSON config; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidFee(self.fee_bps));
        }
        if self.ratio_tolerance_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidTolerance(self.ratio_tolerance_bps));
        }
        if self.initial_pool_a == 0 || self.initial_pool_b == 0 {
            return Err(ConfigError::InvalidAmount {
                input: format!("{}/{}", self.initial_pool_a, self.initial_pool_b),
                reason: "initial reserves must be non-zero".to_string(),
            });
        }
        self.batch.validate()
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.attack_probability) {
            return Err(ConfigError::InvalidProbability(self.attack_probability));
        }
        if self.min_swap == 0 || self.min_swap > self.max_swap {
            return Err(ConfigError::InvalidSwapRange {
                min: self.min_swap,
                max: self.max_swap,
            });
        }
        if self.slippage_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidTolerance(self.slippage_bps));
        }
        if self.num_victims == 0 {
            return Err(ConfigError::InvalidScenario("batch needs at least one victim".to_string()));
        }
        Ok(())
    }
}
