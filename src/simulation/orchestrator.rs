//! Simulation Orchestrator
//!
//! Drives the ordering simulator: builds baselines, replays the natural and
//! sandwich orderings side by side, and runs frontrun sweeps and multi-round
//! randomized batches on top of that.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bots::normal_trader::{random_direction, random_trade_amount, NormalTrader, TradeResult};
use crate::bots::sandwich_attacker::{SandwichAttacker, SweepResult};
use crate::config::SimulationConfig;
use crate::simulation::comparison::{compare_orderings, ComparisonReport};
use crate::simulation::operation::Operation;
use crate::simulation::ordering::{attacker_reorder, natural_order};
use crate::simulation::replay::{replay, OrderingKind, SimulationResult};
use crate::simulation::scenario::{Scenario, ATTACKER};
use crate::utils::amm_math::PoolState;
use crate::utils::ledger::{ActorId, Ledger};
use crate::utils::units::{format_signed_units, DEFAULT_DECIMALS};

/// Both orderings of one operation set plus their comparison
#[derive(Debug, Clone)]
pub struct OrderingRun {
    pub natural: SimulationResult,
    pub sandwich: SimulationResult,
    pub comparison: ComparisonReport,
}

/// Replay `ops` in natural and sandwich order from the same baseline
///
/// The two replays share nothing mutable, so they run in parallel.
pub fn run_orderings(pool: &PoolState, balances: &Ledger, ops: &[Operation], attacker: &ActorId) -> OrderingRun {
    let (natural, sandwich) = rayon::join(
        || replay(pool, balances, &natural_order(ops), OrderingKind::Natural),
        || replay(pool, balances, &attacker_reorder(ops, attacker), OrderingKind::Sandwich),
    );
    let comparison = compare_orderings(&natural, &sandwich);

    OrderingRun {
        natural,
        sandwich,
        comparison,
    }
}

/// Results of a single scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub scenario: Scenario,
    pub decimals: u8,
    pub natural: SimulationResult,
    pub sandwich: SimulationResult,
    pub comparison: ComparisonReport,
    pub generated_at: String,
}

/// Results of a frontrun-size sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResults {
    pub scenario: Scenario,
    pub decimals: u8,
    pub sweep: SweepResult,
    pub generated_at: String,
}

/// One round of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub trade: TradeResult,
    /// The attacker looked at this trade
    pub attack_attempted: bool,
    pub frontrun_amount: Option<u128>,
    pub attacker_profit: i128,
    pub victim_loss: i128,
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_rounds: u32,
    /// Rounds dropped because the victim could not afford the trade
    pub skipped_trades: u32,
    pub attack_attempts: u32,
    pub successful_attacks: u32,
    /// Attack success rate (%)
    pub attack_success_rate: f64,
    /// Attacker gain over the natural ordering, in asset A base units
    pub total_mev_extracted: i128,
    /// Victim value lost, in asset A base units
    pub total_victim_losses: i128,
    pub avg_loss_per_attack: f64,
    pub total_volume: u128,
    pub avg_trade_amount: f64,
}

/// Record of pool state at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStateRecord {
    pub round: u32,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub price_a_in_b: f64,
    pub ordering: OrderingKind,
}

impl PoolStateRecord {
    fn of(round: u32, pool: &PoolState, ordering: OrderingKind) -> Self {
        Self {
            round,
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            price_a_in_b: pool.price_a_in_b(),
            ordering,
        }
    }
}

/// Results of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    pub config: SimulationConfig,
    pub decimals: u8,
    pub rounds: Vec<RoundResult>,
    pub summary: BatchSummary,
    pub pool_history: Vec<PoolStateRecord>,
    pub final_pool: PoolState,
    pub generated_at: String,
}

/// Main simulation orchestrator
pub struct Orchestrator {
    config: SimulationConfig,
}

impl Orchestrator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replay a scenario in both orderings
    pub fn run(&self, scenario: &Scenario) -> Result<SimulationResults> {
        scenario.validate()?;
        let (pool, balances) = scenario
            .baseline()
            .with_context(|| format!("Failed to build baseline for '{}'", scenario.name))?;

        info!("Running scenario '{}'", scenario.name);
        info!(
            "Pool: {} / {} (fee {} bps), {} operations",
            pool.reserve_a,
            pool.reserve_b,
            pool.fee_bps,
            scenario.operations.len()
        );

        let run = run_orderings(&pool, &balances, &scenario.operations, &scenario.attacker);

        info!(
            "Natural order {:?}: {:?}",
            run.comparison.natural.order, run.comparison.natural.status
        );
        info!(
            "Sandwich order {:?}: {:?}",
            run.comparison.sandwich.order, run.comparison.sandwich.status
        );
        info!(
            "Attacker profit: {} TKA, victim loss: {} TKA",
            format_signed_units(run.comparison.attacker_profit, DEFAULT_DECIMALS),
            format_signed_units(run.comparison.victim_loss, DEFAULT_DECIMALS)
        );

        Ok(SimulationResults {
            scenario: scenario.clone(),
            decimals: DEFAULT_DECIMALS,
            natural: run.natural,
            sandwich: run.sandwich,
            comparison: run.comparison,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// The configured reference scenario
    pub fn run_reference(&self) -> Result<SimulationResults> {
        self.run(&Scenario::reference(&self.config))
    }

    /// Replay the scenario's victim against `steps` frontrun sizes
    pub fn sweep(&self, scenario: &Scenario, steps: u32) -> Result<SweepResults> {
        scenario.validate()?;
        let victim = scenario
            .victim_operation()
            .context("Scenario has no victim operation to sweep against")?;
        let (pool, balances) = scenario.baseline()?;
        let attacker = SandwichAttacker::new(scenario.attacker.clone(), self.config.backrun);

        info!("Sweeping {} frontrun sizes against {}", steps, victim.label());
        let sweep = attacker.sweep(&pool, &balances, &scenario.pending(), victim, steps);

        Ok(SweepResults {
            scenario: scenario.clone(),
            decimals: DEFAULT_DECIMALS,
            sweep,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Randomized multi-round run
    ///
    /// Each round one victim submits a swap; with `attack_probability` the
    /// attacker tries to sandwich it. Whichever ordering actually executed
    /// becomes the next round's baseline.
    pub fn run_batch(&self) -> Result<BatchResults> {
        let config = &self.config;
        let batch = &config.batch;
        config.validate()?;

        info!("Starting batch simulation...");
        info!("Rounds: {}", batch.rounds);
        info!("Attack probability: {:.0}%", batch.attack_probability * 100.0);

        let mut rng = StdRng::seed_from_u64(batch.seed);
        let attacker = SandwichAttacker::new(ATTACKER, config.backrun);
        let traders: Vec<NormalTrader> = (0..batch.num_victims)
            .map(|i| NormalTrader::new(format!("victim-{}", i), batch.slippage_bps))
            .collect();

        let mut pool = PoolState::with_tolerance(
            config.initial_pool_a,
            config.initial_pool_b,
            config.fee_bps,
            config.ratio_tolerance_bps,
        )?;
        let mut balances = Ledger::new().mint(attacker.actor(), config.attacker_a, config.attacker_b)?;
        for trader in &traders {
            balances = balances.mint(trader.actor(), config.victim_a, config.victim_b)?;
        }

        let mut rounds = Vec::with_capacity(batch.rounds as usize);
        let mut pool_history = vec![PoolStateRecord::of(0, &pool, OrderingKind::Natural)];
        let mut skipped_trades = 0;

        for round in 0..batch.rounds {
            let trader = &traders[rng.gen_range(0..traders.len())];
            let amount = random_trade_amount(&mut rng, batch.min_swap, batch.max_swap);
            let direction = random_direction(&mut rng);
            let attack_attempted = rng.gen::<f64>() < batch.attack_probability;

            if !trader.can_trade(&balances, direction, amount) {
                debug!("Trader {} has insufficient balance", trader.actor());
                skipped_trades += 1;
                continue;
            }

            let expected_out = trader.expected_out(&pool, direction, amount)?;
            let victim = trader.swap_op(1, u64::from(round), &pool, direction, amount)?;
            let mut ops = vec![victim.clone()];

            let plan = if attack_attempted {
                attacker.should_attack(&pool, &balances, &ops, &victim)
            } else {
                None
            };
            if let Some(plan) = &plan {
                ops.extend(plan.operations.iter().cloned());
            }

            let run = run_orderings(&pool, &balances, &ops, attacker.actor());
            let (executed, ordering) = if plan.is_some() {
                (&run.sandwich, OrderingKind::Sandwich)
            } else {
                (&run.natural, OrderingKind::Natural)
            };

            rounds.push(RoundResult {
                round,
                trade: TradeResult {
                    trader: trader.actor().clone(),
                    amount_in: amount,
                    direction,
                    expected_out,
                    actual_out: executed.output_of(victim.id),
                    was_attacked: plan.is_some(),
                },
                attack_attempted,
                frontrun_amount: plan.as_ref().map(|p| p.frontrun_amount),
                attacker_profit: run.comparison.attacker_profit,
                victim_loss: run.comparison.victim_loss,
            });

            pool = executed.final_pool;
            balances = executed.final_balances.clone();
            pool_history.push(PoolStateRecord::of(round + 1, &pool, ordering));

            if (round + 1) % 100 == 0 || round == 0 {
                info!("Progress: {}/{} rounds", round + 1, batch.rounds);
            }
        }

        let summary = summarize(batch.rounds, skipped_trades, &rounds);

        info!("Batch complete!");
        info!(
            "Total MEV extracted: {} TKA",
            format_signed_units(summary.total_mev_extracted, DEFAULT_DECIMALS)
        );
        info!(
            "Total victim losses: {} TKA",
            format_signed_units(summary.total_victim_losses, DEFAULT_DECIMALS)
        );

        Ok(BatchResults {
            config: config.clone(),
            decimals: DEFAULT_DECIMALS,
            rounds,
            summary,
            pool_history,
            final_pool: pool,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

fn summarize(total_rounds: u32, skipped_trades: u32, rounds: &[RoundResult]) -> BatchSummary {
    let attack_attempts = rounds.iter().filter(|r| r.attack_attempted).count() as u32;
    let successful_attacks = rounds.iter().filter(|r| r.trade.was_attacked).count() as u32;

    let attack_success_rate = if attack_attempts > 0 {
        (successful_attacks as f64 / attack_attempts as f64) * 100.0
    } else {
        0.0
    };

    let total_mev_extracted: i128 = rounds.iter().map(|r| r.attacker_profit).sum();
    let total_victim_losses: i128 = rounds.iter().map(|r| r.victim_loss).sum();

    let avg_loss_per_attack = if successful_attacks > 0 {
        total_victim_losses as f64 / successful_attacks as f64
    } else {
        0.0
    };

    let total_volume: u128 = rounds.iter().map(|r| r.trade.amount_in).sum();
    let avg_trade_amount = if rounds.is_empty() {
        0.0
    } else {
        total_volume as f64 / rounds.len() as f64
    };

    BatchSummary {
        total_rounds,
        skipped_trades,
        attack_attempts,
        successful_attacks,
        attack_success_rate,
        total_mev_extracted,
        total_victim_losses,
        avg_loss_per_attack,
        total_volume,
        avg_trade_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::operation::OpId;
    use crate::simulation::replay::ReplayStatus;

    #[test]
    fn test_reference_run() {
        let orchestrator = Orchestrator::new(SimulationConfig::reference());
        let results = orchestrator.run_reference().unwrap();

        assert_eq!(results.natural.order(), vec![OpId(1), OpId(2), OpId(3)]);
        assert_eq!(results.sandwich.order(), vec![OpId(2), OpId(1), OpId(3)]);
        assert_eq!(results.sandwich.status, ReplayStatus::Complete);
        assert!(results.comparison.attacker_profit > 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let scenario = Scenario::reference(&SimulationConfig::reference());
        let (pool, balances) = scenario.baseline().unwrap();

        let run = run_orderings(&pool, &balances, &scenario.operations, &scenario.attacker);
        let sandwich = replay(
            &pool,
            &balances,
            &attacker_reorder(&scenario.operations, &scenario.attacker),
            OrderingKind::Sandwich,
        );

        assert_eq!(run.sandwich.final_pool, sandwich.final_pool);
        assert_eq!(run.sandwich.final_balances, sandwich.final_balances);
    }

    #[test]
    fn test_sweep_reference() {
        let orchestrator = Orchestrator::new(SimulationConfig::reference());
        let scenario = Scenario::reference(orchestrator.config());

        let results = orchestrator.sweep(&scenario, 5).unwrap();

        assert_eq!(results.sweep.victim, OpId(1));
        assert_eq!(results.sweep.candidates.len(), 5);
        assert!(results.sweep.best.is_some());
    }

    #[test]
    fn test_batch_is_reproducible() {
        let orchestrator = Orchestrator::new(SimulationConfig::quick_test());

        let first = orchestrator.run_batch().unwrap();
        let second = orchestrator.run_batch().unwrap();

        assert_eq!(first.final_pool, second.final_pool);
        assert_eq!(first.summary.total_mev_extracted, second.summary.total_mev_extracted);
        assert_eq!(first.rounds.len() as u32 + first.summary.skipped_trades, 10);
        assert_eq!(first.pool_history.len(), first.rounds.len() + 1);
    }

    #[test]
    fn test_batch_attack_probability() {
        let mut config = SimulationConfig::quick_test();

        config.batch.attack_probability = 0.0;
        let honest = Orchestrator::new(config.clone()).run_batch().unwrap();
        assert_eq!(honest.summary.attack_attempts, 0);
        assert_eq!(honest.summary.total_mev_extracted, 0);
        assert!(honest.rounds.iter().all(|r| r.trade.actual_out == Some(r.trade.expected_out)));

        config.batch.attack_probability = 1.0;
        let hostile = Orchestrator::new(config).run_batch().unwrap();
        assert!(hostile.summary.successful_attacks > 0);
        assert!(hostile.summary.successful_attacks <= hostile.summary.attack_attempts);
        assert!(hostile.summary.total_mev_extracted > 0);
    }
}
