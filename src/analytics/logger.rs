//! Structured logging for simulation results

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::simulation::orchestrator::{BatchResults, SimulationResults, SweepResults};
use crate::simulation::replay::{ReplayStatus, SimulationResult};
use crate::utils::units::{format_signed_units, format_units};

/// Anything the CLI writes to `logs/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedResults {
    Single(SimulationResults),
    Sweep(SweepResults),
    Batch(BatchResults),
}

impl SavedResults {
    fn kind(&self) -> &'static str {
        match self {
            SavedResults::Single(_) => "simulation",
            SavedResults::Sweep(_) => "sweep",
            SavedResults::Batch(_) => "batch",
        }
    }

    /// Text summary for the terminal and `summary_*.txt`
    pub fn summary(&self) -> String {
        match self {
            SavedResults::Single(results) => format_summary(results),
            SavedResults::Sweep(results) => format_sweep_summary(results),
            SavedResults::Batch(results) => format_batch_summary(results),
        }
    }
}

/// Handles logging of simulation results to files
pub struct SimulationLogger {
    output_dir: PathBuf,
}

impl SimulationLogger {
    /// Create a new logger with the specified output directory
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// Ensure output directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.logs_dir()).context("Failed to create logs directory")?;
        fs::create_dir_all(self.reports_dir()).context("Failed to create reports directory")?;
        Ok(())
    }

    /// Save results to `logs/<kind>_<timestamp>.json`
    pub fn save_results(&self, results: &SavedResults) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let path = self
            .logs_dir()
            .join(format!("{}_{}.json", results.kind(), timestamp));

        let json = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
        write_file(&path, &json)?;

        info!("Results saved to: {}", path.display());
        Ok(path)
    }

    /// Load results from a JSON file
    pub fn load_results(path: impl AsRef<Path>) -> Result<SavedResults> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read results file {}", path.display()))?;

        serde_json::from_str(&contents).context("Failed to parse results file")
    }

    /// Save a summary text file
    pub fn save_summary(&self, results: &SavedResults) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.logs_dir().join(format!("summary_{}.txt", timestamp));
        write_file(&path, &results.summary())?;

        info!("Summary saved to: {}", path.display());
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn ordering_block(result: &SimulationResult, decimals: u8) -> String {
    let mut out = String::new();
    let order: Vec<String> = result.operations.iter().map(|op| op.id.to_string()).collect();
    out.push_str(&format!("  Order:                 {}\n", order.join(" -> ")));

    for step in &result.steps {
        let detail = match step.fill.amount_out() {
            Some(out) => format!("out {}", format_units(out, decimals)),
            None => "ok".to_string(),
        };
        out.push_str(&format!("    {:<40} {}\n", step.operation.label(), detail));
    }
    if let Some(failure) = &result.failure {
        out.push_str(&format!("    {:<40} FAILED: {}\n", failure.operation.label(), failure.error));
    }

    let status = match result.status {
        ReplayStatus::Complete => "complete",
        ReplayStatus::Partial => "PARTIAL",
    };
    out.push_str(&format!(
        "  Final pool:            {} TKA / {} TKB ({})\n",
        format_units(result.final_pool.reserve_a, decimals),
        format_units(result.final_pool.reserve_b, decimals),
        status
    ));
    out
}

/// Format a single run as a text summary
pub fn format_summary(results: &SimulationResults) -> String {
    let d = results.decimals;
    let c = &results.comparison;

    let mut actors = String::new();
    for actor in &c.actors {
        actors.push_str(&format!(
            "  {:<12} {:<9} natural {:>14} TKA {:>14} TKB | sandwich {:>14} TKA {:>14} TKB\n",
            actor.actor.as_str(),
            format!("{:?}", actor.role),
            format_signed_units(actor.natural.delta_a, d),
            format_signed_units(actor.natural.delta_b, d),
            format_signed_units(actor.sandwich.delta_a, d),
            format_signed_units(actor.sandwich.delta_b, d),
        ));
    }

    let mut fills = String::new();
    for fill in &c.victim_fills {
        let show = |v: Option<u128>| v.map_or_else(|| "reverted".to_string(), |v| format_units(v, d));
        fills.push_str(&format!(
            "  Victim {} ({}): natural {} / sandwich {}\n",
            fill.op,
            fill.actor,
            show(fill.natural_out),
            show(fill.sandwich_out)
        ));
    }

    format!(
        r#"
══════════════════════════════════════════════════════════════════
  SANDWICH SIMULATION RESULTS: {name}
══════════════════════════════════════════════════════════════════

  POOL
  ────
  Initial Reserves:      {ra} TKA / {rb} TKB
  Fee:                   {fee:.2}%

  NATURAL ORDERING
  ────────────────
{natural}
  SANDWICH ORDERING
  ─────────────────
{sandwich}
  ACTOR DELTAS
  ────────────
{actors}
{fills}
  ★ Attacker Profit:     {profit} TKA
  ★ Victim Loss:         {loss} TKA

Generated: {generated}
"#,
        name = results.scenario.name,
        ra = format_units(results.natural.initial_pool.reserve_a, d),
        rb = format_units(results.natural.initial_pool.reserve_b, d),
        fee = results.scenario.fee_bps as f64 / 100.0,
        natural = ordering_block(&results.natural, d),
        sandwich = ordering_block(&results.sandwich, d),
        actors = actors,
        fills = fills,
        profit = format_signed_units(c.attacker_profit, d),
        loss = format_signed_units(c.victim_loss, d),
        generated = results.generated_at,
    )
}

/// Format a sweep as a text summary
pub fn format_sweep_summary(results: &SweepResults) -> String {
    let d = results.decimals;
    let mut rows = String::new();
    for point in &results.sweep.candidates {
        rows.push_str(&format!(
            "  {:>16} {:>16} {:>16} {}\n",
            format_units(point.frontrun_amount, d),
            format_signed_units(point.attacker_profit, d),
            format_signed_units(point.victim_loss, d),
            if point.completed { "" } else { "victim reverts" }
        ));
    }

    let best = results.sweep.best.as_ref().map_or_else(
        || "none (no candidate completed)".to_string(),
        |b| {
            format!(
                "{} TKA for {} TKA profit",
                format_units(b.frontrun_amount, d),
                format_signed_units(b.attacker_profit, d)
            )
        },
    );

    format!(
        r#"
══════════════════════════════════════════════════════════════════
  FRONTRUN SWEEP: victim {victim}
══════════════════════════════════════════════════════════════════

  Attacker capital:      {capital}

          Frontrun           Profit      Victim loss
{rows}
  ★ Best frontrun:       {best}

Generated: {generated}
"#,
        victim = results.sweep.victim,
        capital = format_units(results.sweep.capital, d),
        rows = rows,
        best = best,
        generated = results.generated_at,
    )
}

/// Format a batch run as a text summary
pub fn format_batch_summary(results: &BatchResults) -> String {
    let s = &results.summary;
    let d = results.decimals;
    let to_tokens = |v: f64| v / 10f64.powi(d as i32);

    format!(
        r#"
╔══════════════════════════════════════════════════════════════════╗
║            SANDWICH BATCH RESULTS                                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  CONFIGURATION                                                   ║
║  ─────────────                                                   ║
║  Rounds:                {:>10}                                   ║
║  Attack Probability:    {:>10.1}%                                ║
║  Victim Slippage:       {:>10.2}%                                ║
║  Pool Fee:              {:>10.2}%                                ║
║  Seed:                  {:>10}                                   ║
║                                                                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  ATTACKS                                                         ║
║  ───────                                                         ║
║  Attack Attempts:       {:>10}                                   ║
║  Successful Attacks:    {:>10}                                   ║
║  Attack Success Rate:   {:>10.1}%                                ║
║  Skipped Trades:        {:>10}                                   ║
║                                                                  ║
║  Total MEV Extracted:   {:>16} TKA                         ║
║  Total Victim Losses:   {:>16} TKA                         ║
║  Avg Loss per Attack:   {:>16.6} TKA                         ║
║                                                                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  VOLUME STATISTICS                                               ║
║  ─────────────────                                               ║
║  Total Volume:          {:>16}                             ║
║  Average Trade:         {:>16.6}                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝

Generated: {}
"#,
        s.total_rounds,
        results.config.batch.attack_probability * 100.0,
        results.config.batch.slippage_bps as f64 / 100.0,
        results.config.fee_bps as f64 / 100.0,
        results.config.batch.seed,
        s.attack_attempts,
        s.successful_attacks,
        s.attack_success_rate,
        s.skipped_trades,
        format_signed_units(s.total_mev_extracted, d),
        format_signed_units(s.total_victim_losses, d),
        to_tokens(s.avg_loss_per_attack),
        format_units(s.total_volume, d),
        to_tokens(s.avg_trade_amount),
        results.generated_at,
    )
}

/// Print summary to terminal
pub fn print_summary(results: &SavedResults) {
    println!("{}", results.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::orchestrator::Orchestrator;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sandwich-sim-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let results = Orchestrator::new(SimulationConfig::reference())
            .run_reference()
            .unwrap();
        let dir = temp_dir("logger");
        let logger = SimulationLogger::new(&dir);

        let expected = results.comparison.clone();
        let saved = SavedResults::Single(results);
        let path = logger.save_results(&saved).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("simulation_"));

        match SimulationLogger::load_results(&path).unwrap() {
            SavedResults::Single(loaded) => assert_eq!(loaded.comparison, expected),
            other => panic!("unexpected kind {}", other.kind()),
        }

        let summary = logger.save_summary(&saved).unwrap();
        assert!(summary.exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_summary_mentions_orders() {
        let results = Orchestrator::new(SimulationConfig::reference())
            .run_reference()
            .unwrap();

        let text = format_summary(&results);

        assert!(text.contains("#1 -> #2 -> #3"));
        assert!(text.contains("#2 -> #1 -> #3"));
        assert!(text.contains("181.818181818181818181"));
    }
}
