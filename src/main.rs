//! Sandwich Simulation CLI
//!
//! Command-line interface for the AMM ordering simulator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sandwich_sim::{
    analytics::{
        logger::{print_summary, SavedResults, SimulationLogger},
        report::generate_report,
    },
    config::SimulationConfig,
    simulation::{Orchestrator, Scenario},
    utils::units::{format_units, parse_units, DEFAULT_DECIMALS},
};

#[derive(Parser)]
#[command(name = "sandwich-sim")]
#[command(author = "FrontrunPoC Team")]
#[command(version = "0.1.0")]
#[command(about = "Constant-product AMM sandwich attack simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (missing fields use the reference scenario)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario in natural and sandwich order and compare
    Run {
        /// JSON scenario file (defaults to the reference sandwich)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// AMM fee in basis points
        #[arg(long)]
        fee_bps: Option<u16>,

        /// Deposit ratio tolerance in basis points
        #[arg(long)]
        tolerance_bps: Option<u16>,

        /// Frontrun size in TKA
        #[arg(long)]
        frontrun: Option<String>,

        /// Victim swap size in TKA
        #[arg(long)]
        victim_amount: Option<String>,

        /// Victim minimum output in TKB
        #[arg(long)]
        victim_min_out: Option<String>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<String>,

        /// Skip HTML report generation
        #[arg(long)]
        no_report: bool,
    },

    /// Find the most profitable frontrun size against the reference victim
    Sweep {
        /// Number of candidate sizes between capital/steps and capital
        #[arg(long, default_value = "20")]
        steps: u32,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run many randomized rounds against an evolving pool
    Batch {
        /// Number of rounds to simulate
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Probability of attack (0.0 - 1.0)
        #[arg(short, long)]
        attack_probability: Option<f64>,

        /// Minimum swap amount in tokens
        #[arg(long)]
        min_swap: Option<String>,

        /// Maximum swap amount in tokens
        #[arg(long)]
        max_swap: Option<String>,

        /// Victim slippage tolerance in basis points
        #[arg(long)]
        slippage_bps: Option<u16>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<String>,

        /// Skip HTML report generation
        #[arg(long)]
        no_report: bool,
    },

    /// Generate report from existing simulation results
    Report {
        /// Input JSON file with simulation results
        #[arg(short, long)]
        input: PathBuf,

        /// Output HTML file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print framework info
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::reference(),
    };

    match cli.command {
        Commands::Run {
            scenario,
            fee_bps,
            tolerance_bps,
            frontrun,
            victim_amount,
            victim_min_out,
            output,
            no_report,
        } => {
            if let Some(fee) = fee_bps {
                config.fee_bps = fee;
            }
            if let Some(tolerance) = tolerance_bps {
                config.ratio_tolerance_bps = tolerance;
            }
            if let Some(amount) = frontrun {
                config.frontrun_amount = parse_units(&amount, DEFAULT_DECIMALS)?;
            }
            if let Some(amount) = victim_amount {
                config.victim_swap = parse_units(&amount, DEFAULT_DECIMALS)?;
            }
            if let Some(amount) = victim_min_out {
                config.victim_min_out = parse_units(&amount, DEFAULT_DECIMALS)?;
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            config.validate()?;

            let scenario = match scenario {
                Some(path) => {
                    let mut loaded = Scenario::from_file(&path)?;
                    if let Some(fee) = fee_bps {
                        loaded.fee_bps = fee;
                    }
                    if let Some(tolerance) = tolerance_bps {
                        loaded.ratio_tolerance_bps = tolerance;
                    }
                    loaded
                }
                None => Scenario::reference(&config),
            };

            run_simulation(&config, &scenario, !no_report)?;
        }

        Commands::Sweep { steps, output } => {
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            run_sweep(&config, steps)?;
        }

        Commands::Batch {
            rounds,
            attack_probability,
            min_swap,
            max_swap,
            slippage_bps,
            seed,
            output,
            no_report,
        } => {
            let batch = &mut config.batch;
            if let Some(rounds) = rounds {
                batch.rounds = rounds;
            }
            if let Some(p) = attack_probability {
                batch.attack_probability = p;
            }
            if let Some(amount) = min_swap {
                batch.min_swap = parse_units(&amount, DEFAULT_DECIMALS)?;
            }
            if let Some(amount) = max_swap {
                batch.max_swap = parse_units(&amount, DEFAULT_DECIMALS)?;
            }
            if let Some(bps) = slippage_bps {
                batch.slippage_bps = bps;
            }
            if let Some(seed) = seed {
                batch.seed = seed;
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            config.validate()?;

            run_batch(&config, !no_report)?;
        }

        Commands::Report { input, output } => {
            generate_report_from_file(&input, output.as_deref(), &config.output_dir)?;
        }

        Commands::Info => {
            print_info();
        }
    }

    Ok(())
}

fn banner(title: &str) {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║       {:<51}║", title);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
}

fn save(config: &SimulationConfig, results: &SavedResults, generate_html: bool) -> Result<()> {
    let logger = SimulationLogger::new(&config.output_dir);
    let json_path = logger.save_results(results)?;
    logger.save_summary(results)?;

    if generate_html {
        let report_path = logger.reports_dir().join("report.html");
        generate_report(results, &report_path)?;

        println!();
        println!("📊 Report generated: {}", report_path.display());
        println!("   Open in browser to view interactive charts");
    }

    println!();
    println!("📁 Results saved to: {}", json_path.display());
    println!();
    Ok(())
}

fn run_simulation(config: &SimulationConfig, scenario: &Scenario, generate_html: bool) -> Result<()> {
    banner("Sandwich Attack Simulation");

    info!("Configuration:");
    info!(
        "  Pool:            {} TKA / {} TKB",
        format_units(scenario.initial_liquidity_a, DEFAULT_DECIMALS),
        format_units(scenario.initial_liquidity_b, DEFAULT_DECIMALS)
    );
    info!("  Fee:             {:.2}%", scenario.fee_bps as f64 / 100.0);
    info!("  Operations:      {}", scenario.operations.len());
    println!();

    let orchestrator = Orchestrator::new(config.clone());
    let results = SavedResults::Single(orchestrator.run(scenario)?);

    print_summary(&results);
    save(config, &results, generate_html)
}

fn run_sweep(config: &SimulationConfig, steps: u32) -> Result<()> {
    banner("Frontrun Size Sweep");

    let orchestrator = Orchestrator::new(config.clone());
    let scenario = Scenario::reference(config);
    let results = SavedResults::Sweep(orchestrator.sweep(&scenario, steps)?);

    print_summary(&results);
    save(config, &results, false)
}

fn run_batch(config: &SimulationConfig, generate_html: bool) -> Result<()> {
    banner("Sandwich Batch Simulation");

    info!("Configuration:");
    info!("  Rounds:              {}", config.batch.rounds);
    info!("  Attack Probability:  {:.0}%", config.batch.attack_probability * 100.0);
    info!(
        "  Swap Range:          {} - {}",
        format_units(config.batch.min_swap, DEFAULT_DECIMALS),
        format_units(config.batch.max_swap, DEFAULT_DECIMALS)
    );
    info!("  Fee:                 {:.2}%", config.fee_bps as f64 / 100.0);
    println!();

    let orchestrator = Orchestrator::new(config.clone());
    let results = SavedResults::Batch(orchestrator.run_batch()?);

    print_summary(&results);
    save(config, &results, generate_html)
}

fn generate_report_from_file(input: &Path, output: Option<&Path>, output_dir: &str) -> Result<()> {
    info!("Loading results from: {}", input.display());

    let results = SimulationLogger::load_results(input)
        .with_context(|| format!("Could not load {}", input.display()))?;

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => SimulationLogger::new(output_dir).reports_dir().join("report.html"),
    };

    let written = generate_report(&results, &output_path)?;
    println!("📊 Report generated: {}", written.display());

    Ok(())
}

fn print_info() {
    banner("Sandwich Simulation Framework - Info");
    println!("Replays one set of pending operations against a constant-product");
    println!("pool twice: in first-come order and in an attacker's sandwich order.");
    println!();
    println!("COMPONENTS:");
    println!("  • AMM Engine             - x*y=k swaps, deposits, withdrawals (18 decimals)");
    println!("  • Ordering Simulator     - natural vs. sandwich replay and comparison");
    println!("  • Sandwich Attacker Bot  - frontrun sizing, profitability check, sweeps");
    println!("  • Normal Trader Bot      - victim swaps with slippage-derived minimums");
    println!("  • Orchestrator           - single runs, sweeps and randomized batches");
    println!("  • Analytics              - JSON logs, text summaries, HTML charts");
    println!();
    println!("USAGE:");
    println!("  sandwich-sim run                          # Reference scenario");
    println!("  sandwich-sim run --victim-min-out 170     # Victim reverts after frontrun");
    println!("  sandwich-sim sweep --steps 20             # Best frontrun size");
    println!("  sandwich-sim batch --rounds 1000          # Randomized rounds");
    println!("  sandwich-sim report -i results.json       # Generate report");
    println!();
    println!("REFERENCE SCENARIO:");
    println!("  Pool 1000 TKA / 2000 TKB, fee 0, victim swaps 100 TKA (min 150 TKB),");
    println!("  attacker frontruns with 50 TKA and backruns with the TKB it bought.");
    println!();
}
