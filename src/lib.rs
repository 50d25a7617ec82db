//! Sandwich Attack Simulation Framework
//!
//! A constant-product AMM engine over fixed-point amounts, and an ordering
//! simulator that replays the same pending operations in first-come order
//! and in an attacker's sandwich order to measure what reordering extracts.

pub mod analytics;
pub mod bots;
pub mod config;
pub mod errors;
pub mod simulation;
pub mod utils;

pub use analytics::report::generate_report;
pub use config::SimulationConfig;
pub use errors::{AmmError, ConfigError};
pub use simulation::orchestrator::Orchestrator;
