//! Bot implementations for the sandwich simulation

pub mod normal_trader;
pub mod sandwich_attacker;

pub use normal_trader::{NormalTrader, TradeResult};
pub use sandwich_attacker::{AttackPlan, SandwichAttacker, SweepResult};
