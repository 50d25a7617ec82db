//! Utility modules

pub mod amm_math;
pub mod ledger;
pub mod units;

pub use amm_math::{quote_swap, Direction, PoolState, SwapQuote};
pub use ledger::{ActorId, Asset, Holdings, Ledger};
pub use units::{format_units, parse_units, WAD};
