//! Ordering simulator: operations, orderings, replay and comparison

pub mod comparison;
pub mod operation;
pub mod orchestrator;
pub mod ordering;
pub mod replay;
pub mod scenario;

pub use comparison::{compare_orderings, ComparisonReport};
pub use operation::{OpId, Operation, OperationKind, PriorityHint, Role, SwapAmount};
pub use orchestrator::{run_orderings, BatchResults, Orchestrator, SimulationResults, SweepResults};
pub use ordering::{attacker_reorder, natural_order};
pub use replay::{replay, OrderingKind, ReplayError, ReplayStatus, SimulationResult};
pub use scenario::Scenario;
