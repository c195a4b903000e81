//! Anvil Engine Layer
//!
//! Pure decision logic, deterministic given a random source, no I/O.
//! Takes an inventory snapshot and recipe → returns quantities to apply.

#![warn(clippy::all)]

pub mod bonus;
pub mod error;
pub mod planner;
pub mod quality;
pub mod random;

pub use bonus::{
    masterwork_yield, roll_successes, salvage_outputs, salvage_units, scaled_units, BonusKind,
    BonusRule, MasterworkYield, MASTERWORK_BASE_CHANCE, PERFECT_SALVAGE_BASE_CHANCE,
};
pub use error::{EngineError, EngineResult};
pub use planner::{affordable_quantity, plan, units_needed};
pub use quality::average_quality;
pub use random::{RandomSource, SeededRandom, SequenceRandom, ThreadRandom};
