//! Value objects: immutable, identity-less domain values.

mod activity;
mod dice;

pub use activity::{describe_activity, ActivityLevel, ACTIVITY_SAMPLE_SIZE};
pub use dice::{DiceGroup, DiceParseError, DieRoll, RollOutcome, RollRequest, MAX_DICE_PER_REQUEST};
