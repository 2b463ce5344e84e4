//! Rule engines for the supported game systems.
//!
//! Engines never roll dice themselves: callers pass rolled values in, which
//! keeps every outcome reproducible in tests.

pub mod cortex;
pub mod unknown_armies;

pub use cortex::{
    best_choices, parse_pool, Contest, ContestKind, CortexError, DiceSpec, DieResult, RollChoice,
    Side, MAX_POOL_DICE,
};
pub use unknown_armies::{
    perform_check, resolve_check, resolve_stat, CheckError, CheckRank, CheckResult,
    PercentileRoll, Stat,
};
