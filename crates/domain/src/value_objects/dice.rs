//! Polyhedral dice requests like "1d6 3d8".
//!
//! Rolling is split from parsing: the engine supplies the random source, so
//! outcomes here are fully deterministic given the rolled values.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upper bound on dice in one request, keeps replies under the message limit.
pub const MAX_DICE_PER_REQUEST: u32 = 100;

/// Error when parsing a roll request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    #[error("Invalid roll request")]
    InvalidRequest,
}

/// One `XdY` element of a roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGroup {
    pub count: u32,
    pub sides: u32,
}

impl DiceGroup {
    /// Parse a single `XdY` element. Both numbers are required.
    pub fn parse(element: &str) -> Result<Self, DiceParseError> {
        let (count, sides) = element
            .split_once('d')
            .ok_or(DiceParseError::InvalidRequest)?;
        let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !is_number(count) || !is_number(sides) {
            return Err(DiceParseError::InvalidRequest);
        }

        let count: u32 = count.parse().map_err(|_| DiceParseError::InvalidRequest)?;
        let sides: u32 = sides.parse().map_err(|_| DiceParseError::InvalidRequest)?;
        if count == 0 || count > MAX_DICE_PER_REQUEST || sides == 0 {
            return Err(DiceParseError::InvalidRequest);
        }
        Ok(Self { count, sides })
    }

    /// Inclusive range a die of this group rolls in. A d100 reads 00 to 99.
    pub fn range(&self) -> (u32, u32) {
        if self.sides == 100 {
            (0, 99)
        } else {
            (1, self.sides)
        }
    }
}

/// A whitespace separated list of dice groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    pub groups: Vec<DiceGroup>,
}

impl RollRequest {
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let groups = input
            .split_whitespace()
            .map(DiceGroup::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let total: u64 = groups.iter().map(|g| u64::from(g.count)).sum();
        if groups.is_empty() || total > u64::from(MAX_DICE_PER_REQUEST) {
            return Err(DiceParseError::InvalidRequest);
        }
        Ok(Self { groups })
    }

    /// Roll every die, asking `roll(min, max)` for each inclusive value.
    pub fn roll_with(&self, mut roll: impl FnMut(u32, u32) -> u32) -> RollOutcome {
        let rolls = self
            .groups
            .iter()
            .flat_map(|group| std::iter::repeat(*group).take(group.count as usize))
            .map(|group| {
                let (min, max) = group.range();
                DieRoll {
                    sides: group.sides,
                    value: roll(min, max),
                }
            })
            .collect();
        RollOutcome { rolls }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRoll {
    pub sides: u32,
    pub value: u32,
}

impl fmt::Display for DieRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sides == 100 {
            write!(f, "{:02} [d{}]", self.value, self.sides)
        } else {
            write!(f, "{} [d{}]", self.value, self.sides)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub rolls: Vec<DieRoll>,
}

impl RollOutcome {
    pub fn total(&self) -> u64 {
        self.rolls.iter().map(|r| u64::from(r.value)).sum()
    }
}

/// `rolled 4 [d6]` for one die, `rolled **9** = 4 [d6] + 5 [d8]` for several.
impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .rolls
            .iter()
            .map(DieRoll::to_string)
            .collect::<Vec<_>>()
            .join(" + ");
        if self.rolls.len() == 1 {
            write!(f, "rolled {parts}")
        } else {
            write!(f, "rolled **{}** = {parts}", self.total())
        }
    }
}
