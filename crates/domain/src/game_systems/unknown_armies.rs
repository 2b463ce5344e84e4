//! Unknown Armies percentile checks.
//!
//! Rolls are d100 read as two digits, `00` being a hundred. Matched digits
//! matter on major checks, `00` always fumbles and `01` always crits.

use std::fmt;

use thiserror::Error;

use crate::entities::{UaAbility, UaSkill, UnknownArmiesSheetData};

/// Penalty applied when a check is made with a bare ability.
pub const BARE_ABILITY_PENALTY: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("Invalid rank: `{0}`")]
    InvalidRank(String),
    #[error("Failed to locate a skill with the name `{0}`.")]
    UnknownSkill(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckRank {
    Minor,
    #[default]
    Significant,
    Major,
}

impl CheckRank {
    /// Rank codes are case sensitive: `m`, `s` and `M`.
    pub fn parse(code: &str) -> Result<Self, CheckError> {
        match code {
            "m" => Ok(Self::Minor),
            "s" => Ok(Self::Significant),
            "M" => Ok(Self::Major),
            other => Err(CheckError::InvalidRank(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Significant => "significant",
            Self::Major => "major",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Crit,
    Success,
    WeakSuccess,
    Failure,
    Fumble,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Crit => "Crit",
            Self::Success => "Success",
            Self::WeakSuccess => "Weak Success",
            Self::Failure => "Failure",
            Self::Fumble => "Fumble",
        })
    }
}

/// A d100 result between 1 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercentileRoll(u32);

impl PercentileRoll {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_fumble(&self) -> bool {
        self.0 == 100
    }

    pub fn is_crit(&self) -> bool {
        self.0 == 1
    }

    pub fn is_matched(&self) -> bool {
        let digits = self.0 % 100;
        digits / 10 == digits % 10
    }
}

impl fmt::Display for PercentileRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0 % 100)
    }
}

/// What a check is rolled against: a skill (with its governing ability) or a bare ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat<'a> {
    pub skill: Option<&'a UaSkill>,
    pub ability: UaAbility,
}

impl Stat<'_> {
    pub fn label(&self, sheet: &UnknownArmiesSheetData) -> String {
        match self.skill {
            Some(skill) => format!("{} [{}]", skill.name, skill.value),
            None => format!("{} [{}]", self.ability, sheet.ability_score(self.ability)),
        }
    }
}

/// Ability names win over skills; anything else is fuzzy matched against skill names.
pub fn resolve_stat<'a>(sheet: &'a UnknownArmiesSheetData, stat: &str) -> Result<Stat<'a>, CheckError> {
    if let Some(ability) = UaAbility::from_name(stat) {
        return Ok(Stat {
            skill: None,
            ability,
        });
    }
    let name = crate::common::fuzzy_search(stat, sheet.skills.iter().map(|s| s.name.as_str()))
        .ok_or_else(|| CheckError::UnknownSkill(stat.to_string()))?;
    let skill = sheet
        .skills
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| CheckError::UnknownSkill(stat.to_string()))?;
    Ok(Stat {
        skill: Some(skill),
        ability: skill.ability,
    })
}

pub fn resolve_check(
    roll: PercentileRoll,
    rank: CheckRank,
    skill: Option<i64>,
    ability_score: i64,
    shift: Option<i64>,
) -> CheckResult {
    if roll.is_fumble() {
        return CheckResult::Fumble;
    }
    if roll.is_crit() {
        return CheckResult::Crit;
    }

    let value = i64::from(roll.value());
    let shift = shift.unwrap_or(0);
    match (rank, skill) {
        (CheckRank::Minor | CheckRank::Significant, Some(skill)) => {
            if value <= skill.saturating_add(shift) {
                CheckResult::Success
            } else if rank == CheckRank::Significant && value <= ability_score {
                CheckResult::WeakSuccess
            } else {
                CheckResult::Failure
            }
        }
        (CheckRank::Minor | CheckRank::Significant, None) => {
            if value <= ability_score.saturating_sub(BARE_ABILITY_PENALTY) {
                CheckResult::WeakSuccess
            } else {
                CheckResult::Failure
            }
        }
        (CheckRank::Major, skill) => {
            if skill.is_some_and(|s| value <= s.saturating_add(shift)) || roll.is_matched() {
                CheckResult::Success
            } else {
                CheckResult::Failure
            }
        }
    }
}

/// Rolls a check for a character and describes the outcome.
pub fn perform_check(
    character_name: &str,
    sheet: &UnknownArmiesSheetData,
    stat: &str,
    rank: CheckRank,
    shift: Option<i64>,
    roll: PercentileRoll,
) -> Result<String, CheckError> {
    let stat = resolve_stat(sheet, stat)?;
    let ability_score = sheet.ability_score(stat.ability);
    let result = resolve_check(
        roll,
        rank,
        stat.skill.map(|s| s.value),
        ability_score,
        shift,
    );

    let mut message = format!(
        "**{character_name}** rolls **{roll}** using **{}**",
        stat.label(sheet)
    );
    if let (Some(shift), Some(_)) = (shift, stat.skill) {
        message.push_str(&format!(" with a skill shift of **{shift}**"));
    }
    message.push_str(&format!(" ({}): **{result}**", rank.as_str()));
    if roll.is_matched() && !roll.is_fumble() {
        message.push_str(" (matched)");
    }
    Ok(message)
}
