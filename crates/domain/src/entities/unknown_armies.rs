//! Unknown Armies character sheets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, GuildId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UaAbility {
    #[default]
    Body,
    Speed,
    Mind,
    Soul,
}

impl UaAbility {
    pub const ALL: [UaAbility; 4] = [Self::Body, Self::Speed, Self::Mind, Self::Soul];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "Body",
            Self::Speed => "Speed",
            Self::Mind => "Mind",
            Self::Soul => "Soul",
        }
    }

    /// Case-insensitive lookup by ability name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for UaAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Madness {
    #[default]
    Violence,
    #[serde(rename = "The Unnatural")]
    Unnatural,
    Helplessness,
    Isolation,
    #[serde(rename = "Self")]
    SelfIdentity,
}

impl Madness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Violence => "Violence",
            Self::Unnatural => "The Unnatural",
            Self::Helplessness => "Helplessness",
            Self::Isolation => "Isolation",
            Self::SelfIdentity => "Self",
        }
    }
}

impl fmt::Display for Madness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ABILITY_MAX: i64 = 100;
pub const SKILL_MAX: i64 = 100;
pub const HARDENED_MAX: i64 = 10;
pub const FAILED_MAX: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UaSkill {
    pub name: String,
    pub value: i64,
    #[serde(default)]
    pub ability: UaAbility,
    #[serde(default)]
    pub is_obsession: bool,
}

/// Editable content of a sheet, shared by the stored sheet and the web form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnknownArmiesSheetData {
    pub summary: String,
    pub personality: String,
    pub obsession: String,
    pub school: Option<String>,
    pub stimulus_fear_madness: Madness,
    pub stimulus_fear: String,
    pub stimulus_rage: String,
    pub stimulus_noble: String,

    pub body: i64,
    pub body_descriptor: String,
    pub speed: i64,
    pub speed_descriptor: String,
    pub mind: i64,
    pub mind_descriptor: String,
    pub soul: i64,
    pub soul_descriptor: String,

    pub xp: i64,
    pub skills: Vec<UaSkill>,

    pub violence_hardened: i64,
    pub violence_failed: i64,
    pub unnatural_hardened: i64,
    pub unnatural_failed: i64,
    pub helplessness_hardened: i64,
    pub helplessness_failed: i64,
    pub isolation_hardened: i64,
    pub isolation_failed: i64,
    pub self_hardened: i64,
    pub self_failed: i64,
}

impl UnknownArmiesSheetData {
    pub fn ability_score(&self, ability: UaAbility) -> i64 {
        match ability {
            UaAbility::Body => self.body,
            UaAbility::Speed => self.speed,
            UaAbility::Mind => self.mind,
            UaAbility::Soul => self.soul,
        }
    }

    /// `(label, hardened, failed)` for every madness meter.
    fn meters(&self) -> [(&'static str, i64, i64); 5] {
        [
            ("Violence", self.violence_hardened, self.violence_failed),
            ("Unnatural", self.unnatural_hardened, self.unnatural_failed),
            ("Helplessness", self.helplessness_hardened, self.helplessness_failed),
            ("Isolation", self.isolation_hardened, self.isolation_failed),
            ("Self", self.self_hardened, self.self_failed),
        ]
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for ability in UaAbility::ALL {
            if !(0..=ABILITY_MAX).contains(&self.ability_score(ability)) {
                errors.push(format!(
                    "Your {ability} score must be between 0 and {ABILITY_MAX}."
                ));
            }
        }

        if self.xp < 0 {
            errors.push("Your XP cannot be negative.".to_string());
        }

        for (label, hardened, failed) in self.meters() {
            if !(0..=HARDENED_MAX).contains(&hardened) {
                errors.push(format!(
                    "Your {label} (Hardened) score must be between 0 and {HARDENED_MAX}."
                ));
            }
            if !(0..=FAILED_MAX).contains(&failed) {
                errors.push(format!(
                    "Your {label} (Failed) score must be between 0 and {FAILED_MAX}."
                ));
            }
        }

        let mut obsessions = 0;
        for skill in &self.skills {
            if skill.is_obsession {
                obsessions += 1;
            }
            if !(0..=SKILL_MAX).contains(&skill.value) {
                errors.push(format!(
                    "Your {} skill must be between 0 and {SKILL_MAX}.",
                    skill.name
                ));
            }
        }
        match obsessions {
            0 => errors.push("You must choose an obsession skill.".to_string()),
            1 => {}
            _ => errors.push("You can only choose one obsession skill.".to_string()),
        }

        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownArmiesSheet {
    pub character_id: CharacterId,
    pub guild_id: GuildId,
    #[serde(flatten)]
    pub data: UnknownArmiesSheetData,
}
