//! Umbreal (Cortex Prime) character sheets.
//!
//! Trait values are stored as steps: a value of `n` is a d(2 + 2n) die, and a
//! value of zero means the trait cannot be rolled.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, GuildId};

pub const NAME_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MAX_LENGTH: usize = 1000;

pub const DEFAULT_ALLOWED_RATINGS: [u8; 5] = [4, 6, 8, 10, 12];
pub const POWER_ALLOWED_RATINGS: [u8; 5] = [0, 6, 8, 10, 12];
pub const SIGNATURE_ASSET_ALLOWED_RATINGS: [u8; 4] = [6, 8, 10, 12];

/// Distinctions are always rolled as a d8.
pub const DISTINCTION_RATING: u8 = 8;

pub const ATTRIBUTES: [(&str, &str); 7] = [
    ("Deftness", "Agility, reactivity, delicate manipulations"),
    ("Force", "Brute strength, athleticism"),
    ("Intellect", "Logic, conceptualization, knowledge"),
    ("Magnetism", "Charisma, guile"),
    ("Perception", "Awareness, recognition"),
    ("Solidity", "Resilience, vitality, physicality"),
    ("Will", "Resolve, self-definition, courage"),
];

pub const SKILLS: [(&str, &str); 17] = [
    ("Ambulatorics", "Running, jumping, climbing"),
    ("Antagonomics (melee)", "Melee combat, fist fights, tackling"),
    ("Antagonomics (ranged)", "Ranged combat, guns, external ship weaponry"),
    ("Cartography", "Navigation, carving light into shadow"),
    ("Cognitoscopy", "Psychiatry, shadowing detection"),
    ("Dissimulation", "Stealth, lies, deceit"),
    ("Dramaturgy", "Putting on a flashy show, distracting"),
    ("Engineering", "Building and repairing machines"),
    ("Erudition", "Knowledge of specialized topics"),
    ("Fidophysics", "Engineering the laws of reality"),
    ("Finespeech", "Diplomacy, conflict resolution"),
    ("Gadgetry", "Operating computers, devices, gadgets"),
    ("Oneiromancy", "Creating, tailoring, resisting dreams"),
    ("Perspiraction", "Manual labor, lifting, pushing, digging, pulling, hauling"),
    ("Remedics", "Healing"),
    ("Steelthink", "Focus, meditation"),
    ("Vehiculation", "Piloting, driving, vehicle knowledge"),
];

pub const POWERS: [(&str, &str); 8] = [
    ("Denebulation", "Divination, interpretation of prophecies"),
    ("Esodactyly", "Telekinesis, remote sensation"),
    ("Kleinsicht", "Senses-independent knowledge of one's surroundings"),
    ("Lithargy", "Immunity to reality's impositions"),
    ("Mementogenesis", "Creating, altering, deleting memories"),
    ("Morflexicity", "Altering one's body"),
    ("Sensartistry", "Stimulation, synthesis of sensations"),
    ("Subsonance", "Telepathy, thought inception"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UmbrealTraitSet {
    Distinctions,
    Attributes,
    Skills,
    Powers,
    #[serde(rename = "Signature Assets")]
    SignatureAssets,
    Assets,
    Complications,
}

impl UmbrealTraitSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distinctions => "Distinctions",
            Self::Attributes => "Attributes",
            Self::Skills => "Skills",
            Self::Powers => "Powers",
            Self::SignatureAssets => "Signature Assets",
            Self::Assets => "Assets",
            Self::Complications => "Complications",
        }
    }

    /// Sets a player may roll from their own sheet.
    pub fn is_own_rollable(&self) -> bool {
        !matches!(self, Self::Complications)
    }
}

impl fmt::Display for UmbrealTraitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbrealTrait {
    pub set: UmbrealTraitSet,
    pub name: String,
    pub value: u8,
    pub description: String,
}

impl UmbrealTrait {
    pub fn rating(&self) -> Option<u8> {
        (self.value > 0).then(|| 2 + self.value * 2)
    }
}

/// Converts a die size from the sheet form into a stored step value.
pub fn value_for_rating(rating: u8) -> u8 {
    rating.saturating_sub(2) / 2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lawbreak {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbrealSheet {
    pub character_id: CharacterId,
    pub guild_id: GuildId,
    pub plot_points: i64,
    pub xp_current: i64,
    pub xp_lifetime: i64,
    pub xp_1_milestone: String,
    pub xp_3_milestone: String,
    pub xp_10_milestone: String,
    pub traits: Vec<UmbrealTrait>,
    pub lawbreaks: Vec<Lawbreak>,
}

impl UmbrealSheet {
    pub fn new(character_id: CharacterId, guild_id: GuildId) -> Self {
        Self {
            character_id,
            guild_id,
            plot_points: 0,
            xp_current: 0,
            xp_lifetime: 0,
            xp_1_milestone: String::new(),
            xp_3_milestone: String::new(),
            xp_10_milestone: String::new(),
            traits: Vec::new(),
            lawbreaks: Vec::new(),
        }
    }

    /// Traits with a die rating from the given sets.
    pub fn rollable_traits<'a>(
        &'a self,
        include: impl Fn(UmbrealTraitSet) -> bool + 'a,
    ) -> impl Iterator<Item = &'a UmbrealTrait> + 'a {
        self.traits
            .iter()
            .filter(move |t| include(t.set) && t.rating().is_some())
    }

    pub fn traits_in(&self, set: UmbrealTraitSet) -> Vec<&UmbrealTrait> {
        let mut traits: Vec<_> = self.traits.iter().filter(|t| t.set == set).collect();
        if set != UmbrealTraitSet::Distinctions {
            traits.sort_by(|a, b| a.name.cmp(&b.name));
        }
        traits
    }

    /// Positive amounts also count towards the lifetime total.
    pub fn gain_xp(&mut self, amount: i64) {
        self.xp_current = self.xp_current.saturating_add(amount);
        if amount > 0 {
            self.xp_lifetime = self.xp_lifetime.saturating_add(amount);
        }
    }
}

// =============================================================================
// Web form
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctionForm {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitForm {
    pub name: String,
    pub description: String,
    /// Die size, e.g. 8 for a d8.
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawbreakForm {
    pub name: String,
    pub description: String,
}

/// Full sheet as submitted from the web admin. Ratings are die sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmbrealSheetForm {
    pub distinction_before: DistinctionForm,
    pub distinction_now: DistinctionForm,
    pub distinction_after: DistinctionForm,
    pub attributes: BTreeMap<String, u8>,
    pub skills: BTreeMap<String, u8>,
    pub powers: BTreeMap<String, u8>,
    pub signature_assets: Vec<TraitForm>,
    pub assets: Vec<TraitForm>,
    pub complications: Vec<TraitForm>,
    pub lawbreaks: Vec<LawbreakForm>,
    pub xp_1_milestone: String,
    pub xp_3_milestone: String,
    pub xp_10_milestone: String,
}

fn check_text(errors: &mut Vec<String>, label: &str, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.push(format!("{label} {field} cannot be empty"));
    }
    if value.chars().count() > max {
        errors.push(format!(
            "{label} {field} must be less than {max} characters long"
        ));
    }
}

fn check_ratings(
    errors: &mut Vec<String>,
    label: &str,
    values: &BTreeMap<String, u8>,
    known: &[(&str, &str)],
    allowed: &[u8],
) {
    for (name, rating) in values {
        if !known.iter().any(|(k, _)| k == name) {
            errors.push(format!("Unknown {} {name}", label.to_lowercase()));
        } else if !allowed.contains(rating) {
            errors.push(format!("Invalid {} value", label.to_lowercase()));
        }
    }
}

impl UmbrealSheetForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for distinction in [
            &self.distinction_before,
            &self.distinction_now,
            &self.distinction_after,
        ] {
            check_text(&mut errors, "Distinction", "name", &distinction.name, NAME_MAX_LENGTH);
            check_text(
                &mut errors,
                "Distinction",
                "description",
                &distinction.description,
                DESCRIPTION_MAX_LENGTH,
            );
        }

        check_ratings(&mut errors, "Attribute", &self.attributes, &ATTRIBUTES, &DEFAULT_ALLOWED_RATINGS);
        check_ratings(&mut errors, "Skill", &self.skills, &SKILLS, &DEFAULT_ALLOWED_RATINGS);
        check_ratings(&mut errors, "Power", &self.powers, &POWERS, &POWER_ALLOWED_RATINGS);

        for (label, traits, allowed) in [
            ("Signature asset", &self.signature_assets, &SIGNATURE_ASSET_ALLOWED_RATINGS[..]),
            ("Asset", &self.assets, &DEFAULT_ALLOWED_RATINGS[..]),
            ("Complication", &self.complications, &DEFAULT_ALLOWED_RATINGS[..]),
        ] {
            for t in traits {
                check_text(&mut errors, label, "name", &t.name, NAME_MAX_LENGTH);
                check_text(&mut errors, label, "description", &t.description, DESCRIPTION_MAX_LENGTH);
                if !allowed.contains(&t.rating) {
                    errors.push(format!("Invalid {} value", label.to_lowercase()));
                }
            }
        }

        for lawbreak in &self.lawbreaks {
            check_text(&mut errors, "Lawbreak", "name", &lawbreak.name, NAME_MAX_LENGTH);
            check_text(
                &mut errors,
                "Lawbreak",
                "description",
                &lawbreak.description,
                DESCRIPTION_MAX_LENGTH,
            );
        }

        for milestone in [&self.xp_1_milestone, &self.xp_3_milestone, &self.xp_10_milestone] {
            check_text(&mut errors, "XP milestone", "level", milestone, DESCRIPTION_MAX_LENGTH);
        }

        errors
    }

    /// Replaces every trait and lawbreak of `sheet`. Plot points and XP are kept.
    pub fn apply_to(&self, sheet: &mut UmbrealSheet) {
        let mut traits = Vec::new();

        for (tag, distinction) in [
            ("Before", &self.distinction_before),
            ("Now", &self.distinction_now),
            ("After", &self.distinction_after),
        ] {
            traits.push(UmbrealTrait {
                set: UmbrealTraitSet::Distinctions,
                name: format!("{tag}: {}", distinction.name.trim()),
                value: value_for_rating(DISTINCTION_RATING),
                description: distinction.description.trim().to_string(),
            });
        }

        for (set, known, values, default_rating) in [
            (UmbrealTraitSet::Attributes, &ATTRIBUTES[..], &self.attributes, 4),
            (UmbrealTraitSet::Skills, &SKILLS[..], &self.skills, 4),
            (UmbrealTraitSet::Powers, &POWERS[..], &self.powers, 0),
        ] {
            for (name, description) in known {
                let rating = values.get(*name).copied().unwrap_or(default_rating);
                traits.push(UmbrealTrait {
                    set,
                    name: (*name).to_string(),
                    value: value_for_rating(rating),
                    description: (*description).to_string(),
                });
            }
        }

        for (set, forms) in [
            (UmbrealTraitSet::SignatureAssets, &self.signature_assets),
            (UmbrealTraitSet::Assets, &self.assets),
            (UmbrealTraitSet::Complications, &self.complications),
        ] {
            traits.extend(forms.iter().map(|t| UmbrealTrait {
                set,
                name: t.name.trim().to_string(),
                value: value_for_rating(t.rating),
                description: t.description.trim().to_string(),
            }));
        }

        sheet.traits = traits;
        sheet.lawbreaks = self
            .lawbreaks
            .iter()
            .map(|l| Lawbreak {
                name: l.name.trim().to_string(),
                description: l.description.trim().to_string(),
            })
            .collect();
        sheet.xp_1_milestone = self.xp_1_milestone.trim().to_string();
        sheet.xp_3_milestone = self.xp_3_milestone.trim().to_string();
        sheet.xp_10_milestone = self.xp_10_milestone.trim().to_string();
    }
}
