//! Character entity - a player's persona, its channel binding, position and belongings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{ChannelId, CharacterId, ConnectionId, GuildId, LocationId, UserId};

pub const CHARACTER_NAME_MAX_LENGTH: usize = 60;
pub const CHARACTER_STATUS_MAX_LENGTH: usize = 200;
pub const CHARACTER_APPEARANCE_MAX_LENGTH: usize = 1000;

/// Kinds of things a character can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitKind {
    /// Opens a connection; the value is the connection id.
    Key,
    /// An inventory item; the value is its description.
    Item,
    /// A GM-controlled variable visible to location templates.
    Flag,
}

impl TraitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Item => "item",
            Self::Flag => "flag",
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraitKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(Self::Key),
            "item" => Ok(Self::Item),
            "flag" => Ok(Self::Flag),
            other => Err(DomainError::parse(format!("Unknown trait kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTrait {
    pub kind: TraitKind,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub guild_id: GuildId,
    pub member_id: UserId,
    pub name: String,
    pub status: Option<String>,
    pub appearance: Option<String>,
    pub portrait: Option<String>,
    pub channel_id: Option<ChannelId>,
    pub location_id: Option<LocationId>,
    pub last_movement: Option<DateTime<Utc>>,
    pub intercept: bool,
    #[serde(default)]
    pub traits: Vec<CharacterTrait>,
}

impl Character {
    pub fn new(guild_id: GuildId, member_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            guild_id,
            member_id,
            name: name.into(),
            status: None,
            appearance: None,
            portrait: None,
            channel_id: None,
            location_id: None,
            last_movement: None,
            intercept: false,
            traits: Vec::new(),
        }
    }

    pub fn find_trait(&self, kind: TraitKind, name: &str) -> Option<&CharacterTrait> {
        self.traits
            .iter()
            .find(|t| t.kind == kind && t.name == name)
    }

    pub fn traits_of(&self, kind: TraitKind) -> impl Iterator<Item = &CharacterTrait> {
        self.traits.iter().filter(move |t| t.kind == kind)
    }

    /// Adds or replaces the trait with the same kind and name.
    pub fn set_trait(&mut self, kind: TraitKind, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .traits
            .iter_mut()
            .find(|t| t.kind == kind && t.name == name)
        {
            Some(existing) => existing.value = value,
            None => self.traits.push(CharacterTrait { kind, name, value }),
        }
    }

    /// Removes a trait, returning it if it existed.
    pub fn remove_trait(&mut self, kind: TraitKind, name: &str) -> Option<CharacterTrait> {
        let index = self
            .traits
            .iter()
            .position(|t| t.kind == kind && t.name == name)?;
        Some(self.traits.remove(index))
    }

    pub fn has_key(&self, connection_id: ConnectionId) -> bool {
        let id = connection_id.to_string();
        self.traits_of(TraitKind::Key).any(|t| t.value == id)
    }

    pub fn flags(&self) -> BTreeMap<String, String> {
        self.traits_of(TraitKind::Flag)
            .map(|t| (t.name.clone(), t.value.clone()))
            .collect()
    }

    /// Time left before a connection with `timer_seconds` can be used, if any.
    pub fn movement_cooldown(&self, timer_seconds: i64, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_movement?;
        let next = last + Duration::seconds(timer_seconds);
        (next > now).then(|| next - now)
    }
}

/// Flag names are lowercase words joined by underscores.
pub fn is_valid_flag_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

/// Editable fields of a character from the web admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterForm {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub appearance: String,
    #[serde(default)]
    pub portrait: String,
}

impl CharacterForm {
    /// Returns a copy with every field trimmed.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            status: self.status.trim().to_string(),
            appearance: self.appearance.trim().to_string(),
            portrait: self.portrait.trim().to_string(),
        }
    }

    /// Field-level checks. Name uniqueness needs the repository and is checked by the caller.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("You must specify a name".to_string());
        }
        if self.name.chars().count() > CHARACTER_NAME_MAX_LENGTH {
            errors.push(format!(
                "Character name is too long (must be {CHARACTER_NAME_MAX_LENGTH} characters or less)"
            ));
        }
        if self.status.chars().count() > CHARACTER_STATUS_MAX_LENGTH {
            errors.push(format!(
                "Character status is too long (must be {CHARACTER_STATUS_MAX_LENGTH} characters or less)"
            ));
        }
        if self.appearance.chars().count() > CHARACTER_APPEARANCE_MAX_LENGTH {
            errors.push(format!(
                "Character appearance is too long (must be {CHARACTER_APPEARANCE_MAX_LENGTH} characters or less)"
            ));
        }
        if !self.portrait.is_empty() && !is_image_url(&self.portrait) {
            errors.push("You must specify a valid image URL (PNG, JPG or GIF)".to_string());
        }
        errors
    }

    pub fn apply_to(&self, character: &mut Character) {
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        character.name = self.name.clone();
        character.status = optional(&self.status);
        character.appearance = optional(&self.appearance);
        character.portrait = optional(&self.portrait);
    }
}

fn is_image_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://"))
        && [".png", ".jpg", ".jpeg", ".gif"]
            .iter()
            .any(|ext| url.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn character() -> Character {
        Character::new(GuildId::new(1), UserId::new(2), "Ada")
    }

    #[test]
    fn set_trait_replaces_same_name() {
        let mut c = character();
        c.set_trait(TraitKind::Flag, "door", "open");
        c.set_trait(TraitKind::Flag, "door", "closed");
        c.set_trait(TraitKind::Item, "door", "a door");
        assert_eq!(c.traits.len(), 2);
        assert_eq!(c.flags().get("door").map(String::as_str), Some("closed"));
    }

    #[test]
    fn keys_match_connection_ids() {
        let mut c = character();
        let connection = ConnectionId::new();
        assert!(!c.has_key(connection));
        c.set_trait(TraitKind::Key, "brass key", connection.to_string());
        assert!(c.has_key(connection));
        assert!(c.remove_trait(TraitKind::Key, "brass key").is_some());
        assert!(!c.has_key(connection));
    }

    #[test]
    fn cooldown_only_while_timer_runs() {
        let mut c = character();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().expect("date");
        assert_eq!(c.movement_cooldown(600, now), None);

        c.last_movement = Some(now - Duration::seconds(100));
        assert_eq!(c.movement_cooldown(600, now), Some(Duration::seconds(500)));
        assert_eq!(c.movement_cooldown(100, now), None);
    }

    #[test]
    fn flag_names_are_lowercase_with_underscores() {
        assert!(is_valid_flag_name("door_open"));
        assert!(!is_valid_flag_name("Door"));
        assert!(!is_valid_flag_name("door-open"));
        assert!(!is_valid_flag_name(""));
    }

    #[test]
    fn form_reports_every_problem() {
        let form = CharacterForm {
            name: String::new(),
            status: "s".repeat(201),
            appearance: String::new(),
            portrait: "ftp://example.com/a.png".to_string(),
        };
        let errors = form.validate();
        assert!(errors.contains(&"You must specify a name".to_string()));
        assert!(errors
            .iter()
            .any(|e| e.starts_with("Character status is too long")));
        assert!(errors.contains(&"You must specify a valid image URL (PNG, JPG or GIF)".to_string()));
    }

    #[test]
    fn form_accepts_https_images() {
        let form = CharacterForm {
            name: "Ada".to_string(),
            portrait: "https://example.com/ada.jpeg".to_string(),
            ..Default::default()
        };
        assert!(form.validate().is_empty());
    }
}
