//! Finding the character a command is about, and the small edits made from chat.

use std::sync::Arc;

use raconteur_domain::common::fuzzy_search;
use raconteur_domain::entities::{is_valid_flag_name, CHARACTER_STATUS_MAX_LENGTH};
use raconteur_domain::{ChannelId, Character, GuildId, TraitKind, UserId};

use crate::infrastructure::ports::{CharacterRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Cannot process command: none of your characters are associated with this channel.")]
    NoChannelCharacter,
    #[error("Failed to locate character with name **{0}**")]
    UnknownCharacter(String),
    #[error("Player has multiple characters, please specify one of the following: {0}")]
    Ambiguous(String),
    #[error("Player has no associated characters")]
    NoCharacters,
    #[error("Status is too long (maximum {max} characters)")]
    StatusTooLong { max: usize },
    #[error("Cannot set flag `{0}`: invalid name, must consist only of lowercase letters and underscores.")]
    InvalidFlagName(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

pub struct Roster {
    characters: Arc<dyn CharacterRepo>,
}

impl Roster {
    pub fn new(characters: Arc<dyn CharacterRepo>) -> Self {
        Self { characters }
    }

    /// The character bound to `channel_id`, if it belongs to `member_id`.
    pub async fn find_channel_character(
        &self,
        channel_id: ChannelId,
        member_id: UserId,
    ) -> Result<Option<Character>, RepoError> {
        Ok(self
            .characters
            .get_for_channel(channel_id)
            .await?
            .filter(|c| c.member_id == member_id))
    }

    pub async fn channel_character(
        &self,
        channel_id: ChannelId,
        member_id: UserId,
    ) -> Result<Character, RosterError> {
        self.find_channel_character(channel_id, member_id)
            .await?
            .ok_or(RosterError::NoChannelCharacter)
    }

    /// A member's character: picked by name when given, else their only one.
    pub async fn implicit_character(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        name: Option<&str>,
    ) -> Result<Character, RosterError> {
        let mut characters = self.characters.list_of_member(guild_id, member_id).await?;

        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            let found = fuzzy_search(name, characters.iter().map(|c| c.name.as_str()))
                .map(str::to_string)
                .ok_or_else(|| RosterError::UnknownCharacter(name.to_string()))?;
            return characters
                .into_iter()
                .find(|c| c.name == found)
                .ok_or(RosterError::UnknownCharacter(found));
        }

        match characters.len() {
            0 => Err(RosterError::NoCharacters),
            1 => Ok(characters.remove(0)),
            _ => Err(RosterError::Ambiguous(
                characters
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    /// Binds a channel to a character, releasing it from any previous holder.
    pub async fn bind_channel(
        &self,
        mut character: Character,
        channel_id: ChannelId,
    ) -> Result<String, RosterError> {
        if character.channel_id == Some(channel_id) {
            return Ok(format!("This channel is already bound to **{}**", character.name));
        }
        if let Some(mut holder) = self.characters.get_for_channel(channel_id).await? {
            holder.channel_id = None;
            self.characters.save(&holder).await?;
        }
        character.channel_id = Some(channel_id);
        self.characters.save(&character).await?;
        Ok(format!("This channel has been bound to **{}**", character.name))
    }

    pub async fn unbind_channel(&self, mut character: Character) -> Result<String, RosterError> {
        if character.channel_id.is_none() {
            return Ok(format!(
                "**{}** doesn't have a channel bound to them",
                character.name
            ));
        }
        character.channel_id = None;
        self.characters.save(&character).await?;
        Ok(format!("**{}** has been unbound from a channel", character.name))
    }

    pub async fn set_status(&self, mut character: Character, status: &str) -> Result<(), RosterError> {
        let status = status.trim();
        if status.chars().count() > CHARACTER_STATUS_MAX_LENGTH {
            return Err(RosterError::StatusTooLong {
                max: CHARACTER_STATUS_MAX_LENGTH,
            });
        }
        character.status = Some(status.to_string());
        self.characters.save(&character).await?;
        Ok(())
    }

    /// Flips interception and returns the new state.
    pub async fn toggle_intercept(&self, mut character: Character) -> Result<Character, RosterError> {
        character.intercept = !character.intercept;
        self.characters.save(&character).await?;
        Ok(character)
    }

    pub async fn set_flag(
        &self,
        mut character: Character,
        name: &str,
        value: &str,
    ) -> Result<String, RosterError> {
        let (name, value) = (name.trim(), value.trim());
        if !is_valid_flag_name(name) {
            return Err(RosterError::InvalidFlagName(name.to_string()));
        }
        character.set_trait(TraitKind::Flag, name, value);
        self.characters.save(&character).await?;
        Ok(format!("Successfully set flag `{name}` to \"{value}\"."))
    }
}
