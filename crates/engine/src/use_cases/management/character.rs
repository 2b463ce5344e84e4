//! Character management for players editing their own characters.

use std::sync::Arc;

use raconteur_domain::{Character, CharacterForm, CharacterId, GuildId, UserId};

use crate::infrastructure::ports::CharacterRepo;

use super::ManagementError;

pub struct CharacterManagement {
    characters: Arc<dyn CharacterRepo>,
}

impl CharacterManagement {
    pub fn new(characters: Arc<dyn CharacterRepo>) -> Self {
        Self { characters }
    }

    pub async fn list(&self, guild_id: GuildId) -> Result<Vec<Character>, ManagementError> {
        Ok(self.characters.list_in_guild(guild_id).await?)
    }

    pub async fn list_of_member(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Vec<Character>, ManagementError> {
        Ok(self.characters.list_of_member(guild_id, member_id).await?)
    }

    /// A character of the guild owned by `member_id`.
    pub async fn get_owned(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<Character, ManagementError> {
        self.characters
            .get(character_id)
            .await?
            .filter(|c| c.guild_id == guild_id && c.member_id == member_id)
            .ok_or(ManagementError::NotFound)
    }

    async fn validate(
        &self,
        guild_id: GuildId,
        form: &CharacterForm,
        current: Option<CharacterId>,
    ) -> Result<(), ManagementError> {
        let mut errors = form.validate();
        let taken = self
            .characters
            .list_in_guild(guild_id)
            .await?
            .iter()
            .any(|c| c.name == form.name && Some(c.id) != current);
        if taken {
            errors.push("A character with this name already exists".to_string());
        }
        ManagementError::check(errors)
    }

    pub async fn create(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        form: CharacterForm,
    ) -> Result<Character, ManagementError> {
        let form = form.normalized();
        self.validate(guild_id, &form, None).await?;

        let mut character = Character::new(guild_id, member_id, form.name.clone());
        form.apply_to(&mut character);
        self.characters.save(&character).await?;
        tracing::info!(guild_id = %guild_id, character_id = %character.id, "Created character");
        Ok(character)
    }

    pub async fn update(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
        form: CharacterForm,
    ) -> Result<Character, ManagementError> {
        let mut character = self.get_owned(guild_id, member_id, character_id).await?;
        let form = form.normalized();
        self.validate(guild_id, &form, Some(character_id)).await?;

        form.apply_to(&mut character);
        self.characters.save(&character).await?;
        Ok(character)
    }

    pub async fn delete(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<(), ManagementError> {
        let character = self.get_owned(guild_id, member_id, character_id).await?;
        self.characters.delete(character.id).await?;
        tracing::info!(guild_id = %guild_id, character_id = %character.id, "Deleted character");
        Ok(())
    }
}
