//! Game system sheets, edited by the players owning the characters.

use std::collections::HashSet;
use std::sync::Arc;

use raconteur_domain::{
    Character, CharacterId, GuildId, UmbrealSheet, UmbrealSheetForm, UnknownArmiesSheet,
    UnknownArmiesSheetData, UserId,
};

use crate::infrastructure::ports::{CharacterRepo, UmbrealRepo, UnknownArmiesRepo};

use super::ManagementError;

pub struct SheetManagement {
    characters: Arc<dyn CharacterRepo>,
    umbreal: Arc<dyn UmbrealRepo>,
    unknown_armies: Arc<dyn UnknownArmiesRepo>,
}

impl SheetManagement {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        umbreal: Arc<dyn UmbrealRepo>,
        unknown_armies: Arc<dyn UnknownArmiesRepo>,
    ) -> Self {
        Self {
            characters,
            umbreal,
            unknown_armies,
        }
    }

    async fn owned_ids(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<HashSet<CharacterId>, ManagementError> {
        Ok(self
            .characters
            .list_of_member(guild_id, member_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    async fn owned_character(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<Option<Character>, ManagementError> {
        Ok(self
            .characters
            .get(character_id)
            .await?
            .filter(|c| c.guild_id == guild_id && c.member_id == member_id))
    }

    // =========================================================================
    // Umbreal
    // =========================================================================

    pub async fn list_umbreal(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Vec<UmbrealSheet>, ManagementError> {
        let owned = self.owned_ids(guild_id, member_id).await?;
        let mut sheets = self.umbreal.list_in_guild(guild_id).await?;
        sheets.retain(|s| owned.contains(&s.character_id));
        Ok(sheets)
    }

    pub async fn get_umbreal(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<UmbrealSheet, ManagementError> {
        self.owned_character(guild_id, member_id, character_id)
            .await?
            .ok_or(ManagementError::NotFound)?;
        self.umbreal
            .get(character_id)
            .await?
            .ok_or(ManagementError::NotFound)
    }

    /// Creates the sheet or replaces its traits. Plot points and XP are kept.
    pub async fn save_umbreal(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
        form: UmbrealSheetForm,
    ) -> Result<UmbrealSheet, ManagementError> {
        let Some(character) = self.owned_character(guild_id, member_id, character_id).await? else {
            return Err(ManagementError::Validation(vec![
                "Failed to locate character.".to_string(),
            ]));
        };
        ManagementError::check(form.validate())?;

        let mut sheet = self
            .umbreal
            .get(character.id)
            .await?
            .unwrap_or_else(|| UmbrealSheet::new(character.id, guild_id));
        form.apply_to(&mut sheet);
        self.umbreal.save(&sheet).await?;
        Ok(sheet)
    }

    pub async fn delete_umbreal(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<(), ManagementError> {
        let sheet = self.get_umbreal(guild_id, member_id, character_id).await?;
        self.umbreal.delete(sheet.character_id).await?;
        Ok(())
    }

    // =========================================================================
    // Unknown Armies
    // =========================================================================

    pub async fn list_unknown_armies(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Vec<UnknownArmiesSheet>, ManagementError> {
        let owned = self.owned_ids(guild_id, member_id).await?;
        let mut sheets = self.unknown_armies.list_in_guild(guild_id).await?;
        sheets.retain(|s| owned.contains(&s.character_id));
        Ok(sheets)
    }

    pub async fn get_unknown_armies(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<UnknownArmiesSheet, ManagementError> {
        self.owned_character(guild_id, member_id, character_id)
            .await?
            .ok_or(ManagementError::NotFound)?;
        self.unknown_armies
            .get(character_id)
            .await?
            .ok_or(ManagementError::NotFound)
    }

    pub async fn save_unknown_armies(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
        data: UnknownArmiesSheetData,
    ) -> Result<UnknownArmiesSheet, ManagementError> {
        let Some(character) = self.owned_character(guild_id, member_id, character_id).await? else {
            return Err(ManagementError::Validation(vec![
                "Failed to locate character.".to_string(),
            ]));
        };
        ManagementError::check(data.validate())?;

        let sheet = UnknownArmiesSheet {
            character_id: character.id,
            guild_id,
            data,
        };
        self.unknown_armies.save(&sheet).await?;
        Ok(sheet)
    }

    pub async fn delete_unknown_armies(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        character_id: CharacterId,
    ) -> Result<(), ManagementError> {
        let sheet = self
            .get_unknown_armies(guild_id, member_id, character_id)
            .await?;
        self.unknown_armies.delete(sheet.character_id).await?;
        Ok(())
    }
}
