//! Items carried by characters and the keys that open connections.

use std::sync::Arc;

use raconteur_domain::{Character, ConnectionId, GuildId, LocationId, TraitKind};

use crate::infrastructure::ports::{CharacterRepo, LocationRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Cannot pickup **{0}**: your character isn't in any location yet.")]
    PickupNotPlaced(String),
    #[error("Cannot pickup **{0}**: your character is already carrying this item.")]
    AlreadyCarried(String),
    #[error("Cannot drop **{0}**: your character isn't in any location yet.")]
    DropNotPlaced(String),
    #[error("Cannot drop **{0}**: your character isn't carrying this item.")]
    NotCarried(String),
    #[error("Cannot give key: unknown location `{0}`.")]
    UnknownLocation(String),
    #[error("Cannot give key: no connection between `{0}` and `{1}`.")]
    NoConnection(String, String),
    #[error("Cannot give key: **{0}** already has a key for this connection.")]
    AlreadyHasKey(String),
    #[error("Cannot give key: a key with the name **{0}** already exists for this character.")]
    DuplicateKeyName(String),
    #[error("Cannot remove key: character **{character}** does not own a key named **{key}**.")]
    UnknownKey { character: String, key: String },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Text to broadcast to everyone in a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub location_id: LocationId,
    pub text: String,
}

pub struct Inventory {
    characters: Arc<dyn CharacterRepo>,
    locations: Arc<dyn LocationRepo>,
}

impl Inventory {
    pub fn new(characters: Arc<dyn CharacterRepo>, locations: Arc<dyn LocationRepo>) -> Self {
        Self {
            characters,
            locations,
        }
    }

    pub fn describe(character: &Character) -> String {
        let items = character
            .traits_of(TraitKind::Item)
            .map(|item| format!("- **{}**: {}", item.name, item.value))
            .collect::<Vec<_>>();
        if items.is_empty() {
            format!("**{}** doesn't have anything in their inventory.", character.name)
        } else {
            format!(
                "**{}** has the following in their inventory:\n{}",
                character.name,
                items.join("\n")
            )
        }
    }

    pub async fn pickup(
        &self,
        mut character: Character,
        name: &str,
        description: &str,
    ) -> Result<Announcement, InventoryError> {
        let (name, description) = (name.trim(), description.trim());
        let location_id = character
            .location_id
            .ok_or_else(|| InventoryError::PickupNotPlaced(name.to_string()))?;
        if character.find_trait(TraitKind::Item, name).is_some() {
            return Err(InventoryError::AlreadyCarried(name.to_string()));
        }

        character.set_trait(TraitKind::Item, name, description);
        self.characters.save(&character).await?;
        Ok(Announcement {
            location_id,
            text: format!("**{}** picks up **{name}**.", character.name),
        })
    }

    pub async fn drop(&self, mut character: Character, name: &str) -> Result<Announcement, InventoryError> {
        let name = name.trim();
        let location_id = character
            .location_id
            .ok_or_else(|| InventoryError::DropNotPlaced(name.to_string()))?;
        let item = character
            .remove_trait(TraitKind::Item, name)
            .ok_or_else(|| InventoryError::NotCarried(name.to_string()))?;

        self.characters.save(&character).await?;
        Ok(Announcement {
            location_id,
            text: format!("**{}** drops **{}**.", character.name, item.name),
        })
    }

    /// Gives the character a named key for the connection between two locations.
    pub async fn give_key(
        &self,
        guild_id: GuildId,
        mut character: Character,
        key: &str,
        location_1: &str,
        location_2: &str,
    ) -> Result<String, InventoryError> {
        let (key, location_1, location_2) = (key.trim(), location_1.trim(), location_2.trim());
        let first = self
            .locations
            .get_by_name(guild_id, location_1)
            .await?
            .ok_or_else(|| InventoryError::UnknownLocation(location_1.to_string()))?;
        let second = self
            .locations
            .get_by_name(guild_id, location_2)
            .await?
            .ok_or_else(|| InventoryError::UnknownLocation(location_2.to_string()))?;
        let connection = self
            .locations
            .connections_of(first.id)
            .await?
            .into_iter()
            .find(|c| c.joins(first.id, second.id))
            .ok_or_else(|| {
                InventoryError::NoConnection(location_1.to_string(), location_2.to_string())
            })?;

        if character.has_key(connection.id) {
            return Err(InventoryError::AlreadyHasKey(character.name));
        }
        if character.find_trait(TraitKind::Key, key).is_some() {
            return Err(InventoryError::DuplicateKeyName(key.to_string()));
        }

        character.set_trait(TraitKind::Key, key, connection.id.to_string());
        self.characters.save(&character).await?;
        tracing::info!(character_id = %character.id, connection_id = %connection.id, "Gave key");
        Ok(format!(
            "The key **{key}** from `{location_1}` to `{location_2}` has been given to **{}**.",
            character.name
        ))
    }

    pub async fn remove_key(&self, mut character: Character, key: &str) -> Result<String, InventoryError> {
        let key = key.trim();
        let removed = character
            .remove_trait(TraitKind::Key, key)
            .ok_or_else(|| InventoryError::UnknownKey {
                character: character.name.clone(),
                key: key.to_string(),
            })?;

        let connection = match removed.value.parse::<ConnectionId>() {
            Ok(id) => self.locations.get_connection(id).await?,
            Err(_) => None,
        };
        let path = match connection {
            Some(connection) => {
                let first = self.locations.get(connection.location_1).await?;
                let second = self.locations.get(connection.location_2).await?;
                match (first, second) {
                    (Some(first), Some(second)) => {
                        format!("from `{}` to `{}`", first.name, second.name)
                    }
                    _ => "for a removed connection".to_string(),
                }
            }
            None => "for a removed connection".to_string(),
        };

        self.characters.save(&character).await?;
        Ok(format!(
            "The key **{key}** {path} has been removed from **{}**.",
            character.name
        ))
    }
}
