//! Repository port traits for database access.

use async_trait::async_trait;
use raconteur_domain::*;

use super::error::RepoError;

// =============================================================================
// Games
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameRepo: Send + Sync {
    async fn get(&self, guild_id: GuildId) -> Result<Option<Game>, RepoError>;
    async fn list(&self) -> Result<Vec<Game>, RepoError>;
    async fn save(&self, game: &Game) -> Result<(), RepoError>;
}

// =============================================================================
// Characters
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError>;
    async fn save(&self, character: &Character) -> Result<(), RepoError>;
    /// Also deletes the character's game sheets.
    async fn delete(&self, id: CharacterId) -> Result<(), RepoError>;

    // Queries
    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<Character>, RepoError>;
    async fn list_of_member(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Vec<Character>, RepoError>;
    async fn list_in_location(&self, location_id: LocationId) -> Result<Vec<Character>, RepoError>;
    async fn get_for_channel(&self, channel_id: ChannelId) -> Result<Option<Character>, RepoError>;
}

// =============================================================================
// Locations and connections
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: LocationId) -> Result<Option<Location>, RepoError>;
    async fn save(&self, location: &Location) -> Result<(), RepoError>;
    /// Removes the location's connections and unplaces characters standing in it.
    async fn delete(&self, id: LocationId) -> Result<(), RepoError>;

    // Queries
    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<Location>, RepoError>;
    async fn get_by_name(&self, guild_id: GuildId, name: &str)
        -> Result<Option<Location>, RepoError>;
    async fn get_for_channel(&self, channel_id: ChannelId) -> Result<Option<Location>, RepoError>;

    // Connections
    async fn connections_of(&self, location_id: LocationId) -> Result<Vec<Connection>, RepoError>;
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RepoError>;
    async fn save_connection(&self, connection: &Connection) -> Result<(), RepoError>;
    async fn delete_connection(&self, id: ConnectionId) -> Result<(), RepoError>;
}

// =============================================================================
// Game system sheets
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UmbrealRepo: Send + Sync {
    async fn get(&self, character_id: CharacterId) -> Result<Option<UmbrealSheet>, RepoError>;
    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<UmbrealSheet>, RepoError>;
    async fn save(&self, sheet: &UmbrealSheet) -> Result<(), RepoError>;
    async fn delete(&self, character_id: CharacterId) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnknownArmiesRepo: Send + Sync {
    async fn get(&self, character_id: CharacterId)
        -> Result<Option<UnknownArmiesSheet>, RepoError>;
    async fn list_in_guild(&self, guild_id: GuildId)
        -> Result<Vec<UnknownArmiesSheet>, RepoError>;
    async fn save(&self, sheet: &UnknownArmiesSheet) -> Result<(), RepoError>;
    async fn delete(&self, character_id: CharacterId) -> Result<(), RepoError>;
}
