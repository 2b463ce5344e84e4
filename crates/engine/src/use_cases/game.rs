//! Per-guild game records: creation, plugin toggles, settings and role bindings.

use std::sync::Arc;

use raconteur_domain::entities::CORE_PLUGIN;
use raconteur_domain::{Game, GuildId, RoleId};
use serde_json::Value;

use crate::infrastructure::ports::{GameRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Game is not initialized")]
    NotInitialized,
    #[error("Plugin {0} is not enabled")]
    PluginNotEnabled(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// The roles a game binds to its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameRole {
    GameMaster,
    Player,
    Spectator,
}

impl GameRole {
    pub const ALL: [GameRole; 3] = [Self::GameMaster, Self::Player, Self::Spectator];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GameMaster => "Game Master",
            Self::Player => "Player",
            Self::Spectator => "Spectator",
        }
    }

    pub fn colour(&self) -> u32 {
        match self {
            Self::GameMaster => 0x206694,
            Self::Player => 0x992D22,
            Self::Spectator => 0xE67E22,
        }
    }

    pub fn bound_in(&self, game: &Game) -> Option<RoleId> {
        match self {
            Self::GameMaster => game.gm_role_id,
            Self::Player => game.player_role_id,
            Self::Spectator => game.spectator_role_id,
        }
    }

    fn bind(&self, game: &mut Game, role_id: RoleId) {
        match self {
            Self::GameMaster => game.gm_role_id = Some(role_id),
            Self::Player => game.player_role_id = Some(role_id),
            Self::Spectator => game.spectator_role_id = Some(role_id),
        }
    }
}

pub struct GameUseCases {
    games: Arc<dyn GameRepo>,
}

impl GameUseCases {
    pub fn new(games: Arc<dyn GameRepo>) -> Self {
        Self { games }
    }

    pub async fn get(&self, guild_id: GuildId) -> Result<Option<Game>, RepoError> {
        self.games.get(guild_id).await
    }

    pub async fn list(&self) -> Result<Vec<Game>, RepoError> {
        self.games.list().await
    }

    /// Every guild always has a game; the first contact creates it with only the core plugin.
    pub async fn get_or_create(&self, guild_id: GuildId, guild_name: &str) -> Result<Game, RepoError> {
        if let Some(game) = self.games.get(guild_id).await? {
            return Ok(game);
        }
        let game = Game::new(guild_id, guild_name);
        self.games.save(&game).await?;
        tracing::info!(guild_id = %guild_id, name = %game.name, "Created game");
        Ok(game)
    }

    pub async fn get_setting(
        &self,
        guild_id: GuildId,
        plugin: &str,
        name: &str,
    ) -> Result<Option<Value>, GameError> {
        let game = self.games.get(guild_id).await?.ok_or(GameError::NotInitialized)?;
        let plugin = game
            .plugin(plugin)
            .ok_or_else(|| GameError::PluginNotEnabled(plugin.to_string()))?;
        Ok(plugin.settings.get(name).cloned())
    }

    pub async fn set_setting(
        &self,
        guild_id: GuildId,
        plugin: &str,
        name: &str,
        value: Value,
    ) -> Result<(), GameError> {
        let mut game = self.games.get(guild_id).await?.ok_or(GameError::NotInitialized)?;
        game.plugin_mut(plugin)
            .ok_or_else(|| GameError::PluginNotEnabled(plugin.to_string()))?
            .settings
            .insert(name.to_string(), value);
        self.games.save(&game).await?;
        Ok(())
    }

    /// Returns `false` when the plugin was already enabled.
    pub async fn enable_plugin(&self, game: &mut Game, plugin: &str) -> Result<bool, RepoError> {
        if !game.enable_plugin(plugin) {
            return Ok(false);
        }
        self.games.save(game).await?;
        tracing::info!(guild_id = %game.guild_id, plugin, "Enabled plugin");
        Ok(true)
    }

    /// Returns `false` when the plugin was not enabled. The core plugin is never disabled.
    pub async fn disable_plugin(&self, game: &mut Game, plugin: &str) -> Result<bool, RepoError> {
        if plugin == CORE_PLUGIN || !game.disable_plugin(plugin) {
            return Ok(false);
        }
        self.games.save(game).await?;
        tracing::info!(guild_id = %game.guild_id, plugin, "Disabled plugin");
        Ok(true)
    }

    pub async fn bind_roles(
        &self,
        game: &mut Game,
        roles: &[(GameRole, RoleId)],
    ) -> Result<(), RepoError> {
        for (role, id) in roles {
            role.bind(game, *id);
        }
        self.games.save(game).await
    }
}
