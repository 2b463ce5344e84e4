//! Game entity - one per guild, tracks roles and enabled plugins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{GuildId, RoleId};

pub const CORE_PLUGIN: &str = "CorePlugin";
pub const CHARACTER_PLUGIN: &str = "CharacterPlugin";
pub const UMBREAL_PLUGIN: &str = "UmbrealPlugin";
pub const UNKNOWN_ARMIES_PLUGIN: &str = "UnknownArmiesPlugin";

/// A plugin enabled for a game, with its free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlugin {
    pub name: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl GamePlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub guild_id: GuildId,
    pub name: String,
    pub plugins: Vec<GamePlugin>,
    pub gm_role_id: Option<RoleId>,
    pub player_role_id: Option<RoleId>,
    pub spectator_role_id: Option<RoleId>,
}

/// What a guild member may do in a game, derived from their roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub is_gm: bool,
    pub is_player: bool,
    pub is_spectator: bool,
}

impl Game {
    /// A freshly created game only has the core plugin enabled.
    pub fn new(guild_id: GuildId, name: impl Into<String>) -> Self {
        Self {
            guild_id,
            name: name.into(),
            plugins: vec![GamePlugin::new(CORE_PLUGIN)],
            gm_role_id: None,
            player_role_id: None,
            spectator_role_id: None,
        }
    }

    pub fn plugin(&self, name: &str) -> Option<&GamePlugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugin_mut(&mut self, name: &str) -> Option<&mut GamePlugin> {
        self.plugins.iter_mut().find(|p| p.name == name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }

    /// Returns `false` when the plugin was already enabled.
    pub fn enable_plugin(&mut self, name: &str) -> bool {
        if self.is_enabled(name) {
            return false;
        }
        self.plugins.push(GamePlugin::new(name));
        true
    }

    /// Returns `false` when the plugin was not enabled.
    pub fn disable_plugin(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        self.plugins.len() != before
    }

    pub fn permissions(&self, roles: &[RoleId]) -> Permissions {
        let has = |role: Option<RoleId>| role.is_some_and(|r| roles.contains(&r));
        Permissions {
            is_gm: has(self.gm_role_id),
            is_player: has(self.player_role_id),
            is_spectator: has(self.spectator_role_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_has_only_core_plugin() {
        let game = Game::new(GuildId::new(1), "Test");
        assert_eq!(game.plugins.len(), 1);
        assert!(game.is_enabled(CORE_PLUGIN));
        assert!(!game.is_enabled(CHARACTER_PLUGIN));
    }

    #[test]
    fn enabling_twice_is_reported() {
        let mut game = Game::new(GuildId::new(1), "Test");
        assert!(game.enable_plugin(UMBREAL_PLUGIN));
        assert!(!game.enable_plugin(UMBREAL_PLUGIN));
        assert!(game.disable_plugin(UMBREAL_PLUGIN));
        assert!(!game.disable_plugin(UMBREAL_PLUGIN));
    }

    #[test]
    fn permissions_follow_bound_roles() {
        let mut game = Game::new(GuildId::new(1), "Test");
        game.gm_role_id = Some(RoleId::new(10));
        game.player_role_id = Some(RoleId::new(11));

        let gm = game.permissions(&[RoleId::new(10)]);
        assert!(gm.is_gm && !gm.is_player && !gm.is_spectator);

        let player = game.permissions(&[RoleId::new(11), RoleId::new(99)]);
        assert!(!player.is_gm && player.is_player);

        // Unbound spectator role never matches
        assert_eq!(game.permissions(&[]), Permissions::default());
    }
}
