//! Feature modules that can be enabled per game.
//!
//! A plugin contributes chat commands, hooks for plain messages, typing and
//! reactions, and entries in the web admin menu. The registry keeps them in a
//! fixed order: commands are matched and hooks run in that order.

use std::sync::Arc;

use async_trait::async_trait;
use raconteur_domain::entities::{CHARACTER_PLUGIN, CORE_PLUGIN, UMBREAL_PLUGIN, UNKNOWN_ARMIES_PLUGIN};
use raconteur_domain::{ChannelId, Game, UserId};
use serde::Serialize;

use crate::app::App;
use crate::commands::{parse_args, Args, CommandContext, CommandError, CommandSpec, GuildDirectory};
use crate::infrastructure::ports::{ChatMessage, ChatPort, ChatReaction};

pub mod character;
pub mod core_plugin;
pub mod umbreal;
pub mod unknown_armies;

pub use core_plugin::CorePlugin;
pub use character::CharacterPlugin;
pub use umbreal::UmbrealPlugin;
pub use unknown_armies::UnknownArmiesPlugin;

/// Every plugin the bot knows, in registry order.
pub const REGISTERED_PLUGINS: [&str; 4] = [
    CORE_PLUGIN,
    CHARACTER_PLUGIN,
    UMBREAL_PLUGIN,
    UNKNOWN_ARMIES_PLUGIN,
];

pub fn is_registered(name: &str) -> bool {
    REGISTERED_PLUGINS.contains(&name)
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn commands(&self) -> &'static [CommandSpec];

    /// Runs one of this plugin's commands. Returned texts are sent to the invoking channel.
    async fn on_command(
        &self,
        ctx: &CommandContext,
        command: &CommandSpec,
        args: Args,
    ) -> Result<Vec<String>, CommandError>;

    /// A guild message that was not handled as a command.
    async fn on_message(&self, _game: &Game, _message: &ChatMessage) -> Result<(), CommandError> {
        Ok(())
    }

    async fn on_typing(
        &self,
        _game: &Game,
        _channel_id: ChannelId,
        _user_id: UserId,
    ) -> Result<(), CommandError> {
        Ok(())
    }

    async fn on_reaction(&self, _game: &Game, _reaction: &ChatReaction) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Checks permissions, parses the raw parameters and runs the command.
pub async fn invoke(
    plugin: &dyn Plugin,
    chat: &dyn ChatPort,
    ctx: &CommandContext,
    command: &'static CommandSpec,
    raw: &str,
) -> Result<Vec<String>, CommandError> {
    command.check_permissions(ctx.permissions)?;
    let directory = GuildDirectory::load(chat, ctx.guild_id, command.params).await?;
    let args = parse_args(command.params, raw, &directory)?;
    plugin.on_command(ctx, command, args).await
}

// =============================================================================
// Web menu
// =============================================================================

/// A link in the web admin menu, optionally grouped under a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub section: Option<&'static str>,
    pub label: &'static str,
    /// API path, `{guild}` stands for the game's guild id.
    pub path: &'static str,
}

impl MenuEntry {
    pub const fn new(label: &'static str, path: &'static str) -> Self {
        Self {
            section: None,
            label,
            path,
        }
    }

    pub const fn in_section(mut self, section: &'static str) -> Self {
        self.section = Some(section);
        self
    }
}

pub fn web_menu(plugin: &str) -> &'static [MenuEntry] {
    match plugin {
        CHARACTER_PLUGIN => character::WEB_MENU,
        UMBREAL_PLUGIN => umbreal::WEB_MENU,
        UNKNOWN_ARMIES_PLUGIN => unknown_armies::WEB_MENU,
        _ => &[],
    }
}

/// Menu entries of the plugins enabled for `game`, in registry order.
pub fn menu_for(game: &Game) -> Vec<MenuEntry> {
    REGISTERED_PLUGINS
        .iter()
        .filter(|name| game.is_enabled(name))
        .flat_map(|name| web_menu(name).iter().copied())
        .collect()
}

// =============================================================================
// Registry
// =============================================================================

pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            plugins: vec![
                Arc::new(CorePlugin::new(app.clone())),
                Arc::new(CharacterPlugin::new(app.clone())),
                Arc::new(UmbrealPlugin::new(app.clone())),
                Arc::new(UnknownArmiesPlugin::new(app)),
            ],
        }
    }

    pub fn enabled<'a>(&'a self, game: &'a Game) -> impl Iterator<Item = &'a Arc<dyn Plugin>> + 'a {
        self.plugins.iter().filter(|p| game.is_enabled(p.name()))
    }

    /// Commands of the enabled plugins, in registry order.
    pub fn commands_for(&self, game: &Game) -> Vec<CommandSpec> {
        self.enabled(game)
            .flat_map(|p| p.commands().iter().copied())
            .collect()
    }

    /// The first enabled plugin owning a command called exactly `name`.
    pub fn find_command<'a>(
        &'a self,
        game: &'a Game,
        name: &str,
    ) -> Option<(&'a Arc<dyn Plugin>, &'static CommandSpec)> {
        self.enabled(game).find_map(|plugin| {
            plugin
                .commands()
                .iter()
                .find(|c| c.name == name)
                .map(|command| (plugin, command))
        })
    }
}
