//! Always-enabled commands: help, first-run setup and plugin toggles.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use raconteur_domain::entities::CORE_PLUGIN;

use super::{is_registered, Plugin};
use crate::app::App;
use crate::commands::{Args, CommandContext, CommandError, CommandSpec, ParamKind, ParamSpec};
use crate::use_cases::GameRole;

const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("help", "Displays a list of commands you can run."),
    CommandSpec::new("init", "Sets up the server for a first run."),
    CommandSpec::new("pluginenable", "Enables a plugin for this server.")
        .gm()
        .params(&[ParamSpec::required("name", ParamKind::Text)]),
    CommandSpec::new("plugindisable", "Disables a plugin for this server.")
        .gm()
        .params(&[ParamSpec::required("name", ParamKind::Text)]),
];

pub struct CorePlugin {
    app: Arc<App>,
}

impl CorePlugin {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    async fn init(&self, ctx: &CommandContext) -> Result<Vec<String>, CommandError> {
        let mut responses = vec!["Initializing game session".to_string()];
        let mut game = ctx.game.clone();

        let missing: Vec<GameRole> = GameRole::ALL
            .into_iter()
            .filter(|role| role.bound_in(&game).is_none())
            .collect();
        if !missing.is_empty() {
            responses.push("Setting up roles for game session".to_string());
            let chat = self.app.chat.as_ref();
            let created = try_join_all(
                missing
                    .iter()
                    .map(|role| chat.create_role(ctx.guild_id, role.name(), role.colour())),
            )
            .await?;
            let bindings: Vec<_> = missing
                .into_iter()
                .zip(created)
                .map(|(role, created)| (role, created.id))
                .collect();
            self.app
                .use_cases
                .game
                .bind_roles(&mut game, &bindings)
                .await?;
            tracing::info!(guild_id = %ctx.guild_id, roles = bindings.len(), "Created game roles");
        }

        responses.push("Initialization complete".to_string());
        Ok(responses)
    }

    async fn enable(&self, ctx: &CommandContext, name: &str) -> Result<String, CommandError> {
        if !is_registered(name) {
            return Err(CommandError::user(format!("Unknown plugin \"{name}\"")));
        }
        let mut game = ctx.game.clone();
        if self.app.use_cases.game.enable_plugin(&mut game, name).await? {
            Ok(format!("Plugin **{name}** has been enabled"))
        } else {
            Ok(format!("Plugin **{name}** is already enabled"))
        }
    }

    async fn disable(&self, ctx: &CommandContext, name: &str) -> Result<String, CommandError> {
        if name == CORE_PLUGIN {
            return Ok(format!("Cannot disable **{CORE_PLUGIN}**"));
        }
        if !is_registered(name) {
            return Err(CommandError::user(format!("Unknown plugin **{name}**")));
        }
        let mut game = ctx.game.clone();
        if self.app.use_cases.game.disable_plugin(&mut game, name).await? {
            Ok(format!("Plugin **{name}** has been disabled"))
        } else {
            Ok(format!("Plugin **{name}** is already disabled"))
        }
    }
}

#[async_trait]
impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        CORE_PLUGIN
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn on_command(
        &self,
        ctx: &CommandContext,
        command: &CommandSpec,
        args: Args,
    ) -> Result<Vec<String>, CommandError> {
        match command.name {
            "help" => Ok(vec![ctx.help()]),
            "init" => self.init(ctx).await,
            "pluginenable" => Ok(vec![self.enable(ctx, args.required_text("name")?.trim()).await?]),
            "plugindisable" => Ok(vec![self.disable(ctx, args.required_text("name")?.trim()).await?]),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestApp, GM_ROLE, GUILD, PLAYER_ROLE};
    use raconteur_domain::entities::{CHARACTER_PLUGIN, UMBREAL_PLUGIN};
    use raconteur_domain::Game;

    #[tokio::test]
    async fn init_creates_missing_roles_once() {
        let test = TestApp::new().await;
        let plugin = CorePlugin::new(test.app.clone());
        let game = Game::new(GUILD, "Test Guild");
        test.app.repositories.game.save(&game).await.expect("save");
        let member = test.chat.add_member(5, "Ada", Vec::new());

        let responses = test
            .run(&plugin, &game, &member, 10, ".init")
            .await
            .expect("init");
        assert_eq!(
            responses,
            vec![
                "Initializing game session",
                "Setting up roles for game session",
                "Initialization complete",
            ]
        );
        let names: Vec<_> = test.chat.state().roles.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["Game Master", "Player", "Spectator"]);

        let stored = test
            .app
            .repositories
            .game
            .get(GUILD)
            .await
            .expect("get")
            .expect("game");
        assert!(stored.gm_role_id.is_some() && stored.spectator_role_id.is_some());

        let responses = test
            .run(&plugin, &stored, &member, 10, ".init")
            .await
            .expect("init again");
        assert_eq!(responses, vec!["Initializing game session", "Initialization complete"]);
        assert_eq!(test.chat.state().roles.len(), 3);
    }

    #[tokio::test]
    async fn plugins_are_toggled_by_the_gm() {
        let test = TestApp::new().await;
        let plugin = CorePlugin::new(test.app.clone());
        let game = test.game(&[]).await;
        let gm = test.chat.add_member(5, "Gia", vec![GM_ROLE]);

        let responses = test
            .run(&plugin, &game, &gm, 10, ".pluginenable UmbrealPlugin")
            .await
            .expect("enable");
        assert_eq!(responses, vec!["Plugin **UmbrealPlugin** has been enabled"]);

        let game = test.app.repositories.game.get(GUILD).await.expect("get").expect("game");
        assert!(game.is_enabled(UMBREAL_PLUGIN));
        let responses = test
            .run(&plugin, &game, &gm, 10, ".pluginenable UmbrealPlugin")
            .await
            .expect("enable again");
        assert_eq!(responses, vec!["Plugin **UmbrealPlugin** is already enabled"]);

        let responses = test
            .run(&plugin, &game, &gm, 10, ".plugindisable CharacterPlugin")
            .await
            .expect("disable");
        assert_eq!(responses, vec![format!("Plugin **{CHARACTER_PLUGIN}** is already disabled")]);

        let responses = test
            .run(&plugin, &game, &gm, 10, ".plugindisable CorePlugin")
            .await
            .expect("core");
        assert_eq!(responses, vec!["Cannot disable **CorePlugin**"]);

        let err = test
            .run(&plugin, &game, &gm, 10, ".pluginenable DicePlugin")
            .await
            .expect_err("unknown");
        assert_eq!(err.to_string(), "Unknown plugin \"DicePlugin\"");
        let err = test
            .run(&plugin, &game, &gm, 10, ".plugindisable DicePlugin")
            .await
            .expect_err("unknown");
        assert_eq!(err.to_string(), "Unknown plugin **DicePlugin**");
    }

    #[tokio::test]
    async fn players_cannot_toggle_plugins() {
        let test = TestApp::new().await;
        let plugin = CorePlugin::new(test.app.clone());
        let game = test.game(&[]).await;
        let player = test.chat.add_member(6, "Pip", vec![PLAYER_ROLE]);

        let err = test
            .run(&plugin, &game, &player, 10, ".pluginenable UmbrealPlugin")
            .await
            .expect_err("forbidden");
        assert_eq!(
            err.to_string(),
            "Insufficient permissions to use command `.pluginenable`"
        );

        let help = test
            .run(&plugin, &game, &player, 10, ".help")
            .await
            .expect("help");
        assert_eq!(
            help,
            vec![
                "**`.help`**: Displays a list of commands you can run.\n\
                 **`.init`**: Sets up the server for a first run."
            ]
        );
    }
}
