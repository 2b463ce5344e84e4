//! Everything a plugin needs to know about one command invocation.

use raconteur_domain::{ChannelId, Game, GuildId, Permissions};

use super::CommandSpec;
use crate::infrastructure::ports::{ChatMember, ChatMessage};

#[derive(Debug, Clone)]
pub struct CommandContext {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message: ChatMessage,
    pub member: ChatMember,
    pub game: Game,
    pub permissions: Permissions,
    /// Commands of the enabled plugins, in registry order.
    pub commands: Vec<CommandSpec>,
}

impl CommandContext {
    pub fn new(
        guild_id: GuildId,
        message: ChatMessage,
        member: ChatMember,
        game: Game,
        commands: Vec<CommandSpec>,
    ) -> Self {
        let permissions = game.permissions(&member.roles);
        Self {
            guild_id,
            channel_id: message.channel_id,
            message,
            member,
            game,
            permissions,
            commands,
        }
    }

    /// One help line per command the member may use.
    pub fn help(&self) -> String {
        self.commands
            .iter()
            .filter(|c| c.is_available_to(self.permissions))
            .map(CommandSpec::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ParamKind, ParamSpec};
    use chrono::Utc;
    use raconteur_domain::{MessageId, RoleId, UserId};

    const COMMANDS: [CommandSpec; 3] = [
        CommandSpec::new("help", "Displays a list of commands you can run."),
        CommandSpec::new("flag", "Sets a flag.")
            .gm()
            .params(&[ParamSpec::required("name", ParamKind::Text)]),
        CommandSpec::new("move", "Moves.").player(),
    ];

    fn context(roles: Vec<RoleId>) -> CommandContext {
        let mut game = Game::new(GuildId::new(1), "Harbour");
        game.player_role_id = Some(RoleId::new(7));
        let message = ChatMessage {
            id: MessageId::new(3),
            channel_id: ChannelId::new(4),
            guild_id: Some(GuildId::new(1)),
            author_id: UserId::new(5),
            content: ".help".to_string(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            reference: None,
        };
        let member = ChatMember {
            id: UserId::new(5),
            display_name: "Ada".to_string(),
            user_name: "ada".to_string(),
            roles,
        };
        CommandContext::new(GuildId::new(1), message, member, game, COMMANDS.to_vec())
    }

    #[test]
    fn help_lists_only_usable_commands() {
        let ctx = context(vec![RoleId::new(7)]);
        assert!(ctx.permissions.is_player);
        assert_eq!(ctx.channel_id, ChannelId::new(4));
        assert_eq!(
            ctx.help(),
            "**`.help`**: Displays a list of commands you can run.\n**`.move`**: Moves."
        );

        let ctx = context(Vec::new());
        assert_eq!(
            ctx.help(),
            "**`.help`**: Displays a list of commands you can run."
        );
    }
}
