//! Chat entry point: routes guild messages, typing and reactions to plugins.

use std::sync::Arc;

use raconteur_domain::{ChannelId, Game, GuildId, MessageId, UserId};

use crate::app::App;
use crate::commands::{is_possible_command, parse_invocation, CommandContext, CommandError, CommandSpec};
use crate::infrastructure::ports::{ChatError, ChatMessage, ChatPort, ChatReaction, OutgoingMessage};
use crate::plugins::{invoke, Plugin, PluginRegistry};

pub const MESSAGE_CHARS_LIMIT: usize = 2000;
pub const FAILED_EMOJI: &str = "🚫";
const UNKNOWN_ERROR: &str = "Failed to process command: Unknown error";

/// Splits text into chunks the chat platform accepts, keeping lines together
/// where possible. Over-long lines are hard-split; blank chunks are dropped.
pub fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for mut line in text.split('\n') {
        if current.chars().count() + line.chars().count() > MESSAGE_CHARS_LIMIT {
            chunks.push(std::mem::take(&mut current));
            while let Some((at, _)) = line.char_indices().nth(MESSAGE_CHARS_LIMIT) {
                chunks.push(line[..at].to_string());
                line = &line[at..];
            }
        }
        current.push_str(line);
        current.push('\n');
    }
    chunks.push(current);

    chunks
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Sends `text` in as many messages as needed; attachments ride on the last one.
/// Returns the id of the last message sent.
pub async fn send_text(
    chat: &dyn ChatPort,
    channel_id: ChannelId,
    text: &str,
    attachments: &[String],
) -> Result<Option<MessageId>, ChatError> {
    let mut chunks = split_message(text);
    if chunks.is_empty() {
        if attachments.is_empty() {
            return Ok(None);
        }
        chunks.push(String::new());
    }

    let last = chunks.len() - 1;
    let mut sent = None;
    for (i, content) in chunks.into_iter().enumerate() {
        let message = OutgoingMessage {
            content,
            embed: None,
            attachments: if i == last { attachments.to_vec() } else { Vec::new() },
        };
        sent = Some(chat.send(channel_id, message).await?);
    }
    Ok(sent)
}

pub struct Dispatcher {
    app: Arc<App>,
    plugins: PluginRegistry,
}

impl Dispatcher {
    pub fn new(app: Arc<App>) -> Self {
        let plugins = PluginRegistry::new(app.clone());
        Self { app, plugins }
    }

    async fn game(&self, guild_id: GuildId) -> Result<Game, CommandError> {
        if let Some(game) = self.app.use_cases.game.get(guild_id).await? {
            return Ok(game);
        }
        let name = self.app.chat.guild_name(guild_id).await?;
        Ok(self.app.use_cases.game.get_or_create(guild_id, &name).await?)
    }

    fn is_bot(&self, user_id: UserId) -> bool {
        user_id == self.app.chat.bot_user_id()
    }

    /// Runs a command if some enabled plugin owns it, otherwise hands the
    /// message to every enabled plugin.
    pub async fn on_message(&self, message: ChatMessage) -> Result<(), CommandError> {
        let Some(guild_id) = message.guild_id else {
            return Ok(());
        };
        if self.is_bot(message.author_id) {
            return Ok(());
        }

        let game = self.game(guild_id).await?;
        if is_possible_command(&message.content) {
            if let Some((name, raw)) = parse_invocation(&message.content) {
                if let Some((plugin, command)) = self.plugins.find_command(&game, name) {
                    return self
                        .run_command(&game, plugin.as_ref(), command, raw, message.clone())
                        .await;
                }
            }
        }

        for plugin in self.plugins.enabled(&game) {
            if let Err(e) = plugin.on_message(&game, &message).await {
                tracing::error!(
                    plugin = plugin.name(),
                    message_id = %message.id,
                    error = %e,
                    "Plugin failed to handle message"
                );
            }
        }
        Ok(())
    }

    async fn run_command(
        &self,
        game: &Game,
        plugin: &dyn Plugin,
        command: &'static CommandSpec,
        raw: &str,
        message: ChatMessage,
    ) -> Result<(), CommandError> {
        let chat = self.app.chat.as_ref();
        let Some(guild_id) = message.guild_id else {
            return Ok(());
        };
        let Some(member) = chat.member(guild_id, message.author_id).await? else {
            tracing::debug!(guild_id = %guild_id, user_id = %message.author_id, "Ignoring command from unknown member");
            return Ok(());
        };
        let (channel_id, message_id) = (message.channel_id, message.id);
        let ctx = CommandContext::new(
            guild_id,
            message,
            member,
            game.clone(),
            self.plugins.commands_for(game),
        );

        let outcome = async {
            for text in invoke(plugin, chat, &ctx, command, raw).await? {
                send_text(chat, channel_id, &text, &[]).await?;
            }
            Ok::<_, CommandError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                chat.delete_message(channel_id, message_id).await?;
                tracing::info!(
                    guild_id = %guild_id,
                    command = command.name,
                    author = %ctx.member.user_name,
                    "Successfully processed command"
                );
            }
            Err(e) if e.is_user_facing() => {
                chat.add_reaction(channel_id, message_id, FAILED_EMOJI).await?;
                send_text(chat, channel_id, &e.to_string(), &[]).await?;
            }
            Err(e) => {
                tracing::error!(guild_id = %guild_id, command = command.name, error = %e, "Failed to process command");
                chat.add_reaction(channel_id, message_id, FAILED_EMOJI).await?;
                send_text(chat, channel_id, UNKNOWN_ERROR, &[]).await?;
            }
        }
        Ok(())
    }

    pub async fn on_typing(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), CommandError> {
        if self.is_bot(user_id) {
            return Ok(());
        }
        let game = self.game(guild_id).await?;
        for plugin in self.plugins.enabled(&game) {
            if let Err(e) = plugin.on_typing(&game, channel_id, user_id).await {
                tracing::warn!(plugin = plugin.name(), channel_id = %channel_id, error = %e, "Plugin failed to relay typing");
            }
        }
        Ok(())
    }

    pub async fn on_reaction(&self, reaction: ChatReaction) -> Result<(), CommandError> {
        if self.is_bot(reaction.user_id) {
            return Ok(());
        }
        let game = self.game(reaction.guild_id).await?;
        for plugin in self.plugins.enabled(&game) {
            if let Err(e) = plugin.on_reaction(&game, &reaction).await {
                tracing::error!(
                    plugin = plugin.name(),
                    message_id = %reaction.message_id,
                    error = %e,
                    "Plugin failed to handle reaction"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{message, TestApp, BOT, GUILD, PLAYER_ROLE};
    use raconteur_domain::entities::{CHARACTER_PLUGIN, CORE_PLUGIN};

    const ADA_CHANNEL: u64 = 100;
    const SQUARE_CHANNEL: u64 = 300;

    #[test]
    fn short_text_stays_in_one_chunk() {
        assert_eq!(split_message("first\nsecond\n"), vec!["first\nsecond"]);
        assert!(split_message(" \n \n").is_empty());
    }

    #[test]
    fn chunks_break_between_lines() {
        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1000));
        let chunks = split_message(&text);
        assert_eq!(chunks, vec!["a".repeat(1500), "b".repeat(1000)]);
    }

    #[test]
    fn long_lines_are_hard_split() {
        let chunks = split_message(&"x".repeat(4500));
        let sizes: Vec<_> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(sizes, vec![2000, 2000, 500]);
    }

    #[tokio::test]
    async fn attachments_ride_on_the_last_chunk() {
        let test = TestApp::new().await;
        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1000));
        let files = vec!["https://cdn.example/map.png".to_string()];

        let last = send_text(test.chat.as_ref(), ChannelId::new(7), &text, &files)
            .await
            .expect("send");

        let sent = test.chat.sent_to(ChannelId::new(7));
        assert_eq!(sent.len(), 2);
        assert!(sent[0].message.attachments.is_empty());
        assert_eq!(sent[1].message.attachments, files);
        assert_eq!(last, Some(sent[1].message_id));

        let nothing = send_text(test.chat.as_ref(), ChannelId::new(7), "  ", &[])
            .await
            .expect("send");
        assert_eq!(nothing, None);
    }

    #[tokio::test]
    async fn successful_commands_reply_and_delete_the_invocation() {
        let test = TestApp::new().await;
        test.game(&[CORE_PLUGIN]).await;
        test.chat.add_member(5, "Ada P", vec![]);
        let dispatcher = Dispatcher::new(test.app.clone());

        dispatcher
            .on_message(message(1, ADA_CHANNEL, 5, ".help"))
            .await
            .expect("dispatch");

        let replies = test.chat.texts_in(ChannelId::new(ADA_CHANNEL));
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("**`.help`**"));
        assert_eq!(
            test.chat.state().deleted,
            vec![(ChannelId::new(ADA_CHANNEL), MessageId::new(1))]
        );
    }

    #[tokio::test]
    async fn user_errors_are_flagged_and_explained() {
        let test = TestApp::new().await;
        test.game(&[CHARACTER_PLUGIN]).await;
        test.chat.add_member(5, "Ada P", vec![PLAYER_ROLE]);
        let dispatcher = Dispatcher::new(test.app.clone());

        dispatcher
            .on_message(message(1, ADA_CHANNEL, 5, ".locationsync"))
            .await
            .expect("dispatch");

        let state = test.chat.state();
        assert_eq!(
            state.reactions,
            vec![(ChannelId::new(ADA_CHANNEL), MessageId::new(1), FAILED_EMOJI.to_string())]
        );
        assert!(state.deleted.is_empty());
        assert_eq!(
            state.sent[0].message.content,
            "Insufficient permissions to use command `.locationsync`"
        );
    }

    #[tokio::test]
    async fn plain_and_unknown_messages_reach_the_plugins() {
        let test = TestApp::new().await;
        test.game(&[CHARACTER_PLUGIN]).await;
        let square = test.location("Square", Some(SQUARE_CHANNEL)).await;
        test.character(5, "Ada", Some(ADA_CHANNEL), Some(&square)).await;
        test.chat.add_member(5, "Ada P", vec![PLAYER_ROLE]);
        let dispatcher = Dispatcher::new(test.app.clone());

        dispatcher
            .on_message(message(1, ADA_CHANNEL, 5, ".dance"))
            .await
            .expect("dispatch");

        assert_eq!(
            test.chat.texts_in(ChannelId::new(SQUARE_CHANNEL)),
            vec!["__**Ada**__\n.dance"]
        );
        assert!(test.chat.state().reactions.is_empty());
    }

    #[tokio::test]
    async fn bot_and_direct_messages_are_ignored() {
        let test = TestApp::new().await;
        test.game(&[CORE_PLUGIN]).await;
        let dispatcher = Dispatcher::new(test.app.clone());

        dispatcher
            .on_message(message(1, ADA_CHANNEL, BOT.get(), ".help"))
            .await
            .expect("bot");
        let mut direct = message(2, ADA_CHANNEL, 5, ".help");
        direct.guild_id = None;
        dispatcher.on_message(direct).await.expect("direct");

        assert!(test.chat.state().sent.is_empty());
    }

    #[tokio::test]
    async fn first_contact_creates_the_game() {
        let test = TestApp::new().await;
        let dispatcher = Dispatcher::new(test.app.clone());

        dispatcher
            .on_typing(GUILD, ChannelId::new(ADA_CHANNEL), UserId::new(5))
            .await
            .expect("typing");

        let game = test
            .app
            .repositories
            .game
            .get(GUILD)
            .await
            .expect("get")
            .expect("created");
        assert_eq!(game.name, "Test Guild");
        assert!(game.is_enabled(CORE_PLUGIN));
    }
}
