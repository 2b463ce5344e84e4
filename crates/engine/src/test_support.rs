//! In-process doubles shared by plugin, dispatcher and HTTP tests.
//!
//! [`RecordingChat`] keeps every chat call in memory so tests can assert on
//! what the bot said and did. [`TestApp`] wires it to a real SQLite database
//! in a temporary directory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use raconteur_domain::{
    ChannelId, Character, Game, GuildId, Location, MessageId, RoleId, UserId,
};

use crate::app::App;
use crate::commands::{parse_invocation, CommandContext, CommandError};
use crate::infrastructure::clock::{FixedClock, SequenceRandom};
use crate::infrastructure::message_cache::MessageCache;
use crate::infrastructure::ports::{
    ChannelAccess, ChannelKind, ChatChannel, ChatError, ChatMember, ChatMessage, ChatPort,
    ChatRole, OutgoingMessage,
};
use crate::infrastructure::sqlite::test_repositories;
use crate::plugins::{invoke, Plugin};

pub const GUILD: GuildId = GuildId::new(1);
pub const BOT: UserId = UserId::new(999);
pub const GM_ROLE: RoleId = RoleId::new(501);
pub const PLAYER_ROLE: RoleId = RoleId::new(502);
pub const SPECTATOR_ROLE: RoleId = RoleId::new(503);

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid date")
}

// =============================================================================
// Recording chat
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub message: OutgoingMessage,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub members: Vec<ChatMember>,
    pub roles: Vec<ChatRole>,
    pub channels: Vec<ChatChannel>,
    pub channel_access: Vec<(ChannelId, Vec<ChannelAccess>)>,
    pub sent: Vec<SentMessage>,
    pub edits: Vec<(ChannelId, MessageId, String)>,
    pub deleted: Vec<(ChannelId, MessageId)>,
    pub delayed_deletes: Vec<(ChannelId, MessageId, Duration)>,
    pub reactions: Vec<(ChannelId, MessageId, String)>,
    pub cleared: Vec<(ChannelId, MessageId)>,
    pub typing: Vec<ChannelId>,
    pub history: Vec<(ChannelId, DateTime<Utc>)>,
    next_id: u64,
}

impl ChatState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        10_000 + self.next_id
    }
}

/// A chat platform that remembers everything.
#[derive(Debug, Default)]
pub struct RecordingChat {
    pub state: Mutex<ChatState>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, ChatState> {
        self.state.lock().expect("chat state lock")
    }

    pub fn add_member(&self, id: u64, name: &str, roles: Vec<RoleId>) -> ChatMember {
        let member = ChatMember {
            id: UserId::new(id),
            display_name: name.to_string(),
            user_name: name.to_lowercase(),
            roles,
        };
        self.state().members.push(member.clone());
        member
    }

    pub fn add_channel(&self, id: u64, name: &str, kind: ChannelKind, category_id: Option<ChannelId>) {
        self.state().channels.push(ChatChannel {
            id: ChannelId::new(id),
            name: name.to_string(),
            kind,
            category_id,
        });
    }

    pub fn texts_in(&self, channel_id: ChannelId) -> Vec<String> {
        self.state()
            .sent
            .iter()
            .filter(|s| s.channel_id == channel_id)
            .map(|s| s.message.content.clone())
            .collect()
    }

    pub fn all_texts(&self) -> Vec<String> {
        self.state()
            .sent
            .iter()
            .map(|s| s.message.content.clone())
            .collect()
    }

    pub fn sent_to(&self, channel_id: ChannelId) -> Vec<SentMessage> {
        self.state()
            .sent
            .iter()
            .filter(|s| s.channel_id == channel_id)
            .cloned()
            .collect()
    }

    pub fn channel_named(&self, name: &str) -> Option<ChatChannel> {
        self.state().channels.iter().find(|c| c.name == name).cloned()
    }
}

#[async_trait]
impl ChatPort for RecordingChat {
    fn bot_user_id(&self) -> UserId {
        BOT
    }

    async fn guild_name(&self, _guild_id: GuildId) -> Result<String, ChatError> {
        Ok("Test Guild".to_string())
    }

    async fn members(&self, _guild_id: GuildId) -> Result<Vec<ChatMember>, ChatError> {
        Ok(self.state().members.clone())
    }

    async fn member(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<ChatMember>, ChatError> {
        Ok(self.state().members.iter().find(|m| m.id == user_id).cloned())
    }

    async fn roles(&self, _guild_id: GuildId) -> Result<Vec<ChatRole>, ChatError> {
        Ok(self.state().roles.clone())
    }

    async fn create_role(
        &self,
        _guild_id: GuildId,
        name: &str,
        _colour: u32,
    ) -> Result<ChatRole, ChatError> {
        let mut state = self.state();
        let role = ChatRole {
            id: RoleId::new(state.next_id()),
            name: name.to_string(),
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn channels(&self, _guild_id: GuildId) -> Result<Vec<ChatChannel>, ChatError> {
        Ok(self.state().channels.clone())
    }

    async fn create_channel(
        &self,
        _guild_id: GuildId,
        name: &str,
        kind: ChannelKind,
        category_id: Option<ChannelId>,
        access: Vec<ChannelAccess>,
    ) -> Result<ChatChannel, ChatError> {
        let mut state = self.state();
        let channel = ChatChannel {
            id: ChannelId::new(state.next_id()),
            name: name.to_string(),
            kind,
            category_id,
        };
        state.channels.push(channel.clone());
        state.channel_access.push((channel.id, access));
        Ok(channel)
    }

    async fn send(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, ChatError> {
        let mut state = self.state();
        let message_id = MessageId::new(state.next_id());
        state.sent.push(SentMessage {
            channel_id,
            message_id,
            message,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: String,
    ) -> Result<(), ChatError> {
        self.state().edits.push((channel_id, message_id, content));
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        self.state().deleted.push((channel_id, message_id));
        Ok(())
    }

    async fn delete_message_after(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        delay: Duration,
    ) -> Result<(), ChatError> {
        self.state()
            .delayed_deletes
            .push((channel_id, message_id, delay));
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let state = self.state();
        Ok(state
            .sent
            .iter()
            .find(|s| s.channel_id == channel_id && s.message_id == message_id)
            .map(|s| ChatMessage {
                id: s.message_id,
                channel_id,
                guild_id: Some(GUILD),
                author_id: BOT,
                content: s.message.content.clone(),
                timestamp: test_now(),
                attachments: s.message.attachments.clone(),
                reference: None,
            }))
    }

    async fn recent_message_times(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, ChatError> {
        Ok(self
            .state()
            .history
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .map(|(_, t)| *t)
            .take(limit)
            .collect())
    }

    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<(), ChatError> {
        self.state()
            .reactions
            .push((channel_id, message_id, emoji.to_string()));
        Ok(())
    }

    async fn clear_reactions(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        self.state().cleared.push((channel_id, message_id));
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<(), ChatError> {
        self.state().typing.push(channel_id);
        Ok(())
    }
}

// =============================================================================
// Test application
// =============================================================================

pub struct TestApp {
    pub app: Arc<App>,
    pub chat: Arc<RecordingChat>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_random(vec![4]).await
    }

    /// Dice replay `values` in order.
    pub async fn with_random(values: Vec<u32>) -> Self {
        let (dir, repos) = test_repositories().await;
        let chat = Arc::new(RecordingChat::new());
        let app = App::new(
            repos.into(),
            chat.clone(),
            Arc::new(FixedClock(test_now())),
            Arc::new(SequenceRandom::new(values)),
            Arc::new(MessageCache::in_memory()),
        );
        Self {
            app: Arc::new(app),
            chat,
            _dir: dir,
        }
    }

    /// A game with the given plugins enabled and the three roles bound.
    pub async fn game(&self, plugins: &[&str]) -> Game {
        let mut game = Game::new(GUILD, "Test Guild");
        for plugin in plugins {
            game.enable_plugin(plugin);
        }
        game.gm_role_id = Some(GM_ROLE);
        game.player_role_id = Some(PLAYER_ROLE);
        game.spectator_role_id = Some(SPECTATOR_ROLE);
        self.app
            .repositories
            .game
            .save(&game)
            .await
            .expect("save game");
        game
    }

    pub async fn location(&self, name: &str, channel: Option<u64>) -> Location {
        let mut location = Location::new(GUILD, name, "World", "");
        location.channel_id = channel.map(ChannelId::new);
        self.app
            .repositories
            .location
            .save(&location)
            .await
            .expect("save location");
        location
    }

    pub async fn connect(&self, a: &Location, b: &Location) -> raconteur_domain::Connection {
        let connection = raconteur_domain::Connection::new(a.id, b.id);
        self.app
            .repositories
            .location
            .save_connection(&connection)
            .await
            .expect("save connection");
        connection
    }

    pub async fn character(
        &self,
        member: u64,
        name: &str,
        channel: Option<u64>,
        location: Option<&Location>,
    ) -> Character {
        let mut character = Character::new(GUILD, UserId::new(member), name);
        character.channel_id = channel.map(ChannelId::new);
        character.location_id = location.map(|l| l.id);
        self.save_character(&character).await;
        character
    }

    pub async fn save_character(&self, character: &Character) {
        self.app
            .repositories
            .character
            .save(character)
            .await
            .expect("save character");
    }

    /// Runs one command line of `plugin` as `member` in `channel`.
    pub async fn run(
        &self,
        plugin: &dyn Plugin,
        game: &Game,
        member: &ChatMember,
        channel: u64,
        line: &str,
    ) -> Result<Vec<String>, CommandError> {
        let (name, raw) = parse_invocation(line).expect("command line");
        let command = plugin
            .commands()
            .iter()
            .find(|c| c.name == name)
            .expect("known command");
        let ctx = CommandContext::new(
            GUILD,
            message(1, channel, member.id.get(), line),
            member.clone(),
            game.clone(),
            plugin.commands().to_vec(),
        );
        invoke(plugin, self.chat.as_ref(), &ctx, command, raw).await
    }

    pub async fn reload(&self, character: &Character) -> Character {
        self.app
            .repositories
            .character
            .get(character.id)
            .await
            .expect("get character")
            .expect("character exists")
    }
}

/// A guild message sent "now".
pub fn message(id: u64, channel: u64, author: u64, content: &str) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(id),
        channel_id: ChannelId::new(channel),
        guild_id: Some(GUILD),
        author_id: UserId::new(author),
        content: content.to_string(),
        timestamp: test_now(),
        attachments: Vec::new(),
        reference: None,
    }
}
