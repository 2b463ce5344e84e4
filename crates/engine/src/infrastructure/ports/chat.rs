//! Chat platform port.
//!
//! Everything the bot needs from the chat service goes through [`ChatPort`],
//! so plugins can be exercised against a mock in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use raconteur_domain::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serde::Serialize;

use super::error::ChatError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMember {
    pub id: UserId,
    /// Server nickname, falling back to the global name.
    pub display_name: String,
    pub user_name: String,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRole {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelKind {
    Text,
    Category,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatChannel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub category_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// URLs of the attached files.
    pub attachments: Vec<String>,
    /// The message this one replies to.
    pub reference: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReaction {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub content: String,
    pub embed: Option<Embed>,
    pub attachments: Vec<String>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    Everyone,
    Role(RoleId),
    Member(UserId),
}

/// A permission overwrite applied when creating a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAccess {
    pub target: OverwriteTarget,
    pub read: bool,
    pub write: bool,
}

impl ChannelAccess {
    pub fn hidden(target: OverwriteTarget) -> Self {
        Self {
            target,
            read: false,
            write: false,
        }
    }

    pub fn read_only(target: OverwriteTarget) -> Self {
        Self {
            target,
            read: true,
            write: false,
        }
    }

    pub fn read_write(target: OverwriteTarget) -> Self {
        Self {
            target,
            read: true,
            write: true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPort: Send + Sync {
    fn bot_user_id(&self) -> UserId;

    // Guild directory
    async fn guild_name(&self, guild_id: GuildId) -> Result<String, ChatError>;
    async fn members(&self, guild_id: GuildId) -> Result<Vec<ChatMember>, ChatError>;
    async fn member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<ChatMember>, ChatError>;
    async fn roles(&self, guild_id: GuildId) -> Result<Vec<ChatRole>, ChatError>;
    async fn create_role(
        &self,
        guild_id: GuildId,
        name: &str,
        colour: u32,
    ) -> Result<ChatRole, ChatError>;
    async fn channels(&self, guild_id: GuildId) -> Result<Vec<ChatChannel>, ChatError>;
    async fn create_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        kind: ChannelKind,
        category_id: Option<ChannelId>,
        access: Vec<ChannelAccess>,
    ) -> Result<ChatChannel, ChatError>;

    // Messages
    async fn send(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, ChatError>;
    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: String,
    ) -> Result<(), ChatError>;
    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError>;
    /// Deletes a message once `delay` has passed without blocking the caller.
    async fn delete_message_after(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        delay: Duration,
    ) -> Result<(), ChatError>;
    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError>;
    /// Timestamps of the newest `limit` messages of a channel.
    async fn recent_message_times(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, ChatError>;

    // Reactions and presence
    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<(), ChatError>;
    async fn clear_reactions(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError>;
    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<(), ChatError>;
}
