//! Discord adapter built on serenity.
//!
//! [`DiscordChat`] implements [`ChatPort`] over serenity's HTTP client and
//! [`DiscordHandler`] forwards gateway events to the chat dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use raconteur_domain::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serenity::all::{
    ChannelType, Context, CreateAttachment, CreateChannel, CreateEmbed, CreateEmbedFooter,
    CreateMessage, EditMessage, EditRole, EventHandler, GatewayIntents, GetMessages, Http,
    Member, Message, PermissionOverwrite, PermissionOverwriteType, Permissions, Reaction,
    ReactionType, Ready, TypingStartEvent,
};

use crate::api::chat::Dispatcher;
use crate::infrastructure::ports::{
    ChannelAccess, ChannelKind, ChatChannel, ChatError, ChatMember, ChatMessage, ChatPort,
    ChatReaction, ChatRole, Embed, OutgoingMessage, OverwriteTarget,
};

/// Everything the bot listens to.
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MESSAGE_TYPING
        | GatewayIntents::MESSAGE_CONTENT
}

// =============================================================================
// Id and error conversions
// =============================================================================

fn guild(id: GuildId) -> serenity::all::GuildId {
    serenity::all::GuildId::new(id.get())
}

fn channel(id: ChannelId) -> serenity::all::ChannelId {
    serenity::all::ChannelId::new(id.get())
}

fn message(id: MessageId) -> serenity::all::MessageId {
    serenity::all::MessageId::new(id.get())
}

fn status_of(e: &serenity::Error) -> Option<u16> {
    match e {
        serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(response)) => {
            Some(response.status_code.as_u16())
        }
        _ => None,
    }
}

fn chat_error(operation: &'static str) -> impl Fn(serenity::Error) -> ChatError {
    move |e| match status_of(&e) {
        Some(403) => ChatError::Forbidden(format!("{operation}: {e}")),
        _ => ChatError::request(operation, e),
    }
}

/// Turns a 404 into `None`.
fn found<T>(result: serenity::Result<T>, operation: &'static str) -> Result<Option<T>, ChatError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if status_of(&e) == Some(404) => Ok(None),
        Err(e) => Err(chat_error(operation)(e)),
    }
}

fn to_member(member: &Member) -> ChatMember {
    ChatMember {
        id: UserId::new(member.user.id.get()),
        display_name: member.display_name().to_string(),
        user_name: member.user.name.clone(),
        roles: member.roles.iter().map(|r| RoleId::new(r.get())).collect(),
    }
}

fn to_timestamp(message: &Message) -> DateTime<Utc> {
    DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_default()
}

pub fn to_chat_message(message: &Message) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(message.id.get()),
        channel_id: ChannelId::new(message.channel_id.get()),
        guild_id: message.guild_id.map(|g| GuildId::new(g.get())),
        author_id: UserId::new(message.author.id.get()),
        content: message.content.clone(),
        timestamp: to_timestamp(message),
        attachments: message.attachments.iter().map(|a| a.url.clone()).collect(),
        reference: message
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id)
            .map(|id| MessageId::new(id.get())),
    }
}

fn build_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new()
        .title(&embed.title)
        .description(&embed.description);
    for field in &embed.fields {
        builder = builder.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer));
    }
    builder
}

fn overwrite(guild_id: GuildId, access: &ChannelAccess) -> PermissionOverwrite {
    let perms = |read: bool, write: bool| {
        let mut permissions = Permissions::empty();
        if read {
            permissions |= Permissions::VIEW_CHANNEL;
        }
        if write {
            permissions |= Permissions::SEND_MESSAGES;
        }
        permissions
    };
    let kind = match access.target {
        // The @everyone role shares the guild's id.
        OverwriteTarget::Everyone => {
            PermissionOverwriteType::Role(serenity::all::RoleId::new(guild_id.get()))
        }
        OverwriteTarget::Role(role) => {
            PermissionOverwriteType::Role(serenity::all::RoleId::new(role.get()))
        }
        OverwriteTarget::Member(user) => {
            PermissionOverwriteType::Member(serenity::all::UserId::new(user.get()))
        }
    };
    PermissionOverwrite {
        allow: perms(access.read, access.write),
        deny: perms(!access.read, !access.write),
        kind,
    }
}

// =============================================================================
// Chat port
// =============================================================================

pub struct DiscordChat {
    http: Arc<Http>,
    bot_user_id: UserId,
}

impl DiscordChat {
    /// Logs in over HTTP to learn the bot's own user id.
    pub async fn connect(token: &str) -> Result<Self, ChatError> {
        let http = Arc::new(Http::new(token));
        let user = http
            .get_current_user()
            .await
            .map_err(chat_error("get_current_user"))?;
        tracing::info!(bot = %user.name, "Connected to Discord");
        Ok(Self {
            http,
            bot_user_id: UserId::new(user.id.get()),
        })
    }

    async fn attachments(&self, urls: &[String]) -> Vec<CreateAttachment> {
        let mut attachments = Vec::with_capacity(urls.len());
        for url in urls {
            match CreateAttachment::url(&*self.http, url).await {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => tracing::warn!(url = %url, error = %e, "Failed to load attachment"),
            }
        }
        attachments
    }
}

#[async_trait]
impl ChatPort for DiscordChat {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    async fn guild_name(&self, guild_id: GuildId) -> Result<String, ChatError> {
        let partial = guild(guild_id)
            .to_partial_guild(&*self.http)
            .await
            .map_err(chat_error("guild_name"))?;
        Ok(partial.name)
    }

    async fn members(&self, guild_id: GuildId) -> Result<Vec<ChatMember>, ChatError> {
        let members = guild(guild_id)
            .members(&*self.http, Some(1000), None::<serenity::all::UserId>)
            .await
            .map_err(chat_error("members"))?;
        Ok(members.iter().map(to_member).collect())
    }

    async fn member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<ChatMember>, ChatError> {
        let result = guild(guild_id)
            .member(&*self.http, serenity::all::UserId::new(user_id.get()))
            .await;
        Ok(found(result, "member")?.map(|m| to_member(&m)))
    }

    async fn roles(&self, guild_id: GuildId) -> Result<Vec<ChatRole>, ChatError> {
        let roles = guild(guild_id)
            .roles(&*self.http)
            .await
            .map_err(chat_error("roles"))?;
        Ok(roles
            .into_values()
            .map(|r| ChatRole {
                id: RoleId::new(r.id.get()),
                name: r.name,
            })
            .collect())
    }

    async fn create_role(
        &self,
        guild_id: GuildId,
        name: &str,
        colour: u32,
    ) -> Result<ChatRole, ChatError> {
        let role = guild(guild_id)
            .create_role(&*self.http, EditRole::new().name(name).colour(colour))
            .await
            .map_err(chat_error("create_role"))?;
        Ok(ChatRole {
            id: RoleId::new(role.id.get()),
            name: role.name,
        })
    }

    async fn channels(&self, guild_id: GuildId) -> Result<Vec<ChatChannel>, ChatError> {
        let channels = guild(guild_id)
            .channels(&*self.http)
            .await
            .map_err(chat_error("channels"))?;
        let mut channels: Vec<_> = channels
            .into_values()
            .map(|c| ChatChannel {
                id: ChannelId::new(c.id.get()),
                name: c.name,
                kind: match c.kind {
                    ChannelType::Text => ChannelKind::Text,
                    ChannelType::Category => ChannelKind::Category,
                    _ => ChannelKind::Other,
                },
                category_id: c.parent_id.map(|p| ChannelId::new(p.get())),
            })
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn create_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        kind: ChannelKind,
        category_id: Option<ChannelId>,
        access: Vec<ChannelAccess>,
    ) -> Result<ChatChannel, ChatError> {
        let mut builder = CreateChannel::new(name)
            .kind(match kind {
                ChannelKind::Category => ChannelType::Category,
                _ => ChannelType::Text,
            })
            .permissions(access.iter().map(|a| overwrite(guild_id, a)));
        if let Some(category_id) = category_id {
            builder = builder.category(channel(category_id));
        }
        let created = guild(guild_id)
            .create_channel(&*self.http, builder)
            .await
            .map_err(chat_error("create_channel"))?;
        Ok(ChatChannel {
            id: ChannelId::new(created.id.get()),
            name: created.name,
            kind,
            category_id,
        })
    }

    async fn send(
        &self,
        channel_id: ChannelId,
        outgoing: OutgoingMessage,
    ) -> Result<MessageId, ChatError> {
        let mut builder = CreateMessage::new();
        if !outgoing.content.is_empty() {
            builder = builder.content(outgoing.content);
        }
        if let Some(embed) = &outgoing.embed {
            builder = builder.embed(build_embed(embed));
        }
        if !outgoing.attachments.is_empty() {
            builder = builder.add_files(self.attachments(&outgoing.attachments).await);
        }
        let sent = channel(channel_id)
            .send_message(&*self.http, builder)
            .await
            .map_err(chat_error("send"))?;
        Ok(MessageId::new(sent.id.get()))
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: String,
    ) -> Result<(), ChatError> {
        channel(channel_id)
            .edit_message(&*self.http, message(message_id), EditMessage::new().content(content))
            .await
            .map_err(chat_error("edit_message"))?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        channel(channel_id)
            .delete_message(&*self.http, message(message_id))
            .await
            .map_err(chat_error("delete_message"))
    }

    async fn delete_message_after(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        delay: Duration,
    ) -> Result<(), ChatError> {
        let http = self.http.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = channel(channel_id)
                .delete_message(&*http, message(message_id))
                .await
            {
                tracing::warn!(channel_id = %channel_id, message_id = %message_id, error = %e, "Failed to delete expired message");
            }
        });
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let result = channel(channel_id)
            .message(&*self.http, message(message_id))
            .await;
        Ok(found(result, "fetch_message")?.map(|m| to_chat_message(&m)))
    }

    async fn recent_message_times(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, ChatError> {
        let limit = u8::try_from(limit.clamp(1, 100)).unwrap_or(100);
        let messages = channel(channel_id)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .map_err(chat_error("recent_message_times"))?;
        Ok(messages.iter().map(to_timestamp).collect())
    }

    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<(), ChatError> {
        self.http
            .create_reaction(
                channel(channel_id),
                message(message_id),
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(chat_error("add_reaction"))
    }

    async fn clear_reactions(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        channel(channel_id)
            .delete_reactions(&*self.http, message(message_id))
            .await
            .map_err(chat_error("clear_reactions"))
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<(), ChatError> {
        channel(channel_id)
            .broadcast_typing(&*self.http)
            .await
            .map_err(chat_error("trigger_typing"))
    }
}

// =============================================================================
// Gateway events
// =============================================================================

pub struct DiscordHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DiscordHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, guilds = ready.guilds.len(), "Gateway ready");
    }

    async fn message(&self, _ctx: Context, new_message: Message) {
        let message = to_chat_message(&new_message);
        let message_id = message.id;
        if let Err(e) = self.dispatcher.on_message(message).await {
            tracing::error!(message_id = %message_id, error = %e, "Failed to dispatch message");
        }
    }

    async fn typing_start(&self, _ctx: Context, event: TypingStartEvent) {
        let Some(guild_id) = event.guild_id else {
            return;
        };
        let result = self
            .dispatcher
            .on_typing(
                GuildId::new(guild_id.get()),
                ChannelId::new(event.channel_id.get()),
                UserId::new(event.user_id.get()),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(channel_id = %event.channel_id, error = %e, "Failed to dispatch typing");
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
            return;
        };
        let event = ChatReaction {
            guild_id: GuildId::new(guild_id.get()),
            channel_id: ChannelId::new(reaction.channel_id.get()),
            message_id: MessageId::new(reaction.message_id.get()),
            user_id: UserId::new(user_id.get()),
            emoji: reaction.emoji.to_string(),
        };
        if let Err(e) = self.dispatcher.on_reaction(event).await {
            tracing::error!(message_id = %reaction.message_id, error = %e, "Failed to dispatch reaction");
        }
    }
}
