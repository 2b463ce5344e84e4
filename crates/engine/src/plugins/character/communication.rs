//! Sending to everyone in a location, status embeds and GM-only channels.

use futures_util::future::join_all;
use raconteur_domain::common::{render_template, TemplateContext};
use raconteur_domain::value_objects::{describe_activity, ACTIVITY_SAMPLE_SIZE};
use raconteur_domain::{ChannelId, Character, Game, GuildId, Location, MessageId, UserId};

use crate::app::App;
use crate::commands::CommandError;
use crate::infrastructure::ports::{
    ChannelAccess, ChannelKind, ChatChannel, ChatError, ChatPort, Embed, EmbedField,
    OutgoingMessage, OverwriteTarget, RepoError,
};

const UNKNOWN_STATUS: &str = "(Unknown status)";

/// Channels that see what happens in a location: every placed character's
/// channel, then the location's own channel.
pub async fn audience(app: &App, location: &Location) -> Result<Vec<ChannelId>, RepoError> {
    let mut channels: Vec<ChannelId> = app
        .repositories
        .character
        .list_in_location(location.id)
        .await?
        .into_iter()
        .filter_map(|c| c.channel_id)
        .collect();
    if let Some(channel_id) = location.channel_id {
        channels.push(channel_id);
    }
    channels.dedup();
    Ok(channels)
}

/// Sends the same text to every channel at once. Channels that fail are
/// logged and skipped; the copies that made it are returned.
pub async fn send_copies(
    chat: &dyn ChatPort,
    channels: &[ChannelId],
    text: &str,
    attachments: &[String],
) -> Vec<(ChannelId, MessageId)> {
    let sends = channels.iter().map(|&channel_id| async move {
        let message = OutgoingMessage {
            content: text.to_string(),
            embed: None,
            attachments: attachments.to_vec(),
        };
        (channel_id, chat.send(channel_id, message).await)
    });

    join_all(sends)
        .await
        .into_iter()
        .filter_map(|(channel_id, result)| match result {
            Ok(message_id) => Some((channel_id, message_id)),
            Err(e) => {
                tracing::warn!(channel_id = %channel_id, error = %e, "Failed to send message copy");
                None
            }
        })
        .collect()
}

pub async fn broadcast(app: &App, location: &Location, text: &str) -> Result<(), RepoError> {
    let channels = audience(app, location).await?;
    send_copies(app.chat.as_ref(), &channels, text, &[]).await;
    Ok(())
}

/// Sends the character's view of its location to its channel.
pub async fn send_status(app: &App, character: &Character) -> Result<(), CommandError> {
    let Some(channel_id) = character.channel_id else {
        return Ok(());
    };
    let location = match character.location_id {
        Some(id) => app.repositories.location.get(id).await?,
        None => None,
    };

    let embed = match location {
        Some(location) => {
            let context = TemplateContext::new(character.name.clone(), character.flags());
            let description = render_template(&location.description, &context).unwrap_or_else(|e| {
                tracing::warn!(location_id = %location.id, error = %e, "Failed to render location description");
                location.description.clone()
            });
            let fields = app
                .repositories
                .character
                .list_in_location(location.id)
                .await?
                .into_iter()
                .map(|occupant| EmbedField {
                    name: occupant.name,
                    value: occupant
                        .status
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
                    inline: true,
                })
                .collect();
            let recent = app
                .chat
                .recent_message_times(channel_id, ACTIVITY_SAMPLE_SIZE)
                .await?;
            Embed {
                title: location.name,
                description,
                fields,
                footer: Some(describe_activity(&recent, app.clock.now())),
            }
        }
        None => Embed {
            title: "???".to_string(),
            description: "(Unknown location)".to_string(),
            ..Default::default()
        },
    };

    app.chat.send(channel_id, OutgoingMessage::embed(embed)).await?;
    Ok(())
}

/// Hidden from everyone but the bot and the GM; spectators may read.
pub fn restricted_access(bot_id: UserId, game: &Game) -> Vec<ChannelAccess> {
    let mut access = vec![
        ChannelAccess::hidden(OverwriteTarget::Everyone),
        ChannelAccess::read_write(OverwriteTarget::Member(bot_id)),
    ];
    if let Some(gm) = game.gm_role_id {
        access.push(ChannelAccess::read_write(OverwriteTarget::Role(gm)));
    }
    if let Some(spectator) = game.spectator_role_id {
        access.push(ChannelAccess::read_only(OverwriteTarget::Role(spectator)));
    }
    access
}

/// Finds a text channel by name inside a category, creating both when missing.
pub async fn get_or_create_channel(
    chat: &dyn ChatPort,
    guild_id: GuildId,
    name: &str,
    category_name: &str,
    access: Vec<ChannelAccess>,
) -> Result<ChatChannel, ChatError> {
    let channels = chat.channels(guild_id).await?;
    let category = channels
        .iter()
        .find(|c| c.kind == ChannelKind::Category && c.name == category_name)
        .cloned();

    if let Some(category) = &category {
        if let Some(existing) = channels.iter().find(|c| {
            c.kind == ChannelKind::Text && c.name == name && c.category_id == Some(category.id)
        }) {
            return Ok(existing.clone());
        }
    }

    let category = match category {
        Some(category) => category,
        None => {
            chat.create_channel(guild_id, category_name, ChannelKind::Category, None, access.clone())
                .await?
        }
    };
    let channel = chat
        .create_channel(guild_id, name, ChannelKind::Text, Some(category.id), access)
        .await?;
    tracing::info!(guild_id = %guild_id, channel = name, category = category_name, "Created channel");
    Ok(channel)
}
