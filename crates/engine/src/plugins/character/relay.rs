//! Relaying channel messages between everyone in a location, and holding
//! intercepted messages until the GM lets them through.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use raconteur_domain::{ChannelId, Character, CharacterId, Game, Location, LocationId, UserId};

use super::communication::{audience, get_or_create_channel, restricted_access, send_copies};
use super::{CharacterPlugin, INTERCEPTION_CATEGORY, INTERCEPTION_CHANNEL};
use crate::commands::CommandError;
use crate::infrastructure::message_cache::CachedMessage;
use crate::infrastructure::ports::{ChatMessage, ChatReaction, OutgoingMessage};

pub const ALLOW_EMOJI: &str = "✅";
pub const BLOCK_EMOJI: &str = "❌";

const HOLD_NOTICE: &str = "Your message is being held up for examination by the GM, please wait.";
const HOLD_NOTICE_LIFETIME: Duration = Duration::from_secs(10 * 60);
const BLOCKED_NOTICE: &str = "Your message has been blocked by the GM.";

/// A character message waiting in the interception channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptedMessage {
    /// The author's own channel, for notices.
    pub channel_id: Option<ChannelId>,
    pub location_id: LocationId,
    pub character_id: CharacterId,
}

/// What gets relayed: the text and attachments of some chat message.
struct Relayed<'a> {
    text: &'a str,
    attachments: &'a [String],
    timestamp: DateTime<Utc>,
}

impl<'a> From<&'a ChatMessage> for Relayed<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            text: &message.content,
            attachments: &message.attachments,
            timestamp: message.timestamp,
        }
    }
}

impl CharacterPlugin {
    pub(super) async fn handle_message(
        &self,
        game: &Game,
        message: &ChatMessage,
    ) -> Result<(), CommandError> {
        let held = message
            .reference
            .and_then(|reference| self.intercepted.remove(&reference));
        if let Some((held_id, held)) = held {
            // A GM reply replaces the held text.
            self.release(&held, message.into()).await?;
            self.app.chat.clear_reactions(message.channel_id, held_id).await?;
            return Ok(());
        }

        let roster = &self.app.use_cases.roster;
        if let Some(author) = roster
            .find_channel_character(message.channel_id, message.author_id)
            .await?
        {
            let Some(location) = self.location_of(&author).await? else {
                return Ok(());
            };
            if author.intercept {
                return self.hold(game, &author, &location, message).await;
            }
            self.relay(Some(&author), &location, message.into()).await?;
            self.app
                .chat
                .delete_message(message.channel_id, message.id)
                .await?;
            return Ok(());
        }

        if let Some(location) = self
            .app
            .repositories
            .location
            .get_for_channel(message.channel_id)
            .await?
        {
            self.relay(None, &location, message.into()).await?;
            self.app
                .chat
                .delete_message(message.channel_id, message.id)
                .await?;
        }
        Ok(())
    }

    pub(super) async fn handle_reaction(&self, reaction: &ChatReaction) -> Result<(), CommandError> {
        let chat = self.app.chat.as_ref();
        match reaction.emoji.as_str() {
            ALLOW_EMOJI => {
                let Some((_, held)) = self.intercepted.remove(&reaction.message_id) else {
                    return Ok(());
                };
                let Some(copy) = chat
                    .fetch_message(reaction.channel_id, reaction.message_id)
                    .await?
                else {
                    tracing::warn!(message_id = %reaction.message_id, "Intercepted message disappeared");
                    return Ok(());
                };
                self.release(&held, (&copy).into()).await?;
            }
            BLOCK_EMOJI => {
                let Some((_, held)) = self.intercepted.remove(&reaction.message_id) else {
                    return Ok(());
                };
                if let Some(channel_id) = held.channel_id {
                    chat.send(channel_id, OutgoingMessage::text(BLOCKED_NOTICE))
                        .await?;
                }
                tracing::info!(character_id = %held.character_id, "Blocked intercepted message");
            }
            _ => return Ok(()),
        }
        chat.clear_reactions(reaction.channel_id, reaction.message_id)
            .await?;
        Ok(())
    }

    /// Mirrors typing so the other side knows a reply is coming.
    pub(super) async fn relay_typing(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), CommandError> {
        let characters = &self.app.repositories.character;
        let roster = &self.app.use_cases.roster;

        let (location_id, typist) = match roster.find_channel_character(channel_id, user_id).await? {
            Some(author) => match author.location_id {
                Some(location_id) => (location_id, Some(author.id)),
                None => return Ok(()),
            },
            None => match self
                .app
                .repositories
                .location
                .get_for_channel(channel_id)
                .await?
            {
                Some(location) => (location.id, None),
                None => return Ok(()),
            },
        };

        let targets: Vec<ChannelId> = characters
            .list_in_location(location_id)
            .await?
            .into_iter()
            .filter(|c| Some(c.id) != typist)
            .filter_map(|c| c.channel_id)
            .collect();
        let chat = self.app.chat.as_ref();
        for result in join_all(targets.iter().map(|&c| chat.trigger_typing(c))).await {
            if let Err(e) = result {
                tracing::debug!(error = %e, "Failed to relay typing");
            }
        }
        Ok(())
    }

    async fn location_of(&self, character: &Character) -> Result<Option<Location>, CommandError> {
        match character.location_id {
            Some(id) => Ok(self.app.repositories.location.get(id).await?),
            None => Ok(None),
        }
    }

    /// Copies a message to the whole location and remembers it for `.undo`
    /// and arrival replays.
    async fn relay(
        &self,
        author: Option<&Character>,
        location: &Location,
        relayed: Relayed<'_>,
    ) -> Result<(), CommandError> {
        let text = match author {
            Some(author) => format!("__**{}**__\n{}", author.name, relayed.text),
            None => relayed.text.to_string(),
        };
        let channels = audience(&self.app, location).await?;
        let message_ids =
            send_copies(self.app.chat.as_ref(), &channels, &text, relayed.attachments).await;

        self.app
            .message_cache
            .record(CachedMessage {
                text,
                timestamp: relayed.timestamp,
                author_id: author.map(|a| a.id),
                location_id: Some(location.id),
                message_ids,
            })
            .await?;
        Ok(())
    }

    /// Relays a held message in the name of its author.
    async fn release(&self, held: &InterceptedMessage, relayed: Relayed<'_>) -> Result<(), CommandError> {
        let author = self.app.repositories.character.get(held.character_id).await?;
        let location = self.app.repositories.location.get(held.location_id).await?;
        let (Some(author), Some(location)) = (author, location) else {
            tracing::warn!(character_id = %held.character_id, "Held message lost its author or location");
            return Ok(());
        };
        self.relay(Some(&author), &location, relayed).await
    }

    async fn hold(
        &self,
        game: &Game,
        author: &Character,
        location: &Location,
        message: &ChatMessage,
    ) -> Result<(), CommandError> {
        let chat = self.app.chat.as_ref();
        let channel = get_or_create_channel(
            chat,
            game.guild_id,
            INTERCEPTION_CHANNEL,
            INTERCEPTION_CATEGORY,
            restricted_access(chat.bot_user_id(), game),
        )
        .await?;

        chat.send(
            channel.id,
            OutgoingMessage::text(format!(
                "The following message from **{}** has been intercepted:",
                author.name
            )),
        )
        .await?;
        let copy_id = chat
            .send(
                channel.id,
                OutgoingMessage {
                    content: message.content.clone(),
                    embed: None,
                    attachments: message.attachments.clone(),
                },
            )
            .await?;
        self.intercepted.insert(
            copy_id,
            InterceptedMessage {
                channel_id: author.channel_id,
                location_id: location.id,
                character_id: author.id,
            },
        );
        tracing::info!(character_id = %author.id, message_id = %copy_id, "Intercepted message");

        chat.add_reaction(channel.id, copy_id, ALLOW_EMOJI).await?;
        chat.add_reaction(channel.id, copy_id, BLOCK_EMOJI).await?;
        let notice = chat
            .send(message.channel_id, OutgoingMessage::text(HOLD_NOTICE))
            .await?;
        chat.delete_message_after(message.channel_id, notice, HOLD_NOTICE_LIFETIME)
            .await?;
        chat.delete_message(message.channel_id, message.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Plugin;
    use crate::test_support::{message, test_now, TestApp, GUILD};
    use raconteur_domain::entities::CHARACTER_PLUGIN;
    use raconteur_domain::MessageId;

    const ADA_CHANNEL: u64 = 100;
    const BOB_CHANNEL: u64 = 101;
    const SQUARE_CHANNEL: u64 = 300;

    struct Scene {
        test: TestApp,
        plugin: CharacterPlugin,
        game: Game,
        ada: Character,
    }

    async fn scene() -> Scene {
        let test = TestApp::new().await;
        let plugin = CharacterPlugin::new(test.app.clone());
        let game = test.game(&[CHARACTER_PLUGIN]).await;
        let square = test.location("Square", Some(SQUARE_CHANNEL)).await;
        let ada = test.character(5, "Ada", Some(ADA_CHANNEL), Some(&square)).await;
        test.character(6, "Bob", Some(BOB_CHANNEL), Some(&square)).await;
        Scene {
            test,
            plugin,
            game,
            ada,
        }
    }

    #[tokio::test]
    async fn character_messages_reach_the_location() {
        let Scene { test, plugin, game, ada } = scene().await;

        plugin
            .on_message(&game, &message(50, ADA_CHANNEL, 5, "Hello there"))
            .await
            .expect("relay");

        for channel in [ADA_CHANNEL, BOB_CHANNEL, SQUARE_CHANNEL] {
            assert_eq!(
                test.chat.texts_in(ChannelId::new(channel)),
                vec!["__**Ada**__\nHello there"]
            );
        }
        assert_eq!(
            test.chat.state().deleted,
            vec![(ChannelId::new(ADA_CHANNEL), MessageId::new(50))]
        );

        let cached = test
            .app
            .message_cache
            .take_last_of_character(ada.id)
            .await
            .expect("cache")
            .expect("recorded");
        assert_eq!(cached.message_ids.len(), 3);
        assert_eq!(cached.timestamp, test_now());
    }

    #[tokio::test]
    async fn gm_location_messages_are_anonymous() {
        let Scene { test, plugin, game, .. } = scene().await;

        plugin
            .on_message(&game, &message(51, SQUARE_CHANNEL, 9, "The bells ring."))
            .await
            .expect("relay");

        assert_eq!(
            test.chat.texts_in(ChannelId::new(BOB_CHANNEL)),
            vec!["The bells ring."]
        );
        assert_eq!(test.chat.state().deleted.len(), 1);
    }

    #[tokio::test]
    async fn unrelated_channels_are_ignored() {
        let Scene { test, plugin, game, .. } = scene().await;

        // Bob writing in Ada's channel is not Ada speaking.
        plugin
            .on_message(&game, &message(52, ADA_CHANNEL, 6, "psst"))
            .await
            .expect("ignored");
        plugin
            .on_message(&game, &message(53, 777, 5, "elsewhere"))
            .await
            .expect("ignored");

        assert!(test.chat.all_texts().is_empty());
        assert!(test.chat.state().deleted.is_empty());
    }

    async fn intercept(test: &TestApp, ada: &Character) {
        let mut ada = test.reload(ada).await;
        ada.intercept = true;
        test.save_character(&ada).await;
    }

    fn held_copy(test: &TestApp) -> (ChannelId, MessageId) {
        let channel = test
            .chat
            .channel_named(INTERCEPTION_CHANNEL)
            .expect("interception channel");
        let sent = test.chat.sent_to(channel.id);
        (channel.id, sent[1].message_id)
    }

    #[tokio::test]
    async fn intercepted_messages_wait_for_approval() {
        let Scene { test, plugin, game, ada } = scene().await;
        intercept(&test, &ada).await;

        plugin
            .on_message(&game, &message(54, ADA_CHANNEL, 5, "I slip the guard a coin"))
            .await
            .expect("hold");

        let (interception, copy) = held_copy(&test);
        assert_eq!(
            test.chat.texts_in(interception),
            vec![
                "The following message from **Ada** has been intercepted:",
                "I slip the guard a coin",
            ]
        );
        assert_eq!(test.chat.texts_in(ChannelId::new(ADA_CHANNEL)), vec![HOLD_NOTICE]);
        assert!(test.chat.texts_in(ChannelId::new(BOB_CHANNEL)).is_empty());
        {
            let state = test.chat.state();
            assert_eq!(
                state.reactions,
                vec![
                    (interception, copy, ALLOW_EMOJI.to_string()),
                    (interception, copy, BLOCK_EMOJI.to_string()),
                ]
            );
            assert_eq!(state.delayed_deletes[0].2, HOLD_NOTICE_LIFETIME);
            assert!(state
                .deleted
                .contains(&(ChannelId::new(ADA_CHANNEL), MessageId::new(54))));
        }

        let approval = ChatReaction {
            guild_id: GUILD,
            channel_id: interception,
            message_id: copy,
            user_id: UserId::new(9),
            emoji: ALLOW_EMOJI.to_string(),
        };
        plugin.on_reaction(&game, &approval).await.expect("allow");

        assert_eq!(
            test.chat.texts_in(ChannelId::new(BOB_CHANNEL)),
            vec!["__**Ada**__\nI slip the guard a coin"]
        );
        assert_eq!(test.chat.state().cleared, vec![(interception, copy)]);

        // Already released, a second approval does nothing.
        plugin.on_reaction(&game, &approval).await.expect("noop");
        assert_eq!(test.chat.texts_in(ChannelId::new(BOB_CHANNEL)).len(), 1);
    }

    #[tokio::test]
    async fn gm_can_block_or_rewrite_held_messages() {
        let Scene { test, plugin, game, ada } = scene().await;
        intercept(&test, &ada).await;

        plugin
            .on_message(&game, &message(55, ADA_CHANNEL, 5, "Rude words"))
            .await
            .expect("hold");
        let (interception, copy) = held_copy(&test);
        plugin
            .on_reaction(
                &game,
                &ChatReaction {
                    guild_id: GUILD,
                    channel_id: interception,
                    message_id: copy,
                    user_id: UserId::new(9),
                    emoji: BLOCK_EMOJI.to_string(),
                },
            )
            .await
            .expect("block");
        assert_eq!(
            test.chat.texts_in(ChannelId::new(ADA_CHANNEL)).last().map(String::as_str),
            Some(BLOCKED_NOTICE)
        );
        assert!(test.chat.texts_in(ChannelId::new(BOB_CHANNEL)).is_empty());

        plugin
            .on_message(&game, &message(56, ADA_CHANNEL, 5, "Kind words?"))
            .await
            .expect("hold again");
        let copy = test.chat.sent_to(interception)[3].message_id;
        let mut reply = message(57, interception.get(), 9, "Kind words.");
        reply.reference = Some(copy);
        plugin.on_message(&game, &reply).await.expect("rewrite");

        assert_eq!(
            test.chat.texts_in(ChannelId::new(BOB_CHANNEL)),
            vec!["__**Ada**__\nKind words."]
        );
        assert!(test.chat.state().cleared.contains(&(interception, copy)));
    }

    #[tokio::test]
    async fn typing_is_mirrored_to_the_other_occupants() {
        let Scene { test, plugin, game, .. } = scene().await;

        plugin
            .on_typing(&game, ChannelId::new(ADA_CHANNEL), UserId::new(5))
            .await
            .expect("typing");
        assert_eq!(test.chat.state().typing, vec![ChannelId::new(BOB_CHANNEL)]);

        plugin
            .on_typing(&game, ChannelId::new(SQUARE_CHANNEL), UserId::new(9))
            .await
            .expect("typing");
        let typing = test.chat.state().typing.clone();
        assert_eq!(typing.len(), 3);
        assert!(typing[1..].contains(&ChannelId::new(ADA_CHANNEL)));
    }
}
