//! Characters moving between connected locations and talking through their channels.
//!
//! Every character may be bound to a private channel. Messages written there
//! are relayed to everyone standing in the same location, and the location's
//! own channel lets the GM watch and speak. Commands cover movement, keys,
//! inventory, flags, polyhedral rolls and GM interception.

pub mod communication;
mod relay;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use futures_util::future::join_all;
use raconteur_domain::common::natural_delta;
use raconteur_domain::entities::CHARACTER_PLUGIN;
use raconteur_domain::value_objects::RollRequest;
use raconteur_domain::{ChannelId, Character, Game, LocationId, MessageId, UserId};

use self::communication::{
    audience, broadcast, get_or_create_channel, restricted_access, send_copies, send_status,
};
use self::relay::InterceptedMessage;
use super::{MenuEntry, Plugin};
use crate::api::chat::send_text;
use crate::app::App;
use crate::commands::{Args, CommandContext, CommandError, CommandSpec, ParamKind, ParamSpec};
use crate::infrastructure::ports::{ChannelKind, ChatChannel, ChatMessage, ChatReaction};
use crate::use_cases::{ConnectionChange, Inventory, MovePlan};

pub const INTERCEPTION_CHANNEL: &str = "interception";
pub const INTERCEPTION_CATEGORY: &str = "GM";

/// Cached location messages older than this are not replayed on arrival.
const RECENT_ACTIVITY_DAYS: i64 = 7;

pub const WEB_MENU: &[MenuEntry] = &[
    MenuEntry::new("Characters", "/api/games/{guild}/characters"),
    MenuEntry::new("Locations", "/api/games/{guild}/locations").in_section("Game Master"),
    MenuEntry::new("Characters", "/api/games/{guild}/characters/mine").in_section("Your Data"),
];

const PLAYER_AND_NAME: [ParamSpec; 2] = [
    ParamSpec::required("player", ParamKind::Member),
    ParamSpec::optional("name", ParamKind::Text),
];

const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new(
        "locationsync",
        "Synchronizes the locations in the database with the channels on the server.",
    )
    .gm(),
    CommandSpec::new(
        "charchannelset",
        "Sets the Discord channel bound to a specific character.",
    )
    .gm()
    .params(&PLAYER_AND_NAME),
    CommandSpec::new(
        "charchannelunset",
        "Unsets the Discord channel bound to a specific character.",
    )
    .gm()
    .params(&PLAYER_AND_NAME),
    CommandSpec::new(
        "status",
        "Displays the current status of the room if no value is provided. Otherwise, sets your \
         character's status message to that value (maximum 200 characters).",
    )
    .player()
    .params(&[ParamSpec::optional("status", ParamKind::Text)]),
    CommandSpec::new(
        "undo",
        "Deletes the most-recently sent message. Can only be used once before sending a new message.",
    )
    .player(),
    CommandSpec::new(
        "move",
        "Moves your character to another location. If location is not specified, lists possible \
         destinations instead.",
    )
    .player()
    .params(&[ParamSpec::optional("location", ParamKind::Text)]),
    CommandSpec::new(
        "moveforce",
        "Moves a player's character to another location, even if there are no connections to it.",
    )
    .gm()
    .params(&[
        ParamSpec::required("location", ParamKind::Text),
        ParamSpec::required("player", ParamKind::Member),
        ParamSpec::optional("name", ParamKind::Text),
    ]),
    CommandSpec::new(
        "keygive",
        "Gives a key to the named character between the two specified locations. The name must be \
         unique for that character.",
    )
    .gm()
    .params(&[
        ParamSpec::required("key_name", ParamKind::Text),
        ParamSpec::required("location_1", ParamKind::Text),
        ParamSpec::required("location_2", ParamKind::Text),
        ParamSpec::required("player", ParamKind::Member),
        ParamSpec::optional("character_name", ParamKind::Text),
    ]),
    CommandSpec::new("keyremove", "Removes a character's key by its name.")
        .gm()
        .params(&[
            ParamSpec::required("key_name", ParamKind::Text),
            ParamSpec::required("player", ParamKind::Member),
            ParamSpec::optional("character_name", ParamKind::Text),
        ]),
    CommandSpec::new("lock", "Locks the connection to a location.")
        .params(&[ParamSpec::required("location", ParamKind::Text)]),
    CommandSpec::new("unlock", "Unlocks the connection to a location.")
        .params(&[ParamSpec::required("location", ParamKind::Text)]),
    CommandSpec::new("hide", "Hides the connection to a location.")
        .gm()
        .params(&[ParamSpec::required("location", ParamKind::Text)]),
    CommandSpec::new("reveal", "Reveals the connection to a location.")
        .gm()
        .params(&[ParamSpec::required("location", ParamKind::Text)]),
    CommandSpec::new("inventory", "Lists the items held in your inventory.").player(),
    CommandSpec::new(
        "pickup",
        "Picks up an item with the name and description of your choice and puts it in your inventory.",
    )
    .player()
    .params(&[
        ParamSpec::required("name", ParamKind::Text),
        ParamSpec::required("description", ParamKind::Text),
    ]),
    CommandSpec::new("drop", "Drops an item held in your inventory.")
        .player()
        .params(&[ParamSpec::required("name", ParamKind::Text)]),
    CommandSpec::new(
        "flag",
        "Sets a character's flag to an arbitrary value. Flags do nothing on their own, but can be \
         used to enable conditional descriptions of locations or store arbitrary data for other \
         plugins to use.",
    )
    .gm()
    .params(&[
        ParamSpec::required("name", ParamKind::Text),
        ParamSpec::required("value", ParamKind::Text),
        ParamSpec::required("player", ParamKind::Member),
        ParamSpec::optional("character_name", ParamKind::Text),
    ]),
    CommandSpec::new("d100", "Rolls a d100."),
    CommandSpec::new("d10", "Rolls a d10."),
    CommandSpec::new(
        "roll",
        "Rolls a set of standard polyhedral dice (d4, d6, d8, d10, d12, d20, d100). Example: 1d6 3d8",
    )
    .params(&[ParamSpec::required("dice", ParamKind::Text)]),
    CommandSpec::new(
        "intercept",
        "Toggles a character's messages for interception by the GM.",
    )
    .gm()
    .params(&PLAYER_AND_NAME),
];

pub struct CharacterPlugin {
    app: Arc<App>,
    /// Held messages, keyed by their copy in the interception channel.
    intercepted: DashMap<MessageId, InterceptedMessage>,
}

impl CharacterPlugin {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            intercepted: DashMap::new(),
        }
    }

    async fn channel_character(&self, ctx: &CommandContext) -> Result<Character, CommandError> {
        Ok(self
            .app
            .use_cases
            .roster
            .channel_character(ctx.channel_id, ctx.member.id)
            .await?)
    }

    async fn implicit_character(
        &self,
        ctx: &CommandContext,
        args: &Args,
        name_param: &str,
    ) -> Result<Character, CommandError> {
        let player = args.required_member("player")?;
        Ok(self
            .app
            .use_cases
            .roster
            .implicit_character(ctx.guild_id, player.id, args.text(name_param))
            .await?)
    }

    async fn interception_channel(&self, game: &Game) -> Result<ChatChannel, CommandError> {
        let chat = self.app.chat.as_ref();
        Ok(get_or_create_channel(
            chat,
            game.guild_id,
            INTERCEPTION_CHANNEL,
            INTERCEPTION_CATEGORY,
            restricted_access(chat.bot_user_id(), game),
        )
        .await?)
    }

    // =========================================================================
    // Locations and channels
    // =========================================================================

    async fn location_sync(&self, ctx: &CommandContext) -> Result<Vec<String>, CommandError> {
        let mut responses = vec!["Syncing character channels with database".to_string()];
        let chat = self.app.chat.as_ref();
        let access = restricted_access(chat.bot_user_id(), &ctx.game);
        let mut channels = chat.channels(ctx.guild_id).await?;
        let live: HashSet<ChannelId> = channels.iter().map(|c| c.id).collect();

        let mut created = Vec::new();
        for mut location in self
            .app
            .repositories
            .location
            .list_in_guild(ctx.guild_id)
            .await?
        {
            if location.channel_id.is_some_and(|id| live.contains(&id)) {
                continue;
            }
            let existing_category = channels
                .iter()
                .find(|c| c.kind == ChannelKind::Category && c.name == location.category)
                .cloned();
            let category = match existing_category {
                Some(category) => category,
                None => {
                    let category = chat
                        .create_channel(
                            ctx.guild_id,
                            &location.category,
                            ChannelKind::Category,
                            None,
                            access.clone(),
                        )
                        .await?;
                    channels.push(category.clone());
                    category
                }
            };
            let channel = chat
                .create_channel(
                    ctx.guild_id,
                    &location.name,
                    ChannelKind::Text,
                    Some(category.id),
                    access.clone(),
                )
                .await?;
            location.channel_id = Some(channel.id);
            self.app.repositories.location.save(&location).await?;
            created.push(channel.id);
        }

        if !created.is_empty() {
            tracing::info!(guild_id = %ctx.guild_id, count = created.len(), "Created location channels");
            let lines: String = created.iter().map(|id| format!("\n- <#{id}>")).collect();
            responses.push(format!("Created the following channels:{lines}"));
        }
        responses.push("Sync complete".to_string());
        Ok(responses)
    }

    async fn status(&self, ctx: &CommandContext, status: Option<&str>) -> Result<(), CommandError> {
        let character = self.channel_character(ctx).await?;
        match status {
            None => send_status(&self.app, &character).await,
            Some(status) => Ok(self
                .app
                .use_cases
                .roster
                .set_status(character, status)
                .await?),
        }
    }

    async fn undo(&self, ctx: &CommandContext) -> Result<String, CommandError> {
        let character = self.channel_character(ctx).await?;
        let Some(cached) = self
            .app
            .message_cache
            .take_last_of_character(character.id)
            .await?
        else {
            return Ok(
                "Failed to locate a message to delete. Have you already deleted your latest message?"
                    .to_string(),
            );
        };

        let chat = self.app.chat.as_ref();
        let deletions = cached
            .message_ids
            .iter()
            .map(|&(channel_id, message_id)| chat.delete_message(channel_id, message_id));
        for result in join_all(deletions).await {
            if let Err(e) = result {
                tracing::warn!(character_id = %character.id, error = %e, "Failed to delete relayed copy");
            }
        }
        Ok("Your latest message has been removed.".to_string())
    }

    // =========================================================================
    // Movement
    // =========================================================================

    async fn move_to(
        &self,
        ctx: &CommandContext,
        target: Option<&str>,
    ) -> Result<Option<String>, CommandError> {
        let character = self.channel_character(ctx).await?;
        let movement = &self.app.use_cases.movement;
        match target.map(str::trim).filter(|t| !t.is_empty()) {
            None => Ok(Some(movement.destinations(&character).await?)),
            Some(target) => {
                let plan = movement.plan(character, target).await?;
                self.move_character(plan).await?;
                Ok(None)
            }
        }
    }

    async fn move_force(&self, ctx: &CommandContext, args: &Args) -> Result<String, CommandError> {
        let target = args.required_text("location")?.trim();
        let character = self.implicit_character(ctx, args, "name").await?;
        let plan = self
            .app
            .use_cases
            .movement
            .plan_forced(character, target)
            .await?;
        let name = plan.character.name.clone();
        self.move_character(plan).await?;
        Ok(format!("Force moved {name} to `{target}`"))
    }

    /// Commits the move, tells both locations and shows the arrival to the mover.
    async fn move_character(&self, mut plan: MovePlan) -> Result<(), CommandError> {
        self.app.use_cases.movement.commit(&mut plan).await?;
        let character = &plan.character;
        let chat = self.app.chat.as_ref();

        if let Some(from) = &plan.from {
            let mut channels = audience(&self.app, from).await?;
            if let Some(own) = character.channel_id {
                channels.insert(0, own);
            }
            let text = format!("**{}** moves to `{}`", character.name, plan.to.name);
            send_copies(chat, &channels, &text, &[]).await;
        }

        let arrival = match &plan.from {
            Some(from) => format!("**{}** moves in from `{}`", character.name, from.name),
            None => format!("**{}** appears", character.name),
        };
        let channels: Vec<ChannelId> = audience(&self.app, &plan.to)
            .await?
            .into_iter()
            .filter(|c| Some(*c) != character.channel_id)
            .collect();
        send_copies(chat, &channels, &arrival, &[]).await;

        send_status(&self.app, character).await?;
        self.replay_recent_activity(character, plan.to.id).await
    }

    async fn replay_recent_activity(
        &self,
        character: &Character,
        location_id: LocationId,
    ) -> Result<(), CommandError> {
        let Some(channel_id) = character.channel_id else {
            return Ok(());
        };
        let now = self.app.clock.now();
        let recent = self
            .app
            .message_cache
            .recent_in_location(location_id, now - Duration::days(RECENT_ACTIVITY_DAYS))
            .await;
        let Some(last) = recent.last() else {
            return Ok(());
        };

        let texts: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
        let text = format!(
            "_*Recent activity (last message sent {} ago):*_\n\n{}",
            natural_delta(now - last.timestamp),
            texts.join("\n\n")
        );
        send_text(self.app.chat.as_ref(), channel_id, &text, &[]).await?;
        Ok(())
    }

    // =========================================================================
    // Connections
    // =========================================================================

    async fn toggle_lock(&self, ctx: &CommandContext, target: &str, lock: bool) -> Result<(), CommandError> {
        let character = self
            .app
            .use_cases
            .roster
            .find_channel_character(ctx.channel_id, ctx.member.id)
            .await?;
        let change = self
            .app
            .use_cases
            .connections
            .toggle_lock(character.as_ref(), ctx.permissions, target, lock)
            .await?;
        self.announce_change(&change).await
    }

    async fn toggle_hidden(&self, ctx: &CommandContext, target: &str, hide: bool) -> Result<(), CommandError> {
        let location = self
            .app
            .repositories
            .location
            .get_for_channel(ctx.channel_id)
            .await?;
        let change = self
            .app
            .use_cases
            .connections
            .toggle_hidden(location.as_ref(), target, hide)
            .await?;
        self.announce_change(&change).await
    }

    async fn announce_change(&self, change: &ConnectionChange) -> Result<(), CommandError> {
        for (location, text) in change.announcements() {
            broadcast(&self.app, location, &text).await?;
        }
        Ok(())
    }

    async fn announce_in(&self, location_id: LocationId, text: &str) -> Result<(), CommandError> {
        if let Some(location) = self.app.repositories.location.get(location_id).await? {
            broadcast(&self.app, &location, text).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Dice
    // =========================================================================

    /// From a location channel the GM rolls for everyone to see; a placed
    /// character's roll is broadcast to its location; anything else is a reply.
    async fn roll(&self, ctx: &CommandContext, dice: &str) -> Result<Option<String>, CommandError> {
        let request = RollRequest::parse(dice)?;
        let random = self.app.random.as_ref();
        let outcome = request.roll_with(|min, max| random.roll(min, max));

        let locations = &self.app.repositories.location;
        if let Some(location) = locations.get_for_channel(ctx.channel_id).await? {
            broadcast(&self.app, &location, &format!("**The GM** {outcome}")).await?;
            return Ok(None);
        }
        if let Some(character) = self
            .app
            .use_cases
            .roster
            .find_channel_character(ctx.channel_id, ctx.member.id)
            .await?
        {
            if let Some(location_id) = character.location_id {
                if let Some(location) = locations.get(location_id).await? {
                    broadcast(&self.app, &location, &format!("**{}** {outcome}", character.name))
                        .await?;
                    return Ok(None);
                }
            }
        }
        Ok(Some(format!("**{}** {outcome}", ctx.member.display_name)))
    }

    async fn intercept(&self, ctx: &CommandContext, args: &Args) -> Result<String, CommandError> {
        let character = self.implicit_character(ctx, args, "name").await?;
        let character = self.app.use_cases.roster.toggle_intercept(character).await?;
        let channel = self.interception_channel(&ctx.game).await?;
        tracing::info!(
            character_id = %character.id,
            intercept = character.intercept,
            "Toggled interception"
        );

        if character.intercept {
            Ok(format!(
                "**{}**'s messages are now being intercepted in <#{}>:\n\
                 - React to a message with :white_check_mark: to allow it\n\
                 - React to a message with :x: to block it\n\
                 - Reply to a message to replace the original text with the new text in your reply.",
                character.name, channel.id
            ))
        } else {
            Ok(format!(
                "**{}**'s messages are no longer being intercepted.",
                character.name
            ))
        }
    }
}

#[async_trait]
impl Plugin for CharacterPlugin {
    fn name(&self) -> &'static str {
        CHARACTER_PLUGIN
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
        let roster = &self.app.use_cases.roster;
        let inventory = &self.app.use_cases.inventory;

        let reply = match command.name {
            "locationsync" => return self.location_sync(ctx).await,
            "charchannelset" => {
                let character = self.implicit_character(ctx, &args, "name").await?;
                Some(roster.bind_channel(character, ctx.channel_id).await?)
            }
            "charchannelunset" => {
                let character = self.implicit_character(ctx, &args, "name").await?;
                Some(roster.unbind_channel(character).await?)
            }
            "status" => {
                self.status(ctx, args.text("status")).await?;
                None
            }
            "undo" => Some(self.undo(ctx).await?),
            "move" => self.move_to(ctx, args.text("location")).await?,
            "moveforce" => Some(self.move_force(ctx, &args).await?),
            "keygive" => {
                let character = self.implicit_character(ctx, &args, "character_name").await?;
                Some(
                    inventory
                        .give_key(
                            ctx.guild_id,
                            character,
                            args.required_text("key_name")?,
                            args.required_text("location_1")?,
                            args.required_text("location_2")?,
                        )
                        .await?,
                )
            }
            "keyremove" => {
                let character = self.implicit_character(ctx, &args, "character_name").await?;
                Some(
                    inventory
                        .remove_key(character, args.required_text("key_name")?)
                        .await?,
                )
            }
            "lock" | "unlock" => {
                let target = args.required_text("location")?;
                self.toggle_lock(ctx, target, command.name == "lock").await?;
                None
            }
            "hide" | "reveal" => {
                let target = args.required_text("location")?;
                self.toggle_hidden(ctx, target, command.name == "hide").await?;
                None
            }
            "inventory" => Some(Inventory::describe(&self.channel_character(ctx).await?)),
            "pickup" => {
                let character = self.channel_character(ctx).await?;
                let announcement = inventory
                    .pickup(
                        character,
                        args.required_text("name")?,
                        args.required_text("description")?,
                    )
                    .await?;
                self.announce_in(announcement.location_id, &announcement.text)
                    .await?;
                None
            }
            "drop" => {
                let character = self.channel_character(ctx).await?;
                let announcement = inventory
                    .drop(character, args.required_text("name")?)
                    .await?;
                self.announce_in(announcement.location_id, &announcement.text)
                    .await?;
                None
            }
            "flag" => {
                let character = self.implicit_character(ctx, &args, "character_name").await?;
                Some(
                    roster
                        .set_flag(
                            character,
                            args.required_text("name")?,
                            args.required_text("value")?,
                        )
                        .await?,
                )
            }
            "roll" => self.roll(ctx, args.required_text("dice")?).await?,
            "d100" => self.roll(ctx, "1d100").await?,
            "d10" => self.roll(ctx, "1d10").await?,
            "intercept" => Some(self.intercept(ctx, &args).await?),
            _ => None,
        };
        Ok(reply.into_iter().collect())
    }

    async fn on_message(&self, game: &Game, message: &ChatMessage) -> Result<(), CommandError> {
        self.handle_message(game, message).await
    }

    async fn on_typing(
        &self,
        _game: &Game,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), CommandError> {
        self.relay_typing(channel_id, user_id).await
    }

    async fn on_reaction(&self, _game: &Game, reaction: &ChatReaction) -> Result<(), CommandError> {
        self.handle_reaction(reaction).await
    }
}
