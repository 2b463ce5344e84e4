//! Umbreal, a Cortex Prime hack: named tests and actions rolled from
//! character sheets, with results picked by reaction or `.testset`/`.actionset`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use raconteur_domain::entities::UMBREAL_PLUGIN;
use raconteur_domain::game_systems::cortex::{
    choice_emoji, choice_index_for_emoji, counter_choice_message, initial_choice_message,
    roll_message, strip_choice_prompt, Contest, ContestKind, RollChoice, Side,
};
use raconteur_domain::{ChannelId, Character, Game, GuildId, MessageId, UserId};

use super::{MenuEntry, Plugin};
use crate::app::App;
use crate::commands::{Args, CommandContext, CommandError, CommandSpec, ParamKind, ParamSpec};
use crate::infrastructure::ports::{ChatReaction, OutgoingMessage};
use crate::use_cases::SheetError;

pub const WEB_MENU: &[MenuEntry] =
    &[MenuEntry::new("Umbreal", "/api/games/{guild}/umbreal").in_section("Your Data")];

const ROLL_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("name", ParamKind::Text),
    ParamSpec::collect("traits", ParamKind::Text),
];

const SET_PARAMS: [ParamSpec; 3] = [
    ParamSpec::required("name", ParamKind::Text),
    ParamSpec::required("total", ParamKind::Int),
    ParamSpec::required("effect", ParamKind::Int),
];

const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new(
        "test",
        "Runs a named Cortex Prime test. If a test with that name doesn't exist, this roll sets the \
         difficulty; otherwise, the roll tries to beat the difficulty that was previously set.",
    )
    .player()
    .params(&ROLL_PARAMS),
    CommandSpec::new(
        "action",
        "Runs a named Cortex Prime action roll. If an action with that name doesn't exist, this \
         sets the action roll; otherwise, it is the reaction roll.",
    )
    .player()
    .params(&ROLL_PARAMS),
    CommandSpec::new(
        "testset",
        "Manually sets the result of a named test, if a custom arrangement is desired.",
    )
    .player()
    .params(&SET_PARAMS),
    CommandSpec::new(
        "actionset",
        "Manually sets the result of a named action, if a custom arrangement is desired.",
    )
    .player()
    .params(&SET_PARAMS),
    CommandSpec::new(
        "pp",
        "Gains or spends some plot points. If no value is specified, shows the current number of \
         plot points.",
    )
    .player()
    .params(&[ParamSpec::optional("amount", ParamKind::Int)]),
    CommandSpec::new(
        "xp",
        "Gains or spends some XP. If no value is specified, shows the current amount of XP.",
    )
    .player()
    .params(&[ParamSpec::optional("amount", ParamKind::Int)]),
];

type ContestKey = (GuildId, String);

pub struct UmbrealPlugin {
    app: Arc<App>,
    tests: DashMap<ContestKey, Contest>,
    actions: DashMap<ContestKey, Contest>,
}

/// Which side of a contest a choice applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Initial,
    Counter,
}

impl UmbrealPlugin {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            tests: DashMap::new(),
            actions: DashMap::new(),
        }
    }

    fn contests(&self, kind: ContestKind) -> &DashMap<ContestKey, Contest> {
        match kind {
            ContestKind::Test => &self.tests,
            ContestKind::Action => &self.actions,
        }
    }

    /// The character whose sheet the invoker rolls from. A GM without one
    /// rolls as "The GM".
    async fn roller(&self, ctx: &CommandContext) -> Result<(String, Option<Character>), CommandError> {
        let character = self
            .app
            .use_cases
            .roster
            .find_channel_character(ctx.channel_id, ctx.member.id)
            .await?;
        if let Some(character) = character {
            if self.app.repositories.umbreal.get(character.id).await?.is_some() {
                return Ok((character.name.clone(), Some(character)));
            }
        }
        if ctx.permissions.is_gm {
            Ok(("The GM".to_string(), None))
        } else {
            Err(SheetError::NoUmbrealSheet.into())
        }
    }

    async fn sheet_character(&self, ctx: &CommandContext) -> Result<Character, CommandError> {
        self.app
            .use_cases
            .roster
            .find_channel_character(ctx.channel_id, ctx.member.id)
            .await?
            .ok_or_else(|| SheetError::NoUmbrealSheet.into())
    }

    async fn roll(
        &self,
        ctx: &CommandContext,
        kind: ContestKind,
        name: &str,
        specs: &[String],
    ) -> Result<(), CommandError> {
        let key = (ctx.guild_id, name.to_string());
        if let Some(contest) = self.contests(kind).get(&key) {
            if contest.initial.choice.is_none() {
                return Err(choose_first(kind));
            }
        }

        let (user_name, character) = self.roller(ctx).await?;
        let rolls = self
            .app
            .use_cases
            .sheets
            .roll_pool(ctx.guild_id, character.as_ref(), specs, self.app.random.as_ref())
            .await?;
        let side = Side::rolled(ctx.member.id, user_name, rolls);
        let botched = side.choice;
        let to_beat = self.claim_side(kind, &key, side.clone())?;
        let role = if to_beat.is_some() {
            Role::Counter
        } else {
            Role::Initial
        };
        let text = roll_message(
            &side.user_name,
            name,
            &side.rolls,
            &side.options,
            kind.set_command(),
            to_beat,
        );

        let chat = self.app.chat.as_ref();
        let message_id = match chat.send(ctx.channel_id, OutgoingMessage::text(text)).await {
            Ok(message_id) => message_id,
            Err(e) => {
                if role == Role::Initial {
                    self.contests(kind)
                        .remove_if(&key, |_, c| c.initial.message_id.is_none());
                }
                return Err(e.into());
            }
        };
        if let Some(mut contest) = self.contests(kind).get_mut(&key) {
            let contest = &mut *contest;
            let own = match role {
                Role::Initial => Some(&mut contest.initial),
                Role::Counter => contest.counter.as_mut(),
            };
            if let Some(own) = own.filter(|s| s.member_id == ctx.member.id && s.message_id.is_none()) {
                own.message_id = Some(message_id);
            }
        }

        let reactions = (0..side.options.len())
            .map(choice_emoji)
            .collect::<Vec<_>>();
        for result in join_all(
            reactions
                .iter()
                .map(|emoji| chat.add_reaction(ctx.channel_id, message_id, emoji)),
        )
        .await
        {
            result?;
        }
        tracing::debug!(guild_id = %ctx.guild_id, %kind, name, "Rolled contest side");

        // A botched counter leaves nothing to pick, the contest is decided.
        if let (Role::Counter, Some(choice)) = (role, botched) {
            if let Some((_, contest)) = self.contests(kind).remove(&key) {
                self.announce_counter(ctx.channel_id, &contest, choice).await?;
            }
        }
        Ok(())
    }

    /// Registers a rolled side in one step: a new contest, or the counter of
    /// one whose initial result is set. Returns the result to beat for a counter.
    fn claim_side(
        &self,
        kind: ContestKind,
        key: &ContestKey,
        side: Side,
    ) -> Result<Option<RollChoice>, CommandError> {
        match self.contests(kind).entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Contest::new(kind, key.1.clone(), side));
                Ok(None)
            }
            Entry::Occupied(mut slot) => {
                let contest = slot.get_mut();
                let Some(to_beat) = contest.initial.choice else {
                    return Err(choose_first(kind));
                };
                contest.counter = Some(side);
                Ok(Some(to_beat))
            }
        }
    }

    /// `.testset` and `.actionset`.
    async fn set_choice(
        &self,
        ctx: &CommandContext,
        kind: ContestKind,
        name: &str,
        choice: RollChoice,
    ) -> Result<(), CommandError> {
        let key = (ctx.guild_id, name.to_string());
        let Some(contest) = self.contests(kind).get(&key).map(|c| c.clone()) else {
            return Err(CommandError::user(format!(
                "There is no {kind} with the name `{name}`"
            )));
        };

        let member = ctx.member.id;
        let rolled_initial = contest.initial.member_id == member;
        let rolled_counter = contest
            .counter
            .as_ref()
            .is_some_and(|c| c.member_id == member);
        let role = if rolled_initial && !(rolled_counter && contest.initial.choice.is_some()) {
            Role::Initial
        } else if rolled_counter {
            Role::Counter
        } else {
            return Err(CommandError::user(match kind {
                ContestKind::Test => format!("You need to roll for test {name} first"),
                ContestKind::Action => format!("You need to roll for action `{name}` first"),
            }));
        };

        self.apply_choice(ctx.channel_id, kind, key, contest, role, choice)
            .await
    }

    async fn apply_choice(
        &self,
        channel_id: ChannelId,
        kind: ContestKind,
        key: ContestKey,
        mut contest: Contest,
        role: Role,
        choice: RollChoice,
    ) -> Result<(), CommandError> {
        let chat = self.app.chat.as_ref();
        match role {
            Role::Initial => {
                contest.initial.choice = Some(choice);
                let text = initial_choice_message(&contest.initial.user_name, &contest.name, choice);
                chat.send(channel_id, OutgoingMessage::text(text)).await?;
                self.close_choices(channel_id, contest.initial.message_id)
                    .await?;
                self.contests(kind).insert(key, contest);
            }
            Role::Counter => {
                self.contests(kind).remove(&key);
                self.announce_counter(channel_id, &contest, choice).await?;
                let message_id = contest.counter.as_ref().and_then(|c| c.message_id);
                self.close_choices(channel_id, message_id).await?;
            }
        }
        Ok(())
    }

    async fn announce_counter(
        &self,
        channel_id: ChannelId,
        contest: &Contest,
        choice: RollChoice,
    ) -> Result<(), CommandError> {
        let (Some(initial), Some(counter)) = (contest.initial.choice, contest.counter.as_ref()) else {
            return Ok(());
        };
        let text = counter_choice_message(
            contest.kind,
            &contest.name,
            &contest.initial.user_name,
            initial,
            &counter.user_name,
            choice,
        );
        self.app
            .chat
            .send(channel_id, OutgoingMessage::text(text))
            .await?;
        tracing::info!(kind = %contest.kind, name = %contest.name, "Contest resolved");
        Ok(())
    }

    /// Drops the list of choices from a roll message and its reactions.
    async fn close_choices(
        &self,
        channel_id: ChannelId,
        message_id: Option<MessageId>,
    ) -> Result<(), CommandError> {
        let Some(message_id) = message_id else {
            return Ok(());
        };
        let chat = self.app.chat.as_ref();
        match chat.fetch_message(channel_id, message_id).await? {
            Some(message) => {
                let content = strip_choice_prompt(&message.content).to_string();
                chat.edit_message(channel_id, message_id, content).await?;
                chat.clear_reactions(channel_id, message_id).await?;
            }
            None => {
                tracing::debug!(%channel_id, %message_id, "Roll message not found in this channel");
            }
        }
        Ok(())
    }

    /// The contest and side whose roll message got the reaction from its roller.
    fn find_reacted(
        &self,
        guild_id: GuildId,
        message_id: MessageId,
        user_id: UserId,
    ) -> Option<(ContestKind, ContestKey, Contest, Role)> {
        let owns = |side: &Side| side.message_id == Some(message_id) && side.member_id == user_id;
        [ContestKind::Test, ContestKind::Action]
            .into_iter()
            .find_map(|kind| {
                self.contests(kind).iter().find_map(|entry| {
                    let (key, contest) = entry.pair();
                    if key.0 != guild_id {
                        return None;
                    }
                    let role = if owns(&contest.initial) {
                        Role::Initial
                    } else if contest.counter.as_ref().is_some_and(owns) {
                        Role::Counter
                    } else {
                        return None;
                    };
                    Some((kind, key.clone(), contest.clone(), role))
                })
            })
    }
}

fn choose_first(kind: ContestKind) -> CommandError {
    CommandError::user(format!(
        "You need to choose a roll result, either by reacting to the results list or by using `.{}`.",
        kind.set_command()
    ))
}

#[async_trait]
impl Plugin for UmbrealPlugin {
    fn name(&self) -> &'static str {
        UMBREAL_PLUGIN
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
        let sheets = &self.app.use_cases.sheets;
        let reply = match command.name {
            "test" | "action" => {
                let kind = if command.name == "test" {
                    ContestKind::Test
                } else {
                    ContestKind::Action
                };
                let specs: Vec<String> = args.texts("traits").into_iter().map(str::to_string).collect();
                self.roll(ctx, kind, args.required_text("name")?, &specs)
                    .await?;
                None
            }
            "testset" | "actionset" => {
                let kind = if command.name == "testset" {
                    ContestKind::Test
                } else {
                    ContestKind::Action
                };
                let choice = RollChoice::custom(args.required_int("total")?, args.required_int("effect")?)?;
                self.set_choice(ctx, kind, args.required_text("name")?, choice)
                    .await?;
                None
            }
            "pp" => {
                let character = self.sheet_character(ctx).await?;
                Some(sheets.plot_points(&character, args.int("amount")).await?)
            }
            "xp" => {
                let character = self.sheet_character(ctx).await?;
                Some(sheets.experience(&character, args.int("amount")).await?)
            }
            _ => None,
        };
        Ok(reply.into_iter().collect())
    }

    async fn on_reaction(&self, _game: &Game, reaction: &ChatReaction) -> Result<(), CommandError> {
        let Some(index) = choice_index_for_emoji(&reaction.emoji) else {
            return Ok(());
        };
        let Some((kind, key, contest, role)) =
            self.find_reacted(reaction.guild_id, reaction.message_id, reaction.user_id)
        else {
            return Ok(());
        };
        let side = match role {
            Role::Initial => Some(&contest.initial),
            Role::Counter => contest.counter.as_ref(),
        };
        let Some(choice) = side.and_then(|s| s.options.get(index)).copied() else {
            return Ok(());
        };
        self.apply_choice(reaction.channel_id, kind, key, contest, role, choice)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestApp, GM_ROLE, GUILD, PLAYER_ROLE};
    use raconteur_domain::game_systems::DieResult;
    use raconteur_domain::{UmbrealSheet, UmbrealTrait, UmbrealTraitSet};

    const GM_CHANNEL: u64 = 1;
    const ADA_CHANNEL: u64 = 100;

    struct Table {
        test: TestApp,
        plugin: UmbrealPlugin,
        game: Game,
    }

    async fn table(dice: Vec<u32>) -> Table {
        let test = TestApp::with_random(dice).await;
        let plugin = UmbrealPlugin::new(test.app.clone());
        let game = test.game(&[UMBREAL_PLUGIN]).await;
        Table { test, plugin, game }
    }

    async fn ada_with_sheet(test: &TestApp) -> Character {
        let ada = test.character(5, "Ada", Some(ADA_CHANNEL), None).await;
        let mut sheet = UmbrealSheet::new(ada.id, GUILD);
        sheet.traits.push(UmbrealTrait {
            set: UmbrealTraitSet::Skills,
            name: "Sneak".to_string(),
            value: 4,
            description: String::new(),
        });
        test.app.repositories.umbreal.save(&sheet).await.expect("sheet");
        ada
    }

    #[tokio::test]
    async fn test_difficulty_then_player_roll() {
        let Table { test, plugin, game } = table(vec![5, 3, 9, 6]).await;
        ada_with_sheet(&test).await;
        let gm = test.chat.add_member(9, "Gia", vec![GM_ROLE]);
        let player = test.chat.add_member(5, "Ada P", vec![PLAYER_ROLE]);

        test.run(&plugin, &game, &gm, GM_CHANNEL, ".test lock 2d8")
            .await
            .expect("difficulty");
        let roll = test.chat.sent_to(ChannelId::new(GM_CHANNEL))[0].clone();
        assert!(roll
            .message
            .content
            .starts_with("**The GM** rolls for `lock`: **5** (2d8 :d8:), **3** (2d8 :d8:)."));
        assert_eq!(test.chat.state().reactions.len(), 3);

        let err = test
            .run(&plugin, &game, &player, ADA_CHANNEL, ".test lock Sneak")
            .await
            .expect_err("no choice yet");
        assert_eq!(
            err.to_string(),
            "You need to choose a roll result, either by reacting to the results list or by using `.testset`."
        );

        plugin
            .on_reaction(
                &game,
                &ChatReaction {
                    guild_id: GUILD,
                    channel_id: ChannelId::new(GM_CHANNEL),
                    message_id: roll.message_id,
                    user_id: gm.id,
                    emoji: choice_emoji(0),
                },
            )
            .await
            .expect("choose");
        assert_eq!(
            test.chat.texts_in(ChannelId::new(GM_CHANNEL))[1],
            "**The GM** sets their roll for `lock` to **8** (:d4:)."
        );
        {
            let state = test.chat.state();
            assert_eq!(state.edits[0].1, roll.message_id);
            assert!(!state.edits[0].2.contains("You can react with"));
            assert_eq!(state.cleared, vec![(ChannelId::new(GM_CHANNEL), roll.message_id)]);
        }

        test.run(&plugin, &game, &player, ADA_CHANNEL, ".test lock 1d10 Sneak")
            .await
            .expect("player roll");
        let player_roll = &test.chat.texts_in(ChannelId::new(ADA_CHANNEL))[0];
        assert!(player_roll.starts_with("**Ada** rolls for `lock`:"));
        assert!(player_roll.ends_with("The roll to beat is **8** (:d4:)"));

        test.run(&plugin, &game, &player, ADA_CHANNEL, ".testset lock 15 4")
            .await
            .expect("set");
        assert_eq!(
            test.chat.texts_in(ChannelId::new(ADA_CHANNEL))[1],
            "**Ada** sets their roll for `lock` to **15** (:d4:). This is a **heroic success** for \
             **Ada**. The effect die is stepped up to :d6:."
        );

        let err = test
            .run(&plugin, &game, &player, ADA_CHANNEL, ".testset lock 1 4")
            .await
            .expect_err("resolved");
        assert_eq!(err.to_string(), "There is no test with the name `lock`");
    }

    #[tokio::test]
    async fn action_set_requires_a_roll() {
        let Table { test, plugin, game } = table(vec![7, 2]).await;
        let gm = test.chat.add_member(9, "Gia", vec![GM_ROLE]);
        let other = test.chat.add_member(6, "Bob", vec![GM_ROLE]);

        let err = test
            .run(&plugin, &game, &gm, GM_CHANNEL, ".actionset ambush 3 6")
            .await
            .expect_err("unknown");
        assert_eq!(err.to_string(), "There is no action with the name `ambush`");

        test.run(&plugin, &game, &gm, GM_CHANNEL, ".action ambush 1d8 1d6")
            .await
            .expect("action");
        let err = test
            .run(&plugin, &game, &other, GM_CHANNEL, ".actionset ambush 3 6")
            .await
            .expect_err("not rolled");
        assert_eq!(err.to_string(), "You need to roll for action `ambush` first");

        test.run(&plugin, &game, &gm, GM_CHANNEL, ".actionset ambush 9 4")
            .await
            .expect("set");
        assert_eq!(
            test.chat.texts_in(ChannelId::new(GM_CHANNEL))[1],
            "**The GM** sets their roll for `ambush` to **9** (:d4:)."
        );
    }

    #[tokio::test]
    async fn custom_results_must_be_plausible() {
        let Table { test, plugin, game } = table(vec![5, 3]).await;
        let gm = test.chat.add_member(9, "Gia", vec![GM_ROLE]);

        test.run(&plugin, &game, &gm, GM_CHANNEL, ".test lock 2d8")
            .await
            .expect("difficulty");
        let err = test
            .run(&plugin, &game, &gm, GM_CHANNEL, ".testset lock 8 7")
            .await
            .expect_err("not a die");
        assert_eq!(err.to_string(), "Invalid dice rating: 7");
        let err = test
            .run(&plugin, &game, &gm, GM_CHANNEL, ".testset lock 9223372036854775807 4")
            .await
            .expect_err("unreachable total");
        assert_eq!(err.to_string(), "Invalid roll total: 9223372036854775807");
        assert_eq!(
            plugin.tests.get(&(GUILD, "lock".to_string())).map(|c| c.initial.choice),
            Some(None)
        );
    }

    #[tokio::test]
    async fn claiming_a_pending_contest_keeps_the_first_roll() {
        let Table { plugin, .. } = table(vec![]).await;
        let key = (GUILD, "lock".to_string());
        let die = |value| DieResult {
            name: "d8".to_string(),
            rating: 8,
            value,
        };
        let first = Side::rolled(UserId::new(9), "The GM", vec![die(5)]);
        let second = Side::rolled(UserId::new(6), "Bob", vec![die(7)]);

        assert_eq!(plugin.claim_side(ContestKind::Test, &key, first).expect("new"), None);
        let err = plugin
            .claim_side(ContestKind::Test, &key, second.clone())
            .expect_err("pending");
        assert!(err.to_string().starts_with("You need to choose a roll result"));
        assert_eq!(
            plugin.tests.get(&key).map(|c| c.initial.member_id),
            Some(UserId::new(9))
        );

        if let Some(mut contest) = plugin.tests.get_mut(&key) {
            contest.initial.choice = Some(RollChoice::new(5, 4));
        }
        assert_eq!(
            plugin.claim_side(ContestKind::Test, &key, second).expect("counter"),
            Some(RollChoice::new(5, 4))
        );
        assert_eq!(
            plugin
                .tests
                .get(&key)
                .and_then(|c| c.counter.as_ref().map(|s| s.member_id)),
            Some(UserId::new(6))
        );
    }

    #[tokio::test]
    async fn players_need_a_sheet() {
        let Table { test, plugin, game } = table(vec![4]).await;
        let player = test.chat.add_member(5, "Ada P", vec![PLAYER_ROLE]);

        let err = test
            .run(&plugin, &game, &player, ADA_CHANNEL, ".test climb 1d8")
            .await
            .expect_err("no sheet");
        assert_eq!(err.to_string(), "Failed to locate Umbreal character sheet");
        let err = test
            .run(&plugin, &game, &player, ADA_CHANNEL, ".pp")
            .await
            .expect_err("no sheet");
        assert_eq!(err.to_string(), "Failed to locate Umbreal character sheet");
    }

    #[tokio::test]
    async fn plot_points_and_experience() {
        let Table { test, plugin, game } = table(vec![4]).await;
        ada_with_sheet(&test).await;
        let player = test.chat.add_member(5, "Ada P", vec![PLAYER_ROLE]);

        let mut replies = Vec::new();
        for line in [".pp", ".pp 2", ".pp -1", ".xp 5", ".xp"] {
            let reply = test
                .run(&plugin, &game, &player, ADA_CHANNEL, line)
                .await
                .expect(line);
            replies.extend(reply);
        }
        assert_eq!(
            replies,
            vec![
                "**Ada** currently has **0** :PP:.",
                "**Ada** gains **2** :PP:.",
                "**Ada** spends **1** :PP:.",
                "**Ada** gains **5 XP**, for a new total of **5** XP.",
                "**Ada** currently has **5 XP**, with a lifetime total of **5 XP**.",
            ]
        );
    }
}
