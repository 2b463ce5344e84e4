//! Unknown Armies percentile checks rolled from character sheets.

use std::sync::Arc;

use async_trait::async_trait;
use raconteur_domain::entities::UNKNOWN_ARMIES_PLUGIN;
use raconteur_domain::game_systems::unknown_armies::{perform_check, CheckRank, PercentileRoll};

use super::character::communication::broadcast;
use super::{MenuEntry, Plugin};
use crate::app::App;
use crate::commands::{Args, CommandContext, CommandError, CommandSpec, ParamKind, ParamSpec};

pub const WEB_MENU: &[MenuEntry] = &[MenuEntry::new(
    "Unknown Armies",
    "/api/games/{guild}/unknown-armies",
)
.in_section("Your Data")];

const COMMANDS: &[CommandSpec] = &[CommandSpec::new(
    "ua",
    "Rolls a dice using your stats from your character sheet. The `stat` should be the \
     approximate name of the skill or attribute you are rolling with. The `rank` optionally \
     specifies the rank of the skill check, and can be either: `m` (minor), `s` (significant, \
     default), `M` (major). The `shift` applies an optional positive or negative shift.",
)
.player()
.params(&[
    ParamSpec::required("stat", ParamKind::Text),
    ParamSpec::optional("rank", ParamKind::Text),
    ParamSpec::optional("shift", ParamKind::Int),
])];

pub struct UnknownArmiesPlugin {
    app: Arc<App>,
}

impl UnknownArmiesPlugin {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    async fn check(&self, ctx: &CommandContext, args: &Args) -> Result<Option<String>, CommandError> {
        let rank = match args.text("rank") {
            Some(code) => CheckRank::parse(code.trim())?,
            None => CheckRank::default(),
        };
        let character = self
            .app
            .use_cases
            .roster
            .channel_character(ctx.channel_id, ctx.member.id)
            .await?;
        let sheet = self
            .app
            .use_cases
            .sheets
            .unknown_armies_sheet(&character)
            .await?;

        let roll = PercentileRoll::new(self.app.random.roll(1, 100));
        let message = perform_check(
            &character.name,
            &sheet.data,
            args.required_text("stat")?,
            rank,
            args.int("shift"),
            roll,
        )?;

        let location = match character.location_id {
            Some(id) => self.app.repositories.location.get(id).await?,
            None => None,
        };
        match location {
            Some(location) => {
                broadcast(&self.app, &location, &message).await?;
                Ok(None)
            }
            None => Ok(Some(message)),
        }
    }
}

#[async_trait]
impl Plugin for UnknownArmiesPlugin {
    fn name(&self) -> &'static str {
        UNKNOWN_ARMIES_PLUGIN
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
            "ua" => Ok(self.check(ctx, &args).await?.into_iter().collect()),
            _ => Ok(Vec::new()),
        }
    }
}
