//! Game system sheets as used from chat: plot points, XP and dice pools.

use std::collections::HashMap;
use std::sync::Arc;

use raconteur_domain::common::fuzzy_search;
use raconteur_domain::game_systems::{parse_pool, CortexError, DiceSpec, DieResult};
use raconteur_domain::{Character, GuildId, UmbrealSheet, UmbrealTrait, UnknownArmiesSheet};

use crate::infrastructure::ports::{
    CharacterRepo, RandomPort, RepoError, UmbrealRepo, UnknownArmiesRepo,
};

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Failed to locate Umbreal character sheet")]
    NoUmbrealSheet,
    #[error("Your character **{0}** does not have an Unknown Armies sheet.")]
    NoUnknownArmiesSheet(String),
    #[error("Failed to locate character: {0}")]
    UnknownCharacter(String),
    #[error("Failed to locate trait: {0}")]
    UnknownTrait(String),
    #[error(transparent)]
    Dice(#[from] CortexError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Rollable traits grouped by character name.
#[derive(Debug, Default)]
struct TraitPools {
    by_character: HashMap<String, Vec<UmbrealTrait>>,
    own: Vec<UmbrealTrait>,
}

pub struct Sheets {
    characters: Arc<dyn CharacterRepo>,
    umbreal: Arc<dyn UmbrealRepo>,
    unknown_armies: Arc<dyn UnknownArmiesRepo>,
}

impl Sheets {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        umbreal: Arc<dyn UmbrealRepo>,
        unknown_armies: Arc<dyn UnknownArmiesRepo>,
    ) -> Self {
        Self {
            characters,
            umbreal,
            unknown_armies,
        }
    }

    pub async fn umbreal_sheet(&self, character: &Character) -> Result<UmbrealSheet, SheetError> {
        self.umbreal
            .get(character.id)
            .await?
            .ok_or(SheetError::NoUmbrealSheet)
    }

    pub async fn unknown_armies_sheet(
        &self,
        character: &Character,
    ) -> Result<UnknownArmiesSheet, SheetError> {
        self.unknown_armies
            .get(character.id)
            .await?
            .ok_or_else(|| SheetError::NoUnknownArmiesSheet(character.name.clone()))
    }

    /// Shows the plot points, or gains/spends `amount` of them. Zero only shows.
    pub async fn plot_points(&self, character: &Character, amount: Option<i64>) -> Result<String, SheetError> {
        let mut sheet = self.umbreal_sheet(character).await?;
        let name = &character.name;
        match amount.filter(|a| *a != 0) {
            None => Ok(format!("**{name}** currently has **{}** :PP:.", sheet.plot_points)),
            Some(amount) => {
                sheet.plot_points = sheet.plot_points.saturating_add(amount);
                self.umbreal.save(&sheet).await?;
                let verb = if amount > 0 { "gains" } else { "spends" };
                Ok(format!("**{name}** {verb} **{}** :PP:.", amount.unsigned_abs()))
            }
        }
    }

    /// Shows the XP, or gains/loses `amount` of it. Zero only shows.
    pub async fn experience(&self, character: &Character, amount: Option<i64>) -> Result<String, SheetError> {
        let mut sheet = self.umbreal_sheet(character).await?;
        let name = &character.name;
        let Some(amount) = amount.filter(|a| *a != 0) else {
            return Ok(format!(
                "**{name}** currently has **{} XP**, with a lifetime total of **{} XP**.",
                sheet.xp_current, sheet.xp_lifetime
            ));
        };

        sheet.gain_xp(amount);
        self.umbreal.save(&sheet).await?;
        if amount > 0 {
            Ok(format!(
                "**{name}** gains **{amount} XP**, for a new total of **{}** XP.",
                sheet.xp_current
            ))
        } else {
            Ok(format!(
                "**{name}** loses **{} XP**, for a new total of **{}** XP.",
                amount.unsigned_abs(),
                sheet.xp_current
            ))
        }
    }

    async fn trait_pools(&self, guild_id: GuildId, roller: Option<&Character>) -> Result<TraitPools, RepoError> {
        let names: HashMap<_, _> = self
            .characters
            .list_in_guild(guild_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut pools = TraitPools::default();
        for sheet in self.umbreal.list_in_guild(guild_id).await? {
            let Some(name) = names.get(&sheet.character_id) else {
                continue;
            };
            let own = roller.is_some_and(|r| r.id == sheet.character_id);
            let traits: Vec<_> = sheet
                .rollable_traits(|set| set.is_own_rollable() == own)
                .cloned()
                .collect();
            if own {
                pools.own = traits.clone();
            }
            pools.by_character.insert(name.clone(), traits);
        }
        Ok(pools)
    }

    /// Rolls every element of a Cortex pool: raw dice, the roller's own traits
    /// or another character's complications (`name!trait`).
    pub async fn roll_pool(
        &self,
        guild_id: GuildId,
        roller: Option<&Character>,
        specs: &[String],
        random: &dyn RandomPort,
    ) -> Result<Vec<DieResult>, SheetError> {
        let pool = parse_pool(specs)?;
        let pools = self.trait_pools(guild_id, roller).await?;
        let mut results = Vec::new();

        for (spec, parsed) in specs.iter().zip(pool) {
            match parsed {
                DiceSpec::Dice { count, rating } => {
                    results.extend((0..count).map(|_| DieResult {
                        name: spec.clone(),
                        rating,
                        value: random.roll(1, rating),
                    }));
                }
                DiceSpec::Trait { character, name } => {
                    let traits = match character {
                        Some(character) => {
                            let found = fuzzy_search(&character, pools.by_character.keys())
                                .ok_or_else(|| SheetError::UnknownCharacter(character.clone()))?;
                            pools
                                .by_character
                                .get(found)
                                .ok_or_else(|| SheetError::UnknownCharacter(character.clone()))?
                        }
                        None => &pools.own,
                    };
                    let found = fuzzy_search(&name, traits.iter().map(|t| t.name.as_str()))
                        .ok_or_else(|| SheetError::UnknownTrait(name.clone()))?;
                    let (trait_name, rating) = traits
                        .iter()
                        .find(|t| t.name == found)
                        .and_then(|t| t.rating().map(|r| (t.name.clone(), u32::from(r))))
                        .ok_or_else(|| SheetError::UnknownTrait(name.clone()))?;
                    results.push(DieResult {
                        name: trait_name,
                        rating,
                        value: random.roll(1, rating),
                    });
                }
            }
        }

        Ok(results)
    }
}
