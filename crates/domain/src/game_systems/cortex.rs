//! Cortex Prime dice pools as played in Umbreal.
//!
//! A pool is rolled, 1s are hitches, and the player keeps one or two dice as
//! the total plus one of the remaining dice as the effect. Contests pit an
//! initial roll (a test's difficulty, or an action) against a counter roll.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{MessageId, UserId};

pub const VALID_DIE_RATINGS: [u32; 5] = [4, 6, 8, 10, 12];

/// Choices offered for one roll, one per regional indicator reaction.
pub const MAX_CHOICES: usize = 15;

/// Effect die used when nothing else is left over.
pub const FALLBACK_EFFECT: u32 = 4;

/// Dice in one pool, counting each trait as one die.
pub const MAX_POOL_DICE: u32 = 30;

/// Highest total a `.testset`/`.actionset` may claim: a full pool of d12s.
pub const MAX_CUSTOM_TOTAL: i64 = (MAX_POOL_DICE * MAX_EFFECT) as i64;

const MAX_EFFECT: u32 = 12;
const CHOICE_PROMPT: &str = "You can react with";
const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CortexError {
    #[error("Invalid dice rating: {0}")]
    InvalidRating(String),
    #[error("Invalid trait specification: {0}")]
    InvalidSpec(String),
    #[error("Invalid roll total: {0}")]
    InvalidTotal(i64),
    #[error("You can roll at most {} dice at once", MAX_POOL_DICE)]
    TooManyDice,
}

/// A single rolled die and what it was rolled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieResult {
    pub name: String,
    pub rating: u32,
    pub value: u32,
}

impl DieResult {
    pub fn is_hitch(&self) -> bool {
        self.value == 1
    }
}

/// A total and effect die picked from a roll. Orders by total, then effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RollChoice {
    pub total: i64,
    pub effect: i64,
}

impl RollChoice {
    pub const BOTCH: RollChoice = RollChoice {
        total: 0,
        effect: FALLBACK_EFFECT as i64,
    };

    pub fn new(total: i64, effect: i64) -> Self {
        Self { total, effect }
    }

    /// A result typed in by a player: the effect must be a die rating and the
    /// total must be reachable by a pool.
    pub fn custom(total: i64, effect: i64) -> Result<Self, CortexError> {
        let rating_ok = u32::try_from(effect).is_ok_and(|e| VALID_DIE_RATINGS.contains(&e));
        if !rating_ok {
            return Err(CortexError::InvalidRating(effect.to_string()));
        }
        if !(0..=MAX_CUSTOM_TOTAL).contains(&total) {
            return Err(CortexError::InvalidTotal(total));
        }
        Ok(Self { total, effect })
    }
}

impl fmt::Display for RollChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**{}** (:d{}:)", self.total, self.effect)
    }
}

/// Every one- and two-die total with the best remaining effect die, best first.
pub fn best_choices(results: &[DieResult]) -> Vec<RollChoice> {
    let valid: Vec<&DieResult> = results.iter().filter(|r| !r.is_hitch()).collect();

    let effect_without = |picked: &[usize]| {
        valid
            .iter()
            .enumerate()
            .filter(|(i, _)| !picked.contains(i))
            .map(|(_, r)| r.rating)
            .max()
            .unwrap_or(FALLBACK_EFFECT)
    };

    let mut choices = BTreeSet::new();
    for i in 0..valid.len() {
        choices.insert(RollChoice::new(
            i64::from(valid[i].value),
            i64::from(effect_without(&[i])),
        ));
        for j in (i + 1)..valid.len() {
            choices.insert(RollChoice::new(
                i64::from(valid[i].value + valid[j].value),
                i64::from(effect_without(&[i, j])),
            ));
        }
    }

    choices.into_iter().rev().take(MAX_CHOICES).collect()
}

/// One element of a roll command: raw dice or a named trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiceSpec {
    Dice { count: u32, rating: u32 },
    /// `[character]!trait`, or just `trait` for the roller's own sheet.
    Trait {
        character: Option<String>,
        name: String,
    },
}

impl DiceSpec {
    pub fn parse(spec: &str) -> Result<Self, CortexError> {
        if let Some((count, rating)) = spec.split_once('d') {
            let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            if (count.is_empty() || is_number(count)) && is_number(rating) {
                let count = if count.is_empty() {
                    Ok(1)
                } else {
                    count.parse::<u32>()
                };
                let rating = rating.parse::<u32>();
                return match (count, rating) {
                    (Ok(count), Ok(rating))
                        if VALID_DIE_RATINGS.contains(&rating) && count <= MAX_POOL_DICE =>
                    {
                        Ok(Self::Dice { count, rating })
                    }
                    _ => Err(CortexError::InvalidRating(spec.to_string())),
                };
            }
        }

        match spec.split_once('!') {
            Some((character, name)) if !name.is_empty() => Ok(Self::Trait {
                character: (!character.is_empty()).then(|| character.to_string()),
                name: name.to_string(),
            }),
            _ if !spec.is_empty() => Ok(Self::Trait {
                character: None,
                name: spec.to_string(),
            }),
            _ => Err(CortexError::InvalidSpec(spec.to_string())),
        }
    }

    /// Dice this element adds to the pool.
    pub fn dice_count(&self) -> u32 {
        match self {
            Self::Dice { count, .. } => *count,
            Self::Trait { .. } => 1,
        }
    }
}

/// Parses every element of a pool, rejecting pools above [`MAX_POOL_DICE`].
pub fn parse_pool<S: AsRef<str>>(specs: &[S]) -> Result<Vec<DiceSpec>, CortexError> {
    let mut total = 0u32;
    let mut pool = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = DiceSpec::parse(spec.as_ref())?;
        total = total.saturating_add(spec.dice_count());
        if total > MAX_POOL_DICE {
            return Err(CortexError::TooManyDice);
        }
        pool.push(spec);
    }
    Ok(pool)
}

// =============================================================================
// Contests
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContestKind {
    /// Difficulty first, then the player tries to beat it.
    Test,
    /// Action first, then the reaction.
    Action,
}

impl ContestKind {
    pub fn set_command(&self) -> &'static str {
        match self {
            Self::Test => "testset",
            Self::Action => "actionset",
        }
    }

    /// Whether the verdict is reported for the initial side.
    pub fn for_initial(&self) -> bool {
        matches!(self, Self::Action)
    }

    pub fn wins_ties(&self) -> bool {
        matches!(self, Self::Action)
    }
}

impl fmt::Display for ContestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Test => "test",
            Self::Action => "action",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub member_id: UserId,
    pub user_name: String,
    pub rolls: Vec<DieResult>,
    pub options: Vec<RollChoice>,
    pub message_id: Option<MessageId>,
    pub choice: Option<RollChoice>,
}

impl Side {
    /// A side with nothing to choose from is fixed to a botch.
    pub fn rolled(member_id: UserId, user_name: impl Into<String>, rolls: Vec<DieResult>) -> Self {
        let options = best_choices(&rolls);
        let choice = options.is_empty().then_some(RollChoice::BOTCH);
        Self {
            member_id,
            user_name: user_name.into(),
            rolls,
            options,
            message_id: None,
            choice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contest {
    pub kind: ContestKind,
    pub name: String,
    pub initial: Side,
    pub counter: Option<Side>,
}

impl Contest {
    pub fn new(kind: ContestKind, name: impl Into<String>, initial: Side) -> Self {
        Self {
            kind,
            name: name.into(),
            initial,
            counter: None,
        }
    }
}

/// Describes a roll and lists the choices to react with.
pub fn roll_message(
    user_name: &str,
    roll_name: &str,
    results: &[DieResult],
    choices: &[RollChoice],
    set_command: &str,
    to_beat: Option<RollChoice>,
) -> String {
    let dice = results
        .iter()
        .map(|r| format!("**{}** ({} :d{}:)", r.value, r.name, r.rating))
        .collect::<Vec<_>>()
        .join(", ");
    let mut text = format!("**{user_name}** rolls for `{roll_name}`: {dice}.");

    let hitches = results.iter().filter(|r| r.is_hitch()).count();
    if hitches == results.len() {
        text.push_str("\n\nThis is a **botch**. Your result is **0** :d4:.");
    } else if hitches > 0 {
        text.push_str(&format!("\n\nThere are **{hitches} hitches**. "));
    }

    if hitches < results.len() {
        text.push_str(&format!(
            "\n\n{CHOICE_PROMPT} one of the following pre-determined results, or use `.{set_command}` to specify a \
             custom result (you can include more dice in the result by spending 1 :PP: per die):\n"
        ));
        for (i, choice) in choices.iter().enumerate() {
            text.push_str(&format!("\n:{}: {choice}", choice_emoji_name(i)));
        }
        if let Some(to_beat) = to_beat {
            text.push_str(&format!("\n\nThe roll to beat is {to_beat}"));
        }
    }

    text
}

pub fn initial_choice_message(user_name: &str, roll_name: &str, choice: RollChoice) -> String {
    format!("**{user_name}** sets their roll for `{roll_name}` to {choice}.")
}

/// Announces the counter choice and who won the contest.
pub fn counter_choice_message(
    kind: ContestKind,
    roll_name: &str,
    initial_name: &str,
    initial: RollChoice,
    counter_name: &str,
    counter: RollChoice,
) -> String {
    let mut message = format!("**{counter_name}** sets their roll for `{roll_name}` to {counter}. ");
    let (diff, for_name, effect) = if kind.for_initial() {
        (initial.total.saturating_sub(counter.total), initial_name, initial.effect)
    } else {
        (counter.total.saturating_sub(initial.total), counter_name, counter.effect)
    };

    if diff >= 5 {
        let stepped = effect
            .saturating_add((diff / 5).saturating_mul(2))
            .min(i64::from(MAX_EFFECT));
        message.push_str(&format!(
            "This is a **heroic success** for **{for_name}**. The effect die is stepped up to :d{stepped}:."
        ));
    } else if diff > 0 || (kind.wins_ties() && diff == 0) {
        message.push_str(&format!(
            "This is a **success** for **{for_name}** with effect :d{effect}:."
        ));
    } else {
        message.push_str(&format!("This is a **failure** for **{for_name}**."));
    }
    message
}

/// Shortcode name of the reaction for choice `index`, e.g. `regional_indicator_a`.
pub fn choice_emoji_name(index: usize) -> String {
    let letter = char::from(b'a' + (index as u8 % 26));
    format!("regional_indicator_{letter}")
}

pub fn choice_emoji(index: usize) -> String {
    char::from_u32(REGIONAL_INDICATOR_A + index as u32)
        .map(String::from)
        .unwrap_or_default()
}

pub fn choice_index_for_emoji(emoji: &str) -> Option<usize> {
    (0..MAX_CHOICES).find(|&i| choice_emoji(i) == emoji)
}

/// Roll message content without the list of choices.
pub fn strip_choice_prompt(content: &str) -> &str {
    content
        .split(CHOICE_PROMPT)
        .next()
        .unwrap_or(content)
        .trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn die(rating: u32, value: u32) -> DieResult {
        DieResult {
            name: format!("d{rating}"),
            rating,
            value,
        }
    }

    #[test]
    fn best_choices_pair_totals_with_leftover_effect() {
        let choices = best_choices(&[die(8, 5), die(6, 4), die(10, 1)]);
        assert_eq!(
            choices,
            vec![
                RollChoice::new(9, 4),
                RollChoice::new(5, 6),
                RollChoice::new(4, 8),
            ]
        );
    }

    #[test]
    fn duplicate_choices_collapse() {
        let choices = best_choices(&[die(6, 3), die(6, 3)]);
        assert_eq!(choices, vec![RollChoice::new(6, 4), RollChoice::new(3, 6)]);
    }

    #[test]
    fn choices_are_capped() {
        let rolls: Vec<_> = (2..12).map(|v| die(12, v)).collect();
        assert_eq!(best_choices(&rolls).len(), MAX_CHOICES);
    }

    #[test]
    fn all_hitches_leave_no_choice() {
        let side = Side::rolled(UserId::new(1), "Ada", vec![die(6, 1), die(8, 1)]);
        assert!(side.options.is_empty());
        assert_eq!(side.choice, Some(RollChoice::BOTCH));
    }

    #[test]
    fn dice_specs_parse() {
        assert_eq!(
            DiceSpec::parse("2d8"),
            Ok(DiceSpec::Dice { count: 2, rating: 8 })
        );
        assert_eq!(
            DiceSpec::parse("d6"),
            Ok(DiceSpec::Dice { count: 1, rating: 6 })
        );
        assert_eq!(
            DiceSpec::parse("d7"),
            Err(CortexError::InvalidRating("d7".to_string()))
        );
        assert_eq!(
            DiceSpec::parse("Bob!Force"),
            Ok(DiceSpec::Trait {
                character: Some("Bob".to_string()),
                name: "Force".to_string()
            })
        );
        assert_eq!(
            DiceSpec::parse("!Will"),
            Ok(DiceSpec::Trait {
                character: None,
                name: "Will".to_string()
            })
        );
        assert_eq!(
            DiceSpec::parse("deftness"),
            Ok(DiceSpec::Trait {
                character: None,
                name: "deftness".to_string()
            })
        );
    }

    #[test]
    fn roll_message_lists_choices() {
        let rolls = vec![die(8, 5), die(6, 1)];
        let choices = best_choices(&rolls);
        let text = roll_message("Ada", "jump", &rolls, &choices, "testset", Some(RollChoice::new(4, 6)));
        assert!(text.starts_with("**Ada** rolls for `jump`: **5** (d8 :d8:), **1** (d6 :d6:)."));
        assert!(text.contains("There are **1 hitches**."));
        assert!(text.contains(":regional_indicator_a: **5** (:d4:)"));
        assert!(text.ends_with("The roll to beat is **4** (:d6:)"));
        assert_eq!(
            strip_choice_prompt(&text),
            "**Ada** rolls for `jump`: **5** (d8 :d8:), **1** (d6 :d6:).\n\nThere are **1 hitches**."
        );
    }

    #[test]
    fn botch_message_has_no_choices() {
        let rolls = vec![die(8, 1)];
        let text = roll_message("Ada", "jump", &rolls, &[], "testset", None);
        assert!(text.ends_with("This is a **botch**. Your result is **0** :d4:."));
        assert!(!text.contains(CHOICE_PROMPT));
    }

    #[test]
    fn test_ties_fail_for_the_player() {
        let message = counter_choice_message(
            ContestKind::Test,
            "jump",
            "The GM",
            RollChoice::new(7, 6),
            "Ada",
            RollChoice::new(7, 8),
        );
        assert!(message.ends_with("This is a **failure** for **Ada**."));
    }

    #[test]
    fn action_ties_succeed_for_the_actor() {
        let message = counter_choice_message(
            ContestKind::Action,
            "punch",
            "Ada",
            RollChoice::new(7, 6),
            "Bob",
            RollChoice::new(7, 8),
        );
        assert!(message.ends_with("This is a **success** for **Ada** with effect :d6:."));
    }

    #[test]
    fn heroic_success_steps_up_effect() {
        let message = counter_choice_message(
            ContestKind::Test,
            "jump",
            "The GM",
            RollChoice::new(3, 4),
            "Ada",
            RollChoice::new(14, 8),
        );
        assert!(message.ends_with(
            "This is a **heroic success** for **Ada**. The effect die is stepped up to :d12:."
        ));
    }

    #[test]
    fn extreme_totals_do_not_overflow() {
        let message = counter_choice_message(
            ContestKind::Test,
            "x",
            "The GM",
            RollChoice::new(-5, 4),
            "Ada",
            RollChoice::new(i64::MAX, 4),
        );
        assert!(message.ends_with("The effect die is stepped up to :d12:."));

        let message = counter_choice_message(
            ContestKind::Action,
            "x",
            "Ada",
            RollChoice::new(i64::MIN, 4),
            "Bob",
            RollChoice::new(i64::MAX, 4),
        );
        assert!(message.ends_with("This is a **failure** for **Ada**."));
    }

    #[test]
    fn custom_choices_are_bounded() {
        assert_eq!(RollChoice::custom(9, 6), Ok(RollChoice::new(9, 6)));
        assert_eq!(
            RollChoice::custom(9, 7),
            Err(CortexError::InvalidRating("7".to_string()))
        );
        assert_eq!(
            RollChoice::custom(9, -4),
            Err(CortexError::InvalidRating("-4".to_string()))
        );
        assert_eq!(
            RollChoice::custom(i64::MAX, 4),
            Err(CortexError::InvalidTotal(i64::MAX))
        );
        assert_eq!(RollChoice::custom(-1, 4), Err(CortexError::InvalidTotal(-1)));
        assert!(RollChoice::custom(MAX_CUSTOM_TOTAL, 12).is_ok());
    }

    #[test]
    fn pools_are_capped() {
        let pool = parse_pool(&["20d8", "9d6", "Strength"]).expect("thirty dice");
        assert_eq!(pool.iter().map(DiceSpec::dice_count).sum::<u32>(), MAX_POOL_DICE);

        let many: Vec<String> = (0..500).map(|_| "d6".to_string()).collect();
        assert_eq!(parse_pool(&many), Err(CortexError::TooManyDice));
        assert_eq!(
            parse_pool(&["30d8", "Strength"]).map_err(|e| e.to_string()),
            Err("You can roll at most 30 dice at once".to_string())
        );
        assert_eq!(
            DiceSpec::parse("31d8"),
            Err(CortexError::InvalidRating("31d8".to_string()))
        );
    }

    #[test]
    fn emoji_round_trip() {
        assert_eq!(choice_emoji(0), "\u{1F1E6}");
        assert_eq!(choice_index_for_emoji("\u{1F1E8}"), Some(2));
        assert_eq!(choice_index_for_emoji("\u{2705}"), None);
        assert_eq!(choice_emoji_name(1), "regional_indicator_b");
    }
}
