//! Chat commands: declaration, tokenizing and permission gates.
//!
//! Plugins declare their commands as `const` [`CommandSpec`] tables. The
//! dispatcher matches an invocation against those tables, parses the raw
//! parameter string with [`parse_args`] and hands the typed [`Args`] to the
//! owning plugin.

mod context;
mod params;

use std::fmt;

use raconteur_domain::game_systems::{CheckError, CortexError};
use raconteur_domain::value_objects::DiceParseError;
use raconteur_domain::{DomainError, Permissions};

use crate::infrastructure::ports::{ChatError, RepoError};

pub use context::CommandContext;
pub use params::{parse_args, split_params, Args, GuildDirectory, ParamKind, ParamSpec, ParamValue};

pub const COMMAND_PREFIX: char = '.';

pub fn is_possible_command(content: &str) -> bool {
    content.starts_with(COMMAND_PREFIX)
}

/// Splits `.name rest of line` into the command name and its raw parameters.
pub fn parse_invocation(content: &str) -> Option<(&str, &str)> {
    let body = content.strip_prefix(COMMAND_PREFIX)?;
    Some(body.split_once(' ').unwrap_or((body, "")))
}

/// Static description of a chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub requires_gm: bool,
    pub requires_player: bool,
    pub params: &'static [ParamSpec],
}

impl CommandSpec {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            requires_gm: false,
            requires_player: false,
            params: &[],
        }
    }

    pub const fn gm(mut self) -> Self {
        self.requires_gm = true;
        self
    }

    pub const fn player(mut self) -> Self {
        self.requires_player = true;
        self
    }

    pub const fn params(mut self, params: &'static [ParamSpec]) -> Self {
        self.params = params;
        self
    }

    pub fn is_available_to(&self, permissions: Permissions) -> bool {
        (!self.requires_gm || permissions.is_gm) && (!self.requires_player || permissions.is_player)
    }

    pub fn check_permissions(&self, permissions: Permissions) -> Result<(), CommandError> {
        if self.is_available_to(permissions) {
            Ok(())
        } else {
            Err(CommandError::user(format!(
                "Insufficient permissions to use command `{COMMAND_PREFIX}{}`",
                self.name
            )))
        }
    }
}

/// The help line shown by `.help`.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut line = format!("**`{COMMAND_PREFIX}{}`**", self.name);
        for param in self.params {
            let star = if param.required { "" } else { "*" };
            line.push_str(&format!("` `{star}`{}`{star}", param.name));
            if param.collect {
                line.push_str("`...`");
            }
        }
        write!(f, "{}: {}", line.replace("``", ""), self.help)
    }
}

/// Why a command could not be completed.
///
/// `User` errors are shown to the invoker verbatim; everything else is logged
/// and reported as an unknown error.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    User(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

impl CommandError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl From<CortexError> for CommandError {
    fn from(err: CortexError) -> Self {
        Self::User(err.to_string())
    }
}

impl From<CheckError> for CommandError {
    fn from(err: CheckError) -> Self {
        Self::User(err.to_string())
    }
}

impl From<DiceParseError> for CommandError {
    fn from(err: DiceParseError) -> Self {
        Self::User(err.to_string())
    }
}

impl From<DomainError> for CommandError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) => Self::User(message),
            other => Self::User(other.to_string()),
        }
    }
}

/// Converts a use-case error into a [`CommandError`]: its `Repo` variant stays
/// internal, every other variant is shown to the invoker.
macro_rules! user_facing_errors {
    ($($error:ident),+ $(,)?) => {
        $(
            impl From<$error> for $crate::commands::CommandError {
                fn from(err: $error) -> Self {
                    match err {
                        $error::Repo(e) => Self::Repo(e),
                        other => Self::User(other.to_string()),
                    }
                }
            }
        )+
    };
}
pub(crate) use user_facing_errors;

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE: CommandSpec = CommandSpec::new(
        "move",
        "Moves your character to another location.",
    )
    .player()
    .params(&[ParamSpec::optional("location", ParamKind::Text)]);

    const KEYGIVE: CommandSpec = CommandSpec::new("keygive", "Gives a key.")
        .gm()
        .params(&[
            ParamSpec::required("key", ParamKind::Text),
            ParamSpec::required("player", ParamKind::Member),
            ParamSpec::optional("name", ParamKind::Text),
        ]);

    const TEST: CommandSpec = CommandSpec::new("test", "Rolls a test.").params(&[
        ParamSpec::required("name", ParamKind::Text),
        ParamSpec::collect("dice", ParamKind::Text),
    ]);

    #[test]
    fn invocation_splits_on_first_space() {
        assert_eq!(parse_invocation(".help"), Some(("help", "")));
        assert_eq!(
            parse_invocation(".move town square"),
            Some(("move", "town square"))
        );
        assert_eq!(parse_invocation("hello"), None);
        assert!(is_possible_command(".x"));
        assert!(!is_possible_command(" .x"));
    }

    #[test]
    fn help_lines_mark_optional_and_collecting_params() {
        assert_eq!(
            MOVE.to_string(),
            "**`.move`**` `*`location`*: Moves your character to another location."
        );
        assert_eq!(
            KEYGIVE.to_string(),
            "**`.keygive`**` key player `*`name`*: Gives a key."
        );
        assert_eq!(TEST.to_string(), "**`.test`**` name `*`dice`*`...`: Rolls a test.");
        assert_eq!(
            CommandSpec::new("help", "Shows help.").to_string(),
            "**`.help`**: Shows help."
        );
    }

    #[test]
    fn permission_gates() {
        let gm = Permissions {
            is_gm: true,
            ..Default::default()
        };
        let player = Permissions {
            is_player: true,
            ..Default::default()
        };

        assert!(KEYGIVE.check_permissions(gm).is_ok());
        assert_eq!(
            KEYGIVE.check_permissions(player).expect_err("gm only").to_string(),
            "Insufficient permissions to use command `.keygive`"
        );
        assert!(MOVE.is_available_to(player));
        assert!(!MOVE.is_available_to(gm));
        assert!(TEST.is_available_to(Permissions::default()));
    }

    #[test]
    fn domain_errors_are_user_facing() {
        let err: CommandError = DomainError::validation("You must specify a name").into();
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "You must specify a name");

        let err: CommandError = DomainError::invalid_id("not-a-uuid").into();
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "Invalid ID format: not-a-uuid");

        let err: CommandError = RepoError::database("games", "locked").into();
        assert!(!err.is_user_facing());
    }
}
