//! Command parameters: tokenizing the raw argument string and resolving typed values.

use std::collections::HashMap;
use std::sync::LazyLock;

use raconteur_domain::{ChannelId, GuildId, RoleId, UserId};
use regex_lite::Regex;

use super::CommandError;
use crate::infrastructure::ports::{ChannelKind, ChatChannel, ChatMember, ChatPort, ChatRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Bool,
    Int,
    Member,
    Role,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Gathers every remaining value.
    pub collect: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            collect: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            collect: false,
        }
    }

    pub const fn collect(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            collect: true,
        }
    }

    /// Converts one raw value to this parameter's type.
    pub fn parse(&self, raw: &str, guild: &GuildDirectory) -> Result<ParamValue, CommandError> {
        let clean = raw.trim().to_lowercase();
        match self.kind {
            ParamKind::Text => Ok(ParamValue::Text(raw.to_string())),
            ParamKind::Bool => match clean.as_str() {
                "true" | "1" | "on" | "yes" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "off" | "no" => Ok(ParamValue::Bool(false)),
                _ => Err(self.invalid_value(raw)),
            },
            ParamKind::Int => raw
                .parse()
                .map(ParamValue::Int)
                .map_err(|_| self.invalid_value(raw)),
            ParamKind::Member => {
                let member = match mention_id(&USER_MENTION, raw) {
                    Some(id) => guild.members.iter().find(|m| m.id == UserId::new(id)),
                    None => guild
                        .members
                        .iter()
                        .filter(|m| {
                            m.display_name.to_lowercase().starts_with(&clean)
                                || m.user_name.to_lowercase().starts_with(&clean)
                        })
                        .last(),
                };
                member.cloned().map(ParamValue::Member).ok_or_else(|| {
                    CommandError::user(format!(
                        "Failed to locate user \"{raw}\" for parameter \"{}\"",
                        self.name
                    ))
                })
            }
            ParamKind::Role => {
                let role = match mention_id(&ROLE_MENTION, raw) {
                    Some(id) => guild.roles.iter().find(|r| r.id == RoleId::new(id)),
                    None => guild
                        .roles
                        .iter()
                        .filter(|r| r.name.to_lowercase().starts_with(&clean))
                        .last(),
                };
                role.cloned().map(ParamValue::Role).ok_or_else(|| {
                    CommandError::user(format!(
                        "Failed to locate role \"{raw}\" for parameter \"{}\"",
                        self.name
                    ))
                })
            }
            ParamKind::Channel => {
                let channel = match mention_id(&CHANNEL_MENTION, raw) {
                    Some(id) => guild.channels.iter().find(|c| c.id == ChannelId::new(id)),
                    None => guild
                        .channels
                        .iter()
                        .filter(|c| {
                            c.kind == ChannelKind::Text && c.name.to_lowercase().starts_with(&clean)
                        })
                        .last(),
                };
                channel.cloned().map(ParamValue::Channel).ok_or_else(|| {
                    CommandError::user(format!(
                        "Failed to locate channel \"{raw}\" for parameter \"{}\"",
                        self.name
                    ))
                })
            }
        }
    }

    fn invalid_value(&self, raw: &str) -> CommandError {
        CommandError::user(format!(
            "Invalid value \"{raw}\" for parameter \"{}\"",
            self.name
        ))
    }
}

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?([0-9]+)>$").expect("valid regex"));
static ROLE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@&([0-9]+)>$").expect("valid regex"));
static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<#([0-9]+)>$").expect("valid regex"));

fn mention_id(pattern: &Regex, raw: &str) -> Option<u64> {
    pattern
        .captures(raw.trim())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Member(ChatMember),
    Role(ChatRole),
    Channel(ChatChannel),
    List(Vec<ParamValue>),
}

/// Guild members, roles and channels that parameters may refer to.
#[derive(Debug, Clone, Default)]
pub struct GuildDirectory {
    pub members: Vec<ChatMember>,
    pub roles: Vec<ChatRole>,
    pub channels: Vec<ChatChannel>,
}

impl GuildDirectory {
    /// Fetches only what the given parameters need.
    pub async fn load(
        chat: &dyn ChatPort,
        guild_id: GuildId,
        params: &[ParamSpec],
    ) -> Result<Self, CommandError> {
        let needs = |kind: ParamKind| params.iter().any(|p| p.kind == kind);
        let mut directory = Self::default();
        if needs(ParamKind::Member) {
            directory.members = chat.members(guild_id).await?;
        }
        if needs(ParamKind::Role) {
            directory.roles = chat.roles(guild_id).await?;
        }
        if needs(ParamKind::Channel) {
            directory.channels = chat.channels(guild_id).await?;
        }
        Ok(directory)
    }
}

/// Parsed arguments of one invocation, by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: HashMap<&'static str, ParamValue>,
}

impl Args {
    pub fn insert(&mut self, name: &'static str, value: ParamValue) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn required_text(&self, name: &str) -> Result<&str, CommandError> {
        self.text(name).ok_or_else(|| missing(name))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn required_int(&self, name: &str) -> Result<i64, CommandError> {
        self.int(name).ok_or_else(|| missing(name))
    }

    pub fn member(&self, name: &str) -> Option<&ChatMember> {
        match self.values.get(name) {
            Some(ParamValue::Member(member)) => Some(member),
            _ => None,
        }
    }

    pub fn required_member(&self, name: &str) -> Result<&ChatMember, CommandError> {
        self.member(name).ok_or_else(|| missing(name))
    }

    /// Text values of a collecting parameter, empty when none were given.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        match self.values.get(name) {
            Some(ParamValue::List(values)) => values
                .iter()
                .filter_map(|v| match v {
                    ParamValue::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            Some(ParamValue::Text(text)) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

fn missing(name: &str) -> CommandError {
    CommandError::user(format!("Missing parameter \"{name}\""))
}

/// Splits the raw argument string into the values of each declared parameter.
///
/// Values are separated by spaces and may be wrapped in double quotes. The
/// last parameter takes the rest of the string verbatim unless it collects, in
/// which case it gathers every remaining value.
pub fn split_params(params: &[ParamSpec], raw: &str) -> Result<Vec<Vec<String>>, CommandError> {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut idx = 0;
    let mut split = Vec::with_capacity(params.len());

    for (i, param) in params.iter().enumerate() {
        let is_last = i + 1 == params.len();
        let mut values = Vec::new();
        while idx < chars.len() {
            let value = if is_last && !param.collect {
                while chars[idx] == ' ' {
                    idx += 1;
                }
                let rest: String = chars[idx..].iter().collect();
                idx = chars.len();
                rest
            } else {
                next_value(&chars, &mut idx, raw)?
            };
            values.push(value);
            if !param.collect {
                break;
            }
        }

        if param.required && values.is_empty() {
            return Err(missing(param.name));
        }
        split.push(values);
    }

    Ok(split)
}

fn next_value(chars: &[char], idx: &mut usize, raw: &str) -> Result<String, CommandError> {
    while *idx < chars.len() && chars[*idx] == ' ' {
        *idx += 1;
    }

    let mut value = String::new();
    if chars.get(*idx) == Some(&'"') {
        *idx += 1;
        while *idx < chars.len() && chars[*idx] != '"' {
            value.push(chars[*idx]);
            *idx += 1;
        }
        *idx += 1;
        if *idx < chars.len() && chars[*idx] != ' ' {
            return Err(CommandError::user(format!(
                "Invalid parameters: {}",
                raw.trim()
            )));
        }
    } else {
        while *idx < chars.len() && chars[*idx] != ' ' {
            value.push(chars[*idx]);
            *idx += 1;
        }
    }
    Ok(value)
}

/// Tokenizes and converts every parameter of a command.
pub fn parse_args(
    params: &'static [ParamSpec],
    raw: &str,
    guild: &GuildDirectory,
) -> Result<Args, CommandError> {
    let mut args = Args::default();
    for (param, values) in params.iter().zip(split_params(params, raw)?) {
        if values.is_empty() {
            continue;
        }
        let value = if param.collect {
            ParamValue::List(
                values
                    .iter()
                    .map(|v| param.parse(v, guild))
                    .collect::<Result<_, _>>()?,
            )
        } else {
            param.parse(&values[0], guild)?
        };
        args.insert(param.name, value);
    }
    Ok(args)
}
