//! Runtime configuration read from the environment.

use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:raconteur.db?mode=rwc";
pub const DEFAULT_WEB_HOST: &str = "0.0.0.0";
pub const DEFAULT_WEB_PORT: u16 = 6897;
pub const DEFAULT_MESSAGE_CACHE_PATH: &str = "plugin_characters_cached_messages.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bot_token: String,
    pub web_host: String,
    pub web_port: u16,
    pub message_cache_path: PathBuf,
    /// Comma separated origins, or `*`. No CORS layer when unset.
    pub cors_allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .context("BOT_TOKEN must be set")?;
        let web_port = match lookup("WEB_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("WEB_PORT is not a valid port: {port}"))?,
            None => DEFAULT_WEB_PORT,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bot_token,
            web_host: lookup("WEB_HOST").unwrap_or_else(|| DEFAULT_WEB_HOST.into()),
            web_port,
            message_cache_path: lookup("MESSAGE_CACHE_PATH")
                .unwrap_or_else(|| DEFAULT_MESSAGE_CACHE_PATH.into())
                .into(),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}
