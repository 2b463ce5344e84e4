//! Raconteur - Main entry point.
//!
//! `raconteur bot` runs the Discord bot, `raconteur web` serves the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raconteur_engine::api::{self, Dispatcher, WebState};
use raconteur_engine::app::App;
use raconteur_engine::infrastructure::{
    clock::{SystemClock, SystemRandom},
    config::AppConfig,
    discord::{gateway_intents, DiscordChat, DiscordHandler},
    message_cache::MessageCache,
    sqlite::SqliteRepositories,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Bot,
    Web,
}

impl Component {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            Some("bot") => Ok(Self::Bot),
            Some("web") => Ok(Self::Web),
            other => bail!(
                "Invalid component \"{}\", must be one of: \"bot\", \"web\"",
                other.unwrap_or_default()
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let _ = dotenvy::from_filename(filename);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "raconteur_engine=debug,raconteur=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let component = Component::parse(std::env::args().nth(1).as_deref())?;
    let config = AppConfig::from_env()?;
    tracing::info!(component = ?component, "Starting Raconteur");

    let repos = SqliteRepositories::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    let chat = Arc::new(DiscordChat::connect(&config.bot_token).await?);
    let message_cache = Arc::new(MessageCache::load(&config.message_cache_path).await);

    let app = Arc::new(App::new(
        repos.into(),
        chat,
        Arc::new(SystemClock::new()),
        Arc::new(SystemRandom::new()),
        message_cache,
    ));

    match component {
        Component::Bot => run_bot(app, &config).await,
        Component::Web => run_web(app, &config).await,
    }
}

async fn run_bot(app: Arc<App>, config: &AppConfig) -> anyhow::Result<()> {
    let handler = DiscordHandler::new(Arc::new(Dispatcher::new(app)));
    serenity::Client::builder(&config.bot_token, gateway_intents())
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}

async fn run_web(app: Arc<App>, config: &AppConfig) -> anyhow::Result<()> {
    let mut router = api::routes()
        .with_state(WebState::new(app))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = config.cors_allowed_origins.as_deref().and_then(build_cors_layer) {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn build_cors_layer(allowed_origins: &str) -> Option<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // The admin frontend sends X-User-Id and JSON bodies, which trigger preflights.
        .allow_headers([
            HeaderName::from_static("x-user-id"),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        return None;
    }
    Some(cors.allow_origin(origins))
}
