//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    message_cache::MessageCache,
    ports::{
        CharacterRepo, ChatPort, ClockPort, GameRepo, LocationRepo, RandomPort, UmbrealRepo,
        UnknownArmiesRepo,
    },
    sqlite::SqliteRepositories,
};
use crate::use_cases;

/// Main application state.
///
/// Holds all repositories and use cases. Shared by the chat dispatcher, the
/// plugins and the HTTP handlers (via Axum state).
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub chat: Arc<dyn ChatPort>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
    pub message_cache: Arc<MessageCache>,
}

/// Container for all repository ports.
#[derive(Clone)]
pub struct Repositories {
    pub game: Arc<dyn GameRepo>,
    pub character: Arc<dyn CharacterRepo>,
    pub location: Arc<dyn LocationRepo>,
    pub umbreal: Arc<dyn UmbrealRepo>,
    pub unknown_armies: Arc<dyn UnknownArmiesRepo>,
}

impl From<SqliteRepositories> for Repositories {
    fn from(repos: SqliteRepositories) -> Self {
        Self {
            game: repos.games,
            character: repos.characters,
            location: repos.locations,
            umbreal: repos.umbreal,
            unknown_armies: repos.unknown_armies,
        }
    }
}

/// Container for all use cases.
pub struct UseCases {
    pub game: use_cases::GameUseCases,
    pub roster: use_cases::Roster,
    pub movement: use_cases::Movement,
    pub connections: use_cases::Connections,
    pub inventory: use_cases::Inventory,
    pub sheets: use_cases::Sheets,
    pub management: use_cases::ManagementUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        repos: Repositories,
        chat: Arc<dyn ChatPort>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        message_cache: Arc<MessageCache>,
    ) -> Self {
        let use_cases = UseCases {
            game: use_cases::GameUseCases::new(repos.game.clone()),
            roster: use_cases::Roster::new(repos.character.clone()),
            movement: use_cases::Movement::new(
                repos.character.clone(),
                repos.location.clone(),
                clock.clone(),
            ),
            connections: use_cases::Connections::new(repos.location.clone()),
            inventory: use_cases::Inventory::new(repos.character.clone(), repos.location.clone()),
            sheets: use_cases::Sheets::new(
                repos.character.clone(),
                repos.umbreal.clone(),
                repos.unknown_armies.clone(),
            ),
            management: use_cases::ManagementUseCases::new(
                repos.character.clone(),
                repos.location.clone(),
                repos.umbreal.clone(),
                repos.unknown_armies.clone(),
            ),
        };

        Self {
            repositories: repos,
            use_cases,
            chat,
            clock,
            random,
            message_cache,
        }
    }
}
