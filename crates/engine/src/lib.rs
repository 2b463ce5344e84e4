//! Raconteur Engine library.
//!
//! Everything server-side: the chat bot, its plugins and the web admin API.
//!
//! ## Structure
//!
//! - `commands/` - Command specs, argument parsing and errors
//! - `plugins/` - Feature modules enabled per game
//! - `use_cases/` - User story orchestration over the repositories
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `api/` - Chat dispatcher and HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod commands;
pub mod infrastructure;
pub mod plugins;
pub mod use_cases;

/// In-process chat and database doubles shared by the tests.
#[cfg(test)]
mod test_support;

pub use app::App;
