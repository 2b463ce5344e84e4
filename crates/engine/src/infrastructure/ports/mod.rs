//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Database access (SQLite today)
//! - The chat platform (Discord through serenity)
//! - Clock/Random (for testing)

mod chat;
mod error;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{CharacterRepo, GameRepo, LocationRepo, UmbrealRepo, UnknownArmiesRepo};

// =============================================================================
// Chat Port
// =============================================================================
pub use chat::{
    ChannelAccess, ChannelKind, ChatChannel, ChatMember, ChatMessage, ChatPort, ChatReaction,
    ChatRole, Embed, EmbedField, OutgoingMessage, OverwriteTarget,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{
    MockCharacterRepo, MockGameRepo, MockLocationRepo, MockUmbrealRepo, MockUnknownArmiesRepo,
};

#[cfg(test)]
pub use chat::MockChatPort;

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{ChatError, RepoError};
