//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod discord;
pub mod message_cache;
pub mod ports;
pub mod sqlite;
