//! Raconteur domain: game records, characters, the location graph and the
//! dice rule engines.
//!
//! Everything here is pure. Persistence, chat and HTTP live in
//! `raconteur-engine`, which talks to this crate through plain values.

extern crate self as raconteur_domain;

pub mod common;
pub mod entities;
pub mod error;
pub mod game_systems;
pub mod ids;
pub mod value_objects;

pub use entities::{
    Character, CharacterForm, CharacterTrait, Connection, ConnectionForm, Game, GamePlugin,
    Location, LocationForm, Permissions, TraitKind, UmbrealSheet, UmbrealSheetForm, UmbrealTrait,
    UmbrealTraitSet, UnknownArmiesSheet, UnknownArmiesSheetData,
};
pub use error::DomainError;
pub use ids::{
    ChannelId, CharacterId, ConnectionId, GuildId, LocationId, MessageId, RoleId, UserId,
};
