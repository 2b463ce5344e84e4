//! Domain entities - Core business objects with identity

mod character;
mod game;
mod location;
mod umbreal;
mod unknown_armies;

pub use character::{
    is_valid_flag_name, Character, CharacterForm, CharacterTrait, TraitKind,
    CHARACTER_APPEARANCE_MAX_LENGTH, CHARACTER_NAME_MAX_LENGTH, CHARACTER_STATUS_MAX_LENGTH,
};
pub use game::{
    Game, GamePlugin, Permissions, CHARACTER_PLUGIN, CORE_PLUGIN, UMBREAL_PLUGIN,
    UNKNOWN_ARMIES_PLUGIN,
};
pub use location::{
    find_connection, is_valid_location_name, Connection, ConnectionForm, Location, LocationForm,
    LOCATION_CATEGORY_MAX_LENGTH, LOCATION_DESCRIPTION_MAX_LENGTH, LOCATION_NAME_MAX_LENGTH,
};
pub use umbreal::{
    value_for_rating, DistinctionForm, Lawbreak, LawbreakForm, TraitForm, UmbrealSheet,
    UmbrealSheetForm, UmbrealTrait, UmbrealTraitSet, ATTRIBUTES, POWERS, SKILLS,
};
pub use unknown_armies::{
    Madness, UaAbility, UaSkill, UnknownArmiesSheet, UnknownArmiesSheetData,
};
