//! Use cases - User story orchestration.
//!
//! Each module covers one area of the game. Plugins and HTTP handlers call
//! these instead of touching repositories directly.

pub mod connections;
pub mod game;
pub mod inventory;
pub mod management;
pub mod movement;
pub mod roster;
pub mod sheets;

// Re-export main types
pub use connections::{ConnectionChange, ConnectionError, Connections};
pub use game::{GameError, GameRole, GameUseCases};
pub use inventory::{Announcement, Inventory, InventoryError};
pub use management::{ManagementError, ManagementUseCases};
pub use movement::{MoveError, MovePlan, Movement};
pub use roster::{Roster, RosterError};
pub use sheets::{SheetError, Sheets};

use crate::commands::user_facing_errors;

user_facing_errors!(
    ConnectionError,
    GameError,
    InventoryError,
    MoveError,
    RosterError,
    SheetError,
);
