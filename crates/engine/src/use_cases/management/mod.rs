//! Management use cases for the web admin's CRUD operations.
//!
//! These keep the HTTP handlers thin: handlers check permissions, these
//! validate forms and scope every entity to its guild (and owner, for
//! player data).

use std::sync::Arc;

use crate::infrastructure::ports::{
    CharacterRepo, LocationRepo, RepoError, UmbrealRepo, UnknownArmiesRepo,
};

mod character;
mod location;
mod sheet;

pub use character::CharacterManagement;
pub use location::{LocationDetail, LocationManagement};
pub use sheet::SheetManagement;

/// Shared error type for management use cases.
#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("Failed to locate entity")]
    NotFound,
    #[error("{}", .0.join(" "))]
    Validation(Vec<String>),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ManagementError {
    /// Fails with every collected message, if any.
    pub(crate) fn check(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation(errors))
        }
    }
}

/// Container for management use cases.
pub struct ManagementUseCases {
    pub characters: CharacterManagement,
    pub locations: LocationManagement,
    pub sheets: SheetManagement,
}

impl ManagementUseCases {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        locations: Arc<dyn LocationRepo>,
        umbreal: Arc<dyn UmbrealRepo>,
        unknown_armies: Arc<dyn UnknownArmiesRepo>,
    ) -> Self {
        Self {
            characters: CharacterManagement::new(characters.clone()),
            locations: LocationManagement::new(locations),
            sheets: SheetManagement::new(characters, umbreal, unknown_armies),
        }
    }
}
