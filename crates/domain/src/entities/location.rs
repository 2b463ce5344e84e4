//! Locations and the undirected connections between them.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, ConnectionId, GuildId, LocationId};

pub const LOCATION_NAME_MAX_LENGTH: usize = 60;
pub const LOCATION_CATEGORY_MAX_LENGTH: usize = 60;
pub const LOCATION_DESCRIPTION_MAX_LENGTH: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub guild_id: GuildId,
    pub name: String,
    pub category: String,
    /// Template rendered for each character that views the location.
    pub description: String,
    pub channel_id: Option<ChannelId>,
}

impl Location {
    pub fn new(
        guild_id: GuildId,
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: LocationId::new(),
            guild_id,
            name: name.into(),
            category: category.into(),
            description: description.into(),
            channel_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub location_1: LocationId,
    pub location_2: LocationId,
    /// Seconds a character must wait after moving before using this connection.
    pub timer: i64,
    pub locked: bool,
    pub hidden: bool,
}

impl Connection {
    pub fn new(location_1: LocationId, location_2: LocationId) -> Self {
        Self {
            id: ConnectionId::new(),
            location_1,
            location_2,
            timer: 0,
            locked: false,
            hidden: false,
        }
    }

    pub fn touches(&self, location: LocationId) -> bool {
        self.location_1 == location || self.location_2 == location
    }

    /// The far end of the connection as seen from `location`.
    pub fn other_end(&self, location: LocationId) -> Option<LocationId> {
        if self.location_1 == location {
            Some(self.location_2)
        } else if self.location_2 == location {
            Some(self.location_1)
        } else {
            None
        }
    }

    pub fn joins(&self, a: LocationId, b: LocationId) -> bool {
        (self.location_1 == a && self.location_2 == b) || (self.location_1 == b && self.location_2 == a)
    }
}

/// Finds the connection joining `from` and `to`, skipping hidden ones unless asked.
pub fn find_connection(
    connections: &[Connection],
    from: LocationId,
    to: LocationId,
    include_hidden: bool,
) -> Option<&Connection> {
    connections
        .iter()
        .find(|c| (include_hidden || !c.hidden) && c.joins(from, to))
}

/// Editable fields of a location from the web admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationForm {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl LocationForm {
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
        }
    }

    /// Field-level checks. Name uniqueness is checked by the caller.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("You must specify a name".to_string());
        }
        if self.name.chars().count() > LOCATION_NAME_MAX_LENGTH {
            errors.push(format!(
                "Location name is too long (must be {LOCATION_NAME_MAX_LENGTH} characters or less)"
            ));
        }
        if !is_valid_location_name(&self.name) {
            errors.push(
                "Location name must consist only of lowercase letters, numbers and dashes".to_string(),
            );
        }
        if self.category.is_empty() {
            errors.push("You must specify a category".to_string());
        }
        if self.category.chars().count() > LOCATION_CATEGORY_MAX_LENGTH {
            errors.push(format!(
                "Location category is too long (must be {LOCATION_CATEGORY_MAX_LENGTH} characters or less)"
            ));
        }
        if self.description.is_empty() {
            errors.push("You must specify a description".to_string());
        }
        if self.description.chars().count() > LOCATION_DESCRIPTION_MAX_LENGTH {
            errors.push(format!(
                "Location description is too long (must be {LOCATION_DESCRIPTION_MAX_LENGTH} characters or less)"
            ));
        }
        errors
    }

    pub fn apply_to(&self, location: &mut Location) {
        location.name = self.name.clone();
        location.category = self.category.clone();
        location.description = self.description.clone();
    }
}

/// Location names double as channel names: lowercase letters, digits and dashes.
pub fn is_valid_location_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Connection settings from the web admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionForm {
    #[serde(default)]
    pub timer: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl ConnectionForm {
    pub fn validate(&self) -> Vec<String> {
        if self.timer < 0 {
            vec!["Timer time cannot be negative".to_string()]
        } else {
            Vec::new()
        }
    }

    pub fn apply_to(&self, connection: &mut Connection) {
        connection.timer = self.timer;
        connection.locked = self.locked;
        connection.hidden = self.hidden;
    }
}
