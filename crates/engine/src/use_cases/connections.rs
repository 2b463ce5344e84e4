//! Locking and hiding the connections between locations.

use std::sync::Arc;

use raconteur_domain::entities::find_connection;
use raconteur_domain::{Character, Connection, GuildId, Location, LocationId, Permissions};

use crate::infrastructure::ports::{LocationRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Cannot {change} `{target}`: none of your characters are associated with this channel.")]
    NoChannelCharacter { change: &'static str, target: String },
    #[error("Cannot {change} `{target}`: your character isn't in any location yet.")]
    NotPlaced { change: &'static str, target: String },
    #[error("Cannot {change} `{target}`: no location bound to this channel.")]
    NoChannelLocation { change: &'static str, target: String },
    #[error("Cannot {change} `{target}`: no connection to `{target}` from here.")]
    NoConnection { change: &'static str, target: String },
    #[error("Cannot {change} `{target}`: connection is already {state}.")]
    Unchanged {
        change: &'static str,
        target: String,
        state: &'static str,
    },
    #[error("Cannot {change} `{target}`: your character does not own the right key.")]
    MissingKey { change: &'static str, target: String },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Finds the location called `name` and the connection leading there from `from`.
pub async fn route_to(
    locations: &dyn LocationRepo,
    guild_id: GuildId,
    from: LocationId,
    name: &str,
    include_hidden: bool,
) -> Result<Option<(Connection, Location)>, RepoError> {
    let Some(destination) = locations.get_by_name(guild_id, name.trim()).await? else {
        return Ok(None);
    };
    let connections = locations.connections_of(from).await?;
    Ok(find_connection(&connections, from, destination.id, include_hidden)
        .copied()
        .map(|connection| (connection, destination)))
}

/// A connection whose state changed, with both of its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionChange {
    pub connection: Connection,
    pub location_1: Location,
    pub location_2: Location,
    /// Past tense of the change, e.g. `locked`.
    pub state: &'static str,
}

impl ConnectionChange {
    /// The announcement for each end, naming the opposite one.
    pub fn announcements(&self) -> [(&Location, String); 2] {
        [
            (&self.location_1, self.announcement(&self.location_2)),
            (&self.location_2, self.announcement(&self.location_1)),
        ]
    }

    fn announcement(&self, other: &Location) -> String {
        format!("The connection to `{}` has been {}.", other.name, self.state)
    }
}

pub struct Connections {
    locations: Arc<dyn LocationRepo>,
}

impl Connections {
    pub fn new(locations: Arc<dyn LocationRepo>) -> Self {
        Self { locations }
    }

    /// Locks or unlocks the connection from the character's location. GMs may
    /// always do it, players need a key for the connection.
    pub async fn toggle_lock(
        &self,
        character: Option<&Character>,
        permissions: Permissions,
        target: &str,
        lock: bool,
    ) -> Result<ConnectionChange, ConnectionError> {
        let change = if lock { "lock" } else { "unlock" };
        let target = target.trim().to_string();

        let Some(character) = character else {
            return Err(ConnectionError::NoChannelCharacter { change, target });
        };
        let Some(from) = character.location_id else {
            return Err(ConnectionError::NotPlaced { change, target });
        };
        let Some((mut connection, _)) =
            route_to(self.locations.as_ref(), character.guild_id, from, &target, false).await?
        else {
            return Err(ConnectionError::NoConnection { change, target });
        };

        let allowed =
            permissions.is_gm || (permissions.is_player && character.has_key(connection.id));
        if !allowed {
            return Err(ConnectionError::MissingKey { change, target });
        }
        let state = if lock { "locked" } else { "unlocked" };
        if connection.locked == lock {
            return Err(ConnectionError::Unchanged {
                change,
                target,
                state,
            });
        }

        connection.locked = lock;
        self.save(connection, state).await
    }

    /// Hides or reveals a connection of the location bound to the invoking channel.
    pub async fn toggle_hidden(
        &self,
        location: Option<&Location>,
        target: &str,
        hide: bool,
    ) -> Result<ConnectionChange, ConnectionError> {
        let change = if hide { "hide" } else { "reveal" };
        let target = target.trim().to_string();

        let Some(location) = location else {
            return Err(ConnectionError::NoChannelLocation { change, target });
        };
        let Some((mut connection, _)) =
            route_to(self.locations.as_ref(), location.guild_id, location.id, &target, true)
                .await?
        else {
            return Err(ConnectionError::NoConnection { change, target });
        };

        let state = if hide { "hidden" } else { "revealed" };
        if connection.hidden == hide {
            return Err(ConnectionError::Unchanged {
                change,
                target,
                state,
            });
        }

        connection.hidden = hide;
        self.save(connection, state).await
    }

    async fn save(
        &self,
        connection: Connection,
        state: &'static str,
    ) -> Result<ConnectionChange, ConnectionError> {
        self.locations.save_connection(&connection).await?;
        let location_1 = self
            .locations
            .get(connection.location_1)
            .await?
            .ok_or_else(|| RepoError::not_found("Location", connection.location_1))?;
        let location_2 = self
            .locations
            .get(connection.location_2)
            .await?
            .ok_or_else(|| RepoError::not_found("Location", connection.location_2))?;
        tracing::info!(connection_id = %connection.id, state, "Connection changed");
        Ok(ConnectionChange {
            connection,
            location_1,
            location_2,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::MockLocationRepo;
    use raconteur_domain::{TraitKind, UserId};

    const GUILD: GuildId = GuildId::new(1);

    struct Fixture {
        hall: Location,
        cellar: Location,
        door: Connection,
    }

    fn fixture(locked: bool, hidden: bool) -> Fixture {
        let hall = Location::new(GUILD, "hall", "house", "A hall.");
        let cellar = Location::new(GUILD, "cellar", "house", "A cellar.");
        let mut door = Connection::new(hall.id, cellar.id);
        door.locked = locked;
        door.hidden = hidden;
        Fixture { hall, cellar, door }
    }

    fn repo(fixture: &Fixture, expected_saves: usize) -> MockLocationRepo {
        let mut repo = MockLocationRepo::new();
        let all = vec![fixture.hall.clone(), fixture.cellar.clone()];
        let by_id = all.clone();
        repo.expect_get_by_name()
            .returning(move |_, name| Ok(all.iter().find(|l| l.name == name).cloned()));
        repo.expect_get()
            .returning(move |id| Ok(by_id.iter().find(|l| l.id == id).cloned()));
        let door = fixture.door;
        repo.expect_connections_of()
            .returning(move |_| Ok(vec![door]));
        repo.expect_save_connection()
            .times(expected_saves)
            .returning(|_| Ok(()));
        repo
    }

    fn character_in(location: &Location) -> Character {
        let mut character = Character::new(GUILD, UserId::new(3), "Ada");
        character.location_id = Some(location.id);
        character
    }

    fn player() -> Permissions {
        Permissions {
            is_player: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn players_need_a_key_to_lock() {
        let fixture = fixture(false, false);
        let connections = Connections::new(Arc::new(repo(&fixture, 1)));
        let mut ada = character_in(&fixture.hall);

        let err = connections
            .toggle_lock(Some(&ada), player(), "cellar", true)
            .await
            .expect_err("no key");
        assert_eq!(
            err.to_string(),
            "Cannot lock `cellar`: your character does not own the right key."
        );

        ada.set_trait(TraitKind::Key, "iron key", fixture.door.id.to_string());
        let change = connections
            .toggle_lock(Some(&ada), player(), "cellar", true)
            .await
            .expect("locked");
        assert!(change.connection.locked);
        let [(first, first_text), (second, second_text)] = change.announcements();
        assert_eq!(first.name, "hall");
        assert_eq!(first_text, "The connection to `cellar` has been locked.");
        assert_eq!(second.name, "cellar");
        assert_eq!(second_text, "The connection to `hall` has been locked.");
    }

    #[tokio::test]
    async fn gm_cannot_unlock_an_open_connection() {
        let fixture = fixture(false, false);
        let connections = Connections::new(Arc::new(repo(&fixture, 0)));
        let gm = Permissions {
            is_gm: true,
            ..Default::default()
        };

        let err = connections
            .toggle_lock(Some(&character_in(&fixture.hall)), gm, "cellar", false)
            .await
            .expect_err("already unlocked");
        assert_eq!(
            err.to_string(),
            "Cannot unlock `cellar`: connection is already unlocked."
        );
    }

    #[tokio::test]
    async fn locking_needs_a_placed_channel_character() {
        let fixture = fixture(false, false);
        let connections = Connections::new(Arc::new(repo(&fixture, 0)));

        let err = connections
            .toggle_lock(None, player(), "cellar", true)
            .await
            .expect_err("no character");
        assert_eq!(
            err.to_string(),
            "Cannot lock `cellar`: none of your characters are associated with this channel."
        );

        let unplaced = Character::new(GUILD, UserId::new(3), "Ada");
        let err = connections
            .toggle_lock(Some(&unplaced), player(), "cellar", true)
            .await
            .expect_err("unplaced");
        assert_eq!(
            err.to_string(),
            "Cannot lock `cellar`: your character isn't in any location yet."
        );
    }

    #[tokio::test]
    async fn hidden_connections_cannot_be_locked_but_can_be_revealed() {
        let fixture = fixture(false, true);
        let connections = Connections::new(Arc::new(repo(&fixture, 1)));
        let gm = Permissions {
            is_gm: true,
            ..Default::default()
        };

        let err = connections
            .toggle_lock(Some(&character_in(&fixture.hall)), gm, "cellar", true)
            .await
            .expect_err("hidden");
        assert_eq!(
            err.to_string(),
            "Cannot lock `cellar`: no connection to `cellar` from here."
        );

        let err = connections
            .toggle_hidden(Some(&fixture.hall), "cellar", true)
            .await
            .expect_err("already hidden");
        assert_eq!(
            err.to_string(),
            "Cannot hide `cellar`: connection is already hidden."
        );

        let change = connections
            .toggle_hidden(Some(&fixture.cellar), "hall", false)
            .await
            .expect("revealed");
        assert!(!change.connection.hidden);
        assert_eq!(
            change.announcements()[0].1,
            "The connection to `cellar` has been revealed."
        );
    }

    #[tokio::test]
    async fn hiding_needs_a_location_channel() {
        let fixture = fixture(false, false);
        let connections = Connections::new(Arc::new(repo(&fixture, 0)));

        let err = connections
            .toggle_hidden(None, "cellar", true)
            .await
            .expect_err("no location");
        assert_eq!(
            err.to_string(),
            "Cannot hide `cellar`: no location bound to this channel."
        );
    }
}
