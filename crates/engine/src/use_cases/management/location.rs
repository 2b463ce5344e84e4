//! Location and connection management for GMs.

use std::sync::Arc;

use raconteur_domain::{Connection, ConnectionForm, ConnectionId, GuildId, Location, LocationForm, LocationId};
use serde::Serialize;

use crate::infrastructure::ports::LocationRepo;

use super::ManagementError;

/// A location with the connections touching it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub connections: Vec<Connection>,
}

pub struct LocationManagement {
    locations: Arc<dyn LocationRepo>,
}

impl LocationManagement {
    pub fn new(locations: Arc<dyn LocationRepo>) -> Self {
        Self { locations }
    }

    pub async fn list(&self, guild_id: GuildId) -> Result<Vec<Location>, ManagementError> {
        Ok(self.locations.list_in_guild(guild_id).await?)
    }

    async fn get_in_guild(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
    ) -> Result<Location, ManagementError> {
        self.locations
            .get(location_id)
            .await?
            .filter(|l| l.guild_id == guild_id)
            .ok_or(ManagementError::NotFound)
    }

    pub async fn get(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
    ) -> Result<LocationDetail, ManagementError> {
        let location = self.get_in_guild(guild_id, location_id).await?;
        let connections = self.locations.connections_of(location.id).await?;
        Ok(LocationDetail {
            location,
            connections,
        })
    }

    async fn validate(
        &self,
        guild_id: GuildId,
        form: &LocationForm,
        current: Option<LocationId>,
    ) -> Result<(), ManagementError> {
        let mut errors = form.validate();
        if let Some(existing) = self.locations.get_by_name(guild_id, &form.name).await? {
            if Some(existing.id) != current {
                errors.push("A location with this name already exists".to_string());
            }
        }
        ManagementError::check(errors)
    }

    pub async fn create(
        &self,
        guild_id: GuildId,
        form: LocationForm,
    ) -> Result<Location, ManagementError> {
        let form = form.normalized();
        self.validate(guild_id, &form, None).await?;

        let location = Location::new(guild_id, &form.name, &form.category, &form.description);
        self.locations.save(&location).await?;
        tracing::info!(guild_id = %guild_id, location = %location.name, "Created location");
        Ok(location)
    }

    pub async fn update(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
        form: LocationForm,
    ) -> Result<Location, ManagementError> {
        let mut location = self.get_in_guild(guild_id, location_id).await?;
        let form = form.normalized();
        self.validate(guild_id, &form, Some(location_id)).await?;

        form.apply_to(&mut location);
        self.locations.save(&location).await?;
        Ok(location)
    }

    pub async fn delete(&self, guild_id: GuildId, location_id: LocationId) -> Result<(), ManagementError> {
        let location = self.get_in_guild(guild_id, location_id).await?;
        self.locations.delete(location.id).await?;
        tracing::info!(guild_id = %guild_id, location = %location.name, "Deleted location");
        Ok(())
    }

    /// Connects two distinct locations of the guild. Only one connection may join a pair.
    pub async fn add_connection(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
        other_id: LocationId,
        form: ConnectionForm,
    ) -> Result<Connection, ManagementError> {
        let location = self.get_in_guild(guild_id, location_id).await?;
        let mut errors = form.validate();

        let other = self
            .locations
            .get(other_id)
            .await?
            .filter(|l| l.guild_id == guild_id && l.id != location.id);
        match &other {
            Some(other) => {
                let exists = self
                    .locations
                    .connections_of(location.id)
                    .await?
                    .iter()
                    .any(|c| c.joins(location.id, other.id));
                if exists {
                    errors.push(format!("A connection to {} already exists", other.name));
                }
            }
            None => errors.push("Failed to locate location for connection".to_string()),
        }
        ManagementError::check(errors)?;

        let mut connection = Connection::new(location.id, other_id);
        form.apply_to(&mut connection);
        self.locations.save_connection(&connection).await?;
        Ok(connection)
    }

    async fn connection_of(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
        connection_id: ConnectionId,
    ) -> Result<Option<Connection>, ManagementError> {
        let location = self.get_in_guild(guild_id, location_id).await?;
        Ok(self
            .locations
            .connections_of(location.id)
            .await?
            .into_iter()
            .find(|c| c.id == connection_id))
    }

    pub async fn edit_connection(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
        connection_id: ConnectionId,
        form: ConnectionForm,
    ) -> Result<Connection, ManagementError> {
        let connection = self.connection_of(guild_id, location_id, connection_id).await?;
        let mut errors = Vec::new();
        if connection.is_none() {
            errors.push("Failed to locate connection".to_string());
        }
        errors.extend(form.validate());
        ManagementError::check(errors)?;

        let mut connection = connection.ok_or(ManagementError::NotFound)?;
        form.apply_to(&mut connection);
        self.locations.save_connection(&connection).await?;
        Ok(connection)
    }

    pub async fn delete_connection(
        &self,
        guild_id: GuildId,
        location_id: LocationId,
        connection_id: ConnectionId,
    ) -> Result<(), ManagementError> {
        let connection = self
            .connection_of(guild_id, location_id, connection_id)
            .await?
            .ok_or_else(|| ManagementError::Validation(vec!["Failed to locate connection".to_string()]))?;
        self.locations.delete_connection(connection.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::MockLocationRepo;
    use mockall::predicate::*;

    const GUILD: GuildId = GuildId::new(1);

    fn validation_errors(err: ManagementError) -> Vec<String> {
        match err {
            ManagementError::Validation(errors) => errors,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_reports_every_problem() {
        let mut repo = MockLocationRepo::new();
        let existing = Location::new(GUILD, "hall", "house", "A hall.");
        repo.expect_get_by_name()
            .with(eq(GUILD), eq("hall"))
            .returning(move |_, _| Ok(Some(existing.clone())));
        repo.expect_save().never();

        let errors = validation_errors(
            LocationManagement::new(Arc::new(repo))
                .create(
                    GUILD,
                    LocationForm {
                        name: "hall".to_string(),
                        category: String::new(),
                        description: "Big.".to_string(),
                    },
                )
                .await
                .expect_err("invalid"),
        );
        assert_eq!(
            errors,
            vec![
                "You must specify a category",
                "A location with this name already exists"
            ]
        );
    }

    #[tokio::test]
    async fn locations_of_other_guilds_are_hidden() {
        let foreign = Location::new(GuildId::new(2), "hall", "house", "A hall.");
        let foreign_id = foreign.id;
        let mut repo = MockLocationRepo::new();
        repo.expect_get()
            .returning(move |_| Ok(Some(foreign.clone())));
        repo.expect_delete().never();

        let err = LocationManagement::new(Arc::new(repo))
            .delete(GUILD, foreign_id)
            .await
            .expect_err("foreign");
        assert!(matches!(err, ManagementError::NotFound));
    }

    #[tokio::test]
    async fn connections_are_unique_per_pair() {
        let hall = Location::new(GUILD, "hall", "house", "A hall.");
        let cellar = Location::new(GUILD, "cellar", "house", "A cellar.");
        let (hall_id, cellar_id) = (hall.id, cellar.id);
        let existing = Connection::new(cellar.id, hall.id);

        let mut repo = MockLocationRepo::new();
        let all = vec![hall.clone(), cellar.clone()];
        repo.expect_get()
            .returning(move |id| Ok(all.iter().find(|l| l.id == id).cloned()));
        repo.expect_connections_of()
            .returning(move |_| Ok(vec![existing]));
        repo.expect_save_connection().never();
        let management = LocationManagement::new(Arc::new(repo));

        let errors = validation_errors(
            management
                .add_connection(
                    GUILD,
                    hall_id,
                    cellar_id,
                    ConnectionForm {
                        timer: -5,
                        locked: false,
                        hidden: false,
                    },
                )
                .await
                .expect_err("duplicate"),
        );
        assert_eq!(
            errors,
            vec![
                "Timer time cannot be negative",
                "A connection to cellar already exists"
            ]
        );

        let errors = validation_errors(
            management
                .add_connection(
                    GUILD,
                    hall_id,
                    hall_id,
                    ConnectionForm {
                        timer: 0,
                        locked: false,
                        hidden: false,
                    },
                )
                .await
                .expect_err("self"),
        );
        assert_eq!(errors, vec!["Failed to locate location for connection"]);
    }

    #[tokio::test]
    async fn editing_and_deleting_connections() {
        let hall = Location::new(GUILD, "hall", "house", "A hall.");
        let hall_id = hall.id;
        let door = Connection::new(hall.id, LocationId::new());
        let door_id = door.id;

        let mut repo = MockLocationRepo::new();
        repo.expect_get()
            .returning(move |_| Ok(Some(hall.clone())));
        repo.expect_connections_of()
            .returning(move |_| Ok(vec![door]));
        repo.expect_save_connection()
            .withf(|c| c.timer == 30 && c.locked)
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_delete_connection()
            .with(eq(door_id))
            .times(1)
            .returning(|_| Ok(()));
        let management = LocationManagement::new(Arc::new(repo));
        let form = ConnectionForm {
            timer: 30,
            locked: true,
            hidden: false,
        };

        let edited = management
            .edit_connection(GUILD, hall_id, door_id, form)
            .await
            .expect("edited");
        assert_eq!(edited.timer, 30);

        let errors = validation_errors(
            management
                .edit_connection(GUILD, hall_id, ConnectionId::new(), form)
                .await
                .expect_err("missing"),
        );
        assert_eq!(errors, vec!["Failed to locate connection"]);

        management
            .delete_connection(GUILD, hall_id, door_id)
            .await
            .expect("deleted");
    }
}
