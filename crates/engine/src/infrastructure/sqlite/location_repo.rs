use async_trait::async_trait;
use raconteur_domain::{ChannelId, Connection, ConnectionId, GuildId, Location, LocationId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{from_sql_id, map_write_error, to_sql_id};
use crate::infrastructure::ports::{LocationRepo, RepoError};

pub struct SqliteLocationRepo {
    pool: SqlitePool,
}

impl SqliteLocationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_id<T: std::str::FromStr>(row: &SqliteRow, column: &str) -> Result<T, RepoError> {
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|_| RepoError::serialization(format!("invalid {column}: {raw}")))
}

fn row_to_location(row: &SqliteRow) -> Result<Location, RepoError> {
    Ok(Location {
        id: parse_id(row, "id")?,
        guild_id: GuildId::new(from_sql_id(row.get("guild_id"))),
        name: row.get("name"),
        category: row.get("category"),
        description: row.get("description"),
        channel_id: row
            .get::<Option<i64>, _>("channel_id")
            .map(|id| ChannelId::new(from_sql_id(id))),
    })
}

fn row_to_connection(row: &SqliteRow) -> Result<Connection, RepoError> {
    Ok(Connection {
        id: parse_id(row, "id")?,
        location_1: parse_id(row, "location_1")?,
        location_2: parse_id(row, "location_2")?,
        timer: row.get("timer"),
        locked: row.get("locked"),
        hidden: row.get("hidden"),
    })
}

#[async_trait]
impl LocationRepo for SqliteLocationRepo {
    async fn get(&self, id: LocationId) -> Result<Option<Location>, RepoError> {
        let row = sqlx::query("SELECT * FROM locations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        row.as_ref().map(row_to_location).transpose()
    }

    async fn save(&self, location: &Location) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, guild_id, name, category, description, channel_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                description = excluded.description,
                channel_id = excluded.channel_id
            "#,
        )
        .bind(location.id.to_string())
        .bind(to_sql_id(location.guild_id.get()))
        .bind(&location.name)
        .bind(&location.category)
        .bind(&location.description)
        .bind(location.channel_id.map(|c| to_sql_id(c.get())))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("locations", e))?;

        Ok(())
    }

    async fn delete(&self, id: LocationId) -> Result<(), RepoError> {
        let id = id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        sqlx::query("DELETE FROM connections WHERE location_1 = ? OR location_2 = ?")
            .bind(&id)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        sqlx::query("UPDATE characters SET location_id = NULL WHERE location_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        tx.commit()
            .await
            .map_err(|e| RepoError::database("locations", e))
    }

    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<Location>, RepoError> {
        let rows = sqlx::query("SELECT * FROM locations WHERE guild_id = ? ORDER BY name")
            .bind(to_sql_id(guild_id.get()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        rows.iter().map(row_to_location).collect()
    }

    async fn get_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<Location>, RepoError> {
        let row = sqlx::query("SELECT * FROM locations WHERE guild_id = ? AND name = ?")
            .bind(to_sql_id(guild_id.get()))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        row.as_ref().map(row_to_location).transpose()
    }

    async fn get_for_channel(&self, channel_id: ChannelId) -> Result<Option<Location>, RepoError> {
        let row = sqlx::query("SELECT * FROM locations WHERE channel_id = ?")
            .bind(to_sql_id(channel_id.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("locations", e))?;
        row.as_ref().map(row_to_location).transpose()
    }

    async fn connections_of(&self, location_id: LocationId) -> Result<Vec<Connection>, RepoError> {
        let id = location_id.to_string();
        let rows = sqlx::query("SELECT * FROM connections WHERE location_1 = ? OR location_2 = ? ORDER BY rowid")
            .bind(&id)
            .bind(&id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("connections", e))?;
        rows.iter().map(row_to_connection).collect()
    }

    async fn get_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RepoError> {
        let row = sqlx::query("SELECT * FROM connections WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("connections", e))?;
        row.as_ref().map(row_to_connection).transpose()
    }

    async fn save_connection(&self, connection: &Connection) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO connections (id, location_1, location_2, timer, locked, hidden)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                timer = excluded.timer,
                locked = excluded.locked,
                hidden = excluded.hidden
            "#,
        )
        .bind(connection.id.to_string())
        .bind(connection.location_1.to_string())
        .bind(connection.location_2.to_string())
        .bind(connection.timer)
        .bind(connection.locked)
        .bind(connection.hidden)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("connections", e))?;

        Ok(())
    }

    async fn delete_connection(&self, id: ConnectionId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("connections", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::CharacterRepo;
    use crate::infrastructure::sqlite::test_repositories;
    use raconteur_domain::{Character, UserId};

    fn location(guild: GuildId, name: &str) -> Location {
        Location::new(guild, name, "town", "A place.")
    }

    #[tokio::test]
    async fn finds_locations_by_name_and_channel() {
        let (_dir, repos) = test_repositories().await;
        let guild = GuildId::new(1);
        let mut square = location(guild, "square");
        square.channel_id = Some(ChannelId::new(55));
        repos.locations.save(&square).await.expect("save");

        let by_name = repos.locations.get_by_name(guild, "square").await.expect("get");
        assert_eq!(by_name, Some(square.clone()));
        assert!(repos
            .locations
            .get_by_name(GuildId::new(2), "square")
            .await
            .expect("get")
            .is_none());
        let by_channel = repos
            .locations
            .get_for_channel(ChannelId::new(55))
            .await
            .expect("get");
        assert_eq!(by_channel.map(|l| l.id), Some(square.id));
    }

    #[tokio::test]
    async fn connections_are_found_from_either_end() {
        let (_dir, repos) = test_repositories().await;
        let guild = GuildId::new(1);
        let a = location(guild, "a");
        let b = location(guild, "b");
        repos.locations.save(&a).await.expect("save");
        repos.locations.save(&b).await.expect("save");

        let mut connection = Connection::new(a.id, b.id);
        connection.timer = 30;
        repos.locations.save_connection(&connection).await.expect("save");
        connection.locked = true;
        repos.locations.save_connection(&connection).await.expect("update");

        assert_eq!(repos.locations.connections_of(a.id).await.expect("list"), vec![connection]);
        assert_eq!(repos.locations.connections_of(b.id).await.expect("list"), vec![connection]);

        repos.locations.delete_connection(connection.id).await.expect("delete");
        assert!(repos.locations.connections_of(a.id).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn deleting_a_location_cleans_up() {
        let (_dir, repos) = test_repositories().await;
        let guild = GuildId::new(1);
        let a = location(guild, "a");
        let b = location(guild, "b");
        repos.locations.save(&a).await.expect("save");
        repos.locations.save(&b).await.expect("save");
        repos
            .locations
            .save_connection(&Connection::new(a.id, b.id))
            .await
            .expect("save");
        let mut ada = Character::new(guild, UserId::new(2), "Ada");
        ada.location_id = Some(a.id);
        repos.characters.save(&ada).await.expect("save");

        repos.locations.delete(a.id).await.expect("delete");

        assert!(repos.locations.get(a.id).await.expect("get").is_none());
        assert!(repos.locations.connections_of(b.id).await.expect("list").is_empty());
        let ada = repos.characters.get(ada.id).await.expect("get").expect("ada");
        assert_eq!(ada.location_id, None);
    }
}
