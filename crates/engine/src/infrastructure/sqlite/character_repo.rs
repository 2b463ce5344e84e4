use async_trait::async_trait;
use raconteur_domain::common::parse_datetime;
use raconteur_domain::{ChannelId, Character, CharacterId, GuildId, LocationId, UserId};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use super::{from_sql_id, map_write_error, to_sql_id};
use crate::infrastructure::ports::{CharacterRepo, RepoError};

pub struct SqliteCharacterRepo {
    pool: SqlitePool,
}

impl SqliteCharacterRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_many<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Result<Vec<Character>, RepoError> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("characters", e))?;
        rows.iter().map(row_to_character).collect()
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, RepoError> {
    raw.parse()
        .map_err(|_| RepoError::serialization(format!("invalid id: {raw}")))
}

fn row_to_character(row: &SqliteRow) -> Result<Character, RepoError> {
    let id: String = row.get("id");
    let location_id: Option<String> = row.get("location_id");
    let last_movement: Option<String> = row.get("last_movement");
    let traits_json: String = row.get("traits_json");

    Ok(Character {
        id: parse_id(&id)?,
        guild_id: GuildId::new(from_sql_id(row.get("guild_id"))),
        member_id: UserId::new(from_sql_id(row.get("member_id"))),
        name: row.get("name"),
        status: row.get("status"),
        appearance: row.get("appearance"),
        portrait: row.get("portrait"),
        channel_id: row
            .get::<Option<i64>, _>("channel_id")
            .map(|id| ChannelId::new(from_sql_id(id))),
        location_id: location_id.as_deref().map(parse_id::<LocationId>).transpose()?,
        last_movement: last_movement
            .as_deref()
            .map(|s| parse_datetime(s).map_err(RepoError::serialization))
            .transpose()?,
        intercept: row.get("intercept"),
        traits: serde_json::from_str(&traits_json).map_err(RepoError::serialization)?,
    })
}

#[async_trait]
impl CharacterRepo for SqliteCharacterRepo {
    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError> {
        let row = sqlx::query("SELECT * FROM characters WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("characters", e))?;
        row.as_ref().map(row_to_character).transpose()
    }

    async fn save(&self, character: &Character) -> Result<(), RepoError> {
        let traits_json =
            serde_json::to_string(&character.traits).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO characters (
                id, guild_id, member_id, name, status, appearance, portrait,
                channel_id, location_id, last_movement, intercept, traits_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                member_id = excluded.member_id,
                name = excluded.name,
                status = excluded.status,
                appearance = excluded.appearance,
                portrait = excluded.portrait,
                channel_id = excluded.channel_id,
                location_id = excluded.location_id,
                last_movement = excluded.last_movement,
                intercept = excluded.intercept,
                traits_json = excluded.traits_json
            "#,
        )
        .bind(character.id.to_string())
        .bind(to_sql_id(character.guild_id.get()))
        .bind(to_sql_id(character.member_id.get()))
        .bind(&character.name)
        .bind(&character.status)
        .bind(&character.appearance)
        .bind(&character.portrait)
        .bind(character.channel_id.map(|c| to_sql_id(c.get())))
        .bind(character.location_id.map(|l| l.to_string()))
        .bind(character.last_movement.map(|t| t.to_rfc3339()))
        .bind(character.intercept)
        .bind(traits_json)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("characters", e))?;

        Ok(())
    }

    async fn delete(&self, id: CharacterId) -> Result<(), RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("characters", e))?;
        for statement in [
            "DELETE FROM umbreal_sheets WHERE character_id = ?",
            "DELETE FROM unknown_armies_sheets WHERE character_id = ?",
            "DELETE FROM characters WHERE id = ?",
        ] {
            sqlx::query(statement)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("characters", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| RepoError::database("characters", e))
    }

    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<Character>, RepoError> {
        self.fetch_many(
            sqlx::query("SELECT * FROM characters WHERE guild_id = ? ORDER BY name")
                .bind(to_sql_id(guild_id.get())),
        )
        .await
    }

    async fn list_of_member(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Vec<Character>, RepoError> {
        self.fetch_many(
            sqlx::query("SELECT * FROM characters WHERE guild_id = ? AND member_id = ? ORDER BY name")
                .bind(to_sql_id(guild_id.get()))
                .bind(to_sql_id(member_id.get())),
        )
        .await
    }

    async fn list_in_location(&self, location_id: LocationId) -> Result<Vec<Character>, RepoError> {
        self.fetch_many(
            sqlx::query("SELECT * FROM characters WHERE location_id = ? ORDER BY name")
                .bind(location_id.to_string()),
        )
        .await
    }

    async fn get_for_channel(&self, channel_id: ChannelId) -> Result<Option<Character>, RepoError> {
        let row = sqlx::query("SELECT * FROM characters WHERE channel_id = ?")
            .bind(to_sql_id(channel_id.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("characters", e))?;
        row.as_ref().map(row_to_character).transpose()
    }
}
