//! Game system sheets, stored whole as JSON keyed by character.

use async_trait::async_trait;
use raconteur_domain::{CharacterId, GuildId, UmbrealSheet, UnknownArmiesSheet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use super::{map_write_error, to_sql_id};
use crate::infrastructure::ports::{RepoError, UmbrealRepo, UnknownArmiesRepo};

/// Shared JSON-per-row storage for one sheet table.
struct SheetTable {
    pool: SqlitePool,
    table: &'static str,
}

impl SheetTable {
    async fn get<T: DeserializeOwned>(&self, character_id: CharacterId) -> Result<Option<T>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT sheet_json FROM {} WHERE character_id = ?",
            self.table
        ))
        .bind(character_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database(self.table, e))?;

        row.map(|row| {
            let json: String = row.get("sheet_json");
            serde_json::from_str(&json).map_err(RepoError::serialization)
        })
        .transpose()
    }

    async fn list<T: DeserializeOwned>(&self, guild_id: GuildId) -> Result<Vec<T>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT sheet_json FROM {} WHERE guild_id = ?",
            self.table
        ))
        .bind(to_sql_id(guild_id.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database(self.table, e))?;

        rows.iter()
            .map(|row| {
                let json: String = row.get("sheet_json");
                serde_json::from_str(&json).map_err(RepoError::serialization)
            })
            .collect()
    }

    async fn save<T: Serialize + Sync>(
        &self,
        character_id: CharacterId,
        guild_id: GuildId,
        sheet: &T,
    ) -> Result<(), RepoError> {
        let json = serde_json::to_string(sheet).map_err(RepoError::serialization)?;
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (character_id, guild_id, sheet_json)
            VALUES (?, ?, ?)
            ON CONFLICT(character_id) DO UPDATE SET sheet_json = excluded.sheet_json
            "#,
            self.table
        ))
        .bind(character_id.to_string())
        .bind(to_sql_id(guild_id.get()))
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(self.table, e))?;
        Ok(())
    }

    async fn delete(&self, character_id: CharacterId) -> Result<(), RepoError> {
        sqlx::query(&format!("DELETE FROM {} WHERE character_id = ?", self.table))
            .bind(character_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database(self.table, e))?;
        Ok(())
    }
}

pub struct SqliteUmbrealRepo {
    table: SheetTable,
}

impl SqliteUmbrealRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            table: SheetTable {
                pool,
                table: "umbreal_sheets",
            },
        }
    }
}

#[async_trait]
impl UmbrealRepo for SqliteUmbrealRepo {
    async fn get(&self, character_id: CharacterId) -> Result<Option<UmbrealSheet>, RepoError> {
        self.table.get(character_id).await
    }

    async fn list_in_guild(&self, guild_id: GuildId) -> Result<Vec<UmbrealSheet>, RepoError> {
        self.table.list(guild_id).await
    }

    async fn save(&self, sheet: &UmbrealSheet) -> Result<(), RepoError> {
        self.table
            .save(sheet.character_id, sheet.guild_id, sheet)
            .await
    }

    async fn delete(&self, character_id: CharacterId) -> Result<(), RepoError> {
        self.table.delete(character_id).await
    }
}

pub struct SqliteUnknownArmiesRepo {
    table: SheetTable,
}

impl SqliteUnknownArmiesRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            table: SheetTable {
                pool,
                table: "unknown_armies_sheets",
            },
        }
    }
}

#[async_trait]
impl UnknownArmiesRepo for SqliteUnknownArmiesRepo {
    async fn get(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<UnknownArmiesSheet>, RepoError> {
        self.table.get(character_id).await
    }

    async fn list_in_guild(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<UnknownArmiesSheet>, RepoError> {
        self.table.list(guild_id).await
    }

    async fn save(&self, sheet: &UnknownArmiesSheet) -> Result<(), RepoError> {
        self.table
            .save(sheet.character_id, sheet.guild_id, sheet)
            .await
    }

    async fn delete(&self, character_id: CharacterId) -> Result<(), RepoError> {
        self.table.delete(character_id).await
    }
}
