//! SQLite persistence.
//!
//! One pool is shared by every repository. The schema is created on connect.
//! Chat snowflakes are stored as `INTEGER` (bit-cast to `i64`), entity ids as
//! uuid text, timestamps as RFC 3339 text and nested data as JSON text.

mod character_repo;
mod game_repo;
mod location_repo;
mod sheet_repo;

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::infrastructure::ports::RepoError;

pub use character_repo::SqliteCharacterRepo;
pub use game_repo::SqliteGameRepo;
pub use location_repo::SqliteLocationRepo;
pub use sheet_repo::{SqliteUmbrealRepo, SqliteUnknownArmiesRepo};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS games (
        guild_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        plugins_json TEXT NOT NULL,
        gm_role_id INTEGER,
        player_role_id INTEGER,
        spectator_role_id INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS characters (
        id TEXT PRIMARY KEY,
        guild_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        status TEXT,
        appearance TEXT,
        portrait TEXT,
        channel_id INTEGER UNIQUE,
        location_id TEXT,
        last_movement TEXT,
        intercept INTEGER NOT NULL DEFAULT 0,
        traits_json TEXT NOT NULL,
        UNIQUE (guild_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id TEXT PRIMARY KEY,
        guild_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        channel_id INTEGER UNIQUE,
        UNIQUE (guild_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS connections (
        id TEXT PRIMARY KEY,
        location_1 TEXT NOT NULL,
        location_2 TEXT NOT NULL,
        timer INTEGER NOT NULL DEFAULT 0,
        locked INTEGER NOT NULL DEFAULT 0,
        hidden INTEGER NOT NULL DEFAULT 0,
        UNIQUE (location_1, location_2)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS umbreal_sheets (
        character_id TEXT PRIMARY KEY,
        guild_id INTEGER NOT NULL,
        sheet_json TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS unknown_armies_sheets (
        character_id TEXT PRIMARY KEY,
        guild_id INTEGER NOT NULL,
        sheet_json TEXT NOT NULL
    )
    "#,
];

/// All SQLite repositories over a single pool.
pub struct SqliteRepositories {
    pub games: Arc<SqliteGameRepo>,
    pub characters: Arc<SqliteCharacterRepo>,
    pub locations: Arc<SqliteLocationRepo>,
    pub umbreal: Arc<SqliteUmbrealRepo>,
    pub unknown_armies: Arc<SqliteUnknownArmiesRepo>,
}

impl SqliteRepositories {
    pub async fn connect(database_url: &str) -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| RepoError::database("connect", e))?;
        ensure_schema(&pool).await?;

        Ok(Self {
            games: Arc::new(SqliteGameRepo::new(pool.clone())),
            characters: Arc::new(SqliteCharacterRepo::new(pool.clone())),
            locations: Arc::new(SqliteLocationRepo::new(pool.clone())),
            umbreal: Arc::new(SqliteUmbrealRepo::new(pool.clone())),
            unknown_armies: Arc::new(SqliteUnknownArmiesRepo::new(pool)),
        })
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::database("schema", e))?;
    }
    Ok(())
}

fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

/// Maps unique index failures to constraint violations.
fn map_write_error(operation: &'static str, e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::constraint(format!("{operation}: {}", db.message()))
        }
        _ => RepoError::database(operation, e),
    }
}

#[cfg(test)]
pub(crate) async fn test_repositories() -> (tempfile::TempDir, SqliteRepositories) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let repos = SqliteRepositories::connect(&url).await.expect("connect");
    (dir, repos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflakes_survive_the_signed_cast() {
        let big = u64::MAX - 5;
        assert_eq!(from_sql_id(to_sql_id(big)), big);
    }

    #[tokio::test]
    async fn connecting_twice_keeps_the_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("twice.db").display());
        SqliteRepositories::connect(&url).await.expect("first");
        SqliteRepositories::connect(&url).await.expect("second");
    }
}
