use async_trait::async_trait;
use raconteur_domain::{Game, GuildId, RoleId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{from_sql_id, map_write_error, to_sql_id};
use crate::infrastructure::ports::{GameRepo, RepoError};

pub struct SqliteGameRepo {
    pool: SqlitePool,
}

impl SqliteGameRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_game(row: &SqliteRow) -> Result<Game, RepoError> {
    let plugins_json: String = row.get("plugins_json");
    let role = |column: &str| row.get::<Option<i64>, _>(column).map(|id| RoleId::new(from_sql_id(id)));
    Ok(Game {
        guild_id: GuildId::new(from_sql_id(row.get("guild_id"))),
        name: row.get("name"),
        plugins: serde_json::from_str(&plugins_json).map_err(RepoError::serialization)?,
        gm_role_id: role("gm_role_id"),
        player_role_id: role("player_role_id"),
        spectator_role_id: role("spectator_role_id"),
    })
}

#[async_trait]
impl GameRepo for SqliteGameRepo {
    async fn get(&self, guild_id: GuildId) -> Result<Option<Game>, RepoError> {
        let row = sqlx::query("SELECT * FROM games WHERE guild_id = ?")
            .bind(to_sql_id(guild_id.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("games", e))?;
        row.as_ref().map(row_to_game).transpose()
    }

    async fn list(&self) -> Result<Vec<Game>, RepoError> {
        let rows = sqlx::query("SELECT * FROM games ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("games", e))?;
        rows.iter().map(row_to_game).collect()
    }

    async fn save(&self, game: &Game) -> Result<(), RepoError> {
        let plugins_json = serde_json::to_string(&game.plugins).map_err(RepoError::serialization)?;
        let role = |id: Option<RoleId>| id.map(|r| to_sql_id(r.get()));

        sqlx::query(
            r#"
            INSERT INTO games (guild_id, name, plugins_json, gm_role_id, player_role_id, spectator_role_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                name = excluded.name,
                plugins_json = excluded.plugins_json,
                gm_role_id = excluded.gm_role_id,
                player_role_id = excluded.player_role_id,
                spectator_role_id = excluded.spectator_role_id
            "#,
        )
        .bind(to_sql_id(game.guild_id.get()))
        .bind(&game.name)
        .bind(plugins_json)
        .bind(role(game.gm_role_id))
        .bind(role(game.player_role_id))
        .bind(role(game.spectator_role_id))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("games", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::test_repositories;
    use raconteur_domain::entities::UMBREAL_PLUGIN;

    #[tokio::test]
    async fn saves_and_updates_games() {
        let (_dir, repos) = test_repositories().await;
        let mut game = Game::new(GuildId::new(u64::MAX), "Harbour");
        repos.games.save(&game).await.expect("save");

        game.gm_role_id = Some(RoleId::new(7));
        game.enable_plugin(UMBREAL_PLUGIN);
        game.plugin_mut(UMBREAL_PLUGIN)
            .expect("plugin")
            .settings
            .insert("difficulty".to_string(), serde_json::json!(8));
        repos.games.save(&game).await.expect("update");

        let loaded = repos
            .games
            .get(GuildId::new(u64::MAX))
            .await
            .expect("get")
            .expect("game");
        assert_eq!(loaded, game);
        assert_eq!(repos.games.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unknown_guild_has_no_game() {
        let (_dir, repos) = test_repositories().await;
        assert!(repos.games.get(GuildId::new(1)).await.expect("get").is_none());
    }
}
