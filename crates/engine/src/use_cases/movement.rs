//! Moving characters along connections, or anywhere when the GM forces it.

use std::sync::Arc;

use raconteur_domain::common::format_remaining;
use raconteur_domain::{Character, Location};

use super::connections::route_to;
use crate::infrastructure::ports::{CharacterRepo, ClockPort, LocationRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("Cannot move: your character isn't in any location yet.")]
    NotPlaced,
    #[error("Cannot move to `{target}`: no connection from `{from}`.")]
    NoConnection { target: String, from: String },
    #[error("Cannot move to `{target}`: `{destination}` is locked off.")]
    Locked { target: String, destination: String },
    #[error("Cannot move to `{target}`: {remaining} left before you can move there.")]
    Cooldown { target: String, remaining: String },
    #[error("Cannot force move **{character}** to `{target}`: unknown location.")]
    UnknownLocation { character: String, target: String },
    #[error("Cannot force move **{character}** to `{target}`: character is already in that location.")]
    AlreadyThere { character: String, target: String },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// A validated move, applied with [`Movement::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    pub character: Character,
    pub from: Option<Location>,
    pub to: Location,
}

pub struct Movement {
    characters: Arc<dyn CharacterRepo>,
    locations: Arc<dyn LocationRepo>,
    clock: Arc<dyn ClockPort>,
}

impl Movement {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        locations: Arc<dyn LocationRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            characters,
            locations,
            clock,
        }
    }

    async fn current_location(&self, character: &Character) -> Result<Option<Location>, RepoError> {
        match character.location_id {
            Some(id) => self.locations.get(id).await,
            None => Ok(None),
        }
    }

    /// The visible neighbours of the character's location.
    pub async fn destinations(&self, character: &Character) -> Result<String, MoveError> {
        let location = self
            .current_location(character)
            .await?
            .ok_or(MoveError::NotPlaced)?;

        let mut lines = Vec::new();
        for connection in self.locations.connections_of(location.id).await? {
            if connection.hidden {
                continue;
            }
            let Some(other) = connection.other_end(location.id) else {
                continue;
            };
            let Some(other) = self.locations.get(other).await? else {
                continue;
            };
            if connection.locked {
                lines.push(format!("- *{}* (locked or unavailable)", other.name));
            } else {
                lines.push(format!("- {}", other.name));
            }
        }

        if lines.is_empty() {
            Ok("There are no destinations available from here.".to_string())
        } else {
            Ok(format!(
                "The following destinations are available from `{}`:\n{}",
                location.name,
                lines.join("\n")
            ))
        }
    }

    /// Checks that the character may walk to `target` right now.
    pub async fn plan(&self, character: Character, target: &str) -> Result<MovePlan, MoveError> {
        let target = target.trim();
        let from = self
            .current_location(&character)
            .await?
            .ok_or(MoveError::NotPlaced)?;

        let (connection, to) = route_to(
            self.locations.as_ref(),
            character.guild_id,
            from.id,
            target,
            false,
        )
        .await?
        .ok_or_else(|| MoveError::NoConnection {
            target: target.to_string(),
            from: from.name.clone(),
        })?;
        if connection.locked {
            return Err(MoveError::Locked {
                target: target.to_string(),
                destination: to.name,
            });
        }
        if let Some(remaining) = character.movement_cooldown(connection.timer, self.clock.now()) {
            return Err(MoveError::Cooldown {
                target: target.to_string(),
                remaining: format_remaining(remaining),
            });
        }

        Ok(MovePlan {
            character,
            from: Some(from),
            to,
        })
    }

    /// GM move that ignores connections, locks and timers.
    pub async fn plan_forced(&self, character: Character, target: &str) -> Result<MovePlan, MoveError> {
        let target = target.trim();
        let to = self
            .locations
            .get_by_name(character.guild_id, target)
            .await?
            .ok_or_else(|| MoveError::UnknownLocation {
                character: character.name.clone(),
                target: target.to_string(),
            })?;
        if character.location_id == Some(to.id) {
            return Err(MoveError::AlreadyThere {
                character: character.name.clone(),
                target: target.to_string(),
            });
        }
        let from = self.current_location(&character).await?;

        Ok(MovePlan {
            character,
            from,
            to,
        })
    }

    /// Places the character at the destination and starts its movement timer.
    pub async fn commit(&self, plan: &mut MovePlan) -> Result<(), RepoError> {
        plan.character.location_id = Some(plan.to.id);
        plan.character.last_movement = Some(self.clock.now());
        self.characters.save(&plan.character).await?;
        tracing::info!(
            character_id = %plan.character.id,
            from = plan.from.as_ref().map(|l| l.name.as_str()).unwrap_or("nowhere"),
            to = %plan.to.name,
            "Character moved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockCharacterRepo, MockClockPort, MockLocationRepo};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use raconteur_domain::{Connection, GuildId, LocationId, UserId};

    const GUILD: GuildId = GuildId::new(1);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn clock() -> Arc<MockClockPort> {
        let mut clock = MockClockPort::new();
        clock.expect_now().returning(now);
        Arc::new(clock)
    }

    struct Map {
        square: Location,
        tavern: Location,
        vault: Location,
        to_tavern: Connection,
        to_vault: Connection,
    }

    fn map() -> Map {
        let square = Location::new(GUILD, "square", "town", "The square.");
        let tavern = Location::new(GUILD, "tavern", "town", "The tavern.");
        let vault = Location::new(GUILD, "vault", "town", "The vault.");
        let mut to_tavern = Connection::new(square.id, tavern.id);
        to_tavern.timer = 90;
        let mut to_vault = Connection::new(vault.id, square.id);
        to_vault.locked = true;
        Map {
            square,
            tavern,
            vault,
            to_tavern,
            to_vault,
        }
    }

    fn location_repo(map: &Map, hidden_extra: Option<Connection>) -> MockLocationRepo {
        let mut repo = MockLocationRepo::new();
        let all = vec![map.square.clone(), map.tavern.clone(), map.vault.clone()];
        let by_id = all.clone();
        repo.expect_get()
            .returning(move |id| Ok(by_id.iter().find(|l| l.id == id).cloned()));
        repo.expect_get_by_name()
            .returning(move |_, name| Ok(all.iter().find(|l| l.name == name).cloned()));
        let mut connections = vec![map.to_tavern, map.to_vault];
        connections.extend(hidden_extra);
        repo.expect_connections_of().returning(move |id| {
            Ok(connections.iter().filter(|c| c.touches(id)).copied().collect())
        });
        repo
    }

    fn placed(map: &Map) -> Character {
        let mut character = Character::new(GUILD, UserId::new(5), "Ada");
        character.location_id = Some(map.square.id);
        character
    }

    fn movement(map: &Map, characters: MockCharacterRepo) -> Movement {
        Movement::new(
            Arc::new(characters),
            Arc::new(location_repo(map, None)),
            clock(),
        )
    }

    #[tokio::test]
    async fn lists_visible_destinations() {
        let map = map();
        let mut hidden = Connection::new(map.square.id, LocationId::new());
        hidden.hidden = true;
        let movement = Movement::new(
            Arc::new(MockCharacterRepo::new()),
            Arc::new(location_repo(&map, Some(hidden))),
            clock(),
        );

        let text = movement.destinations(&placed(&map)).await.expect("list");
        assert_eq!(
            text,
            "The following destinations are available from `square`:\n- tavern\n- *vault* (locked or unavailable)"
        );
    }

    #[tokio::test]
    async fn unplaced_characters_cannot_move() {
        let map = map();
        let movement = movement(&map, MockCharacterRepo::new());
        let lost = Character::new(GUILD, UserId::new(5), "Lost");

        let err = movement.plan(lost, "tavern").await.expect_err("unplaced");
        assert_eq!(err.to_string(), "Cannot move: your character isn't in any location yet.");
    }

    #[tokio::test]
    async fn rejects_missing_and_locked_connections() {
        let map = map();
        let movement = movement(&map, MockCharacterRepo::new());

        let err = movement
            .plan(placed(&map), "castle")
            .await
            .expect_err("unknown");
        assert_eq!(
            err.to_string(),
            "Cannot move to `castle`: no connection from `square`."
        );

        let err = movement
            .plan(placed(&map), " vault ")
            .await
            .expect_err("locked");
        assert_eq!(err.to_string(), "Cannot move to `vault`: `vault` is locked off.");
    }

    #[tokio::test]
    async fn enforces_the_connection_timer() {
        let map = map();
        let movement = movement(&map, MockCharacterRepo::new());
        let mut ada = placed(&map);
        ada.last_movement = Some(now() - Duration::seconds(20));

        let err = movement.plan(ada.clone(), "tavern").await.expect_err("cooldown");
        assert_eq!(
            err.to_string(),
            "Cannot move to `tavern`: 1 minute and 10 seconds left before you can move there."
        );

        ada.last_movement = Some(now() - Duration::seconds(90));
        let plan = movement.plan(ada, "tavern").await.expect("allowed");
        assert_eq!(plan.to.name, "tavern");
        assert_eq!(plan.from.map(|l| l.name), Some("square".to_string()));
    }

    #[tokio::test]
    async fn forced_moves_ignore_connections() {
        let map = map();
        let vault_id = map.vault.id;
        let mut characters = MockCharacterRepo::new();
        characters
            .expect_save()
            .withf(move |c| c.location_id == Some(vault_id) && c.last_movement == Some(now()))
            .times(1)
            .returning(|_| Ok(()));
        let movement = movement(&map, characters);

        let err = movement
            .plan_forced(placed(&map), "square")
            .await
            .expect_err("already there");
        assert_eq!(
            err.to_string(),
            "Cannot force move **Ada** to `square`: character is already in that location."
        );
        let err = movement
            .plan_forced(placed(&map), "moon")
            .await
            .expect_err("unknown");
        assert_eq!(
            err.to_string(),
            "Cannot force move **Ada** to `moon`: unknown location."
        );

        let mut plan = movement.plan_forced(placed(&map), "vault").await.expect("forced");
        movement.commit(&mut plan).await.expect("commit");
        assert_eq!(plan.character.location_id, Some(vault_id));
    }
}
