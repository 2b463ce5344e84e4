//! HTTP routes for the web admin.
//!
//! Every game route identifies the caller through the `X-User-Id` header and
//! checks the member's roles in the guild against the game's role bindings.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use raconteur_domain::{
    Character, CharacterForm, CharacterId, Connection, ConnectionForm, ConnectionId, Game, GuildId,
    Location, LocationForm, LocationId, Permissions, RoleId, UmbrealSheet, UmbrealSheetForm,
    UnknownArmiesSheet, UnknownArmiesSheetData, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::app::App;
use crate::infrastructure::ports::{ChatError, RepoError};
use crate::plugins::{menu_for, MenuEntry};
use crate::use_cases::management::LocationDetail;
use crate::use_cases::{GameError, ManagementError};

pub const USER_HEADER: &str = "X-User-Id";

/// How long a member's roles are trusted before asking the chat platform again.
pub const ROLE_CACHE_TTL_SECONDS: i64 = 60;

// =============================================================================
// State
// =============================================================================

#[derive(Clone)]
pub struct WebState {
    pub app: Arc<App>,
    roles: Arc<RoleCache>,
}

impl WebState {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            roles: Arc::new(RoleCache::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedRoles {
    fetched_at: DateTime<Utc>,
    /// `None` when the user is not a member of the guild.
    roles: Option<Vec<RoleId>>,
}

#[derive(Debug, Default)]
struct RoleCache {
    entries: DashMap<(GuildId, UserId), CachedRoles>,
}

impl RoleCache {
    async fn roles(
        &self,
        app: &App,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<Vec<RoleId>>, ApiError> {
        let now = app.clock.now();
        if let Some(cached) = self.entries.get(&(guild_id, user_id)) {
            if now - cached.fetched_at < Duration::seconds(ROLE_CACHE_TTL_SECONDS) {
                return Ok(cached.roles.clone());
            }
        }

        let roles = app.chat.member(guild_id, user_id).await?.map(|m| m.roles);
        self.entries.insert(
            (guild_id, user_id),
            CachedRoles {
                fetched_at: now,
                roles: roles.clone(),
            },
        );
        Ok(roles)
    }
}

// =============================================================================
// Caller identity
// =============================================================================

/// The user making the request.
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub UserId);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|id| Viewer(UserId::new(id)))
            .ok_or(ApiError::Unauthorized)
    }
}

/// A member's view of one game.
struct Access {
    game: Game,
    user_id: UserId,
    permissions: Permissions,
}

impl Access {
    async fn load(state: &WebState, guild: u64, Viewer(user_id): Viewer) -> Result<Self, ApiError> {
        let guild_id = GuildId::new(guild);
        let game = state
            .app
            .use_cases
            .game
            .get(guild_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let roles = state
            .roles
            .roles(&state.app, guild_id, user_id)
            .await?
            .ok_or(ApiError::Forbidden)?;
        let permissions = game.permissions(&roles);
        Ok(Self {
            game,
            user_id,
            permissions,
        })
    }

    fn guild_id(&self) -> GuildId {
        self.game.guild_id
    }

    fn require_gm(self) -> Result<Self, ApiError> {
        if self.permissions.is_gm {
            Ok(self)
        } else {
            Err(ApiError::Forbidden)
        }
    }

    fn require_player(self) -> Result<Self, ApiError> {
        if self.permissions.is_player {
            Ok(self)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Create all HTTP routes.
pub fn routes() -> Router<WebState> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/games", get(list_games))
        .route("/api/games/{guild}", get(get_game))
        .route(
            "/api/games/{guild}/plugins/{plugin}/settings/{name}",
            get(get_setting).put(set_setting),
        )
        .route("/api/games/{guild}/characters", get(list_characters))
        .route(
            "/api/games/{guild}/characters/mine",
            get(list_my_characters).post(create_character),
        )
        .route(
            "/api/games/{guild}/characters/mine/{id}",
            axum::routing::put(update_character).delete(delete_character),
        )
        .route(
            "/api/games/{guild}/locations",
            get(list_locations).post(create_location),
        )
        .route(
            "/api/games/{guild}/locations/{id}",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route(
            "/api/games/{guild}/locations/{id}/connections",
            axum::routing::post(create_connection),
        )
        .route(
            "/api/games/{guild}/locations/{id}/connections/{connection}",
            axum::routing::put(update_connection).delete(delete_connection),
        )
        .route("/api/games/{guild}/umbreal", get(list_umbreal))
        .route(
            "/api/games/{guild}/umbreal/{character}",
            get(get_umbreal).put(save_umbreal).delete(delete_umbreal),
        )
        .route("/api/games/{guild}/unknown-armies", get(list_unknown_armies))
        .route(
            "/api/games/{guild}/unknown-armies/{character}",
            get(get_unknown_armies)
                .put(save_unknown_armies)
                .delete(delete_unknown_armies),
        )
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Games
// =============================================================================

#[derive(Debug, Serialize)]
pub struct GameView {
    #[serde(flatten)]
    pub game: Game,
    pub permissions: Permissions,
    pub menu: Vec<MenuEntry>,
}

/// Games of every guild the caller is a member of.
async fn list_games(
    State(state): State<WebState>,
    Viewer(user_id): Viewer,
) -> Result<Json<Vec<Game>>, ApiError> {
    let mut games = Vec::new();
    for game in state.app.use_cases.game.list().await? {
        let roles = state.roles.roles(&state.app, game.guild_id, user_id).await?;
        if roles.is_some() {
            games.push(game);
        }
    }
    Ok(Json(games))
}

async fn get_game(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<GameView>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?;
    let menu = menu_for(&access.game);
    Ok(Json(GameView {
        game: access.game,
        permissions: access.permissions,
        menu,
    }))
}

async fn get_setting(
    State(state): State<WebState>,
    Path((guild, plugin, name)): Path<(u64, String, String)>,
    viewer: Viewer,
) -> Result<Json<Value>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let value = state
        .app
        .use_cases
        .game
        .get_setting(access.guild_id(), &plugin, &name)
        .await?;
    Ok(Json(value.unwrap_or(Value::Null)))
}

async fn set_setting(
    State(state): State<WebState>,
    Path((guild, plugin, name)): Path<(u64, String, String)>,
    viewer: Viewer,
    Json(value): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    state
        .app
        .use_cases
        .game
        .set_setting(access.guild_id(), &plugin, &name, value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Characters
// =============================================================================

async fn list_characters(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<Vec<Character>>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?;
    let characters = state
        .app
        .use_cases
        .management
        .characters
        .list(access.guild_id())
        .await?;
    Ok(Json(characters))
}

async fn list_my_characters(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<Vec<Character>>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let characters = state
        .app
        .use_cases
        .management
        .characters
        .list_of_member(access.guild_id(), access.user_id)
        .await?;
    Ok(Json(characters))
}

async fn create_character(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
    Json(form): Json<CharacterForm>,
) -> Result<(StatusCode, Json<Character>), ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let character = state
        .app
        .use_cases
        .management
        .characters
        .create(access.guild_id(), access.user_id, form)
        .await?;
    Ok((StatusCode::CREATED, Json(character)))
}

async fn update_character(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
    Json(form): Json<CharacterForm>,
) -> Result<Json<Character>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let character = state
        .app
        .use_cases
        .management
        .characters
        .update(
            access.guild_id(),
            access.user_id,
            CharacterId::from_uuid(id),
            form,
        )
        .await?;
    Ok(Json(character))
}

async fn delete_character(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    state
        .app
        .use_cases
        .management
        .characters
        .delete(access.guild_id(), access.user_id, CharacterId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Locations
// =============================================================================

async fn list_locations(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<Vec<Location>>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let locations = state
        .app
        .use_cases
        .management
        .locations
        .list(access.guild_id())
        .await?;
    Ok(Json(locations))
}

async fn create_location(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
    Json(form): Json<LocationForm>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let location = state
        .app
        .use_cases
        .management
        .locations
        .create(access.guild_id(), form)
        .await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn get_location(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<Json<LocationDetail>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let detail = state
        .app
        .use_cases
        .management
        .locations
        .get(access.guild_id(), LocationId::from_uuid(id))
        .await?;
    Ok(Json(detail))
}

async fn update_location(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
    Json(form): Json<LocationForm>,
) -> Result<Json<Location>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let location = state
        .app
        .use_cases
        .management
        .locations
        .update(access.guild_id(), LocationId::from_uuid(id), form)
        .await?;
    Ok(Json(location))
}

async fn delete_location(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    state
        .app
        .use_cases
        .management
        .locations
        .delete(access.guild_id(), LocationId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct NewConnection {
    /// The location on the other end.
    pub location_id: Uuid,
    #[serde(flatten)]
    pub form: ConnectionForm,
}

async fn create_connection(
    State(state): State<WebState>,
    Path((guild, id)): Path<(u64, Uuid)>,
    viewer: Viewer,
    Json(body): Json<NewConnection>,
) -> Result<(StatusCode, Json<Connection>), ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let connection = state
        .app
        .use_cases
        .management
        .locations
        .add_connection(
            access.guild_id(),
            LocationId::from_uuid(id),
            LocationId::from_uuid(body.location_id),
            body.form,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

async fn update_connection(
    State(state): State<WebState>,
    Path((guild, id, connection)): Path<(u64, Uuid, Uuid)>,
    viewer: Viewer,
    Json(form): Json<ConnectionForm>,
) -> Result<Json<Connection>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    let connection = state
        .app
        .use_cases
        .management
        .locations
        .edit_connection(
            access.guild_id(),
            LocationId::from_uuid(id),
            ConnectionId::from_uuid(connection),
            form,
        )
        .await?;
    Ok(Json(connection))
}

async fn delete_connection(
    State(state): State<WebState>,
    Path((guild, id, connection)): Path<(u64, Uuid, Uuid)>,
    viewer: Viewer,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_gm()?;
    state
        .app
        .use_cases
        .management
        .locations
        .delete_connection(
            access.guild_id(),
            LocationId::from_uuid(id),
            ConnectionId::from_uuid(connection),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Sheets
// =============================================================================

async fn list_umbreal(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<Vec<UmbrealSheet>>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheets = state
        .app
        .use_cases
        .management
        .sheets
        .list_umbreal(access.guild_id(), access.user_id)
        .await?;
    Ok(Json(sheets))
}

async fn get_umbreal(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<Json<UmbrealSheet>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheet = state
        .app
        .use_cases
        .management
        .sheets
        .get_umbreal(access.guild_id(), access.user_id, CharacterId::from_uuid(character))
        .await?;
    Ok(Json(sheet))
}

async fn save_umbreal(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
    Json(form): Json<UmbrealSheetForm>,
) -> Result<Json<UmbrealSheet>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheet = state
        .app
        .use_cases
        .management
        .sheets
        .save_umbreal(
            access.guild_id(),
            access.user_id,
            CharacterId::from_uuid(character),
            form,
        )
        .await?;
    Ok(Json(sheet))
}

async fn delete_umbreal(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    state
        .app
        .use_cases
        .management
        .sheets
        .delete_umbreal(access.guild_id(), access.user_id, CharacterId::from_uuid(character))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_unknown_armies(
    State(state): State<WebState>,
    Path(guild): Path<u64>,
    viewer: Viewer,
) -> Result<Json<Vec<UnknownArmiesSheet>>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheets = state
        .app
        .use_cases
        .management
        .sheets
        .list_unknown_armies(access.guild_id(), access.user_id)
        .await?;
    Ok(Json(sheets))
}

async fn get_unknown_armies(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<Json<UnknownArmiesSheet>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheet = state
        .app
        .use_cases
        .management
        .sheets
        .get_unknown_armies(access.guild_id(), access.user_id, CharacterId::from_uuid(character))
        .await?;
    Ok(Json(sheet))
}

async fn save_unknown_armies(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
    Json(data): Json<UnknownArmiesSheetData>,
) -> Result<Json<UnknownArmiesSheet>, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    let sheet = state
        .app
        .use_cases
        .management
        .sheets
        .save_unknown_armies(
            access.guild_id(),
            access.user_id,
            CharacterId::from_uuid(character),
            data,
        )
        .await?;
    Ok(Json(sheet))
}

async fn delete_unknown_armies(
    State(state): State<WebState>,
    Path((guild, character)): Path<(u64, Uuid)>,
    viewer: Viewer,
) -> Result<StatusCode, ApiError> {
    let access = Access::load(&state, guild, viewer).await?.require_player()?;
    state
        .app
        .use_cases
        .management
        .sheets
        .delete_unknown_armies(access.guild_id(), access.user_id, CharacterId::from_uuid(character))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Unauthorized,
    Forbidden,
    Validation(Vec<String>),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ValidationBody {
    errors: Vec<String>,
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            ApiError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationBody { errors })).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ManagementError> for ApiError {
    fn from(e: ManagementError) -> Self {
        match e {
            ManagementError::NotFound => ApiError::NotFound,
            ManagementError::Validation(errors) => ApiError::Validation(errors),
            ManagementError::Repo(e) => e.into(),
        }
    }
}

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::NotInitialized => ApiError::NotFound,
            GameError::PluginNotEnabled(_) => ApiError::BadRequest(e.to_string()),
            GameError::Repo(e) => e.into(),
        }
    }
}
