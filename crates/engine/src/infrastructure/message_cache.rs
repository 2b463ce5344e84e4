//! Recently relayed messages, persisted to a JSON file.
//!
//! The cache keeps the last relayed message of every character (so it can be
//! undone) and the last few messages of every location (replayed to
//! characters arriving there).

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use raconteur_domain::{ChannelId, CharacterId, LocationId, MessageId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::infrastructure::ports::RepoError;

/// Messages kept per location.
pub const MAX_LOCATION_MESSAGES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: Option<CharacterId>,
    pub location_id: Option<LocationId>,
    /// Every copy sent while relaying.
    pub message_ids: Vec<(ChannelId, MessageId)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheContents {
    characters: HashMap<CharacterId, CachedMessage>,
    locations: HashMap<LocationId, VecDeque<CachedMessage>>,
}

pub struct MessageCache {
    path: Option<PathBuf>,
    contents: Mutex<CacheContents>,
}

impl MessageCache {
    /// Loads the cache from `path`. A missing or unreadable file starts an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable message cache");
                CacheContents::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheContents::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read message cache");
                CacheContents::default()
            }
        };
        Self {
            path: Some(path),
            contents: Mutex::new(contents),
        }
    }

    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            contents: Mutex::new(CacheContents::default()),
        }
    }

    pub async fn record(&self, message: CachedMessage) -> Result<(), RepoError> {
        let mut contents = self.contents.lock().await;
        if let Some(author_id) = message.author_id {
            contents.characters.insert(author_id, message.clone());
        }
        if let Some(location_id) = message.location_id {
            let recent = contents.locations.entry(location_id).or_default();
            recent.push_back(message);
            while recent.len() > MAX_LOCATION_MESSAGES {
                recent.pop_front();
            }
        }
        self.persist(&contents).await
    }

    /// Removes and returns the character's latest relayed message.
    pub async fn take_last_of_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<CachedMessage>, RepoError> {
        let mut contents = self.contents.lock().await;
        let message = contents.characters.remove(&character_id);
        if message.is_some() {
            self.persist(&contents).await?;
        }
        Ok(message)
    }

    /// Location messages sent after `since`, oldest first.
    pub async fn recent_in_location(
        &self,
        location_id: LocationId,
        since: DateTime<Utc>,
    ) -> Vec<CachedMessage> {
        let contents = self.contents.lock().await;
        contents
            .locations
            .get(&location_id)
            .map(|recent| {
                recent
                    .iter()
                    .filter(|m| m.timestamp > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn persist(&self, contents: &CacheContents) -> Result<(), RepoError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec(contents).map_err(RepoError::serialization)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| RepoError::database("message_cache", e))
    }
}
