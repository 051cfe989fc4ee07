//! In-memory session storage for game state held between requests.
//!
//! Sessions expire after a fixed TTL. Reads return nothing for expired
//! entries but never delete; only the reaper sweep removes strictly-expired
//! sessions, so it is safe to run concurrently with request handling.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::constants::SESSION_TTL_HOURS;
use crate::game::PlayerData;
use crate::personality::PersonalityProfile;
use crate::result::ProcessingResult;

/// Lifecycle state of a stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

/// Data stored for a single player during a game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSessionData {
    pub id: String,
    pub name: String,
    pub selections: Vec<String>,
    pub total_cost: f64,
    #[serde(default)]
    pub processing_result: Option<ProcessingResult>,
    #[serde(default)]
    pub generated_image_url: Option<String>,
    #[serde(default)]
    pub personality: Option<PersonalityProfile>,
}

impl From<&PlayerData> for PlayerSessionData {
    fn from(player: &PlayerData) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            selections: player.selections.clone(),
            total_cost: player.total_cost,
            processing_result: None,
            generated_image_url: None,
            personality: player.personality.clone(),
        }
    }
}

/// Complete game session data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub players: Vec<PlayerSessionData>,
    pub status: SessionStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl GameSession {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Counts reported by [`SessionStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStoreStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub total_players: usize,
}

/// In-memory TTL session store. Safe to share across request handlers;
/// writes to one session key are last-write-wins with a monotonically
/// non-decreasing `updated_at`.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, GameSession>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Store with the default 24-hour TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl_hours(SESSION_TTL_HOURS)
    }

    #[must_use]
    pub fn with_ttl_hours(hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(hours),
        }
    }

    /// Create a session for the given players, returning its id.
    pub fn create(&self, players: &[PlayerData]) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = GameSession {
            session_id: session_id.clone(),
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
            players: players.iter().map(PlayerSessionData::from).collect(),
            status: SessionStatus::Active,
            metadata: BTreeMap::new(),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), session);
        session_id
    }

    /// Fetch a session. Expired sessions read as absent; they are only
    /// deleted by the reaper sweep.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<GameSession> {
        let now = Utc::now();
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .filter(|session| !session.is_expired(now))
            .cloned()
    }

    /// Replace a session's data. Last write wins; `updated_at` never moves
    /// backwards. Returns `false` for unknown ids.
    pub fn update(&self, session_id: &str, mut data: GameSession) -> bool {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = sessions.get(session_id) else {
            return false;
        };
        data.updated_at = Utc::now().max(existing.updated_at);
        sessions.insert(session_id.to_string(), data);
        true
    }

    /// Delete a session outright. Returns `false` for unknown ids.
    pub fn delete(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Reaper sweep: remove strictly-expired sessions, returning how many
    /// were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    /// Ids of all live sessions.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<String> {
        let now = Utc::now();
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|session| !session.is_expired(now))
            .map(|session| session.session_id.clone())
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStoreStats {
        let now = Utc::now();
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let active = sessions
            .values()
            .filter(|session| !session.is_expired(now))
            .count();
        SessionStoreStats {
            total_sessions: sessions.len(),
            active_sessions: active,
            expired_sessions: sessions.len() - active,
            total_players: sessions.values().map(|s| s.players.len()).sum(),
        }
    }

    /// Fetch one player from a session by case-insensitive name.
    #[must_use]
    pub fn get_player(&self, session_id: &str, player_name: &str) -> Option<PlayerSessionData> {
        self.get(session_id)?
            .players
            .into_iter()
            .find(|player| player.name.eq_ignore_ascii_case(player_name))
    }

    /// Apply an update to one player in a session. Returns `false` when the
    /// session or player is missing.
    pub fn update_player(
        &self,
        session_id: &str,
        player_name: &str,
        apply: impl FnOnce(&mut PlayerSessionData),
    ) -> bool {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        if session.is_expired(now) {
            return false;
        }
        let Some(player) = session
            .players
            .iter_mut()
            .find(|player| player.name.eq_ignore_ascii_case(player_name))
        else {
            return false;
        };
        apply(player);
        session.updated_at = now.max(session.updated_at);
        true
    }

    /// Store a finished processing result for a player.
    pub fn store_processing_result(
        &self,
        session_id: &str,
        player_name: &str,
        result: ProcessingResult,
    ) -> bool {
        self.update_player(session_id, player_name, |player| {
            player.processing_result = Some(result);
        })
    }

    /// Store a generated image URL for a player.
    pub fn store_generated_image(
        &self,
        session_id: &str,
        player_name: &str,
        image_url: &str,
    ) -> bool {
        self.update_player(session_id, player_name, |player| {
            player.generated_image_url = Some(image_url.to_string());
        })
    }

    /// Mark a session as completed.
    pub fn mark_complete(&self, session_id: &str) -> bool {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        if session.is_expired(now) {
            return false;
        }
        session.status = SessionStatus::Completed;
        session.updated_at = now.max(session.updated_at);
        true
    }
}
