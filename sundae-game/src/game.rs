//! Game payload models as submitted by the frontend.
//!
//! Field names follow the frontend's camelCase wire format. The claimed
//! `totalCost` is carried for discrepancy reporting only; it is never an
//! input to pricing.
use serde::{Deserialize, Serialize};

use crate::personality::PersonalityProfile;
use crate::selection::{is_skip, non_skip_selections};

/// Frontend-recorded AI chatter for one selection round. Passthrough only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInteraction {
    #[serde(default)]
    pub selection: String,
    #[serde(default)]
    pub ai_thought: String,
    #[serde(default)]
    pub ai_emoji: String,
    #[serde(default)]
    pub ai_steps: Vec<String>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub timestamp: String,
}

/// One player's submission: selections, claimed total, and personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub id: String,
    pub name: String,
    /// Abstract selection tokens, e.g. `["Skip", "Rich", "Skip", "Crunchy"]`.
    pub selections: Vec<String>,
    /// Client-claimed total. Reference only, never authoritative.
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub ai_interactions: Vec<AiInteraction>,
    #[serde(default)]
    pub personality: Option<PersonalityProfile>,
}

impl PlayerData {
    /// All non-skip selections, in submission order.
    #[must_use]
    pub fn non_skip_selections(&self) -> Vec<String> {
        non_skip_selections(&self.selections)
    }

    /// Whether the player made at least one real selection.
    #[must_use]
    pub fn has_valid_selections(&self) -> bool {
        self.selections.iter().any(|s| !is_skip(s))
    }

    /// Number of skip selections.
    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.selections.iter().filter(|s| is_skip(s)).count()
    }
}

/// Complete game batch from the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub game_date: String,
    pub players: Vec<PlayerData>,
    pub total_players: usize,
    #[serde(default)]
    pub game_version: String,
}

impl GameData {
    #[must_use]
    pub fn player_by_id(&self, player_id: &str) -> Option<&PlayerData> {
        self.players.iter().find(|player| player.id == player_id)
    }

    /// Non-skip selections for a player, empty when the player is unknown.
    #[must_use]
    pub fn non_skip_selections(&self, player_id: &str) -> Vec<String> {
        self.player_by_id(player_id)
            .map(PlayerData::non_skip_selections)
            .unwrap_or_default()
    }

    /// Whether a player made at least one real selection.
    #[must_use]
    pub fn has_valid_selections(&self, player_id: &str) -> bool {
        self.player_by_id(player_id)
            .is_some_and(PlayerData::has_valid_selections)
    }
}
