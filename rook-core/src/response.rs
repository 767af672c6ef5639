//! Response shapes returned by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::{MemberId, PlayerInfo, RatingPeriod, RookError};

/// Batch lookup result: payloads in caller order plus per-id failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayersResponse {
    pub players: Vec<PlayerInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PlayerError>,
}

/// A single id that could not be resolved inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub id: MemberId,
    pub error: String,
}

impl PlayerError {
    pub fn new(id: MemberId, error: &RookError) -> Self {
        Self {
            id,
            error: error.to_string(),
        }
    }
}

/// One period of a member's rating history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub period: RatingPeriod,
    #[serde(flatten)]
    pub player: PlayerInfo,
}

/// Rating history for one member, newest period first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingHistoryResponse {
    pub player_id: MemberId,
    pub ratings: Vec<RatingSnapshot>,
}

impl RatingHistoryResponse {
    pub fn periods(&self) -> Vec<RatingPeriod> {
        self.ratings.iter().map(|r| r.period).collect()
    }
}
