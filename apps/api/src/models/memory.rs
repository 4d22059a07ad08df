use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Who produced a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Agent => "agent",
        }
    }
}

/// One append-only turn within a session. `seq` is dense per session and
/// doubles as the optimistic-concurrency guard for concurrent appends.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemoryTurnRow {
    pub session_id: String,
    pub seq: i64,
    pub role: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
