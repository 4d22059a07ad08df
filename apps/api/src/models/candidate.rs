use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-unit-of-work status. Explicit so callers never have to infer
/// "done vs. failed vs. pending" from the shape of the score fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Complete,
    Failed,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Complete => "complete",
            CandidateStatus::Failed => "failed",
        }
    }
}

/// One resume submission, keyed by the composite `(job_id, candidate_id)`.
/// Scores stay zero and `analysis_object_key` stays NULL while the
/// pipeline run is pending or failed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub job_id: String,
    pub candidate_id: String,
    pub name: String,
    pub source_resume_key: String,
    pub analysis_object_key: Option<String>,
    pub overall_score: i32,
    pub core_score: i32,
    pub domain_score: i32,
    pub soft_score: i32,
    pub status: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
