use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a job posting. Stored as TEXT; the enum is the single
/// source of truth for the legal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    InProgress,
    Analyzed,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::InProgress => "in_progress",
            JobStatus::Analyzed => "analyzed",
            JobStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub job_id: String,
    pub title: String,
    pub client: String,
    pub keywords: Vec<String>,
    pub summary: String,
    pub source_object_key: String,
    pub status: String,
    pub total_candidates: i32,
    pub top_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
