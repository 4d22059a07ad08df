//! Read model — the query side of the pipeline. Listings come straight from
//! the job/candidate records; the full analysis payload is fetched from the
//! object store only on the detail view, and only for completed candidates.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::errors::AppError;
use crate::events::UPLOAD_ROOT;
use crate::models::analysis::AnalysisResult;
use crate::models::candidate::{CandidateRow, CandidateStatus};
use crate::models::job::JobPostingRow;
use crate::poll::{poll_until, PollOutcome};
use crate::state::AppState;
use crate::storage;

/// A completed candidate's payload can lag the record write by a moment on
/// an eventually consistent store; probe a few times before giving up.
const ANALYSIS_POLL_ATTEMPTS: u32 = 3;
const ANALYSIS_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListItem {
    pub job_id: String,
    pub title: String,
    pub client: String,
    pub keywords: Vec<String>,
    pub summary: String,
    pub status: String,
    pub total_candidates: i32,
    pub top_score: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateListItem {
    pub candidate_id: String,
    pub name: String,
    pub status: String,
    pub overall_score: i32,
    pub core_score: i32,
    pub domain_score: i32,
    pub soft_score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Present only for completed candidates whose payload could be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: JobListItem,
    pub candidates: Vec<CandidateListItem>,
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobListItem>>, AppError> {
    if state.config.demo_data {
        return Ok(Json(demo_jobs()));
    }

    let rows: Vec<JobPostingRow> =
        sqlx::query_as("SELECT * FROM job_postings ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(rows.into_iter().map(job_list_item).collect()))
}

/// GET /api/v1/jobs/:job_id
///
/// The detail view: the job header plus its candidates ranked by overall
/// score. A candidate whose analysis payload cannot be loaded still
/// appears, just without the embedded analysis.
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobDetailResponse>, AppError> {
    let job: JobPostingRow = sqlx::query_as("SELECT * FROM job_postings WHERE job_id = $1")
        .bind(&job_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job '{job_id}' not found")))?;

    let mut candidates: Vec<CandidateRow> = sqlx::query_as(
        "SELECT * FROM candidates WHERE job_id = $1 ORDER BY created_at ASC",
    )
    .bind(&job_id)
    .fetch_all(&state.db)
    .await?;
    rank_candidates(&mut candidates);

    let mut items = Vec::with_capacity(candidates.len());
    for row in candidates {
        let analysis = load_analysis(&state, &job_id, &row).await;
        items.push(CandidateListItem {
            candidate_id: row.candidate_id,
            name: row.name,
            status: row.status,
            overall_score: row.overall_score,
            core_score: row.core_score,
            domain_score: row.domain_score,
            soft_score: row.soft_score,
            last_error: row.last_error,
            analysis,
        });
    }

    Ok(Json(JobDetailResponse {
        job: job_list_item(job),
        candidates: items,
    }))
}

/// Highest overall score first; ties keep submission order (stable sort).
fn rank_candidates(candidates: &mut [CandidateRow]) {
    candidates.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));
}

async fn load_analysis(
    state: &AppState,
    job_id: &str,
    row: &CandidateRow,
) -> Option<AnalysisResult> {
    if row.status != CandidateStatus::Complete.as_str() {
        return None;
    }
    let key = row.analysis_object_key.clone().unwrap_or_else(|| {
        format!(
            "{UPLOAD_ROOT}/{job_id}/candidates/{}/analysis.json",
            row.candidate_id
        )
    });
    let probe = || storage::get_json::<AnalysisResult>(&state.s3, &state.config.s3_bucket, &key);
    match poll_until(ANALYSIS_POLL_ATTEMPTS, ANALYSIS_POLL_INTERVAL, probe).await {
        Ok(PollOutcome::Ready(analysis)) => Some(analysis),
        Ok(PollOutcome::TimedOut) => {
            warn!(
                "analysis payload for {}/{} not visible yet",
                job_id, row.candidate_id
            );
            None
        }
        Err(e) => {
            warn!(
                "analysis payload for {}/{} unreadable: {e}",
                job_id, row.candidate_id
            );
            None
        }
    }
}

fn job_list_item(row: JobPostingRow) -> JobListItem {
    JobListItem {
        job_id: row.job_id,
        title: row.title,
        client: row.client,
        keywords: row.keywords,
        summary: row.summary,
        status: row.status,
        total_candidates: row.total_candidates,
        top_score: row.top_score,
    }
}

/// Canned listings for UI development without a populated store.
fn demo_jobs() -> Vec<JobListItem> {
    vec![
        JobListItem {
            job_id: "SO_000001".to_string(),
            title: "Senior DevOps Engineer".to_string(),
            client: "Meridian Logistics".to_string(),
            keywords: vec![
                "AWS".to_string(),
                "Terraform".to_string(),
                "Kubernetes".to_string(),
                "CI/CD".to_string(),
                "Python".to_string(),
            ],
            summary: "Senior DevOps role owning AWS infrastructure and delivery pipelines."
                .to_string(),
            status: "analyzed".to_string(),
            total_candidates: 4,
            top_score: 91,
        },
        JobListItem {
            job_id: "SO_000002".to_string(),
            title: "Data Scientist".to_string(),
            client: "N/A".to_string(),
            keywords: vec![
                "Python".to_string(),
                "SQL".to_string(),
                "ML".to_string(),
                "Statistics".to_string(),
            ],
            summary: "Mid-level data scientist for demand forecasting models.".to_string(),
            status: "in_progress".to_string(),
            total_candidates: 2,
            top_score: 74,
        },
        JobListItem {
            job_id: "SO_000003".to_string(),
            title: "Backend Engineer".to_string(),
            client: "Halcyon Health".to_string(),
            keywords: vec![
                "Rust".to_string(),
                "PostgreSQL".to_string(),
                "gRPC".to_string(),
            ],
            summary: "Backend engineer for the claims-processing platform.".to_string(),
            status: "new".to_string(),
            total_candidates: 0,
            top_score: 0,
        },
    ]
}
