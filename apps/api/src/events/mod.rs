//! Event Classifier / Router — turns object-storage creation events into
//! pipeline runs.
//!
//! Two processing modes, because uploads arrive in either order:
//! - batch mode (a JD upload): re-run every resume already uploaded for the
//!   job against the new/updated description;
//! - single mode (a resume upload): run that one resume against the existing
//!   JD, or record a no-op if no JD exists yet.
//!
//! Events are at-least-once; every mutation here is safe to re-apply.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::docparse;
use crate::errors::AppError;
use crate::ids::{self, IdNamespace};
use crate::models::analysis::JdAnalysis;
use crate::models::candidate::CandidateStatus;
use crate::models::job::JobStatus;
use crate::pipeline::{self, JobContext};
use crate::state::AppState;
use crate::storage;

/// Root prefix all monitored uploads live under.
pub const UPLOAD_ROOT: &str = "opportunities";

/// Logical role of an uploaded object, parsed purely from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadKind {
    /// `opportunities/{filename}` — a fresh JD drop; allocates a job.
    JobRoot { filename: String },
    /// `opportunities/{jobId}/jd/{filename}` — a JD (re-)upload for a known job.
    JobFolder { job_id: String, filename: String },
    /// `opportunities/{jobId}/candidates/{filename}` — a resume drop.
    CandidateUpload { job_id: String, filename: String },
    /// Derived artifacts, already-relocated files, folder markers, strays.
    Ignored,
}

/// Classifies a storage key. Pure path structure, no I/O.
pub fn classify(object_key: &str) -> UploadKind {
    let parts: Vec<&str> = object_key.split('/').collect();
    if parts.first() != Some(&UPLOAD_ROOT) || object_key.ends_with('/') {
        return UploadKind::Ignored;
    }

    match parts.as_slice() {
        [_, filename] if !filename.is_empty() => UploadKind::JobRoot {
            filename: (*filename).to_string(),
        },
        [_, job_id, "jd", filename] if !filename.is_empty() => {
            // jd.json is our own derived artifact; re-triggering on it would loop.
            if *filename == "jd.json" {
                UploadKind::Ignored
            } else {
                UploadKind::JobFolder {
                    job_id: (*job_id).to_string(),
                    filename: (*filename).to_string(),
                }
            }
        }
        [_, job_id, "candidates", filename] if !filename.is_empty() => {
            UploadKind::CandidateUpload {
                job_id: (*job_id).to_string(),
                filename: (*filename).to_string(),
            }
        }
        // Files already inside a candidate subfolder (relocated resumes,
        // analysis.json) have their own lifecycle.
        _ => UploadKind::Ignored,
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageEventRequest {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    JobAnalyzed,
    JobAnalysisFailed,
    CandidateAnalyzed,
    CandidateFailed,
    AwaitingJobDescription,
    Ignored,
}

#[derive(Debug, Serialize)]
pub struct EventOutcome {
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub message: String,
}

/// POST /api/v1/events
///
/// One storage creation event per call. Store failures surface as 5xx so
/// the delivery mechanism retries; pipeline failures are recorded on the
/// unit of work and answered with 200.
pub async fn handle_event(
    State(state): State<AppState>,
    Json(req): Json<StorageEventRequest>,
) -> Result<Json<EventOutcome>, AppError> {
    let kind = classify(&req.key);
    info!("Event for s3://{}/{} -> {:?}", req.bucket, req.key, kind);

    let outcome = match kind {
        UploadKind::JobRoot { filename } => {
            handle_job_root(&state, &req.bucket, &req.key, &filename).await?
        }
        UploadKind::JobFolder { job_id, filename } => {
            handle_jd_upload(&state, &req.bucket, &job_id, &req.key, &filename).await?
        }
        UploadKind::CandidateUpload { job_id, filename } => {
            handle_candidate_upload(&state, &req.bucket, &req.key, &job_id, &filename).await?
        }
        UploadKind::Ignored => EventOutcome {
            disposition: Disposition::Ignored,
            job_id: None,
            candidate_id: None,
            message: format!("key '{}' is not a monitored upload", req.key),
        },
    };

    Ok(Json(outcome))
}

/// Root JD drop: allocate (or re-resolve) the job, move the file into its
/// folder, then process as a JD upload.
async fn handle_job_root(
    state: &AppState,
    bucket: &str,
    key: &str,
    filename: &str,
) -> Result<EventOutcome, AppError> {
    // The filename is the natural key: re-uploading the same JD updates the
    // same job instead of minting a new one.
    let job_id = ids::resolve_or_create(&state.db, IdNamespace::Job, filename)
        .await
        .map_err(AppError::Internal)?;

    let jd_key = format!("{UPLOAD_ROOT}/{job_id}/jd/{filename}");
    relocate_if_needed(state, bucket, key, &jd_key).await?;

    handle_jd_upload(state, bucket, &job_id, &jd_key, filename).await
}

/// JD upload (fresh or re-upload): run the JD unit, persist jd.json and the
/// JobPosting record, then batch-reprocess every existing candidate —
/// evaluation criteria changed, so all prior results are stale.
async fn handle_jd_upload(
    state: &AppState,
    bucket: &str,
    job_id: &str,
    jd_key: &str,
    _filename: &str,
) -> Result<EventOutcome, AppError> {
    let bytes = storage::download(&state.s3, bucket, jd_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    let jd_text = docparse::extract_text(jd_key, &bytes)?;

    let jd = match pipeline::run_jd_unit(state.infer.as_ref(), &jd_text).await {
        Ok(jd) => jd,
        Err(e) => {
            warn!("JD unit for {job_id} failed: {e}");
            insert_placeholder_job(&state.db, job_id, jd_key).await?;
            return Ok(EventOutcome {
                disposition: Disposition::JobAnalysisFailed,
                job_id: Some(job_id.to_string()),
                candidate_id: None,
                message: format!("job description analysis failed: {e}"),
            });
        }
    };

    let jd_json_key = format!("{UPLOAD_ROOT}/{job_id}/jd/jd.json");
    storage::put_json(&state.s3, bucket, &jd_json_key, &jd)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    upsert_job_posting(&state.db, job_id, &jd, jd_key).await?;

    let reprocessed = run_batch(state, bucket, job_id).await?;

    Ok(EventOutcome {
        disposition: Disposition::JobAnalyzed,
        job_id: Some(job_id.to_string()),
        candidate_id: None,
        message: format!("job description analyzed; {reprocessed} candidate(s) reprocessed"),
    })
}

/// Resume drop: allocate (or re-resolve) the candidate, move the file into
/// its folder, and run single mode. With no JD yet this is a recorded
/// no-op — the resume waits for the next batch trigger.
async fn handle_candidate_upload(
    state: &AppState,
    bucket: &str,
    key: &str,
    job_id: &str,
    filename: &str,
) -> Result<EventOutcome, AppError> {
    let natural_key = format!("{job_id}/{filename}");
    let candidate_id = ids::resolve_or_create(&state.db, IdNamespace::Candidate, &natural_key)
        .await
        .map_err(AppError::Internal)?;

    let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("pdf");
    let resume_key = format!("{UPLOAD_ROOT}/{job_id}/candidates/{candidate_id}/resume.{ext}");
    relocate_if_needed(state, bucket, key, &resume_key).await?;

    let name = derive_candidate_name(filename);
    ensure_candidate(&state.db, job_id, &candidate_id, &name, &resume_key).await?;

    let Some(context) = load_job_context(state, bucket, job_id).await? else {
        info!("No job description yet for {job_id}; resume {candidate_id} parked");
        return Ok(EventOutcome {
            disposition: Disposition::AwaitingJobDescription,
            job_id: Some(job_id.to_string()),
            candidate_id: Some(candidate_id),
            message: "no job description uploaded yet; resume stored for the next batch run"
                .to_string(),
        });
    };

    let completed = evaluate_candidate(
        state.clone(),
        bucket.to_string(),
        job_id.to_string(),
        candidate_id.clone(),
        resume_key,
        context,
    )
    .await?;

    Ok(EventOutcome {
        disposition: if completed {
            Disposition::CandidateAnalyzed
        } else {
            Disposition::CandidateFailed
        },
        job_id: Some(job_id.to_string()),
        candidate_id: Some(candidate_id),
        message: if completed {
            "candidate analyzed".to_string()
        } else {
            "candidate pipeline failed; recorded on the candidate record".to_string()
        },
    })
}

/// Batch fan-out: one unordered, concurrent evaluation per relocated resume.
/// A failed candidate run never aborts the others.
async fn run_batch(state: &AppState, bucket: &str, job_id: &str) -> Result<usize, AppError> {
    let Some(context) = load_job_context(state, bucket, job_id).await? else {
        return Ok(0);
    };

    let prefix = format!("{UPLOAD_ROOT}/{job_id}/candidates/");
    let keys = storage::list_keys(&state.s3, bucket, &prefix)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let mut set = JoinSet::new();
    let mut scheduled = 0usize;
    for key in keys {
        let Some((candidate_id, _)) = split_relocated_resume(&key) else {
            continue;
        };
        scheduled += 1;
        set.spawn(evaluate_candidate(
            state.clone(),
            bucket.to_string(),
            job_id.to_string(),
            candidate_id,
            key,
            context.clone(),
        ));
    }

    let mut completed = 0usize;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(true)) => completed += 1,
            Ok(Ok(false)) => {}
            Ok(Err(e)) => warn!("candidate run in batch for {job_id} errored: {e}"),
            Err(e) => warn!("candidate task for {job_id} panicked: {e}"),
        }
    }

    info!("Batch for {job_id}: {completed}/{scheduled} candidate(s) completed");
    Ok(completed)
}

/// One resume-evaluation unit of work, persisted end to end.
/// `Ok(true)` means COMPLETE; `Ok(false)` means the pipeline failed and the
/// failure was recorded. Store errors propagate.
async fn evaluate_candidate(
    state: AppState,
    bucket: String,
    job_id: String,
    candidate_id: String,
    resume_key: String,
    context: JobContext,
) -> Result<bool, AppError> {
    ensure_candidate(&state.db, &job_id, &candidate_id, &candidate_id, &resume_key).await?;

    let bytes = storage::download(&state.s3, &bucket, &resume_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    let resume_text = match docparse::extract_text(&resume_key, &bytes) {
        Ok(text) => text,
        Err(e) => {
            mark_candidate_failed(&state.db, &job_id, &candidate_id, &e.to_string()).await?;
            return Ok(false);
        }
    };

    match pipeline::run_evaluation(state.infer.as_ref(), &candidate_id, &resume_text, &context)
        .await
    {
        Ok(result) => {
            let analysis_key =
                format!("{UPLOAD_ROOT}/{job_id}/candidates/{candidate_id}/analysis.json");
            // Single put: readers either see the whole payload or none of it.
            storage::put_json(&state.s3, &bucket, &analysis_key, &result)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
            finalize_result(&state.db, &job_id, &candidate_id, &analysis_key, &result).await?;
            info!(
                "Candidate {candidate_id} for {job_id} complete (overall {})",
                result.candidate.overall_score
            );
            Ok(true)
        }
        Err(e) => {
            warn!(
                "Candidate {candidate_id} for {job_id} failed at {} (last completed {})",
                e.failed_stage, e.last_completed
            );
            mark_candidate_failed(&state.db, &job_id, &candidate_id, &e.to_string()).await?;
            Ok(false)
        }
    }
}

/// Resolves the JD context for a job: the structured analysis if a JD unit
/// already produced one, the raw JD text as fallback, or nothing.
async fn load_job_context(
    state: &AppState,
    bucket: &str,
    job_id: &str,
) -> Result<Option<JobContext>, AppError> {
    let jd_json_key = format!("{UPLOAD_ROOT}/{job_id}/jd/jd.json");
    if let Some(jd) = storage::get_json::<JdAnalysis>(&state.s3, bucket, &jd_json_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?
    {
        return Ok(Some(JobContext::Analyzed(jd)));
    }

    let jd_prefix = format!("{UPLOAD_ROOT}/{job_id}/jd/");
    let keys = storage::list_keys(&state.s3, bucket, &jd_prefix)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    let Some(raw_key) = keys.iter().find(|k| !k.ends_with("/jd.json")) else {
        return Ok(None);
    };

    let bytes = storage::download(&state.s3, bucket, raw_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    let text = docparse::extract_text(raw_key, &bytes)?;
    Ok(Some(JobContext::RawText(text)))
}

/// Moves an upload to its allocated location, tolerating duplicate
/// delivery: if the source is gone but the target exists, the earlier
/// delivery already did the work.
async fn relocate_if_needed(
    state: &AppState,
    bucket: &str,
    from: &str,
    to: &str,
) -> Result<(), AppError> {
    if from == to {
        return Ok(());
    }
    let source_exists = storage::exists(&state.s3, bucket, from)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    if source_exists {
        return storage::relocate(&state.s3, bucket, from, to)
            .await
            .map_err(|e| AppError::Storage(e.to_string()));
    }
    let target_exists = storage::exists(&state.s3, bucket, to)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    if target_exists {
        info!("s3://{bucket}/{from} already relocated to {to}");
        return Ok(());
    }
    Err(AppError::Storage(format!(
        "upload s3://{bucket}/{from} vanished before relocation"
    )))
}

/// "jane_doe-resume.pdf" -> "Jane Doe Resume"
fn derive_candidate_name(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `opportunities/{job}/candidates/{cand}/resume.{ext}` -> (cand, file)
fn split_relocated_resume(key: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [_, _, "candidates", candidate_id, filename] if filename.starts_with("resume.") => {
            Some(((*candidate_id).to_string(), (*filename).to_string()))
        }
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Persistence
// ────────────────────────────────────────────────────────────────────────────

/// Creates or refreshes the JobPosting record. Re-upload under the same
/// logical name updates, never duplicates; the status field is left alone
/// so a re-upload does not regress an in-flight job to `new`.
async fn upsert_job_posting(
    pool: &sqlx::PgPool,
    job_id: &str,
    jd: &JdAnalysis,
    source_key: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO job_postings (job_id, title, client, keywords, summary, source_object_key, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (job_id) DO UPDATE SET
            title = EXCLUDED.title,
            client = EXCLUDED.client,
            keywords = EXCLUDED.keywords,
            summary = EXCLUDED.summary,
            source_object_key = EXCLUDED.source_object_key,
            updated_at = now()
        "#,
    )
    .bind(job_id)
    .bind(&jd.title)
    .bind(&jd.client)
    .bind(&jd.keywords)
    .bind(&jd.summary)
    .bind(source_key)
    .bind(JobStatus::New.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Records the job with placeholder fields when the JD unit failed, so the
/// read model can at least show the posting exists.
async fn insert_placeholder_job(
    pool: &sqlx::PgPool,
    job_id: &str,
    source_key: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO job_postings (job_id, source_object_key, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (job_id) DO NOTHING
        "#,
    )
    .bind(job_id)
    .bind(source_key)
    .bind(JobStatus::New.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Creates the pending candidate record if absent. Conditional insert keeps
/// duplicate deliveries from resetting an existing record.
async fn ensure_candidate(
    pool: &sqlx::PgPool,
    job_id: &str,
    candidate_id: &str,
    name: &str,
    resume_key: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO candidates (job_id, candidate_id, name, source_resume_key, status)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (job_id, candidate_id) DO NOTHING
        "#,
    )
    .bind(job_id)
    .bind(candidate_id)
    .bind(name)
    .bind(resume_key)
    .bind(CandidateStatus::Pending.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// The COMPLETE write: candidate scores/status plus the job rollups
/// (candidate count, top score, status) in one transaction, so a reader
/// never sees the rollups disagree with the row that changed them.
async fn finalize_result(
    pool: &sqlx::PgPool,
    job_id: &str,
    candidate_id: &str,
    analysis_key: &str,
    result: &crate::models::analysis::AnalysisResult,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE candidates SET
            name = $3,
            analysis_object_key = $4,
            overall_score = $5,
            core_score = $6,
            domain_score = $7,
            soft_score = $8,
            status = $9,
            last_error = NULL,
            updated_at = now()
        WHERE job_id = $1 AND candidate_id = $2
        "#,
    )
    .bind(job_id)
    .bind(candidate_id)
    .bind(&result.candidate.name)
    .bind(analysis_key)
    .bind(result.candidate.overall_score as i32)
    .bind(result.candidate.core_score as i32)
    .bind(result.candidate.domain_score as i32)
    .bind(result.candidate.soft_score as i32)
    .bind(CandidateStatus::Complete.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE job_postings SET
            total_candidates = (SELECT COUNT(*) FROM candidates WHERE job_id = $1),
            top_score = (SELECT COALESCE(MAX(overall_score), 0) FROM candidates WHERE job_id = $1),
            status = CASE
                WHEN status = 'closed' THEN 'closed'
                WHEN NOT EXISTS (
                    SELECT 1 FROM candidates WHERE job_id = $1 AND status <> 'complete'
                ) THEN 'analyzed'
                WHEN status = 'new' THEN 'in_progress'
                ELSE status
            END,
            updated_at = now()
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Terminal FAILED marker for a unit of work, with the last error.
async fn mark_candidate_failed(
    pool: &sqlx::PgPool,
    job_id: &str,
    candidate_id: &str,
    error: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE candidates SET status = $3, last_error = $4, updated_at = now()
        WHERE job_id = $1 AND candidate_id = $2
        "#,
    )
    .bind(job_id)
    .bind(candidate_id)
    .bind(CandidateStatus::Failed.as_str())
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_root_jd_upload() {
        assert_eq!(
            classify("opportunities/senior_devops_jd.pdf"),
            UploadKind::JobRoot {
                filename: "senior_devops_jd.pdf".to_string()
            }
        );
    }

    #[test]
    fn test_classify_jd_folder_upload() {
        assert_eq!(
            classify("opportunities/SO_000005/jd/revised_jd.pdf"),
            UploadKind::JobFolder {
                job_id: "SO_000005".to_string(),
                filename: "revised_jd.pdf".to_string()
            }
        );
    }

    #[test]
    fn test_classify_candidate_upload() {
        assert_eq!(
            classify("opportunities/SO_000005/candidates/arjun_mehta.pdf"),
            UploadKind::CandidateUpload {
                job_id: "SO_000005".to_string(),
                filename: "arjun_mehta.pdf".to_string()
            }
        );
    }

    #[test]
    fn test_classify_ignores_derived_jd_json() {
        assert_eq!(classify("opportunities/SO_000005/jd/jd.json"), UploadKind::Ignored);
    }

    #[test]
    fn test_classify_ignores_relocated_resume() {
        assert_eq!(
            classify("opportunities/SO_000005/candidates/CAND_000001/resume.pdf"),
            UploadKind::Ignored
        );
    }

    #[test]
    fn test_classify_ignores_analysis_artifact() {
        assert_eq!(
            classify("opportunities/SO_000005/candidates/CAND_000001/analysis.json"),
            UploadKind::Ignored
        );
    }

    #[test]
    fn test_classify_ignores_foreign_root() {
        assert_eq!(classify("uploads/whatever.pdf"), UploadKind::Ignored);
        assert_eq!(classify("api-lambda/deployment.zip"), UploadKind::Ignored);
    }

    #[test]
    fn test_classify_ignores_folder_markers() {
        assert_eq!(classify("opportunities/"), UploadKind::Ignored);
        assert_eq!(classify("opportunities/SO_000005/candidates/"), UploadKind::Ignored);
    }

    #[test]
    fn test_classify_ignores_unknown_folder_type() {
        assert_eq!(
            classify("opportunities/SO_000005/notes/meeting.txt"),
            UploadKind::Ignored
        );
    }

    #[test]
    fn test_derive_candidate_name() {
        assert_eq!(derive_candidate_name("arjun_mehta.pdf"), "Arjun Mehta");
        assert_eq!(derive_candidate_name("jane-doe-resume.docx"), "Jane Doe Resume");
        assert_eq!(derive_candidate_name("resume"), "Resume");
    }

    #[test]
    fn test_split_relocated_resume() {
        let (cand, file) =
            split_relocated_resume("opportunities/SO_000005/candidates/CAND_000001/resume.pdf")
                .unwrap();
        assert_eq!(cand, "CAND_000001");
        assert_eq!(file, "resume.pdf");

        assert!(split_relocated_resume(
            "opportunities/SO_000005/candidates/CAND_000001/analysis.json"
        )
        .is_none());
        assert!(split_relocated_resume("opportunities/SO_000005/candidates/loose.pdf").is_none());
    }
}
