//! Analysis Pipeline Orchestrator — the fixed LLM stage chain per unit of
//! work, either "parse a job description" or "evaluate one resume against
//! one job description".
//!
//! Stages are strictly sequential within a unit; each consumes the prior
//! stages' typed output. A stage that exhausts its retries fails the whole
//! unit — it never substitutes placeholder data, since later stages depend
//! on its output.

pub mod prompts;
pub mod stages;

use std::fmt;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::llm_client::{strip_json_fences, Inference, LlmError};
use crate::models::analysis::{AnalysisResult, CandidateSummary, JdAnalysis};
use crate::pipeline::stages::{FitEvaluation, GapReport, ParsedProfile, Rating};

/// Retries per stage beyond the first attempt.
const MAX_STAGE_RETRIES: u32 = 2;

/// The unit-of-work state machine. `Failed` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    RequirementsExtracted,
    Evaluated,
    GapsIdentified,
    Rated,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::Parsed => "PARSED",
            Stage::RequirementsExtracted => "REQUIREMENTS_EXTRACTED",
            Stage::Evaluated => "EVALUATED",
            Stage::GapsIdentified => "GAPS_IDENTIFIED",
            Stage::Rated => "RATED",
            Stage::Complete => "COMPLETE",
            Stage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a unit of work. Carries the stage that gave up and
/// the last marker the unit actually reached, which is what gets recorded.
#[derive(Debug, Error)]
#[error("stage {failed_stage} failed (last completed: {last_completed}): {source}")]
pub struct PipelineError {
    pub failed_stage: Stage,
    pub last_completed: Stage,
    #[source]
    pub source: LlmError,
}

/// Job-description context for a resume evaluation. A prior JD unit usually
/// supplies the structured analysis; raw text is the fallback when only the
/// original upload exists.
#[derive(Debug, Clone)]
pub enum JobContext {
    Analyzed(JdAnalysis),
    RawText(String),
}

/// Runs one stage: a single inference call validated against `T`, retried
/// with exponential backoff on transient failure and on malformed output.
pub(crate) async fn run_stage<T: DeserializeOwned>(
    infer: &dyn Inference,
    stage: Stage,
    last_completed: Stage,
    system: &str,
    prompt: &str,
) -> Result<T, PipelineError> {
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..=MAX_STAGE_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 500ms, 1s
            let delay = std::time::Duration::from_millis(500 * (1 << (attempt - 1)));
            warn!(
                "Stage {stage} attempt {attempt} failed, retrying after {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let error = match infer.complete(system, prompt).await {
            Ok(text) => match serde_json::from_str::<T>(strip_json_fences(&text)) {
                Ok(value) => return Ok(value),
                // Malformed output: a fresh sample may parse, so this
                // consumes a retry like any transient failure.
                Err(e) => LlmError::Parse(e),
            },
            Err(e) => e,
        };

        let retryable = error.is_retryable();
        last_error = Some(error);
        if !retryable {
            break;
        }
    }

    Err(PipelineError {
        failed_stage: stage,
        last_completed,
        source: last_error.unwrap_or(LlmError::EmptyContent),
    })
}

/// JD-parse unit of work: requirement extraction only.
pub async fn run_jd_unit(
    infer: &dyn Inference,
    jd_text: &str,
) -> Result<JdAnalysis, PipelineError> {
    stages::extract_requirements(infer, jd_text, Stage::Received).await
}

/// Resume-evaluation unit of work: the five-stage chain.
///
/// RECEIVED -> PARSED -> REQUIREMENTS_EXTRACTED -> EVALUATED ->
/// GAPS_IDENTIFIED -> RATED -> COMPLETE. When the job context is already
/// analyzed, the requirements marker is reached without a fresh call.
pub async fn run_evaluation(
    infer: &dyn Inference,
    candidate_id: &str,
    resume_text: &str,
    job_context: &JobContext,
) -> Result<AnalysisResult, PipelineError> {
    let profile = stages::parse_profile(infer, resume_text).await?;

    let requirements = match job_context {
        JobContext::Analyzed(jd) => jd.clone(),
        JobContext::RawText(text) => {
            stages::extract_requirements(infer, text, Stage::Parsed).await?
        }
    };

    let evaluation = stages::evaluate_fit(infer, &profile, &requirements).await?;
    let gaps = stages::identify_gaps(infer, &profile, &requirements).await?;
    let rating = stages::rate_candidate(infer, &profile, &requirements, &evaluation, &gaps).await?;

    Ok(assemble(candidate_id, profile, evaluation, gaps, rating))
}

/// Aggregates the stage outputs into the one self-contained payload the
/// read side renders.
fn assemble(
    candidate_id: &str,
    profile: ParsedProfile,
    evaluation: FitEvaluation,
    gaps: GapReport,
    rating: Rating,
) -> AnalysisResult {
    let initials = initials(&profile.name);
    AnalysisResult {
        candidate: CandidateSummary {
            id: candidate_id.to_string(),
            name: profile.name,
            level: profile.level,
            experience_years: profile.experience_years,
            overall_score: rating.overall_score.min(100),
            core_score: rating.core_score.min(100),
            domain_score: rating.domain_score.min(100),
            soft_score: rating.soft_score.min(100),
            initials,
        },
        core_skills: evaluation.core_skills,
        domain_skills: evaluation.domain_skills,
        evidence_snippets: evaluation.evidence_snippets,
        gaps: gaps.gaps,
        recommendation: rating.recommendation,
    }
}

/// First letters of the first and last name, uppercased.
fn initials(name: &str) -> String {
    let mut words = name.split_whitespace();
    let first = words.next().and_then(|w| w.chars().next());
    let last = words.last().and_then(|w| w.chars().next());
    match (first, last) {
        (Some(f), Some(l)) => format!("{}{}", f.to_uppercase(), l.to_uppercase()),
        (Some(f), None) => f.to_uppercase().to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted inference fake: pops one canned response per call and
    /// records the prompts it saw.
    struct ScriptedInference {
        responses: Mutex<VecDeque<Result<String, u16>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedInference {
        fn new(responses: Vec<Result<&str, u16>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_owned))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Inference for ScriptedInference {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted inference ran out of responses");
            next.map_err(|status| LlmError::Api {
                status,
                message: "injected".to_string(),
            })
        }
    }

    const PROFILE_JSON: &str = r#"{
        "name": "Arjun Mehta",
        "level": "Senior",
        "experience_years": 9.0,
        "skills": ["AWS", "Docker", "Terraform"],
        "summary": "Senior DevOps engineer with 9 years on AWS."
    }"#;

    const JD_JSON: &str = r#"{
        "summary": "Senior DevOps role, AWS-heavy.",
        "title": "Senior DevOps Engineer",
        "client": "Acme",
        "keywords": ["AWS", "IaC", "Docker"],
        "required_qualifications": ["5+ years AWS"],
        "preferred_qualifications": ["Kubernetes"]
    }"#;

    const EVALUATION_JSON: &str = r#"{
        "coreSkills": [
            {"name": "AWS", "years": "7 yrs", "level": "Expert", "status": "pass"}
        ],
        "domainSkills": [
            {"skill": "CI/CD", "priority": "High", "level": "Strong", "evidence": "Built pipelines"}
        ],
        "evidenceSnippets": ["Led migration to ECS"]
    }"#;

    const GAPS_JSON: &str = r#"{"gaps": ["No production Kubernetes experience"]}"#;

    const RATING_JSON: &str = r#"{
        "overallScore": 85,
        "coreScore": 88,
        "domainScore": 80,
        "softScore": 78,
        "recommendation": "Proceed to interview."
    }"#;

    fn analyzed_context() -> JobContext {
        JobContext::Analyzed(serde_json::from_str(JD_JSON).unwrap())
    }

    #[tokio::test]
    async fn test_evaluation_with_analyzed_jd_makes_four_calls() {
        let infer = ScriptedInference::new(vec![
            Ok(PROFILE_JSON),
            Ok(EVALUATION_JSON),
            Ok(GAPS_JSON),
            Ok(RATING_JSON),
        ]);

        let result = run_evaluation(&infer, "CAND_000001", "resume text", &analyzed_context())
            .await
            .unwrap();

        assert_eq!(infer.calls(), 4);
        assert_eq!(result.candidate.id, "CAND_000001");
        assert_eq!(result.candidate.name, "Arjun Mehta");
        assert_eq!(result.candidate.initials, "AM");
        assert_eq!(result.candidate.overall_score, 85);
        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.recommendation, "Proceed to interview.");
    }

    #[tokio::test]
    async fn test_evaluation_with_raw_jd_runs_requirements_stage() {
        let infer = ScriptedInference::new(vec![
            Ok(PROFILE_JSON),
            Ok(JD_JSON),
            Ok(EVALUATION_JSON),
            Ok(GAPS_JSON),
            Ok(RATING_JSON),
        ]);
        let context = JobContext::RawText("Senior DevOps, AWS/IaC/Docker".to_string());

        let result = run_evaluation(&infer, "CAND_000002", "resume text", &context)
            .await
            .unwrap();

        assert_eq!(infer.calls(), 5);
        assert_eq!(result.candidate.core_score, 88);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_at_evaluation_stage_stops_the_chain() {
        // Profile parses, then the evaluation stage fails every attempt.
        let infer = ScriptedInference::new(vec![
            Ok(PROFILE_JSON),
            Err(500),
            Err(500),
            Err(500),
        ]);

        let err = run_evaluation(&infer, "CAND_000003", "resume text", &analyzed_context())
            .await
            .unwrap_err();

        assert_eq!(err.failed_stage, Stage::Evaluated);
        assert_eq!(err.last_completed, Stage::RequirementsExtracted);
        // 1 profile call + 3 evaluation attempts; gaps and rating never ran.
        assert_eq!(infer.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_consumes_a_retry_then_succeeds() {
        let infer = ScriptedInference::new(vec![Ok("this is not json"), Ok(JD_JSON)]);

        let jd = run_jd_unit(&infer, "Senior DevOps, AWS/IaC/Docker")
            .await
            .unwrap();

        assert_eq!(infer.calls(), 2);
        assert_eq!(jd.title, "Senior DevOps Engineer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_exhausts_retries_and_fails_unit() {
        let infer =
            ScriptedInference::new(vec![Ok("nope"), Ok("still nope"), Ok("never json")]);

        let err = run_jd_unit(&infer, "jd text").await.unwrap_err();

        assert_eq!(err.failed_stage, Stage::RequirementsExtracted);
        assert_eq!(err.last_completed, Stage::Received);
        assert!(matches!(err.source, LlmError::Parse(_)));
        assert_eq!(infer.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_without_retrying() {
        let infer = ScriptedInference::new(vec![Err(400)]);

        let err = run_jd_unit(&infer, "jd text").await.unwrap_err();

        assert_eq!(infer.calls(), 1);
        assert!(matches!(err.source, LlmError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_fenced_stage_output_is_accepted() {
        let fenced = format!("```json\n{JD_JSON}\n```");
        let infer = ScriptedInference::new(vec![Ok(fenced.as_str())]);

        let jd = run_jd_unit(&infer, "jd text").await.unwrap();
        assert_eq!(jd.keywords, vec!["AWS", "IaC", "Docker"]);
    }

    #[tokio::test]
    async fn test_scores_are_clamped_to_100() {
        let rating = r#"{
            "overallScore": 120, "coreScore": 100, "domainScore": 99,
            "softScore": 101, "recommendation": "r"
        }"#;
        let infer = ScriptedInference::new(vec![
            Ok(PROFILE_JSON),
            Ok(EVALUATION_JSON),
            Ok(GAPS_JSON),
            Ok(rating),
        ]);

        let result = run_evaluation(&infer, "CAND_000004", "resume", &analyzed_context())
            .await
            .unwrap();

        assert_eq!(result.candidate.overall_score, 100);
        assert_eq!(result.candidate.soft_score, 100);
        assert_eq!(result.candidate.domain_score, 99);
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Arjun Mehta"), "AM");
        assert_eq!(initials("Madonna"), "M");
        assert_eq!(initials("Jean claude van Damme"), "JD");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_stage_markers_match_recorded_names() {
        assert_eq!(Stage::RequirementsExtracted.as_str(), "REQUIREMENTS_EXTRACTED");
        assert_eq!(Stage::GapsIdentified.as_str(), "GAPS_IDENTIFIED");
        assert_eq!(Stage::Failed.to_string(), "FAILED");
    }
}
