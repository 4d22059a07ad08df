//! Per-stage schemas and inference calls. Each stage is a pure
//! request -> structured-result function: it formats a prompt from the
//! prior stages' typed outputs, makes one inference call (with the shared
//! retry policy), and validates the response against its schema.

use serde::{Deserialize, Serialize};

use crate::llm_client::Inference;
use crate::models::analysis::{CoreSkillMatch, DomainSkillMatch, JdAnalysis};
use crate::pipeline::prompts;
use crate::pipeline::{run_stage, PipelineError, Stage};

/// Stage 1 output: the parsed candidate profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedProfile {
    pub name: String,
    pub level: String,
    pub experience_years: f64,
    pub skills: Vec<String>,
    pub summary: String,
}

/// Stage 3 output: per-requirement fit with evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitEvaluation {
    pub core_skills: Vec<CoreSkillMatch>,
    pub domain_skills: Vec<DomainSkillMatch>,
    pub evidence_snippets: Vec<String>,
}

/// Stage 4 output: missing qualifications and risks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapReport {
    pub gaps: Vec<String>,
}

/// Stage 5 output: ordinal 0-100 scores plus the free-text recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub overall_score: u32,
    pub core_score: u32,
    pub domain_score: u32,
    pub soft_score: u32,
    pub recommendation: String,
}

pub async fn parse_profile(
    infer: &dyn Inference,
    resume_text: &str,
) -> Result<ParsedProfile, PipelineError> {
    let prompt = prompts::PROFILE_PROMPT_TEMPLATE.replace("{resume_text}", resume_text);
    run_stage(
        infer,
        Stage::Parsed,
        Stage::Received,
        prompts::PROFILE_SYSTEM,
        &prompt,
    )
    .await
}

pub async fn extract_requirements(
    infer: &dyn Inference,
    jd_text: &str,
    last_completed: Stage,
) -> Result<JdAnalysis, PipelineError> {
    let prompt = prompts::JD_PROMPT_TEMPLATE.replace("{jd_text}", jd_text);
    run_stage(
        infer,
        Stage::RequirementsExtracted,
        last_completed,
        prompts::JD_SYSTEM,
        &prompt,
    )
    .await
}

pub async fn evaluate_fit(
    infer: &dyn Inference,
    profile: &ParsedProfile,
    requirements: &JdAnalysis,
) -> Result<FitEvaluation, PipelineError> {
    let prompt = prompts::EVALUATION_PROMPT_TEMPLATE
        .replace("{profile_json}", &to_pretty_json(profile))
        .replace("{requirements_json}", &to_pretty_json(requirements));
    run_stage(
        infer,
        Stage::Evaluated,
        Stage::RequirementsExtracted,
        prompts::EVALUATION_SYSTEM,
        &prompt,
    )
    .await
}

pub async fn identify_gaps(
    infer: &dyn Inference,
    profile: &ParsedProfile,
    requirements: &JdAnalysis,
) -> Result<GapReport, PipelineError> {
    let prompt = prompts::GAPS_PROMPT_TEMPLATE
        .replace("{profile_json}", &to_pretty_json(profile))
        .replace("{requirements_json}", &to_pretty_json(requirements));
    run_stage(
        infer,
        Stage::GapsIdentified,
        Stage::Evaluated,
        prompts::GAPS_SYSTEM,
        &prompt,
    )
    .await
}

pub async fn rate_candidate(
    infer: &dyn Inference,
    profile: &ParsedProfile,
    requirements: &JdAnalysis,
    evaluation: &FitEvaluation,
    gaps: &GapReport,
) -> Result<Rating, PipelineError> {
    let prompt = prompts::RATING_PROMPT_TEMPLATE
        .replace("{profile_json}", &to_pretty_json(profile))
        .replace("{requirements_json}", &to_pretty_json(requirements))
        .replace("{evaluation_json}", &to_pretty_json(evaluation))
        .replace("{gaps_json}", &to_pretty_json(gaps));
    run_stage(
        infer,
        Stage::Rated,
        Stage::GapsIdentified,
        prompts::RATING_SYSTEM,
        &prompt,
    )
    .await
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
