//! Analysis payload — the self-contained, independently-renderable unit the
//! pipeline writes once per completed run. Wire shape is camelCase because
//! the UI reads `analysis.json` directly from the object store.

use serde::{Deserialize, Serialize};

/// Verdict for one core-skill match. The values are fixed wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Pass,
    Partial,
    Fail,
}

/// Per-requirement fit for a core (must-have) skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSkillMatch {
    pub name: String,
    /// e.g. "5 yrs" — absent when the resume gives no duration signal.
    #[serde(default)]
    pub years: Option<String>,
    pub level: String,
    pub status: SkillStatus,
}

/// Domain/functional skill assessment with evidence from the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSkillMatch {
    pub skill: String,
    pub priority: String,
    pub level: String,
    pub evidence: String,
}

/// The candidate header block of the analysis payload. Scores are 0-100;
/// the rating stage fixes this scale for the read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub id: String,
    pub name: String,
    pub level: String,
    pub experience_years: f64,
    pub overall_score: u32,
    pub core_score: u32,
    pub domain_score: u32,
    pub soft_score: u32,
    pub initials: String,
}

/// Full structured analysis for one resume evaluated against one job.
/// Written atomically (single object put); readers never see it half-built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub candidate: CandidateSummary,
    pub core_skills: Vec<CoreSkillMatch>,
    pub domain_skills: Vec<DomainSkillMatch>,
    pub evidence_snippets: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendation: String,
}

/// Structured output of the job-description parse unit, persisted to
/// `opportunities/{jobId}/jd/jd.json` and reused by every resume run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdAnalysis {
    pub summary: String,
    pub title: String,
    #[serde(default = "default_client")]
    pub client: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub required_qualifications: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
}

fn default_client() -> String {
    "N/A".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The exact wire shape the supervisor contract fixes: camelCase keys,
    /// lowercase skill statuses, one candidate per analysis.
    const ANALYSIS_FIXTURE: &str = r#"{
        "candidate": {
            "id": "CAND_000045",
            "name": "Arjun Mehta",
            "level": "Senior",
            "experienceYears": 9,
            "overallScore": 85,
            "coreScore": 88,
            "domainScore": 80,
            "softScore": 78,
            "initials": "AM"
        },
        "coreSkills": [
            {"name": "AWS", "years": "7 yrs", "level": "Expert", "status": "pass"},
            {"name": "Terraform", "years": null, "level": "Basic", "status": "partial"},
            {"name": "Kubernetes", "level": "Basic", "status": "fail"}
        ],
        "domainSkills": [
            {"skill": "CI/CD pipelines", "priority": "High", "level": "Strong",
             "evidence": "Built GitLab pipelines for 40 services"}
        ],
        "evidenceSnippets": ["Led migration of 200 VMs to ECS"],
        "gaps": ["No production Kubernetes experience"],
        "recommendation": "Proceed to interview; probe container orchestration depth."
    }"#;

    #[test]
    fn test_analysis_result_deserializes_wire_shape() {
        let result: AnalysisResult = serde_json::from_str(ANALYSIS_FIXTURE).unwrap();
        assert_eq!(result.candidate.id, "CAND_000045");
        assert_eq!(result.candidate.overall_score, 85);
        assert_eq!(result.core_skills.len(), 3);
        assert_eq!(result.core_skills[0].status, SkillStatus::Pass);
        assert_eq!(result.core_skills[1].years, None);
        assert_eq!(result.core_skills[2].years, None);
        assert_eq!(result.gaps.len(), 1);
        assert!(!result.recommendation.is_empty());
    }

    #[test]
    fn test_analysis_result_round_trips_camel_case() {
        let result: AnalysisResult = serde_json::from_str(ANALYSIS_FIXTURE).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["candidate"]["overallScore"].is_number());
        assert!(json["coreSkills"].is_array());
        assert!(json["evidenceSnippets"].is_array());
        assert_eq!(json["coreSkills"][0]["status"], "pass");
    }

    #[test]
    fn test_jd_analysis_tolerates_missing_optional_fields() {
        let json = r#"{
            "summary": "Senior DevOps role focused on AWS infrastructure.",
            "title": "Senior DevOps Engineer",
            "keywords": ["AWS", "IaC", "Docker"]
        }"#;
        let jd: JdAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(jd.client, "N/A");
        assert!(jd.required_qualifications.is_empty());
        assert_eq!(jd.keywords.len(), 3);
    }

    #[test]
    fn test_skill_status_rejects_unknown_value() {
        let err = serde_json::from_str::<SkillStatus>(r#""maybe""#);
        assert!(err.is_err());
    }
}
