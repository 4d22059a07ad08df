// All LLM prompt constants for the analysis pipeline. One system prompt and
// one template per stage; templates carry `{placeholders}` replaced before
// sending. Every prompt enforces JSON-only output because stage responses
// are validated against a fixed schema, never parsed permissively.

/// System prompt for the job-requirement extraction stage.
pub const JD_SYSTEM: &str =
    "You are a Job Analyzer Agent specializing in extracting job requirements. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Requirement-extraction template. Replace `{jd_text}`.
pub const JD_PROMPT_TEMPLATE: &str = r#"Analyze the following job description and extract structured requirements.

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "A very brief summary (1-2 lines) highlighting the key points of the job description",
  "title": "A suitable job title (e.g., \"DevOps Engineer\", \"Data Scientist\")",
  "client": "Client/company name if mentioned, else \"N/A\"",
  "keywords": ["Top 5-6 key technical skills and technologies, e.g. \"AWS\", \"Python\""],
  "required_qualifications": ["Education, experience, skills, certifications that are required"],
  "preferred_qualifications": ["Additional beneficial skills"]
}

JOB DESCRIPTION:
{jd_text}"#;

/// System prompt for the resume-profile extraction stage.
pub const PROFILE_SYSTEM: &str =
    "You are a Resume Parser Agent specializing in extracting structured information from resumes. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Profile-extraction template. Replace `{resume_text}`.
pub const PROFILE_PROMPT_TEMPLATE: &str = r#"Extract structured information from the following resume.

Return a JSON object with this EXACT schema (no extra fields):
{
  "name": "Full name from the resume",
  "level": "Senior | Mid | Junior",
  "experience_years": number,
  "skills": ["technical, domain and soft skills, with the most prominent first"],
  "summary": "2-3 sentence professional summary grounded in the resume"
}

RESUME:
{resume_text}"#;

/// System prompt for the fit-evaluation stage.
pub const EVALUATION_SYSTEM: &str =
    "You are a Resume Evaluator Agent specializing in comparing candidates against job requirements. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Fit-evaluation template. Replace `{profile_json}` and `{requirements_json}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate the candidate against the job requirements.

Return a JSON object with this EXACT schema (no extra fields):
{
  "coreSkills": [
    {"name": "Skill name", "years": "X yrs", "level": "Expert | Strong | Basic", "status": "pass | partial | fail"}
  ],
  "domainSkills": [
    {"skill": "Domain skill name", "priority": "High | Medium | Low", "level": "Expert | Strong | Basic", "evidence": "Short evidence from resume"}
  ],
  "evidenceSnippets": ["3-6 direct quotes or paraphrased evidence from the resume"]
}

Rules:
- coreSkills: 4-8 items covering the job's must-have skills. status must be exactly "pass", "partial", or "fail".
- domainSkills: 3-6 items. priority must be "High", "Medium", or "Low".
- Omit "years" (use null) when the resume gives no duration signal.

CANDIDATE PROFILE:
{profile_json}

JOB REQUIREMENTS:
{requirements_json}"#;

/// System prompt for the gap-identification stage.
pub const GAPS_SYSTEM: &str =
    "You are a Gap Identifier Agent specializing in finding missing qualifications and inconsistencies. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Gap-identification template. Replace `{profile_json}` and `{requirements_json}`.
pub const GAPS_PROMPT_TEMPLATE: &str = r#"Identify gaps between the candidate and the job requirements.

Return a JSON object with this EXACT schema (no extra fields):
{
  "gaps": ["2-5 specific gaps or risks: missing qualifications, timeline gaps, skill mismatches, areas needing clarification"]
}

CANDIDATE PROFILE:
{profile_json}

JOB REQUIREMENTS:
{requirements_json}"#;

/// System prompt for the rating stage.
pub const RATING_SYSTEM: &str =
    "You are a Candidate Rater Agent specializing in scoring candidates. \
    All scores are numbers from 0 to 100. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Rating template. Replace `{profile_json}`, `{requirements_json}`,
/// `{evaluation_json}` and `{gaps_json}`.
pub const RATING_PROMPT_TEMPLATE: &str = r#"Rate the candidate against the job requirements, using the evaluation and gaps below as evidence.

Return a JSON object with this EXACT schema (no extra fields):
{
  "overallScore": number 0-100,
  "coreScore": number 0-100,
  "domainScore": number 0-100,
  "softScore": number 0-100,
  "recommendation": "One or two paragraph recommendation: whether to proceed, key strengths, areas to probe in interview."
}

CANDIDATE PROFILE:
{profile_json}

JOB REQUIREMENTS:
{requirements_json}

EVALUATION:
{evaluation_json}

GAPS:
{gaps_json}"#;
