// Prompts for job/profile fit scoring.

/// System prompt for fit scoring. Also the key test doubles script against.
pub const SCORE_SYSTEM: &str = "You are a career matching expert. \
    Score how well a job matches a candidate's profile on a scale of 0-100. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Fit scoring prompt. Replace `{job_title}`, `{company}`, `{job_description}`
/// and `{profile}` before sending.
pub const SCORE_PROMPT_TEMPLATE: &str = r#"Job Title: {job_title}
Company: {company}

Job Description:
{job_description}

Candidate Profile:
{profile}

Return a JSON object with this EXACT schema:
{
  "score": <integer 0-100>,
  "reason": "<one or two sentences explaining the score>"
}

Weigh skill alignment, required experience level, location and salary
expectations if mentioned, and career progression fit."#;

pub const SCORE_MAX_TOKENS: u32 = 500;
