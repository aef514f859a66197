// Prompts for resume tailoring.
// Both calls share the same job context block.

/// System prompt for the tailored resume body.
pub const RESUME_SYSTEM: &str = "You are an expert resume writer who tailors \
    resumes to specific job openings. Respond with the resume text only, in the \
    same format as the original. No preamble, no commentary.";

/// Tailoring prompt. Replace `{job_context}`, `{original_resume}` and
/// `{truthfulness}` before sending.
pub const RESUME_PROMPT_TEMPLATE: &str = r#"{job_context}

Original Resume:
{original_resume}

Customize the resume for this job. Keep the original structure, then:
1. Highlight the skills and experience most relevant to the job
2. Reorder bullet points so the strongest matches come first
3. Mirror the job description's terminology where it is accurate to do so
4. Keep professional formatting

{truthfulness}"#;

pub const RESUME_MAX_TOKENS: u32 = 3000;

/// System prompt for the change summary.
pub const SUMMARY_SYSTEM: &str = "You summarize edits made to a resume. \
    Respond in plain prose, two or three sentences, no lists.";

/// Summary prompt. Replace `{job_context}`, `{original_resume}` and
/// `{customized_resume}` before sending.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{job_context}

Original Resume:
{original_resume}

Customized Resume:
{customized_resume}

Summarize the key changes made to tailor the resume for this position."#;

pub const SUMMARY_MAX_TOKENS: u32 = 200;

/// Stored when the summary call fails or returns nothing.
pub const FALLBACK_SUMMARY: &str =
    "Resume tailored to emphasize the experience most relevant to this role.";
