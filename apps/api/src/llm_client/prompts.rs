// Cross-cutting prompt fragments. Each service keeps its own prompts.rs.

/// Appended to every prompt that rewrites candidate material.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Keep the resume honest and truthful. Every claim must already be \
    present in the original resume. Do NOT invent employers, titles, dates, \
    metrics or skills. Reorder and reword; never fabricate.";
