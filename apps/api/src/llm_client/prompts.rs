// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts alongside it;
// this file holds the cross-cutting pieces.

/// Instruction appended to every prompt that narrates computed data.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only state facts present in the provided data. \
    Do NOT invent scores, names, skills or capabilities. \
    If the data is empty, say so plainly and suggest a next step.";
