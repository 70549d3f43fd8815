// All LLM prompt constants for the MCP loop.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for tool planning. Also identifies planner calls to test fakes.
pub const PLANNER_SYSTEM: &str =
    "You are the planning component of a talent-matching assistant. \
    Choose which analysis tools should run next for the user's request. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Planner prompt template. Replace `{mode}`, `{anchors}`, `{message}`,
/// `{focus}`, `{previous}` and `{tools}` before sending.
pub const PLANNER_PROMPT_TEMPLATE: &str = r#"Recommend the analysis tools to run for this request.

Mode: {mode}
Anchor ids: {anchors}
Latest user message: {message}
Current focus: {focus}
Previously shown matches: {previous}

You may ONLY choose from these tools:
{tools}

Return a JSON object with this EXACT schema:
{
  "recommendations": [
    {"tool": "<one of the tools above>", "reason": "<one sentence>", "confidence": 0.0, "inputs": {}}
  ]
}

Rules:
- Order recommendations from most to least useful.
- confidence is a number between 0 and 1.
- Return at most 3 recommendations."#;

/// System prompt for the user-facing narrative.
pub const CHAT_SYSTEM: &str =
    "You are a friendly talent-matching assistant helping people explore roles, \
    candidates and workforce capabilities. Write concise, plain-language answers. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Narrative prompt template. Replace `{mode}`, `{message}`, `{history}`,
/// `{data}` and `{grounding}` before sending.
pub const CHAT_PROMPT_TEMPLATE: &str = r#"Write the assistant's reply for a {mode} conversation.

Latest user message: {message}

Recent conversation:
{history}

Computed results (JSON):
{data}

{grounding}

Return a JSON object with this EXACT schema:
{
  "message": "<2-5 sentence reply summarising the results>",
  "followUpQuestion": "<one short question that moves the conversation forward>"
}"#;
