// MCP loop: mode-dispatching orchestration over context, planning, matching
// and scoring. All LLM calls go through llm_client via the LanguageModel trait.

pub mod audit;
pub mod context;
pub mod executor;
pub mod handlers;
pub mod planner;
pub mod prompts;
pub mod request;
pub mod responder;
pub mod response;
