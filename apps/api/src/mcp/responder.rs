//! Chat Responder: turns computed results into the assistant's reply.
//!
//! The model is asked for `{message, followUpQuestion}` JSON. Plain prose is
//! accepted as the message. A failed call degrades to a fixed apology.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::{strip_json_fences, LanguageModel};
use crate::mcp::prompts::{CHAT_PROMPT_TEMPLATE, CHAT_SYSTEM};
use crate::mcp::request::Mode;
use crate::mcp::response::ChatResponse;
use crate::models::conversation::ConversationContext;
use crate::soft::{within, Degraded, Soft};

pub const APOLOGY: &str =
    "I'm sorry, I wasn't able to put together a full answer just now. \
    The results I found are included below.";
pub const GENERIC_FOLLOW_UP: &str = "Would you like me to try a different approach?";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatReply {
    message: String,
    #[serde(default)]
    follow_up_question: Option<String>,
}

pub fn apology() -> ChatResponse {
    ChatResponse {
        message: APOLOGY.to_string(),
        follow_up_question: Some(GENERIC_FOLLOW_UP.to_string()),
    }
}

#[derive(Clone)]
pub struct ChatResponder {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ChatResponder {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn respond(
        &self,
        mode: Mode,
        last_message: Option<&str>,
        context: &ConversationContext,
        data: &Value,
    ) -> Soft<ChatResponse> {
        let prompt = CHAT_PROMPT_TEMPLATE
            .replace("{mode}", mode.as_str())
            .replace("{message}", last_message.unwrap_or("(none)"))
            .replace(
                "{history}",
                context.summary.as_deref().unwrap_or("(no earlier messages)"),
            )
            .replace("{data}", &data.to_string())
            .replace("{grounding}", GROUNDING_INSTRUCTION);

        let text = within(self.timeout, self.llm.complete(CHAT_SYSTEM, &prompt))
            .await
            .map_err(|reason| Degraded::new(apology(), reason))?;

        parse_reply(&text).ok_or_else(|| Degraded::new(apology(), "empty narrative"))
    }
}

fn parse_reply(text: &str) -> Option<ChatResponse> {
    let body = strip_json_fences(text);
    if let Ok(reply) = serde_json::from_str::<ChatReply>(body) {
        if !reply.message.trim().is_empty() {
            return Some(ChatResponse {
                message: reply.message.trim().to_string(),
                follow_up_question: reply
                    .follow_up_question
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty()),
            });
        }
    }
    let prose = text.trim();
    if prose.is_empty() {
        return None;
    }
    Some(ChatResponse {
        message: prose.to_string(),
        follow_up_question: None,
    })
}
