//! Conversation Context Loader: rebuilds what the loop knows about a session.
//!
//! Store failures degrade to an empty context; the loop always proceeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::models::conversation::{ConversationContext, MessageRow};
use crate::soft::{within, Degraded, Soft};
use crate::store::TalentStore;

/// Messages quoted in the narrative summary.
const SUMMARY_MESSAGES: usize = 3;
const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub message_limit: usize,
    pub action_limit: usize,
    pub embedding_average_count: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            message_limit: 10,
            action_limit: 5,
            embedding_average_count: 5,
        }
    }
}

#[derive(Clone)]
pub struct ConversationContextLoader {
    store: Arc<dyn TalentStore>,
    timeout: Duration,
}

impl ConversationContextLoader {
    pub fn new(store: Arc<dyn TalentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn load(
        &self,
        session_id: &str,
        options: &ContextOptions,
    ) -> Soft<ConversationContext> {
        let (history, agent_actions) = tokio::try_join!(
            within(
                self.timeout,
                self.store.recent_messages(session_id, options.message_limit)
            ),
            within(
                self.timeout,
                self.store.recent_actions(session_id, options.action_limit)
            ),
        )
        .map_err(|reason| {
            Degraded::new(
                ConversationContext::default(),
                format!("history for session {session_id}: {reason}"),
            )
        })?;

        let embeddings = history
            .iter()
            .filter_map(|m| m.embedding.as_deref())
            .chain(agent_actions.iter().filter_map(|a| a.embedding.as_deref()));
        let context_embedding = mean_embedding(embeddings, options.embedding_average_count);

        debug!(
            "Loaded {} messages and {} actions for session {session_id} (embedding: {})",
            history.len(),
            agent_actions.len(),
            context_embedding.is_some()
        );

        Ok(ConversationContext {
            summary: summarize(&history),
            history,
            agent_actions,
            context_embedding,
        })
    }
}

/// Element-wise mean of the first `count` non-empty embeddings. Vectors whose
/// dimension differs from the first one are skipped.
pub fn mean_embedding<'a>(
    embeddings: impl Iterator<Item = &'a [f32]>,
    count: usize,
) -> Option<Vec<f32>> {
    let mut sum: Vec<f32> = Vec::new();
    let mut taken = 0usize;
    for embedding in embeddings.filter(|e| !e.is_empty()) {
        if taken == count {
            break;
        }
        if sum.is_empty() {
            sum = embedding.to_vec();
        } else if embedding.len() == sum.len() {
            sum.iter_mut().zip(embedding).for_each(|(acc, v)| *acc += v);
        } else {
            continue;
        }
        taken += 1;
    }
    if taken == 0 {
        return None;
    }
    let n = taken as f32;
    Some(sum.into_iter().map(|v| v / n).collect())
}

/// Oldest-first digest of the latest few messages.
fn summarize(history: &[MessageRow]) -> Option<String> {
    if history.is_empty() {
        return None;
    }
    let lines: Vec<String> = history
        .iter()
        .take(SUMMARY_MESSAGES)
        .rev()
        .map(|m| {
            let content: String = m.content.chars().take(SUMMARY_CHARS).collect();
            format!("{}: {}", m.role, content)
        })
        .collect();
    Some(lines.join("\n"))
}
