//! Stage 1: parallel collection of individual persona responses.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ChatMessage, ModelClient};
use crate::persona::Persona;

/// A successful response from one persona.
///
/// Only produced for calls that succeeded; failed personas are omitted from
/// the result list entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage1Result {
    pub persona_id: String,
    pub persona_name: String,
    pub persona_role: String,
    pub persona_icon: String,
    pub model: String,
    pub response: String,
}

/// Fan the query out to every persona concurrently and join the batch.
///
/// Each persona gets an isolated conversation: its own system prompt plus
/// the user query, no cross-persona context. Tasks are spawned
/// independently and collected as `(index, reply-or-absence)` pairs; a
/// failed call drops that persona from the output without touching its
/// siblings. Output preserves input persona order, filtered to successes.
pub async fn collect_responses(
    client: Arc<dyn ModelClient>,
    query: &str,
    personas: &[Persona],
    timeout: Duration,
) -> Vec<Stage1Result> {
    let handles: Vec<_> = personas
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, persona)| {
            let client = Arc::clone(&client);
            let query = query.to_string();
            tokio::spawn(async move {
                let messages = vec![
                    ChatMessage::system(persona.system_prompt.as_str()),
                    ChatMessage::user(query),
                ];
                let reply = client.query(&persona.model, &messages, timeout).await;
                (index, persona, reply)
            })
        })
        .collect();

    let mut collected = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        match joined {
            Ok(entry) => collected.push(entry),
            Err(e) => warn!(error = %e, "stage1 task panicked"),
        }
    }
    collected.sort_by_key(|(index, ..)| *index);

    let mut results = Vec::new();
    for (_, persona, reply) in collected {
        match reply {
            Some(reply) => results.push(Stage1Result {
                persona_id: persona.id,
                persona_name: persona.name,
                persona_role: persona.role,
                persona_icon: persona.icon,
                model: persona.model,
                response: reply.content,
            }),
            None => debug!(persona = %persona.name, "no response from persona, omitting"),
        }
    }
    results
}
