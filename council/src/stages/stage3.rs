//! Stage 3: chairman synthesis of the final answer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{ChatMessage, ModelClient};
use crate::stages::{Stage1Result, Stage2Result};

/// Display name used for the chairman in synthesized results.
pub const CHAIRMAN_NAME: &str = "Chairman";

/// The final answer for a turn. Exactly one per turn, even when degraded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisResult {
    pub model: String,
    pub response: String,
}

impl SynthesisResult {
    /// Fixed fallback when the chairman call fails.
    pub(crate) fn fallback() -> Self {
        Self {
            model: CHAIRMAN_NAME.to_string(),
            response: "Error: Unable to generate final synthesis.".to_string(),
        }
    }

    /// Abort-shaped result when Stage 1 produced no responses at all.
    pub(crate) fn aborted() -> Self {
        Self {
            model: "error".to_string(),
            response: "All council members failed to respond. Please try again.".to_string(),
        }
    }
}

fn synthesis_prompt(query: &str, stage1: &[Stage1Result], stage2: &[Stage2Result]) -> String {
    let stage1_text = stage1
        .iter()
        .map(|result| {
            format!(
                "Persona: {} ({})\nResponse: {}",
                result.persona_name, result.persona_icon, result.response
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let stage2_text = stage2
        .iter()
        .map(|result| format!("Ranker: {}\nRanking: {}", result.ranker, result.ranking))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are the Chairman of an LLM Council. Multiple AI Experts (Personas) have provided \
         responses to a user's question, and then ranked each other's responses.\n\n\
         Original Question: {query}\n\n\
         STAGE 1 - Expert Responses:\n{stage1_text}\n\n\
         STAGE 2 - Peer Rankings:\n{stage2_text}\n\n\
         Your task as Chairman is to synthesize all of this information into a single, \
         comprehensive, accurate answer to the user's original question. Consider:\n\
         - The individual responses and their unique perspectives\n\
         - The peer rankings and what they reveal about response quality\n\
         - Any patterns of agreement or disagreement\n\n\
         Provide a clear, well-reasoned final answer that represents the council's collective wisdom:"
    )
}

/// Single chairman call over the full turn context.
///
/// On failure, returns the fixed fallback result; the turn still completes
/// and is persistable.
pub async fn synthesize_final(
    client: Arc<dyn ModelClient>,
    query: &str,
    stage1: &[Stage1Result],
    stage2: &[Stage2Result],
    chairman_model: &str,
    timeout: Duration,
) -> SynthesisResult {
    let prompt = synthesis_prompt(query, stage1, stage2);
    let messages = vec![ChatMessage::user(prompt)];

    match client.query(chairman_model, &messages, timeout).await {
        Some(reply) => SynthesisResult {
            model: CHAIRMAN_NAME.to_string(),
            response: reply.content,
        },
        None => {
            warn!(model = chairman_model, "chairman synthesis failed, using fallback");
            SynthesisResult::fallback()
        }
    }
}
