//! Stage 2: anonymized peer ranking by the council itself.
//!
//! Every surviving persona receives the identical composite prompt with all
//! responses behind single-letter labels, and ranks them blind. The same
//! fan-out/fan-in policy as Stage 1 applies: a failed ranker is omitted and
//! never aborts the turn.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ChatMessage, ModelClient};
use crate::ranking::{parse_ranking, response_label, LabelMapping};
use crate::stages::Stage1Result;

/// A ranking produced by one council member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage2Result {
    /// Persona display name of the ranker (not the raw model id).
    pub ranker: String,
    /// Full ranking text as returned by the model.
    pub ranking: String,
    /// Labels extracted through the ranking grammar, in order.
    pub parsed_ranking: Vec<String>,
}

/// Build the composite prompt embedding every labeled response, with the
/// format instructions the ranking grammar expects.
fn ranking_prompt(query: &str, stage1: &[Stage1Result]) -> String {
    let responses_text = stage1
        .iter()
        .enumerate()
        .map(|(index, result)| format!("{}:\n{}", response_label(index), result.response))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are evaluating different responses to the following question:\n\n\
         Question: {query}\n\n\
         Here are the responses from different perspectives (anonymized):\n\n\
         {responses_text}\n\n\
         Your task:\n\
         1. First, evaluate each response individually. For each response, explain what it does well and what it does poorly.\n\
         2. Then, at the very end of your response, provide a final ranking.\n\n\
         IMPORTANT: Your final ranking MUST be formatted EXACTLY as follows:\n\
         - Start with the line \"FINAL RANKING:\" (all caps, with colon)\n\
         - Then list the responses from best to worst as a numbered list\n\
         - Each line should be: number, period, space, then ONLY the response label (e.g., \"1. Response A\")\n\
         - Do not add any other text or explanations in the ranking section\n\n\
         Example of the correct format for your ENTIRE response:\n\n\
         Response A provides good detail on X but misses Y...\n\
         Response B is accurate but lacks depth on Z...\n\
         Response C offers the most comprehensive answer...\n\n\
         FINAL RANKING:\n\
         1. Response C\n\
         2. Response A\n\
         3. Response B\n\n\
         Now provide your evaluation and ranking:"
    )
}

/// Dispatch the identical ranking prompt, concurrently, to each surviving
/// persona's own model, and freeze the label mapping for the turn.
///
/// Ranker identity is recorded by persona display name for aggregation
/// keying. Failed calls are omitted; output follows dispatch order among
/// successes.
pub async fn collect_rankings(
    client: Arc<dyn ModelClient>,
    query: &str,
    stage1: &[Stage1Result],
    timeout: Duration,
) -> (Vec<Stage2Result>, LabelMapping) {
    let mapping = LabelMapping::from_results(stage1);
    let prompt = ranking_prompt(query, stage1);

    let handles: Vec<_> = stage1
        .iter()
        .enumerate()
        .map(|(index, result)| {
            let client = Arc::clone(&client);
            let messages = vec![ChatMessage::user(prompt.clone())];
            let model = result.model.clone();
            let ranker = result.persona_name.clone();
            tokio::spawn(async move {
                let reply = client.query(&model, &messages, timeout).await;
                (index, ranker, reply)
            })
        })
        .collect();

    let mut collected = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        match joined {
            Ok(entry) => collected.push(entry),
            Err(e) => warn!(error = %e, "stage2 task panicked"),
        }
    }
    collected.sort_by_key(|(index, ..)| *index);

    let mut results = Vec::new();
    for (_, ranker, reply) in collected {
        match reply {
            Some(reply) => {
                let parsed = parse_ranking(&reply.content);
                results.push(Stage2Result {
                    ranker,
                    ranking: reply.content,
                    parsed_ranking: parsed,
                });
            }
            None => debug!(ranker = %ranker, "no ranking from persona, omitting"),
        }
    }

    (results, mapping)
}
