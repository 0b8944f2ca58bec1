//! Dynamic persona planning: the chairman assembles the council for a turn.
//!
//! Planning is best-effort. Any failure along the call, fence-strip,
//! JSON-decode, validate path falls back to the configured default subset,
//! so the pipeline always starts with a usable persona list.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{ChatMessage, ModelClient};
use crate::config::CouncilConfig;
use crate::persona::{sanitize_personas, Persona};

#[derive(Debug, Deserialize)]
struct PlannedPersonas {
    personas: Vec<Persona>,
}

/// Ask the chairman model to assemble 3-5 personas for the query.
///
/// Never fails: every planning error degrades to the configured default
/// subset. The returned list is validated and capped.
pub async fn plan_personas(
    client: Arc<dyn ModelClient>,
    config: &CouncilConfig,
    query: &str,
) -> Vec<Persona> {
    let prompt = planning_prompt(query, &config.registry_models());
    let messages = vec![ChatMessage::user(prompt)];

    let reply = match client
        .query(&config.chairman_model, &messages, config.request_timeout)
        .await
    {
        Some(reply) if !reply.content.trim().is_empty() => reply,
        _ => {
            warn!("persona planning call failed, using default personas");
            return sanitize_personas(config.fallback_personas());
        }
    };

    match parse_planned_personas(&reply.content) {
        Some(personas) if !personas.is_empty() => {
            debug!(count = personas.len(), "using dynamically planned personas");
            personas
        }
        _ => {
            warn!("persona planning output unusable, using default personas");
            sanitize_personas(config.fallback_personas())
        }
    }
}

fn planning_prompt(query: &str, models: &[&str]) -> String {
    let model_list = models.join("\", \"");
    format!(
        "You are the Chairman of an AI Council. Your job is to assemble a team of 3-5 expert \
         personas to answer the following question.\n\n\
         Question: \"{query}\"\n\n\
         Identify the most relevant perspectives or roles needed to provide a comprehensive, \
         diverse, and high-quality answer.\n\
         For example:\n\
         - If the question is about business, you might need a \"Legal Expert\", \"Sales Strategist\", and \"Product Manager\".\n\
         - If the question is about coding, you might need a \"Senior Architect\", \"Security Specialist\", and \"Performance Engineer\".\n\
         - Always include at least one critical or alternative perspective (e.g., \"Devil's Advocate\", \"Skeptic\", \"Ethicist\").\n\n\
         Return the result as a JSON object with a \"personas\" key containing a list of objects. Each object must have:\n\
         - \"id\": A unique short identifier (e.g., \"legal_expert\")\n\
         - \"name\": Display name (e.g., \"Legal Expert\")\n\
         - \"role\": Short role description (e.g., \"Corporate Law Specialist\")\n\
         - \"icon\": A single emoji representing the persona\n\
         - \"style\": A short description of their tone/style (e.g., \"formal, cautious, precise\")\n\
         - \"system_prompt\": A detailed system prompt that instructs the AI how to behave as this persona.\n\
         - \"model\": The LLM model to use (choose from: \"{model_list}\"). Assign the most appropriate model for the role.\n\n\
         JSON Response:"
    )
}

/// Strip surrounding markdown code fences, if any. Text outside the first
/// fenced block is discarded; an unclosed fence keeps everything after it.
fn strip_code_fences(content: &str) -> &str {
    for opener in ["```json", "```"] {
        if let Some((_, rest)) = content.split_once(opener) {
            return match rest.split_once("```") {
                Some((inner, _)) => inner,
                None => rest,
            };
        }
    }
    content
}

fn parse_planned_personas(content: &str) -> Option<Vec<Persona>> {
    let cleaned = strip_code_fences(content).trim();
    let planned: PlannedPersonas = serde_json::from_str(cleaned).ok()?;
    Some(sanitize_personas(planned.personas))
}
