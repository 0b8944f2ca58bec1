//! Pipeline orchestration: plan, respond, rank, synthesize.
//!
//! Two interfaces over the same sequencing:
//! - [`Council::run_turn`] blocks until the whole turn completes and returns
//!   everything at once.
//! - [`Council::run_conversation_turn`] emits ordered [`CouncilEvent`]s as
//!   stages finish, persists the finalized turn, and joins an off-critical-
//!   path title task just before completing.
//!
//! Degradation inside the pipeline is always data, never a propagated error.
//! The only failure the event interface surfaces is a terminal `error` event
//! (storage faults and other uncaught failures); the blocking interface has
//! no failure mode at all.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::{ChatMessage, ModelClient};
use crate::config::CouncilConfig;
use crate::error::StorageError;
use crate::events::CouncilEvent;
use crate::persona::Persona;
use crate::planner::plan_personas;
use crate::ranking::{aggregate_rankings, AggregateRanking, LabelMapping};
use crate::stages::{
    collect_rankings, collect_responses, synthesize_final, Stage1Result, Stage2Result,
    SynthesisResult,
};
use crate::storage::{ConversationStore, StoredMessage};

/// Ranking metadata attached to a completed turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub label_to_persona: LabelMapping,
    pub aggregate_rankings: Vec<AggregateRanking>,
}

/// Everything produced by one council turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub personas: Vec<Persona>,
    pub stage1: Vec<Stage1Result>,
    pub stage2: Vec<Stage2Result>,
    pub stage3: SynthesisResult,
    pub metadata: TurnMetadata,
}

impl TurnOutcome {
    /// Whether the turn aborted because every Stage 1 call failed.
    pub fn is_aborted(&self) -> bool {
        self.stage1.is_empty()
    }
}

/// The council orchestrator.
///
/// Holds an explicit configuration and an injected model client; no global
/// state is consulted after construction.
pub struct Council {
    config: CouncilConfig,
    client: Arc<dyn ModelClient>,
}

impl Council {
    pub fn new(config: CouncilConfig, client: Arc<dyn ModelClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    /// Run one complete turn, blocking until synthesis.
    pub async fn run_turn(&self, query: &str) -> TurnOutcome {
        let timeout = self.config.request_timeout;

        let personas = plan_personas(Arc::clone(&self.client), &self.config, query).await;
        info!(count = personas.len(), "council assembled");

        let stage1 =
            collect_responses(Arc::clone(&self.client), query, &personas, timeout).await;
        if stage1.is_empty() {
            warn!("every stage1 call failed, aborting turn");
            return TurnOutcome {
                personas,
                stage1: Vec::new(),
                stage2: Vec::new(),
                stage3: SynthesisResult::aborted(),
                metadata: TurnMetadata::default(),
            };
        }

        let (stage2, mapping) =
            collect_rankings(Arc::clone(&self.client), query, &stage1, timeout).await;
        let aggregate = aggregate_rankings(&stage2, &mapping);

        let stage3 = synthesize_final(
            Arc::clone(&self.client),
            query,
            &stage1,
            &stage2,
            &self.config.chairman_model,
            timeout,
        )
        .await;

        TurnOutcome {
            personas,
            stage1,
            stage2,
            stage3,
            metadata: TurnMetadata {
                label_to_persona: mapping,
                aggregate_rankings: aggregate,
            },
        }
    }

    /// Run one turn against a stored conversation, emitting ordered events.
    ///
    /// On the conversation's first turn a title task is spawned before
    /// planning and joined only after Stage 3, so it never extends the
    /// critical path. Any uncaught failure becomes a single terminal
    /// `error` event.
    pub async fn run_conversation_turn(
        &self,
        store: &dyn ConversationStore,
        conversation_id: &str,
        query: &str,
        events: mpsc::Sender<CouncilEvent>,
    ) {
        if let Err(e) = self
            .try_conversation_turn(store, conversation_id, query, &events)
            .await
        {
            warn!(conversation = conversation_id, error = %e, "turn failed");
            let _ = events
                .send(CouncilEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    }

    async fn try_conversation_turn(
        &self,
        store: &dyn ConversationStore,
        conversation_id: &str,
        query: &str,
        events: &mpsc::Sender<CouncilEvent>,
    ) -> Result<(), StorageError> {
        let first_turn = store.message_count(conversation_id).await? == 0;
        store.add_user_message(conversation_id, query).await?;

        let title_task = first_turn.then(|| {
            let client = Arc::clone(&self.client);
            let model = self.config.title_model.clone();
            let timeout = self.config.title_timeout;
            let query = query.to_string();
            tokio::spawn(async move { generate_title(client, &model, &query, timeout).await })
        });

        let timeout = self.config.request_timeout;

        emit(events, CouncilEvent::PersonasStart).await;
        let personas = plan_personas(Arc::clone(&self.client), &self.config, query).await;
        emit(
            events,
            CouncilEvent::PersonasComplete {
                personas: personas.clone(),
            },
        )
        .await;

        emit(events, CouncilEvent::Stage1Start).await;
        let stage1 =
            collect_responses(Arc::clone(&self.client), query, &personas, timeout).await;
        emit(
            events,
            CouncilEvent::Stage1Complete {
                results: stage1.clone(),
            },
        )
        .await;

        let (stage2, stage3) = if stage1.is_empty() {
            // Structured abort: stages 2 and 3 are skipped entirely, the
            // degraded turn is still persisted and completed.
            warn!("every stage1 call failed, aborting turn");
            let stage3 = SynthesisResult::aborted();
            emit(
                events,
                CouncilEvent::Stage3Complete {
                    result: stage3.clone(),
                },
            )
            .await;
            (Vec::new(), stage3)
        } else {
            emit(events, CouncilEvent::Stage2Start).await;
            let (stage2, mapping) =
                collect_rankings(Arc::clone(&self.client), query, &stage1, timeout).await;
            let aggregate = aggregate_rankings(&stage2, &mapping);
            emit(
                events,
                CouncilEvent::Stage2Complete {
                    results: stage2.clone(),
                    metadata: TurnMetadata {
                        label_to_persona: mapping,
                        aggregate_rankings: aggregate,
                    },
                },
            )
            .await;

            emit(events, CouncilEvent::Stage3Start).await;
            let stage3 = synthesize_final(
                Arc::clone(&self.client),
                query,
                &stage1,
                &stage2,
                &self.config.chairman_model,
                timeout,
            )
            .await;
            emit(
                events,
                CouncilEvent::Stage3Complete {
                    result: stage3.clone(),
                },
            )
            .await;
            (stage2, stage3)
        };

        if let Some(task) = title_task {
            match task.await {
                Ok(title) => {
                    store.update_title(conversation_id, &title).await?;
                    emit(events, CouncilEvent::TitleComplete { title }).await;
                }
                Err(e) => warn!(error = %e, "title task panicked"),
            }
        }

        store
            .add_assistant_message(conversation_id, personas, stage1, stage2, Some(stage3))
            .await?;
        emit(events, CouncilEvent::Complete).await;
        Ok(())
    }

    /// A direct follow-up reply from a single persona, outside the
    /// 3-stage pipeline. Carries the last few user messages as context.
    ///
    /// Returns a Stage 1-shaped result so callers can persist it the same
    /// way as a council turn.
    pub async fn direct_reply(
        &self,
        persona: &Persona,
        history: &[StoredMessage],
        user_input: &str,
    ) -> Stage1Result {
        let mut messages = vec![ChatMessage::system(persona.system_prompt.as_str())];
        for message in history.iter().skip(history.len().saturating_sub(5)) {
            if let StoredMessage::User { content } = message {
                messages.push(ChatMessage::user(content.as_str()));
            }
        }
        messages.push(ChatMessage::user(user_input));

        let response = match self
            .client
            .query(&persona.model, &messages, self.config.request_timeout)
            .await
        {
            Some(reply) => reply.content,
            None => {
                warn!(persona = %persona.name, "direct reply failed, using fallback");
                "I'm speechless.".to_string()
            }
        };

        Stage1Result {
            persona_id: persona.id.clone(),
            persona_name: persona.name.clone(),
            persona_role: persona.role.clone(),
            persona_icon: persona.icon.clone(),
            model: persona.model.clone(),
            response,
        }
    }
}

async fn emit(events: &mpsc::Sender<CouncilEvent>, event: CouncilEvent) {
    // A dropped receiver is not an error; the turn still runs to completion.
    let _ = events.send(event).await;
}

/// Generate a short conversation title from the first user message.
///
/// Trims quotes, truncates to 50 characters, and falls back to a generic
/// title when the call fails or returns nothing usable.
pub async fn generate_title(
    client: Arc<dyn ModelClient>,
    model: &str,
    query: &str,
    timeout: Duration,
) -> String {
    const FALLBACK: &str = "New Conversation";

    let prompt = format!(
        "Generate a very short title (3-5 words maximum) that summarizes the following question.\n\
         The title should be concise and descriptive. Do not use quotes or punctuation in the title.\n\n\
         Question: {query}\n\n\
         Title:"
    );
    let messages = vec![ChatMessage::user(prompt)];

    let Some(reply) = client.query(model, &messages, timeout).await else {
        return FALLBACK.to_string();
    };

    let title = reply
        .content
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    if title.is_empty() {
        return FALLBACK.to_string();
    }
    if title.chars().count() > 50 {
        let truncated: String = title.chars().take(47).collect();
        format!("{truncated}...")
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::client::ModelReply;

    struct FixedClient {
        reply: Option<String>,
    }

    #[async_trait]
    impl ModelClient for FixedClient {
        async fn query(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _timeout: Duration,
        ) -> Option<ModelReply> {
            self.reply.clone().map(|content| ModelReply { content })
        }
    }

    fn client(reply: Option<&str>) -> Arc<dyn ModelClient> {
        Arc::new(FixedClient {
            reply: reply.map(|r| r.to_string()),
        })
    }

    #[tokio::test]
    async fn test_title_is_trimmed_and_unquoted() {
        let title = generate_title(
            client(Some("  \"Rust Borrowing Basics\"  ")),
            "m/title",
            "q",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(title, "Rust Borrowing Basics");
    }

    #[tokio::test]
    async fn test_title_failure_falls_back() {
        let title = generate_title(client(None), "m/title", "q", Duration::from_secs(1)).await;
        assert_eq!(title, "New Conversation");

        let title =
            generate_title(client(Some("   ")), "m/title", "q", Duration::from_secs(1)).await;
        assert_eq!(title, "New Conversation");
    }

    #[tokio::test]
    async fn test_long_title_is_truncated() {
        let long = "A very long and winding conversation title that keeps going on";
        let title =
            generate_title(client(Some(long)), "m/title", "q", Duration::from_secs(1)).await;
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn test_direct_reply_includes_recent_user_history() {
        struct Recorder {
            seen: std::sync::Mutex<Vec<ChatMessage>>,
        }

        #[async_trait]
        impl ModelClient for Recorder {
            async fn query(
                &self,
                _model: &str,
                messages: &[ChatMessage],
                _timeout: Duration,
            ) -> Option<ModelReply> {
                *self.seen.lock().unwrap() = messages.to_vec();
                Some(ModelReply {
                    content: "noted".to_string(),
                })
            }
        }

        let recorder = Arc::new(Recorder {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let recorder_client: Arc<dyn ModelClient> = Arc::clone(&recorder) as Arc<dyn ModelClient>;
        let council = Council::new(CouncilConfig::default(), recorder_client);

        let persona = CouncilConfig::default().fallback_personas().remove(0);
        let history = vec![
            StoredMessage::User {
                content: "earlier question".to_string(),
            },
            StoredMessage::Assistant {
                personas: vec![],
                stage1: vec![],
                stage2: vec![],
                stage3: None,
            },
        ];

        let reply = council.direct_reply(&persona, &history, "follow-up").await;
        assert_eq!(reply.persona_id, persona.id);
        assert_eq!(reply.response, "noted");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].role, "system");
        assert_eq!(seen[1].content, "earlier question");
        assert_eq!(seen.last().unwrap().content, "follow-up");
    }

    #[tokio::test]
    async fn test_direct_reply_failure_uses_fallback_text() {
        let council = Council::new(CouncilConfig::default(), client(None));
        let persona = CouncilConfig::default().fallback_personas().remove(0);

        let reply = council.direct_reply(&persona, &[], "hello?").await;
        assert_eq!(reply.response, "I'm speechless.");
    }
}
