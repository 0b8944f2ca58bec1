//! Mocked end-to-end pipeline tests: no network, scripted model replies.
//!
//! Covers: planner fallback, blocking and event interfaces, the all-failed
//! abort path (with call-count assertions that stages 2 and 3 are never
//! dispatched), partial Stage 2 failure, and title generation on first
//! turns only.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use council::storage::ConversationStore;
use council::{
    ChatMessage, Council, CouncilConfig, CouncilEvent, InMemoryStore, ModelClient, ModelReply,
    StoredMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CallKind {
    Planning,
    Response,
    Ranking,
    Synthesis,
    Title,
}

/// Scripted model client: replies are keyed by call kind and model id, and
/// every call is recorded for count assertions.
#[derive(Default)]
struct ScriptedClient {
    planner_reply: Option<String>,
    stage1_failures: HashSet<String>,
    ranking_failures: HashSet<String>,
    rankings: HashMap<String, String>,
    synthesis_reply: Option<String>,
    title_reply: Option<String>,
    calls: Mutex<Vec<CallKind>>,
}

impl ScriptedClient {
    fn count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == kind)
            .count()
    }
}

fn classify(messages: &[ChatMessage]) -> CallKind {
    if messages.first().map(|m| m.role.as_str()) == Some("system") {
        return CallKind::Response;
    }
    let content = &messages.last().expect("messages never empty").content;
    if content.starts_with("You are the Chairman of an AI Council") {
        CallKind::Planning
    } else if content.starts_with("You are evaluating different responses") {
        CallKind::Ranking
    } else if content.starts_with("You are the Chairman of an LLM Council") {
        CallKind::Synthesis
    } else if content.starts_with("Generate a very short title") {
        CallKind::Title
    } else {
        panic!("unclassified model call: {content}");
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _timeout: Duration,
    ) -> Option<ModelReply> {
        let kind = classify(messages);
        self.calls.lock().unwrap().push(kind);

        let content = match kind {
            CallKind::Planning => self.planner_reply.clone()?,
            CallKind::Response => {
                if self.stage1_failures.contains(model) {
                    return None;
                }
                format!("response from {model}")
            }
            CallKind::Ranking => {
                if self.ranking_failures.contains(model) {
                    return None;
                }
                self.rankings.get(model).cloned()?
            }
            CallKind::Synthesis => self.synthesis_reply.clone()?,
            CallKind::Title => self.title_reply.clone()?,
        };
        Some(ModelReply { content })
    }
}

// Default persona models, in fallback-subset order.
const SKEPTIC_MODEL: &str = "anthropic/claude-sonnet-4.5";
const VISIONARY_MODEL: &str = "openai/gpt-5.1";
const PRAGMATIST_MODEL: &str = "google/gemini-3-pro-preview";

/// A client where planning fails (fallback subset is used), every persona
/// answers, every persona ranks, and synthesis succeeds.
fn happy_client() -> ScriptedClient {
    let mut rankings = HashMap::new();
    rankings.insert(
        SKEPTIC_MODEL.to_string(),
        "FINAL RANKING:\n1. Response B\n2. Response A\n3. Response C".to_string(),
    );
    rankings.insert(
        VISIONARY_MODEL.to_string(),
        "FINAL RANKING:\n1. Response B\n2. Response C\n3. Response A".to_string(),
    );
    rankings.insert(
        PRAGMATIST_MODEL.to_string(),
        "FINAL RANKING:\n1. Response B\n2. Response A\n3. Response C".to_string(),
    );
    ScriptedClient {
        rankings,
        synthesis_reply: Some("the council's collective answer".to_string()),
        title_reply: Some("Rust Rewrite Tradeoffs".to_string()),
        ..Default::default()
    }
}

fn council_with(client: ScriptedClient) -> (Council, Arc<ScriptedClient>) {
    let client = Arc::new(client);
    let model_client: Arc<dyn ModelClient> = client.clone();
    let council = Council::new(CouncilConfig::default(), model_client);
    (council, client)
}

fn event_types(events: &[CouncilEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

async fn run_streamed(council: &Council, store: &InMemoryStore, id: &str, query: &str) -> Vec<CouncilEvent> {
    let (tx, mut rx) = mpsc::channel(64);
    council.run_conversation_turn(store, id, query, tx).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_blocking_turn_happy_path() {
    let (council, client) = council_with(happy_client());

    let outcome = council.run_turn("should we rewrite it in Rust?").await;

    // Planner failed, so the configured fallback subset answered.
    let persona_ids: Vec<&str> = outcome.personas.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(persona_ids, vec!["skeptic", "visionary", "pragmatist"]);
    assert!(!outcome.is_aborted());

    let names: Vec<&str> = outcome
        .stage1
        .iter()
        .map(|r| r.persona_name.as_str())
        .collect();
    assert_eq!(names, vec!["The Skeptic", "The Visionary", "The Pragmatist"]);
    assert_eq!(outcome.stage1[0].response, format!("response from {SKEPTIC_MODEL}"));

    let rankers: Vec<&str> = outcome.stage2.iter().map(|r| r.ranker.as_str()).collect();
    assert_eq!(rankers, vec!["The Skeptic", "The Visionary", "The Pragmatist"]);

    let mapping = &outcome.metadata.label_to_persona;
    assert_eq!(mapping.resolve("Response A"), Some("The Skeptic"));
    assert_eq!(mapping.resolve("Response B"), Some("The Visionary"));
    assert_eq!(mapping.resolve("Response C"), Some("The Pragmatist"));

    // Positions: Visionary 1/1/1, Skeptic 2/3/2, Pragmatist 3/2/3.
    let aggregate = &outcome.metadata.aggregate_rankings;
    assert_eq!(aggregate.len(), 3);
    assert_eq!(aggregate[0].persona_name, "The Visionary");
    assert_eq!(aggregate[0].average_rank, 1.0);
    assert_eq!(aggregate[1].persona_name, "The Skeptic");
    assert_eq!(aggregate[1].average_rank, 2.33);
    assert_eq!(aggregate[2].persona_name, "The Pragmatist");
    assert_eq!(aggregate[2].average_rank, 2.67);
    for entry in aggregate {
        assert_eq!(entry.rankings_count, 3);
    }

    assert_eq!(outcome.stage3.model, "Chairman");
    assert_eq!(outcome.stage3.response, "the council's collective answer");

    assert_eq!(client.count(CallKind::Planning), 1);
    assert_eq!(client.count(CallKind::Response), 3);
    assert_eq!(client.count(CallKind::Ranking), 3);
    assert_eq!(client.count(CallKind::Synthesis), 1);
    // The blocking interface never generates titles.
    assert_eq!(client.count(CallKind::Title), 0);
}

#[tokio::test]
async fn test_planned_personas_drive_stage1() {
    let planned = r#"{
        "personas": [
            {"id": "security_specialist", "name": "Security Specialist", "role": "AppSec",
             "icon": "🔒", "style": "precise", "system_prompt": "You are a security specialist.",
             "model": "anthropic/claude-sonnet-4.5"},
            {"id": "devil_advocate", "name": "Devil's Advocate", "role": "Contrarian",
             "icon": "😈", "style": "contrarian", "system_prompt": "You argue the opposite.",
             "model": "x-ai/grok-4"}
        ]
    }"#;
    let mut client = happy_client();
    client.planner_reply = Some(format!("```json\n{planned}\n```"));
    client.rankings.insert(
        "x-ai/grok-4".to_string(),
        "FINAL RANKING:\n1. Response A\n2. Response B".to_string(),
    );
    let (council, _client) = council_with(client);

    let outcome = council.run_turn("is this design secure?").await;

    let ids: Vec<&str> = outcome.personas.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["security_specialist", "devil_advocate"]);
    assert_eq!(outcome.stage1.len(), 2);
    assert_eq!(
        outcome.metadata.label_to_persona.resolve("Response B"),
        Some("Devil's Advocate")
    );
}

#[tokio::test]
async fn test_all_stage1_failures_abort_the_pipeline() {
    let mut client = happy_client();
    client.stage1_failures = [SKEPTIC_MODEL, VISIONARY_MODEL, PRAGMATIST_MODEL]
        .iter()
        .map(|m| m.to_string())
        .collect();
    let (council, client) = council_with(client);

    let outcome = council.run_turn("anyone there?").await;

    assert!(outcome.is_aborted());
    assert!(outcome.stage1.is_empty());
    assert!(outcome.stage2.is_empty());
    assert_eq!(outcome.stage3.model, "error");
    assert!(outcome.metadata.aggregate_rankings.is_empty());
    assert!(outcome.metadata.label_to_persona.is_empty());

    // Stage 2 and Stage 3 collaborators are never invoked on abort.
    assert_eq!(client.count(CallKind::Response), 3);
    assert_eq!(client.count(CallKind::Ranking), 0);
    assert_eq!(client.count(CallKind::Synthesis), 0);
}

#[tokio::test]
async fn test_partial_stage2_failure_aggregates_over_survivors() {
    let mut client = happy_client();
    client.ranking_failures = [VISIONARY_MODEL.to_string()].into_iter().collect();
    let (council, client) = council_with(client);

    let outcome = council.run_turn("how confident are we?").await;

    assert_eq!(outcome.stage1.len(), 3);
    assert_eq!(outcome.stage2.len(), 2);
    let rankers: Vec<&str> = outcome.stage2.iter().map(|r| r.ranker.as_str()).collect();
    assert_eq!(rankers, vec!["The Skeptic", "The Pragmatist"]);

    // Both surviving rankers rank all three responses.
    for entry in &outcome.metadata.aggregate_rankings {
        assert_eq!(entry.rankings_count, 2);
    }
    assert_eq!(client.count(CallKind::Ranking), 3);
    assert_eq!(client.count(CallKind::Synthesis), 1);
}

#[tokio::test]
async fn test_event_stream_order_on_first_turn() {
    let (council, client) = council_with(happy_client());
    let store = InMemoryStore::new();
    store.create_conversation("c1").await.unwrap();

    let events = run_streamed(&council, &store, "c1", "first question").await;

    assert_eq!(
        event_types(&events),
        vec![
            "personas_start",
            "personas_complete",
            "stage1_start",
            "stage1_complete",
            "stage2_start",
            "stage2_complete",
            "stage3_start",
            "stage3_complete",
            "title_complete",
            "complete",
        ]
    );

    match events.iter().find(|e| e.event_type() == "title_complete") {
        Some(CouncilEvent::TitleComplete { title }) => {
            assert_eq!(title, "Rust Rewrite Tradeoffs")
        }
        other => panic!("unexpected title event: {other:?}"),
    }
    assert_eq!(client.count(CallKind::Title), 1);

    // The turn is persisted only once everything is final.
    let conversation = store.conversation("c1").await.unwrap();
    assert_eq!(conversation.title, "Rust Rewrite Tradeoffs");
    assert_eq!(conversation.messages.len(), 2);
    match &conversation.messages[1] {
        StoredMessage::Assistant { stage1, stage2, stage3, .. } => {
            assert_eq!(stage1.len(), 3);
            assert_eq!(stage2.len(), 3);
            assert!(stage3.is_some());
        }
        other => panic!("expected assistant message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_second_turn_emits_no_title_event() {
    let (council, client) = council_with(happy_client());
    let store = InMemoryStore::new();
    store.create_conversation("c1").await.unwrap();

    run_streamed(&council, &store, "c1", "first question").await;
    let second = run_streamed(&council, &store, "c1", "follow-up question").await;

    assert!(!event_types(&second).contains(&"title_complete"));
    assert_eq!(event_types(&second).last(), Some(&"complete"));
    assert_eq!(client.count(CallKind::Title), 1);
}

#[tokio::test]
async fn test_event_stream_abort_skips_stage2_and_stage3() {
    let mut scripted = happy_client();
    scripted.stage1_failures = [SKEPTIC_MODEL, VISIONARY_MODEL, PRAGMATIST_MODEL]
        .iter()
        .map(|m| m.to_string())
        .collect();
    let (council, client) = council_with(scripted);
    let store = InMemoryStore::new();
    store.create_conversation("c1").await.unwrap();

    let events = run_streamed(&council, &store, "c1", "anyone there?").await;

    assert_eq!(
        event_types(&events),
        vec![
            "personas_start",
            "personas_complete",
            "stage1_start",
            "stage1_complete",
            "stage3_complete",
            "title_complete",
            "complete",
        ]
    );
    match events.iter().find(|e| e.event_type() == "stage3_complete") {
        Some(CouncilEvent::Stage3Complete { result }) => assert_eq!(result.model, "error"),
        other => panic!("unexpected stage3 event: {other:?}"),
    }
    assert_eq!(client.count(CallKind::Ranking), 0);
    assert_eq!(client.count(CallKind::Synthesis), 0);

    // The aborted turn is still persisted with an empty Stage 2.
    let conversation = store.conversation("c1").await.unwrap();
    match &conversation.messages[1] {
        StoredMessage::Assistant { stage1, stage2, stage3, .. } => {
            assert!(stage1.is_empty());
            assert!(stage2.is_empty());
            assert_eq!(stage3.as_ref().unwrap().model, "error");
        }
        other => panic!("expected assistant message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_storage_failure_yields_single_terminal_error_event() {
    let (council, client) = council_with(happy_client());
    let store = InMemoryStore::new();
    // Conversation never created: the first storage call fails.

    let events = run_streamed(&council, &store, "ghost", "hello?").await;

    assert_eq!(event_types(&events), vec!["error"]);
    match &events[0] {
        CouncilEvent::Error { message } => assert!(message.contains("ghost")),
        other => panic!("expected error event, got {other:?}"),
    }
    // Nothing was dispatched to the model collaborator.
    assert_eq!(client.count(CallKind::Planning), 0);
    assert_eq!(client.count(CallKind::Response), 0);
}

#[tokio::test]
async fn test_label_assignment_is_deterministic_across_runs() {
    let (council, _) = council_with(happy_client());

    let first = council.run_turn("same question").await;
    let second = council.run_turn("same question").await;

    assert_eq!(first.metadata.label_to_persona, second.metadata.label_to_persona);
    assert_eq!(
        first.metadata.aggregate_rankings,
        second.metadata.aggregate_rankings
    );
}
