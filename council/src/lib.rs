//! Three-stage LLM council orchestration.
//!
//! Assembles a set of model personas for a question, collects their answers
//! in parallel, has the council blindly rank each other's answers behind
//! single-letter labels, and asks a fixed chairman model to synthesize the
//! final response.
//!
//! ```text
//! Planner ─> Stage 1 (parallel responses) ─> Stage 2 (anonymized ranking)
//!                                   │                 │
//!                             abort if empty     aggregation
//!                                                     │
//!                                          Stage 3 (chairman synthesis)
//! ```
//!
//! External collaborators (model serving, conversation storage) are traits;
//! the pipeline degrades instead of failing when individual calls go wrong.
//! See [`orchestrator::Council`] for the two entry points.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod persona;
pub mod planner;
pub mod ranking;
pub mod stages;
pub mod storage;

pub use client::{ChatMessage, ModelClient, ModelReply, OpenRouterClient};
pub use config::{CouncilConfig, PersonaSpec};
pub use error::{ClientError, ConfigError, StorageError};
pub use events::CouncilEvent;
pub use orchestrator::{generate_title, Council, TurnMetadata, TurnOutcome};
pub use persona::{Persona, MAX_COUNCIL_SIZE};
pub use ranking::{AggregateRanking, LabelMapping};
pub use stages::{Stage1Result, Stage2Result, SynthesisResult};
pub use storage::{
    Conversation, ConversationStore, ConversationSummary, InMemoryStore, StoredMessage,
};
