//! Conversation storage collaborator.
//!
//! Append-only per-conversation log. The pipeline only appends finalized
//! turns; durability and on-disk format belong to the implementation.
//! `InMemoryStore` backs the CLI and the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::persona::Persona;
use crate::stages::{Stage1Result, Stage2Result, SynthesisResult};

pub type StorageResult<T> = Result<T, StorageError>;

/// Title assigned to a conversation before its first turn generates one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// One message in a conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StoredMessage {
    User {
        content: String,
    },
    Assistant {
        personas: Vec<Persona>,
        stage1: Vec<Stage1Result>,
        stage2: Vec<Stage2Result>,
        stage3: Option<SynthesisResult>,
    },
}

/// A full conversation with its message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub messages: Vec<StoredMessage>,
}

/// Conversation metadata for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub message_count: usize,
}

/// Append-only conversation log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, id: &str) -> StorageResult<Conversation>;
    async fn conversation(&self, id: &str) -> StorageResult<Conversation>;
    async fn list_conversations(&self) -> StorageResult<Vec<ConversationSummary>>;
    async fn message_count(&self, id: &str) -> StorageResult<usize>;
    async fn add_user_message(&self, id: &str, content: &str) -> StorageResult<()>;
    async fn add_assistant_message(
        &self,
        id: &str,
        personas: Vec<Persona>,
        stage1: Vec<Stage1Result>,
        stage2: Vec<Stage2Result>,
        stage3: Option<SynthesisResult>,
    ) -> StorageResult<()>;
    async fn update_title(&self, id: &str, title: &str) -> StorageResult<()>;
}

/// In-memory conversation store.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_conversation<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Conversation) -> T,
    ) -> StorageResult<T> {
        let mut conversations = self
            .conversations
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        Ok(f(conversation))
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(&self, id: &str) -> StorageResult<Conversation> {
        let mut conversations = self
            .conversations
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if conversations.contains_key(id) {
            return Err(StorageError::AlreadyExists(id.to_string()));
        }
        let conversation = Conversation {
            id: id.to_string(),
            created_at: Utc::now(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
        };
        conversations.insert(id.to_string(), conversation.clone());
        Ok(conversation)
    }

    async fn conversation(&self, id: &str) -> StorageResult<Conversation> {
        self.with_conversation(id, |c| c.clone())
    }

    async fn list_conversations(&self) -> StorageResult<Vec<ConversationSummary>> {
        let conversations = self
            .conversations
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut summaries: Vec<ConversationSummary> = conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                created_at: c.created_at,
                title: c.title.clone(),
                message_count: c.messages.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn message_count(&self, id: &str) -> StorageResult<usize> {
        self.with_conversation(id, |c| c.messages.len())
    }

    async fn add_user_message(&self, id: &str, content: &str) -> StorageResult<()> {
        self.with_conversation(id, |c| {
            c.messages.push(StoredMessage::User {
                content: content.to_string(),
            });
        })
    }

    async fn add_assistant_message(
        &self,
        id: &str,
        personas: Vec<Persona>,
        stage1: Vec<Stage1Result>,
        stage2: Vec<Stage2Result>,
        stage3: Option<SynthesisResult>,
    ) -> StorageResult<()> {
        self.with_conversation(id, |c| {
            c.messages.push(StoredMessage::Assistant {
                personas,
                stage1,
                stage2,
                stage3,
            });
        })
    }

    async fn update_title(&self, id: &str, title: &str) -> StorageResult<()> {
        self.with_conversation(id, |c| {
            c.title = title.to_string();
        })
    }
}
