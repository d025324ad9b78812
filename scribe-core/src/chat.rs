//! Bounded per-document chat history.
//!
//! Each document keeps at most [`DEFAULT_CHAT_CAPACITY`] messages;
//! appending past capacity evicts the oldest entries first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::id::{ConnectionId, DocumentId};

/// Messages retained per document.
pub const DEFAULT_CHAT_CAPACITY: usize = 100;

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "user_id")]
    pub connection_id: ConnectionId,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Chronological chat log per document.
#[derive(Debug)]
pub struct ChatLedger {
    logs: HashMap<DocumentId, VecDeque<ChatMessage>>,
    capacity: usize,
}

impl ChatLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHAT_CAPACITY)
    }

    /// Ledger with a custom per-document bound (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            logs: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Stamp, append, and trim the document's log to capacity.
    pub fn append(
        &mut self,
        document_id: &str,
        connection_id: ConnectionId,
        username: String,
        message: String,
    ) -> ChatMessage {
        let stored = ChatMessage {
            id: Uuid::new_v4().to_string(),
            connection_id,
            username,
            message,
            timestamp: Utc::now(),
        };

        let log = self
            .logs
            .entry(document_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(16)));
        log.push_back(stored.clone());
        while log.len() > self.capacity {
            log.pop_front();
        }

        stored
    }

    /// Oldest-first history; empty when the document has no messages.
    pub fn history(&self, document_id: &str) -> Vec<ChatMessage> {
        self.logs
            .get(document_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, document_id: &str) -> usize {
        self.logs.get(document_id).map_or(0, VecDeque::len)
    }

    pub fn total_messages(&self) -> usize {
        self.logs.values().map(VecDeque::len).sum()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ChatLedger {
    fn default() -> Self {
        Self::new()
    }
}
