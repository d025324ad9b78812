//! JSON event protocol.
//!
//! Wire format (one WebSocket text frame per event, both directions):
//! ```text
//! {"event": "code_change", "data": {"document_id": "demo-js", "content": "..."}}
//! ```
//!
//! Inbound payload fields are all optional here, and a field of the wrong
//! JSON type reads as absent. Required-field checks belong to the
//! coordinator, which reports them as a `SkipReason`.

use chrono::{DateTime, Utc};
use scribe_core::{ChatMessage, ConnectionId, Document, DocumentId, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw envelope shared by both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload carrying only a document reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<DocumentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<DocumentId>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeChange {
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<DocumentId>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
    /// Editor-specific change description, relayed as-is.
    pub change: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorChange {
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<DocumentId>,
    #[serde(default, deserialize_with = "lenient")]
    pub cursor_position: Option<u64>,
    pub selection: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<DocumentId>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub language: Option<String>,
}

/// Everything the coordinator reacts to.
///
/// `Connect` and `Disconnect` come from the gateway's connection
/// lifecycle and are never accepted off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Disconnect,
    JoinDocument(JoinDocument),
    LeaveDocument(DocumentRef),
    CodeChange(CodeChange),
    CursorChange(CursorChange),
    SendMessage(SendMessage),
    GetChatHistory(DocumentRef),
    CreateDocument(CreateDocument),
    SaveDocument(DocumentRef),
}

/// Event names a client may send.
pub const CLIENT_EVENTS: [&str; 8] = [
    "join_document",
    "leave_document",
    "code_change",
    "cursor_change",
    "send_message",
    "get_chat_history",
    "create_document",
    "save_document",
];

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::JoinDocument(_) => "join_document",
            Self::LeaveDocument(_) => "leave_document",
            Self::CodeChange(_) => "code_change",
            Self::CursorChange(_) => "cursor_change",
            Self::SendMessage(_) => "send_message",
            Self::GetChatHistory(_) => "get_chat_history",
            Self::CreateDocument(_) => "create_document",
            Self::SaveDocument(_) => "save_document",
        }
    }

    /// Parse a client text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let event = envelope.event.as_str();
        let data = envelope.data;

        Ok(match event {
            "join_document" => Self::JoinDocument(payload(event, data)?),
            "leave_document" => Self::LeaveDocument(payload(event, data)?),
            "code_change" => Self::CodeChange(payload(event, data)?),
            "cursor_change" => Self::CursorChange(payload(event, data)?),
            "send_message" => Self::SendMessage(payload(event, data)?),
            "get_chat_history" => Self::GetChatHistory(payload(event, data)?),
            "create_document" => Self::CreateDocument(payload(event, data)?),
            "save_document" => Self::SaveDocument(payload(event, data)?),
            "connect" | "disconnect" => {
                return Err(ProtocolError::ReservedEvent(envelope.event));
            }
            _ => return Err(ProtocolError::UnknownEvent(envelope.event)),
        })
    }

    /// Serialize as a client text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let data = match self {
            Self::Connect | Self::Disconnect => {
                return Err(ProtocolError::ReservedEvent(self.name().to_string()));
            }
            Self::JoinDocument(p) => serde_json::to_value(p),
            Self::LeaveDocument(p) | Self::GetChatHistory(p) | Self::SaveDocument(p) => {
                serde_json::to_value(p)
            }
            Self::CodeChange(p) => serde_json::to_value(p),
            Self::CursorChange(p) => serde_json::to_value(p),
            Self::SendMessage(p) => serde_json::to_value(p),
            Self::CreateDocument(p) => serde_json::to_value(p),
        }
        .map_err(|e| ProtocolError::SerializationError(e.to_string()))?;

        let envelope = Envelope {
            event: self.name().to_string(),
            data,
        };
        serde_json::to_string(&envelope).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }
}

/// Missing or `null` data reads as an empty object.
fn payload<T: DeserializeOwned + Default>(event: &str, data: Value) -> Result<T, ProtocolError> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Wrong-typed optional fields become `None` instead of failing the event.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Events sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        user_id: ConnectionId,
    },
    DocumentContent {
        document: Document,
        active_users: Vec<Session>,
    },
    UserJoined {
        user: Session,
        active_users: Vec<Session>,
    },
    UserLeft {
        user_id: ConnectionId,
        active_users: Vec<Session>,
    },
    CodeChanged {
        content: String,
        change: Value,
        user_id: ConnectionId,
    },
    CursorChanged {
        user_id: ConnectionId,
        cursor_position: u64,
        selection: Option<Value>,
    },
    NewMessage(ChatMessage),
    ChatHistory {
        messages: Vec<ChatMessage>,
    },
    DocumentCreated(Document),
    DocumentSaved {
        document_id: DocumentId,
        last_modified: DateTime<Utc>,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::DocumentContent { .. } => "document_content",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::CodeChanged { .. } => "code_changed",
            Self::CursorChanged { .. } => "cursor_changed",
            Self::NewMessage(_) => "new_message",
            Self::ChatHistory { .. } => "chat_history",
            Self::DocumentCreated(_) => "document_created",
            Self::DocumentSaved { .. } => "document_saved",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Reserved event cannot be sent by clients: {0}")]
    ReservedEvent(String),
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Connection timeout")]
    Timeout,
}
