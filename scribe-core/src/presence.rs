//! Presence registry: which connections are on which document.
//!
//! The registry is the source of truth for rooms. A room exists while
//! at least one session is in it and is dropped the moment it empties.
//! Sessions are listed in join order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ConnectionId, DocumentId};

/// Presence record for one connection on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "id")]
    pub connection_id: ConnectionId,
    pub username: String,
    /// Offset into the document content.
    pub cursor_position: u64,
    /// Client-defined selection range, passed through untouched.
    pub selection: Option<serde_json::Value>,
}

impl Session {
    pub fn new(connection_id: ConnectionId, username: impl Into<String>) -> Self {
        Self {
            connection_id,
            username: username.into(),
            cursor_position: 0,
            selection: None,
        }
    }
}

/// Result of removing a session from a room.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// Others are still present, in join order.
    Remaining(Vec<Session>),
    /// The leaver was the last one; the room entry is gone.
    RoomClosed,
    /// The connection had no session on that document.
    NotPresent,
}

/// Per-document outcomes of [`PresenceRegistry::disconnect_all`], in
/// room creation order. Only documents the connection was on appear.
pub type DisconnectOutcome = Vec<(DocumentId, LeaveOutcome)>;

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    rooms: IndexMap<DocumentId, IndexMap<ConnectionId, Session>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the session for `connection_id` on `document_id`.
    ///
    /// A re-join keeps the connection's original position in the room.
    pub fn join(
        &mut self,
        document_id: &str,
        connection_id: &ConnectionId,
        username: impl Into<String>,
    ) -> Session {
        let session = Session::new(connection_id.clone(), username);
        let room = self.rooms.entry(document_id.to_string()).or_default();
        room.insert(connection_id.clone(), session.clone());
        session
    }

    /// Remove the session, closing the room if it is now empty.
    pub fn leave(&mut self, document_id: &str, connection_id: &ConnectionId) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(document_id) else {
            return LeaveOutcome::NotPresent;
        };
        if room.shift_remove(connection_id).is_none() {
            return LeaveOutcome::NotPresent;
        }
        if room.is_empty() {
            self.rooms.shift_remove(document_id);
            return LeaveOutcome::RoomClosed;
        }
        LeaveOutcome::Remaining(room.values().cloned().collect())
    }

    /// Move the connection's cursor. Fails if it has no session there.
    pub fn update_cursor(
        &mut self,
        document_id: &str,
        connection_id: &ConnectionId,
        position: u64,
        selection: Option<serde_json::Value>,
    ) -> Result<&Session, CoreError> {
        let session = self
            .rooms
            .get_mut(document_id)
            .and_then(|room| room.get_mut(connection_id))
            .ok_or_else(|| CoreError::SessionNotFound {
                document_id: document_id.to_string(),
                connection_id: connection_id.clone(),
            })?;
        session.cursor_position = position;
        session.selection = selection;
        Ok(session)
    }

    /// Remove the connection from every room it is in.
    pub fn disconnect_all(&mut self, connection_id: &ConnectionId) -> DisconnectOutcome {
        let present: Vec<DocumentId> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.contains_key(connection_id))
            .map(|(doc, _)| doc.clone())
            .collect();

        present
            .into_iter()
            .map(|doc| {
                let outcome = self.leave(&doc, connection_id);
                (doc, outcome)
            })
            .collect()
    }

    /// Sessions on a document in join order; empty if there is no room.
    pub fn list_active(&self, document_id: &str) -> Vec<Session> {
        self.rooms
            .get(document_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Connection ids in a room, in join order.
    pub fn connection_ids(&self, document_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(document_id)
            .map(|room| room.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn session(&self, document_id: &str, connection_id: &ConnectionId) -> Option<&Session> {
        self.rooms.get(document_id)?.get(connection_id)
    }

    pub fn has_room(&self, document_id: &str) -> bool {
        self.rooms.contains_key(document_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.rooms.values().map(IndexMap::len).sum()
    }
}
