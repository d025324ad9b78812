//! Session coordinator: one state transition per inbound event.
//!
//! The coordinator owns the three stores and holds no other state. Each
//! handler mutates the stores and returns the deliveries to fan out;
//! handlers never touch the transport. Events with a missing required
//! field are skipped without mutating anything and without any reply.
//!
//! | Event              | Fan-out                                         |
//! |--------------------|-------------------------------------------------|
//! | `connect`          | `connected` → sender                            |
//! | `join_document`    | `document_content` → sender, `user_joined` → room − sender |
//! | `leave_document`   | `user_left` → room (if anyone remains)          |
//! | `code_change`      | `code_changed` → room − sender                  |
//! | `cursor_change`    | `cursor_changed` → room − sender                |
//! | `send_message`     | `new_message` → room                            |
//! | `get_chat_history` | `chat_history` → sender                         |
//! | `create_document`  | `document_created` → sender                     |
//! | `save_document`    | `document_saved` → sender                       |
//! | `disconnect`       | `user_left` → each room still occupied          |

use scribe_core::{
    ChatLedger, ConnectionId, DocumentId, DocumentStore, LeaveOutcome, PresenceRegistry,
    DEFAULT_LANGUAGE, DEFAULT_TITLE,
};
use serde_json::json;

use crate::protocol::{
    CodeChange, CreateDocument, CursorChange, DocumentRef, InboundEvent, JoinDocument,
    SendMessage, ServerEvent,
};

/// Who receives an outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single connection.
    Connection(ConnectionId),
    /// Every connection present on the document.
    Room(DocumentId),
    /// Every connection on the document except the originator.
    RoomExcept {
        document_id: DocumentId,
        except: ConnectionId,
    },
}

/// One outbound event and its scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: Target,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn unicast(connection: &ConnectionId, event: ServerEvent) -> Self {
        Self {
            target: Target::Connection(connection.clone()),
            event,
        }
    }

    pub fn room(document_id: &str, event: ServerEvent) -> Self {
        Self {
            target: Target::Room(document_id.to_string()),
            event,
        }
    }

    pub fn room_except(document_id: &str, except: &ConnectionId, event: ServerEvent) -> Self {
        Self {
            target: Target::RoomExcept {
                document_id: document_id.to_string(),
                except: except.clone(),
            },
            event,
        }
    }
}

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingDocumentId,
    MissingContent,
    MissingCursorPosition,
    EmptyMessage,
    /// `save_document` and `send_message` skip unknown documents.
    DocumentNotFound,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(Vec<Delivery>),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn deliveries(&self) -> &[Delivery] {
        match self {
            Outcome::Applied(deliveries) => deliveries,
            Outcome::Skipped(_) => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}

type HandlerResult = Result<Vec<Delivery>, SkipReason>;

pub struct Coordinator {
    documents: DocumentStore,
    presence: PresenceRegistry,
    chat: ChatLedger,
}

impl Coordinator {
    pub fn new(documents: DocumentStore, presence: PresenceRegistry, chat: ChatLedger) -> Self {
        Self {
            documents,
            presence,
            chat,
        }
    }

    /// Coordinator over the demo documents with empty presence and chat.
    pub fn seeded() -> Self {
        Self::new(DocumentStore::seeded(), PresenceRegistry::new(), ChatLedger::new())
    }

    /// Apply one event from `connection`.
    pub fn dispatch(&mut self, connection: &ConnectionId, event: InboundEvent) -> Outcome {
        let name = event.name();
        let result = match event {
            InboundEvent::Connect => Ok(self.on_connect(connection)),
            InboundEvent::Disconnect => Ok(self.on_disconnect(connection)),
            InboundEvent::JoinDocument(p) => self.on_join(connection, p),
            InboundEvent::LeaveDocument(p) => self.on_leave(connection, p),
            InboundEvent::CodeChange(p) => self.on_code_change(connection, p),
            InboundEvent::CursorChange(p) => self.on_cursor_change(connection, p),
            InboundEvent::SendMessage(p) => self.on_send_message(connection, p),
            InboundEvent::GetChatHistory(p) => self.on_get_chat_history(connection, p),
            InboundEvent::CreateDocument(p) => Ok(self.on_create_document(connection, p)),
            InboundEvent::SaveDocument(p) => self.on_save_document(connection, p),
        };

        match result {
            Ok(deliveries) => Outcome::Applied(deliveries),
            Err(reason) => {
                log::debug!("Skipped {name} from {connection}: {reason:?}");
                Outcome::Skipped(reason)
            }
        }
    }

    /// Resolve a target to connection ids using the presence registry.
    pub fn recipients(&self, target: &Target) -> Vec<ConnectionId> {
        match target {
            Target::Connection(id) => vec![id.clone()],
            Target::Room(document_id) => self.presence.connection_ids(document_id),
            Target::RoomExcept { document_id, except } => self
                .presence
                .connection_ids(document_id)
                .into_iter()
                .filter(|id| id != except)
                .collect(),
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn chat(&self) -> &ChatLedger {
        &self.chat
    }

    fn on_connect(&self, connection: &ConnectionId) -> Vec<Delivery> {
        vec![Delivery::unicast(
            connection,
            ServerEvent::Connected {
                user_id: connection.clone(),
            },
        )]
    }

    fn on_disconnect(&mut self, connection: &ConnectionId) -> Vec<Delivery> {
        self.presence
            .disconnect_all(connection)
            .into_iter()
            .filter_map(|(document_id, outcome)| match outcome {
                LeaveOutcome::Remaining(active_users) => Some(Delivery::room(
                    &document_id,
                    ServerEvent::UserLeft {
                        user_id: connection.clone(),
                        active_users,
                    },
                )),
                LeaveOutcome::RoomClosed => {
                    log::info!("Room {document_id} closed (empty)");
                    None
                }
                LeaveOutcome::NotPresent => None,
            })
            .collect()
    }

    fn on_join(&mut self, connection: &ConnectionId, p: JoinDocument) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        let username = p
            .username
            .unwrap_or_else(|| connection.default_username());

        let user = self.presence.join(&document_id, connection, username);
        let active_users = self.presence.list_active(&document_id);
        log::info!(
            "{} ({connection}) joined {document_id} [{} present]",
            user.username,
            active_users.len()
        );

        let mut deliveries = Vec::with_capacity(2);
        match self.documents.get(&document_id) {
            Ok(document) => deliveries.push(Delivery::unicast(
                connection,
                ServerEvent::DocumentContent {
                    document: document.clone(),
                    active_users: active_users.clone(),
                },
            )),
            Err(e) => log::debug!("{e}; join recorded without content"),
        }
        if active_users.len() > 1 {
            deliveries.push(Delivery::room_except(
                &document_id,
                connection,
                ServerEvent::UserJoined { user, active_users },
            ));
        }
        Ok(deliveries)
    }

    fn on_leave(&mut self, connection: &ConnectionId, p: DocumentRef) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;

        Ok(match self.presence.leave(&document_id, connection) {
            LeaveOutcome::Remaining(active_users) => {
                log::info!("{connection} left {document_id}");
                vec![Delivery::room(
                    &document_id,
                    ServerEvent::UserLeft {
                        user_id: connection.clone(),
                        active_users,
                    },
                )]
            }
            LeaveOutcome::RoomClosed => {
                log::info!("{connection} left {document_id}; room closed (empty)");
                Vec::new()
            }
            LeaveOutcome::NotPresent => Vec::new(),
        })
    }

    fn on_code_change(&mut self, connection: &ConnectionId, p: CodeChange) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        let content = p.content.ok_or(SkipReason::MissingContent)?;

        if let Err(e) = self.documents.apply_edit(&document_id, content.clone()) {
            log::debug!("{e}; relaying edit without storing it");
        }

        Ok(vec![Delivery::room_except(
            &document_id,
            connection,
            ServerEvent::CodeChanged {
                content,
                change: p.change.unwrap_or_else(|| json!({})),
                user_id: connection.clone(),
            },
        )])
    }

    fn on_cursor_change(&mut self, connection: &ConnectionId, p: CursorChange) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        let cursor_position = p.cursor_position.ok_or(SkipReason::MissingCursorPosition)?;

        if let Err(e) = self.presence.update_cursor(
            &document_id,
            connection,
            cursor_position,
            p.selection.clone(),
        ) {
            log::trace!("{e}; relaying cursor anyway");
        }

        Ok(vec![Delivery::room_except(
            &document_id,
            connection,
            ServerEvent::CursorChanged {
                user_id: connection.clone(),
                cursor_position,
                selection: p.selection,
            },
        )])
    }

    fn on_send_message(&mut self, connection: &ConnectionId, p: SendMessage) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        let message = p
            .message
            .filter(|m| !m.is_empty())
            .ok_or(SkipReason::EmptyMessage)?;
        if !self.documents.contains(&document_id) {
            log::debug!("Chat for unknown document {document_id} from {connection} dropped");
            return Err(SkipReason::DocumentNotFound);
        }
        let username = p
            .username
            .unwrap_or_else(|| connection.default_username());

        let stored = self
            .chat
            .append(&document_id, connection.clone(), username, message);
        Ok(vec![Delivery::room(&document_id, ServerEvent::NewMessage(stored))])
    }

    fn on_get_chat_history(&self, connection: &ConnectionId, p: DocumentRef) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        Ok(vec![Delivery::unicast(
            connection,
            ServerEvent::ChatHistory {
                messages: self.chat.history(&document_id),
            },
        )])
    }

    fn on_create_document(&mut self, connection: &ConnectionId, p: CreateDocument) -> Vec<Delivery> {
        let title = p.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let language = p.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let document = self.documents.create(&title, &language).clone();
        vec![Delivery::unicast(connection, ServerEvent::DocumentCreated(document))]
    }

    fn on_save_document(&mut self, connection: &ConnectionId, p: DocumentRef) -> HandlerResult {
        let document_id = require_document_id(p.document_id)?;
        let last_modified = self
            .documents
            .touch_saved(&document_id)
            .map_err(|_| SkipReason::DocumentNotFound)?;

        Ok(vec![Delivery::unicast(
            connection,
            ServerEvent::DocumentSaved {
                document_id,
                last_modified,
            },
        )])
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::seeded()
    }
}

/// Absent and empty ids are both treated as missing.
fn require_document_id(document_id: Option<DocumentId>) -> Result<DocumentId, SkipReason> {
    document_id
        .filter(|id| !id.is_empty())
        .ok_or(SkipReason::MissingDocumentId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::Session;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    fn join(doc: &str, username: Option<&str>) -> InboundEvent {
        InboundEvent::JoinDocument(JoinDocument {
            document_id: Some(doc.into()),
            username: username.map(Into::into),
        })
    }

    fn edit(doc: &str, content: &str) -> InboundEvent {
        InboundEvent::CodeChange(CodeChange {
            document_id: Some(doc.into()),
            content: Some(content.into()),
            change: None,
        })
    }

    fn ids(sessions: &[Session]) -> Vec<&str> {
        sessions.iter().map(|s| s.connection_id.as_str()).collect()
    }

    #[test]
    fn test_connect_acks_sender() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(&conn("a"), InboundEvent::Connect);
        assert_eq!(
            outcome,
            Outcome::Applied(vec![Delivery::unicast(
                &conn("a"),
                ServerEvent::Connected { user_id: conn("a") }
            )])
        );
    }

    #[test]
    fn test_two_user_join_scenario() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));

        let first = c.dispatch(&a, join("demo-js", Some("Alice")));
        let deliveries = first.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, Target::Connection(a.clone()));
        match &deliveries[0].event {
            ServerEvent::DocumentContent { document, active_users } => {
                assert_eq!(document.id, "demo-js");
                assert_eq!(ids(active_users), vec!["a"]);
            }
            other => panic!("Expected DocumentContent, got {other:?}"),
        }

        let second = c.dispatch(&b, join("demo-js", Some("Bob")));
        let deliveries = second.deliveries();
        assert_eq!(deliveries.len(), 2);
        match &deliveries[0].event {
            ServerEvent::DocumentContent { active_users, .. } => {
                assert_eq!(ids(active_users), vec!["a", "b"]);
            }
            other => panic!("Expected DocumentContent, got {other:?}"),
        }
        match &deliveries[1] {
            Delivery {
                target,
                event: ServerEvent::UserJoined { user, active_users },
            } => {
                assert_eq!(c.recipients(target), vec![a.clone()]);
                assert_eq!(user.username, "Bob");
                assert_eq!(ids(active_users), vec!["a", "b"]);
            }
            other => panic!("Expected UserJoined, got {other:?}"),
        }
    }

    #[test]
    fn test_join_default_username() {
        let mut c = Coordinator::seeded();
        let id = conn("0123456789abcdef");
        c.dispatch(&id, join("demo-js", None));
        let session = c.presence().session("demo-js", &id).unwrap();
        assert_eq!(session.username, "User_01234567");
    }

    #[test]
    fn test_join_unknown_document_tracks_presence_only() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(&conn("a"), join("ghost", None));
        assert_eq!(outcome, Outcome::Applied(Vec::new()));
        assert!(c.presence().has_room("ghost"));

        let outcome = c.dispatch(&conn("b"), join("ghost", None));
        let deliveries = outcome.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(deliveries[0].event, ServerEvent::UserJoined { .. }));
    }

    #[test]
    fn test_join_without_document_id_is_skipped() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(&conn("a"), InboundEvent::JoinDocument(JoinDocument::default()));
        assert_eq!(outcome, Outcome::Skipped(SkipReason::MissingDocumentId));

        let outcome = c.dispatch(&conn("a"), join("", None));
        assert_eq!(outcome, Outcome::Skipped(SkipReason::MissingDocumentId));
        assert_eq!(c.presence().room_count(), 0);
    }

    #[test]
    fn test_leave_notifies_remaining() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));
        c.dispatch(&a, join("demo-js", None));
        c.dispatch(&b, join("demo-js", None));

        let leave = InboundEvent::LeaveDocument(DocumentRef {
            document_id: Some("demo-js".into()),
        });
        let outcome = c.dispatch(&b, leave.clone());
        let deliveries = outcome.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(c.recipients(&deliveries[0].target), vec![a.clone()]);
        match &deliveries[0].event {
            ServerEvent::UserLeft { user_id, active_users } => {
                assert_eq!(user_id, &b);
                assert_eq!(ids(active_users), vec!["a"]);
            }
            other => panic!("Expected UserLeft, got {other:?}"),
        }

        // Last one out closes the room silently.
        assert_eq!(c.dispatch(&a, leave), Outcome::Applied(Vec::new()));
        assert!(!c.presence().has_room("demo-js"));
    }

    #[test]
    fn test_leave_when_not_present() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::LeaveDocument(DocumentRef {
                document_id: Some("demo-js".into()),
            }),
        );
        assert_eq!(outcome, Outcome::Applied(Vec::new()));
    }

    #[test]
    fn test_code_change_last_writer_wins() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));
        c.dispatch(&a, join("demo-js", None));
        c.dispatch(&b, join("demo-js", None));

        c.dispatch(&a, edit("demo-js", "X"));
        let outcome = c.dispatch(&b, edit("demo-js", "Y"));

        assert_eq!(c.documents().get("demo-js").unwrap().content, "Y");
        let deliveries = outcome.deliveries();
        assert_eq!(c.recipients(&deliveries[0].target), vec![a]);
        assert_eq!(
            deliveries[0].event,
            ServerEvent::CodeChanged {
                content: "Y".into(),
                change: json!({}),
                user_id: b,
            }
        );
    }

    #[test]
    fn test_code_change_relays_change_description() {
        let mut c = Coordinator::seeded();
        let change = json!({"from": {"line": 1, "ch": 0}, "text": ["x"]});
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::CodeChange(CodeChange {
                document_id: Some("demo-js".into()),
                content: Some("x".into()),
                change: Some(change.clone()),
            }),
        );
        match &outcome.deliveries()[0].event {
            ServerEvent::CodeChanged { change: relayed, .. } => assert_eq!(relayed, &change),
            other => panic!("Expected CodeChanged, got {other:?}"),
        }
    }

    #[test]
    fn test_code_change_on_missing_document_still_broadcasts() {
        let mut c = Coordinator::seeded();
        c.dispatch(&conn("a"), join("ghost", None));
        c.dispatch(&conn("b"), join("ghost", None));

        let outcome = c.dispatch(&conn("a"), edit("ghost", "hello"));
        assert_eq!(outcome.deliveries().len(), 1);
        assert_eq!(c.recipients(&outcome.deliveries()[0].target), vec![conn("b")]);
        assert!(c.documents().get("ghost").is_err());
    }

    #[test]
    fn test_code_change_requires_content() {
        let mut c = Coordinator::seeded();
        let before = c.documents().get("demo-js").unwrap().clone();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::CodeChange(CodeChange {
                document_id: Some("demo-js".into()),
                content: None,
                change: None,
            }),
        );
        assert_eq!(outcome, Outcome::Skipped(SkipReason::MissingContent));
        assert_eq!(c.documents().get("demo-js").unwrap(), &before);
    }

    #[test]
    fn test_empty_content_is_an_edit() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(&conn("a"), edit("demo-js", ""));
        assert!(!outcome.is_skipped());
        assert_eq!(c.documents().get("demo-js").unwrap().content, "");
    }

    #[test]
    fn test_cursor_change_updates_session_and_relays() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));
        c.dispatch(&a, join("demo-js", None));
        c.dispatch(&b, join("demo-js", None));

        let selection = json!({"anchor": 2, "head": 5});
        let outcome = c.dispatch(
            &b,
            InboundEvent::CursorChange(CursorChange {
                document_id: Some("demo-js".into()),
                cursor_position: Some(12),
                selection: Some(selection.clone()),
            }),
        );

        let session = c.presence().session("demo-js", &b).unwrap();
        assert_eq!(session.cursor_position, 12);
        assert_eq!(session.selection, Some(selection.clone()));

        let deliveries = outcome.deliveries();
        assert_eq!(c.recipients(&deliveries[0].target), vec![a]);
        assert_eq!(
            deliveries[0].event,
            ServerEvent::CursorChanged {
                user_id: b,
                cursor_position: 12,
                selection: Some(selection),
            }
        );
    }

    #[test]
    fn test_cursor_change_without_session_still_relays() {
        let mut c = Coordinator::seeded();
        c.dispatch(&conn("a"), join("demo-js", None));

        let outcome = c.dispatch(
            &conn("outsider"),
            InboundEvent::CursorChange(CursorChange {
                document_id: Some("demo-js".into()),
                cursor_position: Some(3),
                selection: None,
            }),
        );
        assert_eq!(outcome.deliveries().len(), 1);
        assert_eq!(c.recipients(&outcome.deliveries()[0].target), vec![conn("a")]);
        assert!(c.presence().session("demo-js", &conn("outsider")).is_none());
    }

    #[test]
    fn test_cursor_change_missing_position_is_skipped() {
        let mut c = Coordinator::seeded();
        let a = conn("a");
        c.dispatch(&a, join("demo-js", None));

        let outcome = c.dispatch(
            &a,
            InboundEvent::CursorChange(CursorChange {
                document_id: Some("demo-js".into()),
                cursor_position: None,
                selection: Some(json!({"anchor": 1})),
            }),
        );
        assert_eq!(outcome, Outcome::Skipped(SkipReason::MissingCursorPosition));
        let session = c.presence().session("demo-js", &a).unwrap();
        assert_eq!(session.cursor_position, 0);
        assert!(session.selection.is_none());
    }

    #[test]
    fn test_send_message_reaches_whole_room() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));
        c.dispatch(&a, join("demo-js", None));
        c.dispatch(&b, join("demo-js", None));

        let outcome = c.dispatch(
            &a,
            InboundEvent::SendMessage(SendMessage {
                document_id: Some("demo-js".into()),
                message: Some("hello".into()),
                username: Some("Alice".into()),
            }),
        );

        let deliveries = outcome.deliveries();
        assert_eq!(c.recipients(&deliveries[0].target), vec![a.clone(), b]);
        match &deliveries[0].event {
            ServerEvent::NewMessage(msg) => {
                assert_eq!(msg.message, "hello");
                assert_eq!(msg.username, "Alice");
                assert_eq!(msg.connection_id, a);
            }
            other => panic!("Expected NewMessage, got {other:?}"),
        }
        assert_eq!(c.chat().len("demo-js"), 1);
    }

    #[test]
    fn test_send_message_validation() {
        let mut c = Coordinator::seeded();
        let empty = InboundEvent::SendMessage(SendMessage {
            document_id: Some("demo-js".into()),
            message: Some(String::new()),
            username: None,
        });
        assert_eq!(c.dispatch(&conn("a"), empty), Outcome::Skipped(SkipReason::EmptyMessage));

        let missing = InboundEvent::SendMessage(SendMessage {
            document_id: Some("demo-js".into()),
            message: None,
            username: None,
        });
        assert_eq!(c.dispatch(&conn("a"), missing), Outcome::Skipped(SkipReason::EmptyMessage));
        assert_eq!(c.chat().total_messages(), 0);
    }

    #[test]
    fn test_send_message_to_unknown_document_is_skipped() {
        let mut c = Coordinator::seeded();
        let a = conn("a");
        c.dispatch(&a, join("scratch", None));

        let outcome = c.dispatch(
            &a,
            InboundEvent::SendMessage(SendMessage {
                document_id: Some("scratch".into()),
                message: Some("hello".into()),
                username: None,
            }),
        );
        assert_eq!(outcome, Outcome::Skipped(SkipReason::DocumentNotFound));
        assert_eq!(c.chat().total_messages(), 0);
        assert!(c.chat().history("scratch").is_empty());
    }

    #[test]
    fn test_chat_history_is_unicast_and_bounded() {
        let mut c = Coordinator::seeded();
        let a = conn("a");
        for i in 0..105 {
            c.dispatch(
                &a,
                InboundEvent::SendMessage(SendMessage {
                    document_id: Some("demo-js".into()),
                    message: Some(format!("m{i}")),
                    username: None,
                }),
            );
        }

        let outcome = c.dispatch(
            &conn("b"),
            InboundEvent::GetChatHistory(DocumentRef {
                document_id: Some("demo-js".into()),
            }),
        );
        let deliveries = outcome.deliveries();
        assert_eq!(deliveries[0].target, Target::Connection(conn("b")));
        match &deliveries[0].event {
            ServerEvent::ChatHistory { messages } => {
                assert_eq!(messages.len(), 100);
                assert_eq!(messages[0].message, "m5");
                assert_eq!(messages[99].message, "m104");
                assert_eq!(messages[0].username, "User_a");
            }
            other => panic!("Expected ChatHistory, got {other:?}"),
        }
    }

    #[test]
    fn test_chat_history_for_quiet_document() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::GetChatHistory(DocumentRef {
                document_id: Some("nobody-talks-here".into()),
            }),
        );
        assert_eq!(
            outcome.deliveries()[0].event,
            ServerEvent::ChatHistory { messages: Vec::new() }
        );
    }

    #[test]
    fn test_create_document_defaults() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::CreateDocument(CreateDocument::default()),
        );
        match &outcome.deliveries()[0] {
            Delivery {
                target: Target::Connection(to),
                event: ServerEvent::DocumentCreated(doc),
            } => {
                assert_eq!(to, &conn("a"));
                assert_eq!(doc.title, DEFAULT_TITLE);
                assert_eq!(doc.language, DEFAULT_LANGUAGE);
            }
            other => panic!("Expected DocumentCreated unicast, got {other:?}"),
        }
    }

    #[test]
    fn test_create_document_with_title() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::CreateDocument(CreateDocument {
                title: Some("Demo".into()),
                language: Some("python".into()),
            }),
        );
        let ServerEvent::DocumentCreated(doc) = &outcome.deliveries()[0].event else {
            panic!("Expected DocumentCreated");
        };
        assert!(doc.content.starts_with("// Welcome to Demo"));
        assert_eq!(doc.language, "python");
        assert_ne!(doc.id, "demo-js");
        assert_ne!(doc.id, "demo-python");
        assert_eq!(c.documents().len(), 3);
        assert_eq!(c.documents().get(&doc.id).unwrap(), doc);
    }

    #[test]
    fn test_save_document() {
        let mut c = Coordinator::seeded();
        let content = c.documents().get("demo-python").unwrap().content.clone();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::SaveDocument(DocumentRef {
                document_id: Some("demo-python".into()),
            }),
        );
        let doc = c.documents().get("demo-python").unwrap();
        assert_eq!(doc.content, content);
        assert_eq!(
            outcome.deliveries()[0].event,
            ServerEvent::DocumentSaved {
                document_id: "demo-python".into(),
                last_modified: doc.last_modified,
            }
        );
    }

    #[test]
    fn test_save_missing_document_is_skipped() {
        let mut c = Coordinator::seeded();
        let outcome = c.dispatch(
            &conn("a"),
            InboundEvent::SaveDocument(DocumentRef {
                document_id: Some("ghost".into()),
            }),
        );
        assert_eq!(outcome, Outcome::Skipped(SkipReason::DocumentNotFound));
    }

    #[test]
    fn test_disconnect_fans_out_per_document() {
        let mut c = Coordinator::seeded();
        let (a, b) = (conn("a"), conn("b"));
        c.dispatch(&a, join("demo-js", None));
        c.dispatch(&a, join("demo-python", None));
        c.dispatch(&a, join("scratch", None));
        c.dispatch(&b, join("demo-js", None));
        c.dispatch(&b, join("demo-python", None));

        let outcome = c.dispatch(&a, InboundEvent::Disconnect);
        let deliveries = outcome.deliveries();

        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].target, Target::Room("demo-js".into()));
        assert_eq!(deliveries[1].target, Target::Room("demo-python".into()));
        for delivery in deliveries {
            assert_eq!(c.recipients(&delivery.target), vec![b.clone()]);
            match &delivery.event {
                ServerEvent::UserLeft { user_id, active_users } => {
                    assert_eq!(user_id, &a);
                    assert_eq!(ids(active_users), vec!["b"]);
                }
                other => panic!("Expected UserLeft, got {other:?}"),
            }
        }
        assert!(!c.presence().has_room("scratch"));
        assert_eq!(c.presence().session_count(), 2);
    }

    #[test]
    fn test_recipients_for_empty_room() {
        let c = Coordinator::seeded();
        assert!(c.recipients(&Target::Room("demo-js".into())).is_empty());
        assert_eq!(
            c.recipients(&Target::Connection(conn("a"))),
            vec![conn("a")]
        );
    }
}
