//! WebSocket client for the collaboration server.
//!
//! Used by the integration tests and handy for scripted demos. The client
//! spawns a writer task fed by an mpsc queue and a reader task that decodes
//! server frames into [`ServerEvent`]s. The event receiver ends when the
//! connection does.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use scribe_core::{ConnectionId, DocumentId};

use crate::protocol::{
    CodeChange, CreateDocument, CursorChange, DocumentRef, InboundEvent, JoinDocument,
    ProtocolError, SendMessage, ServerEvent,
};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct CollabClient {
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    /// Identity assigned by the server in its `connected` ack
    user_id: Arc<RwLock<Option<ConnectionId>>>,
    outgoing_tx: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<()>>,
    event_tx: Option<mpsc::Sender<ServerEvent>>,
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
}

impl CollabClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            user_id: Arc::new(RwLock::new(None)),
            outgoing_tx: None,
            writer: None,
            event_tx: Some(event_tx),
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Open the socket and start the reader and writer tasks.
    ///
    /// A client connects once; a second call fails with `ConnectionClosed`.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        let Some(event_tx) = self.event_tx.take() else {
            return Err(ProtocolError::ConnectionClosed);
        };
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(self.server_url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::warn!("Failed to connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: drains the outgoing queue, closes the socket when
        // every sender is gone.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        self.outgoing_tx = Some(out_tx);
        self.writer = Some(tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_writer.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
            let _ = ws_writer.close().await;
        }));

        *self.state.write().await = ConnectionState::Connected;

        let state = self.state.clone();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerEvent::decode(text.as_str()) {
                        Ok(event) => {
                            if let ServerEvent::Connected { user_id: id } = &event {
                                *user_id.write().await = Some(id.clone());
                            }
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::debug!("Ignoring undecodable server frame: {e}"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
        });

        Ok(())
    }

    /// Encode and queue one event.
    pub async fn send(&self, event: &InboundEvent) -> Result<(), ProtocolError> {
        let encoded = event.encode()?;
        self.send_raw(encoded).await
    }

    /// Queue a pre-built text frame as-is.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Err(ProtocolError::ConnectionClosed);
        }
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(text.into())
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    pub async fn join(&self, document_id: &str, username: Option<&str>) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::JoinDocument(JoinDocument {
            document_id: Some(document_id.to_string()),
            username: username.map(str::to_string),
        }))
        .await
    }

    pub async fn leave(&self, document_id: &str) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::LeaveDocument(doc_ref(document_id))).await
    }

    /// Replace the document body.
    pub async fn edit(
        &self,
        document_id: &str,
        content: &str,
        change: Option<Value>,
    ) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::CodeChange(CodeChange {
            document_id: Some(document_id.to_string()),
            content: Some(content.to_string()),
            change,
        }))
        .await
    }

    pub async fn move_cursor(
        &self,
        document_id: &str,
        cursor_position: u64,
        selection: Option<Value>,
    ) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::CursorChange(CursorChange {
            document_id: Some(document_id.to_string()),
            cursor_position: Some(cursor_position),
            selection,
        }))
        .await
    }

    pub async fn chat(
        &self,
        document_id: &str,
        message: &str,
        username: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::SendMessage(SendMessage {
            document_id: Some(document_id.to_string()),
            message: Some(message.to_string()),
            username: username.map(str::to_string),
        }))
        .await
    }

    pub async fn request_history(&self, document_id: &str) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::GetChatHistory(doc_ref(document_id))).await
    }

    pub async fn create_document(
        &self,
        title: Option<&str>,
        language: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::CreateDocument(CreateDocument {
            title: title.map(str::to_string),
            language: language.map(str::to_string),
        }))
        .await
    }

    pub async fn save(&self, document_id: &str) -> Result<(), ProtocolError> {
        self.send(&InboundEvent::SaveDocument(doc_ref(document_id))).await
    }

    /// Close the socket after flushing anything already queued.
    pub async fn disconnect(&mut self) {
        self.outgoing_tx = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// `None` until the server's `connected` ack has been read.
    pub async fn user_id(&self) -> Option<ConnectionId> {
        self.user_id.read().await.clone()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

fn doc_ref(document_id: &str) -> DocumentRef {
    DocumentRef {
        document_id: Some(DocumentId::from(document_id)),
    }
}
