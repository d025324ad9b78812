//! WebSocket gateway and process-level state.
//!
//! ```text
//! Client A ──┐                       ┌── DocumentStore
//!             ├── accept ── task ──► Mutex<Coordinator> ── PresenceRegistry
//! Client B ──┘     (one per conn)    └── ChatLedger
//!                                         │ Vec<Delivery>
//!                     ┌───────────────────┘
//!                     ▼
//!               ConnectionHub ── mpsc ──► writer half of each socket
//! ```
//!
//! Every event, including the synthetic `connect` and `disconnect`, goes
//! through one mutex. Fan-out happens before the lock is released, so
//! all clients observe events on a document in the same order. A client
//! whose outbound queue overflows is disconnected under the same lock,
//! so its peers see `user_left` right after the event it missed.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, MutexGuard};
use tokio_tungstenite::tungstenite::Message;

use scribe_core::ConnectionId;

use crate::broadcast::ConnectionHub;
use crate::coordinator::{Coordinator, Outcome};
use crate::protocol::{InboundEvent, ProtocolError};

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// WebSocket listener address
    pub ws_bind_addr: String,
    /// HTTP query surface listener address
    pub http_bind_addr: String,
    /// Frames buffered per connection before drops start
    pub outbound_capacity: usize,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_bind_addr: "127.0.0.1:9090".to_string(),
            http_bind_addr: "127.0.0.1:5000".to_string(),
            outbound_capacity: 256,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Counters reported by `GET /api/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub documents: usize,
    pub active_rooms: usize,
    pub active_sessions: usize,
    pub connections: usize,
    pub chat_messages: usize,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub connections_evicted: u64,
}

/// Shared state behind both listeners.
pub struct CollabState {
    coordinator: Mutex<Coordinator>,
    hub: ConnectionHub,
}

impl CollabState {
    pub fn new(coordinator: Coordinator, outbound_capacity: usize) -> Self {
        Self {
            coordinator: Mutex::new(coordinator),
            hub: ConnectionHub::new(outbound_capacity),
        }
    }

    /// Run one event through the coordinator and fan out the result
    /// while still holding the lock. Returns the number of frames queued;
    /// skipped events queue nothing.
    ///
    /// Connections evicted by the hub for overflowing are disconnected
    /// before the lock is released, and that fan-out is counted too.
    pub async fn dispatch(
        &self,
        connection: &ConnectionId,
        event: InboundEvent,
    ) -> Result<usize, ProtocolError> {
        let mut coordinator = self.coordinator.lock().await;
        let deliveries = match coordinator.dispatch(connection, event) {
            Outcome::Applied(deliveries) => deliveries,
            Outcome::Skipped(_) => return Ok(0),
        };

        let delivered = self.hub.deliver(&coordinator, deliveries).await?;
        let mut queued = delivered.queued;
        let mut evicted: VecDeque<ConnectionId> = delivered.evicted.into();
        while let Some(slow) = evicted.pop_front() {
            log::warn!("Disconnecting {slow}: outbound queue overflowed");
            let Outcome::Applied(deliveries) = coordinator.dispatch(&slow, InboundEvent::Disconnect)
            else {
                continue;
            };
            let delivered = self.hub.deliver(&coordinator, deliveries).await?;
            queued += delivered.queued;
            evicted.extend(delivered.evicted);
        }
        Ok(queued)
    }

    /// Exclusive access for read-only queries.
    pub async fn coordinator(&self) -> MutexGuard<'_, Coordinator> {
        self.coordinator.lock().await
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub async fn stats(&self) -> ServiceStats {
        let coordinator = self.coordinator.lock().await;
        let hub = self.hub.stats().await;
        ServiceStats {
            documents: coordinator.documents().len(),
            active_rooms: coordinator.presence().room_count(),
            active_sessions: coordinator.presence().session_count(),
            connections: hub.connections,
            chat_messages: coordinator.chat().total_messages(),
            messages_sent: hub.messages_sent,
            messages_dropped: hub.messages_dropped,
            connections_evicted: hub.evictions,
        }
    }
}

pub struct CollabServer {
    config: ServerConfig,
    state: Arc<CollabState>,
}

impl CollabServer {
    /// Server over the seeded demo documents.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_coordinator(config, Coordinator::seeded())
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn with_coordinator(config: ServerConfig, coordinator: Coordinator) -> Self {
        let state = Arc::new(CollabState::new(coordinator, config.outbound_capacity));
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<CollabState> {
        self.state.clone()
    }

    /// Bind both listeners without serving yet.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let ws_listener = TcpListener::bind(&self.config.ws_bind_addr).await?;
        let http_listener = TcpListener::bind(&self.config.http_bind_addr).await?;
        let ws_addr = ws_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        Ok(BoundServer {
            ws_listener,
            http_listener,
            ws_addr,
            http_addr,
            config: self.config,
            state: self.state,
        })
    }

    /// Bind and serve until an accept or HTTP error.
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.run().await
    }
}

/// Server with live listeners; addresses are known even on port 0.
pub struct BoundServer {
    ws_listener: TcpListener,
    http_listener: TcpListener,
    ws_addr: SocketAddr,
    http_addr: SocketAddr,
    config: ServerConfig,
    state: Arc<CollabState>,
}

impl BoundServer {
    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn state(&self) -> Arc<CollabState> {
        self.state.clone()
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let BoundServer {
            ws_listener,
            http_listener,
            ws_addr,
            http_addr,
            config,
            state,
        } = self;
        log::info!("WebSocket gateway listening on ws://{ws_addr}");
        log::info!("HTTP API listening on http://{http_addr}");

        let app = crate::http::router(state.clone(), &config.cors_origins);
        let http = async move {
            axum::serve(http_listener, app)
                .await
                .map_err(ServerError::from)
        };

        tokio::try_join!(accept_loop(ws_listener, state), http)?;
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<CollabState>) -> Result<(), ServerError> {
    loop {
        let (stream, addr) = listener.accept().await?;
        log::debug!("New TCP connection from {addr}");

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, state).await {
                log::error!("Connection error from {addr}: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<CollabState>,
) -> Result<(), ServerError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let id = ConnectionId::generate();
    let mut outbound = state.hub.register(id.clone()).await;
    log::info!("Client connected: {id} ({addr})");

    let session: Result<(), ServerError> = async {
        state.dispatch(&id, InboundEvent::Connect).await?;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match InboundEvent::decode(text.as_str()) {
                                Ok(event) => {
                                    if matches!(event, InboundEvent::CursorChange(_)) {
                                        log::trace!("{id} -> cursor_change");
                                    } else {
                                        log::debug!("{id} -> {}", event.name());
                                    }
                                    if let Err(e) = state.dispatch(&id, event).await {
                                        log::error!("Failed to fan out event from {id}: {e}");
                                    }
                                }
                                Err(e) => log::debug!("Dropping frame from {id}: {e}"),
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            log::debug!("Dropping binary frame from {id}");
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queued the pong while reading; push it out.
                            ws_sender.flush().await?;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            log::warn!("WebSocket error from {id}: {e}");
                            break;
                        }
                        _ => {}
                    }
                }

                frame = outbound.recv() => {
                    match frame {
                        Some(frame) => ws_sender.send(Message::text((*frame).clone())).await?,
                        None => {
                            // Evicted by the hub; the client reconnects and resyncs.
                            log::info!("Closing {id}: outbound queue overflowed");
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        }
        Ok::<(), ServerError>(())
    }
    .await;

    // Unregister first so the departure is never queued for the leaver.
    state.hub.unregister(&id).await;
    if let Err(e) = state.dispatch(&id, InboundEvent::Disconnect).await {
        log::error!("Failed to fan out disconnect of {id}: {e}");
    }
    log::info!("Client disconnected: {id}");

    session
}
