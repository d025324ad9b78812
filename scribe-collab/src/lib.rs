//! # scribe-collab: real-time session layer for scribe
//!
//! Routes client events to the in-memory stores of `scribe-core` and fans
//! the results out to the right connections.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON text frames   ┌──────────────┐
//! │ CollabClient │ ◄──────────────────► │ CollabServer │
//! │ (per user)   │  {"event","data"}    │ (gateway)    │
//! └──────────────┘                      └──────┬───────┘
//!                                              │ one lock, one event at a time
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │ Coordinator  │── DocumentStore
//!                                       │              │── PresenceRegistry
//!                                       └──────┬───────┘── ChatLedger
//!                                              │ Vec<Delivery>
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │ConnectionHub │ (fan-out)
//!                                       └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: inbound/outbound event envelopes
//! - [`coordinator`]: per-event state transitions and fan-out targets
//! - [`broadcast`]: per-connection outbound queues
//! - [`server`]: WebSocket gateway
//! - [`http`]: read-only HTTP query surface
//! - [`client`]: WebSocket client for demos and tests

pub mod broadcast;
pub mod client;
pub mod coordinator;
pub mod http;
pub mod protocol;
pub mod server;

pub use broadcast::{ConnectionHub, Delivered, HubStats};
pub use client::{CollabClient, ConnectionState};
pub use coordinator::{Coordinator, Delivery, Outcome, SkipReason, Target};
pub use protocol::{InboundEvent, ProtocolError, ServerEvent};
pub use server::{BoundServer, CollabServer, CollabState, ServerConfig, ServerError, ServiceStats};
