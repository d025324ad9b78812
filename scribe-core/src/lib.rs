//! # scribe-core: in-memory state for collaborative code editing
//!
//! Transport-free stores owned by the session coordinator in
//! `scribe-collab`. Every operation is synchronous and in-memory.
//!
//! ```text
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │ DocumentStore    │  │ PresenceRegistry │  │ ChatLedger       │
//! │ id → Document    │  │ doc → sessions   │  │ doc → last 100   │
//! │ (last writer     │  │ (insertion       │  │ messages (FIFO   │
//! │  wins)           │  │  ordered)        │  │  eviction)       │
//! └──────────────────┘  └──────────────────┘  └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`document`]: canonical text + metadata per document
//! - [`presence`]: who is on which document, with cursor state
//! - [`chat`]: bounded per-document chat history
//! - [`seed`]: demo documents loaded at startup

pub mod chat;
pub mod document;
pub mod error;
pub mod id;
pub mod presence;
pub mod seed;

pub use chat::{ChatLedger, ChatMessage, DEFAULT_CHAT_CAPACITY};
pub use document::{Document, DocumentStore, DEFAULT_LANGUAGE, DEFAULT_TITLE};
pub use error::CoreError;
pub use id::{ConnectionId, DocumentId};
pub use presence::{DisconnectOutcome, LeaveOutcome, PresenceRegistry, Session};
