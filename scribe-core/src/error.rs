use thiserror::Error;

use crate::id::{ConnectionId, DocumentId};

/// Lookup failures raised by the stores.
///
/// None of these are fatal: the coordinator turns them into silent
/// no-ops on the event path, the HTTP layer into a 404.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),
    #[error("No session for connection {connection_id} on document {document_id}")]
    SessionNotFound {
        document_id: DocumentId,
        connection_id: ConnectionId,
    },
}
