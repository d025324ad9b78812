//! Canonical document text and metadata.
//!
//! Edits replace the whole body. There is no merge and no history:
//! the last `apply_edit` observed by the store wins.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::id::DocumentId;

/// Title used when `create_document` omits one.
pub const DEFAULT_TITLE: &str = "Untitled Document";
/// Language tag used when `create_document` omits one.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// A shared text document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// Tag for client-side syntax highlighting.
    pub language: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// Build a document with both timestamps set to now.
    pub fn new(
        id: impl Into<DocumentId>,
        title: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            language: language.into(),
            content: content.into(),
            created_at: now,
            last_modified: now,
        }
    }

    /// Starter body for a freshly created document.
    pub fn scaffold(title: &str) -> String {
        format!("// Welcome to {title}\n// Start coding here...\n\n")
    }
}

/// In-memory document store, iterated in insertion order.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: IndexMap<DocumentId, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the demo documents.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        for doc in crate::seed::demo_documents() {
            store.insert(doc);
        }
        store
    }

    /// Insert or replace a document under its own id.
    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &str) -> Result<&Document, CoreError> {
        self.documents
            .get(id)
            .ok_or_else(|| CoreError::DocumentNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Create a document with a fresh id and a scaffold body.
    pub fn create(&mut self, title: &str, language: &str) -> &Document {
        let mut id = Uuid::new_v4().to_string();
        while self.documents.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        let document = Document::new(id.clone(), title, language, Document::scaffold(title));
        log::info!("Created document {id} ({title}, {language})");
        self.documents.entry(id).or_insert(document)
    }

    /// Replace the document body wholesale and bump `last_modified`.
    pub fn apply_edit(&mut self, id: &str, content: String) -> Result<&Document, CoreError> {
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| CoreError::DocumentNotFound(id.to_string()))?;
        document.content = content;
        document.last_modified = Utc::now();
        Ok(document)
    }

    /// Acknowledge an explicit save: bump `last_modified`, keep content.
    pub fn touch_saved(&mut self, id: &str) -> Result<DateTime<Utc>, CoreError> {
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| CoreError::DocumentNotFound(id.to_string()))?;
        document.last_modified = Utc::now();
        Ok(document.last_modified)
    }

    pub fn list(&self) -> Vec<&Document> {
        self.documents.values().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
