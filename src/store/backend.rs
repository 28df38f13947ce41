//! Low-level document store trait and supporting types.
//!
//! The [`DocumentStore`] trait is the contract every storage engine
//! implements. It exposes 5 operations over named collections:
//! [`query_eq`](DocumentStore::query_eq), [`insert`](DocumentStore::insert),
//! [`get`](DocumentStore::get), [`update_fields`](DocumentStore::update_fields),
//! and [`delete`](DocumentStore::delete).
//!
//! Domain logic (content validation, owner scoping, ownership checks,
//! document decoding) does **not** belong here. Backends are dumb
//! collection stores; domain logic lives in
//! [`TaskRepository`](crate::store::repository::TaskRepository).
//!
//! # Documents
//!
//! A [`Document`] is a store-assigned ID plus a flat JSON field map. IDs
//! are opaque to callers and are never predictable before an insert
//! returns.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored document: its ID and its fields.
///
/// # Examples
///
/// ```
/// use forte_tasks::store::Document;
/// use serde_json::json;
///
/// let doc = Document::new("abc", json!({"owner": "alice"}));
/// assert_eq!(doc.id, "abc");
/// assert_eq!(doc.field("owner"), Some(&json!("alice")));
/// assert_eq!(doc.field("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned identifier, unique within its collection.
    pub id: String,

    /// The document's fields.
    pub fields: Map<String, Value>,
}

impl Document {
    /// Builds a document from an ID and a JSON object.
    ///
    /// A non-object `fields` value produces an empty field map.
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Returns a field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Errors that can occur during raw store operations.
///
/// The repository maps these to [`TaskError`](crate::error::TaskError)
/// variants before surfacing them.
///
/// # Examples
///
/// ```
/// use forte_tasks::store::StoreError;
///
/// let err = StoreError::NotFound {
///     collection: "todos".to_string(),
///     id: "task-123".to_string(),
/// };
/// assert!(err.to_string().contains("todos/task-123"));
/// ```
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists with the given ID.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// The collection that was searched.
        collection: String,
        /// The document ID that was not found.
        id: String,
    },

    /// An I/O or backend-specific error occurred (network failure,
    /// timeout, unexpected response).
    #[error("backend error: {message}")]
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Shorthand for a [`StoreError::Backend`] without a source.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Collection-oriented document store.
///
/// Implementations provide raw storage primitives against a (usually
/// remote) store that is the sole source of truth. The store does not
/// enforce ownership; callers must scope every query and write.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single store can back many
/// concurrent operations.
///
/// # Atomicity
///
/// Each call is independently atomic at the store's granularity. No
/// operation spans more than one document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document in `collection` whose `field` equals `value`.
    ///
    /// Order is store-defined.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] on I/O or backend-specific failures.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Inserts a new document and returns its store-assigned ID.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] on I/O or backend-specific failures.
    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// Fetches one document by ID, or `None` if absent.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Overwrites exactly the fields present in `patch`, leaving all other
    /// fields untouched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no document exists with the given ID.
    /// - [`StoreError::Backend`] on I/O or backend-specific failures.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Deletes a document by ID. Deleting an absent ID succeeds.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] on I/O or backend-specific failures.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Installs (or clears) the bearer ID token used by later calls.
    ///
    /// Backends without per-user credentials ignore it.
    fn set_credentials(&self, _id_token: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_new_from_object() {
        let doc = Document::new("d1", json!({"a": 1, "b": true}));
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.fields.len(), 2);
        assert_eq!(doc.field("b"), Some(&json!(true)));
    }

    #[test]
    fn document_new_from_non_object_is_empty() {
        let doc = Document::new("d2", json!([1, 2, 3]));
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound {
            collection: "todos".to_string(),
            id: "x".to_string(),
        };
        assert_eq!(err.to_string(), "document not found: todos/x");

        let err = StoreError::backend("connection timeout");
        assert_eq!(err.to_string(), "backend error: connection timeout");
    }

    #[test]
    fn store_error_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::Backend {
            message: "db failed".to_string(),
            source: Some(Box::new(inner)),
        };
        let source = std::error::Error::source(&err);
        assert!(source.is_some_and(|s| s.to_string().contains("refused")));

        let err = StoreError::NotFound {
            collection: "c".to_string(),
            id: "i".to_string(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }
}
