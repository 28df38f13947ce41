//! In-memory document store.
//!
//! [`InMemoryDocumentStore`] provides a thread-safe [`DocumentStore`]
//! implementation using `DashMap<String, StoredDocument>` keyed by
//! `{collection}/{id}`. It is a dumb collection store with no domain
//! logic, used by tests and local single-process sessions.
//!
//! # Ordering
//!
//! Queries return documents in insertion order. This is a property of this
//! backend only; callers of the repository must not rely on it.
//!
//! # Examples
//!
//! ```
//! use forte_tasks::store::memory::InMemoryDocumentStore;
//! use forte_tasks::store::repository::TaskRepository;
//!
//! let repo = TaskRepository::new(InMemoryDocumentStore::new());
//! assert!(repo.store().is_empty());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::backend::{Document, DocumentStore, StoreError};

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    fields: Map<String, Value>,
}

/// Thread-safe in-memory document store using [`DashMap`].
///
/// IDs are random `UUIDv4` strings in simple (hyphen-free) form, so they
/// are not predictable before `insert` returns.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    data: DashMap<String, StoredDocument>,
    next_seq: AtomicU64,
}

fn make_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    ///
    /// # Examples
    ///
    /// ```
    /// use forte_tasks::store::memory::InMemoryDocumentStore;
    ///
    /// let store = InMemoryDocumentStore::new();
    /// assert_eq!(store.len(), 0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents across all collections.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes a document under a caller-chosen ID, replacing any existing
    /// one. Intended for seeding fixtures.
    pub fn put_document(&self, collection: &str, doc: Document) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.data.insert(
            make_key(collection, &doc.id),
            StoredDocument {
                seq,
                fields: doc.fields,
            },
        );
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let prefix = make_key(collection, "");
        let mut matches: Vec<(u64, Document)> = self
            .data
            .iter()
            .filter_map(|entry| {
                let id = entry.key().strip_prefix(&prefix)?;
                let stored = entry.value();
                (stored.fields.get(field) == Some(value)).then(|| {
                    (
                        stored.seq,
                        Document {
                            id: id.to_string(),
                            fields: stored.fields.clone(),
                        },
                    )
                })
            })
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        Ok(matches.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.data
            .insert(make_key(collection, &id), StoredDocument { seq, fields });
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.data.get(&make_key(collection, id)).map(|entry| Document {
            id: id.to_string(),
            fields: entry.value().fields.clone(),
        }))
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .data
            .get_mut(&make_key(collection, id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (name, value) in patch {
            entry.value_mut().fields.insert(name, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.data.remove(&make_key(collection, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert("todos", fields(json!({"n": 1}))).await.unwrap();
        let b = store.insert("todos", fields(json!({"n": 2}))).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn query_eq_filters_and_keeps_insertion_order() {
        let store = InMemoryDocumentStore::new();
        let first = store
            .insert("todos", fields(json!({"owner": "a", "n": 1})))
            .await
            .unwrap();
        store
            .insert("todos", fields(json!({"owner": "b", "n": 2})))
            .await
            .unwrap();
        let third = store
            .insert("todos", fields(json!({"owner": "a", "n": 3})))
            .await
            .unwrap();

        let docs = store.query_eq("todos", "owner", &json!("a")).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), third.as_str()]);
    }

    #[tokio::test]
    async fn query_eq_is_scoped_to_collection() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("todos", fields(json!({"owner": "a"})))
            .await
            .unwrap();
        store
            .insert("notes", fields(json!({"owner": "a"})))
            .await
            .unwrap();
        let docs = store.query_eq("todos", "owner", &json!("a")).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn query_eq_does_not_match_missing_field() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("todos", fields(json!({"content": "x"})))
            .await
            .unwrap();
        let docs = store
            .query_eq("todos", "owner", &Value::Null)
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn update_fields_is_partial() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .insert("todos", fields(json!({"owner": "a", "completed": false})))
            .await
            .unwrap();
        store
            .update_fields("todos", &id, fields(json!({"completed": true})))
            .await
            .unwrap();
        let doc = store.get("todos", &id).await.unwrap().unwrap();
        assert_eq!(
            Value::Object(doc.fields),
            json!({"owner": "a", "completed": true})
        );
    }

    #[tokio::test]
    async fn update_fields_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .update_fields("todos", "nope", fields(json!({"completed": true})))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert("todos", Map::new()).await.unwrap();
        store.delete("todos", &id).await.unwrap();
        store.delete("todos", &id).await.unwrap();
        assert!(store.get("todos", &id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn put_document_uses_given_id() {
        let store = InMemoryDocumentStore::new();
        store.put_document("todos", Document::new("fixed", json!({"owner": "a"})));
        let doc = store.get("todos", "fixed").await.unwrap().unwrap();
        assert_eq!(doc.field("owner"), Some(&json!("a")));
    }
}
