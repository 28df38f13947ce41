//! Cloud Firestore document store over the REST API.
//!
//! [`FirestoreDocumentStore`] implements [`DocumentStore`] against the
//! Firestore v1 REST endpoints. It maps the 5 trait methods to:
//!
//! | Method          | HTTP call                                                     |
//! |-----------------|---------------------------------------------------------------|
//! | `query_eq`      | `POST {documents}:runQuery` with an `EQUAL` field filter       |
//! | `insert`        | `POST {documents}/{collection}` (store-assigned ID)            |
//! | `get`           | `GET {documents}/{collection}/{id}` (404 means absent)         |
//! | `update_fields` | `PATCH` with `updateMask.fieldPaths` and `currentDocument.exists=true` |
//! | `delete`        | `DELETE {documents}/{collection}/{id}`                         |
//!
//! where `{documents}` is
//! `{base_url}/projects/{project_id}/databases/{database}/documents`.
//!
//! # Value Encoding
//!
//! Firestore documents use typed values (`{"stringValue": "x"}`,
//! `{"booleanValue": true}`, ...). [`encode_value`] and [`decode_value`]
//! translate between those and plain `serde_json` values at this boundary
//! so the rest of the crate only sees plain JSON.
//!
//! # Authentication
//!
//! Requests carry the configured API key as a `key` query parameter and,
//! when set, the signed-in user's ID token as a bearer token. Firestore
//! security rules then see the same identity the identity gate resolved.
//!
//! # Usage
//!
//! ```rust,no_run
//! use forte_tasks::store::firestore::{FirestoreConfig, FirestoreDocumentStore};
//! use forte_tasks::store::repository::TaskRepository;
//!
//! # fn example() -> Result<(), forte_tasks::store::StoreError> {
//! let store = FirestoreDocumentStore::new(FirestoreConfig::new("procrastination-terminator"))?;
//! store.set_id_token(Some("eyJhbGciOi...".to_string()));
//! let repo = TaskRepository::new(store);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::store::backend::{Document, DocumentStore, StoreError};

/// Default Firestore REST root.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default database name.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Connection settings for [`FirestoreDocumentStore`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use forte_tasks::store::firestore::FirestoreConfig;
///
/// let config = FirestoreConfig::new("my-project")
///     .with_api_key("AIza...")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.database, "(default)");
/// assert_eq!(
///     config.documents_url(),
///     "https://firestore.googleapis.com/v1/projects/my-project/databases/(default)/documents"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    /// Google Cloud project ID.
    pub project_id: String,

    /// Database name within the project.
    pub database: String,

    /// Web API key, sent as the `key` query parameter.
    pub api_key: Option<String>,

    /// REST root, overridable for the emulator and tests.
    pub base_url: String,

    /// HTTP timeout for each request.
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// Creates a configuration for `project_id` with default settings.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the web API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the REST root URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the `documents` root URL for this project and database.
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }
}

/// Firestore-backed [`DocumentStore`].
#[derive(Debug)]
pub struct FirestoreDocumentStore {
    http_client: reqwest::Client,
    config: FirestoreConfig,
    id_token: RwLock<Option<String>>,
}

impl FirestoreDocumentStore {
    /// Creates a store with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the HTTP client cannot be built.
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Backend {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_http_client(http_client, config))
    }

    /// Creates a store from an existing `reqwest` client.
    pub fn with_http_client(http_client: reqwest::Client, config: FirestoreConfig) -> Self {
        Self {
            http_client,
            config,
            id_token: RwLock::new(None),
        }
    }

    /// Sets (or clears) the bearer ID token sent with every request.
    ///
    /// Behind a [`TaskStore`](crate::store::TaskStore) the controller does
    /// this through `set_credentials` on every resolved auth state.
    pub fn set_id_token(&self, token: Option<String>) {
        *self.id_token.write() = token;
    }

    /// Returns the store's configuration.
    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    // ---- Request helpers (private) ----

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/{}",
            self.config.documents_url(),
            urlencoding::encode(collection)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }

    /// Appends query parameters plus the API key, if any.
    fn with_query(&self, url: String, params: &[(&str, &str)]) -> String {
        let mut pairs: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        if let Some(ref key) = self.config.api_key {
            pairs.push(format!("key={}", urlencoding::encode(key)));
        }
        if pairs.is_empty() {
            url
        } else {
            format!("{url}?{}", pairs.join("&"))
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.id_token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("firestore {what} request failed"),
                source: Some(Box::new(e)),
            })
    }

    async fn read_json(response: reqwest::Response, what: &str) -> Result<Value, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::backend(format!(
                "firestore {what} returned {status}: {body}"
            )));
        }
        response.json::<Value>().await.map_err(|e| StoreError::Backend {
            message: format!("firestore {what} returned invalid JSON"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let url = self.with_query(format!("{}:runQuery", self.config.documents_url()), &[]);
        let body = run_query_body(collection, field, value);
        let response = self
            .send(self.http_client.post(url).json(&body), "runQuery")
            .await?;
        let results = Self::read_json(response, "runQuery").await?;

        let rows = results
            .as_array()
            .ok_or_else(|| StoreError::backend("firestore runQuery returned a non-array body"))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(decode_document)
            .collect())
    }

    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let url = self.with_query(self.collection_url(collection), &[]);
        let body = json!({ "fields": encode_fields(&fields) });
        let response = self
            .send(self.http_client.post(url).json(&body), "createDocument")
            .await?;
        let created = Self::read_json(response, "createDocument").await?;

        decode_document(&created)
            .map(|doc| doc.id)
            .ok_or_else(|| StoreError::backend("firestore createDocument returned no document name"))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.with_query(self.document_url(collection, id), &[]);
        let response = self.send(self.http_client.get(url), "getDocument").await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = Self::read_json(response, "getDocument").await?;
        Ok(decode_document(&doc))
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut params: Vec<(&str, &str)> = patch
            .keys()
            .map(|name| ("updateMask.fieldPaths", name.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));
        let url = self.with_query(self.document_url(collection, id), &params);

        let body = json!({ "fields": encode_fields(&patch) });
        let response = self
            .send(self.http_client.patch(url).json(&body), "patchDocument")
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Self::read_json(response, "patchDocument").await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.with_query(self.document_url(collection, id), &[]);
        let response = self
            .send(self.http_client.delete(url), "deleteDocument")
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::read_json(response, "deleteDocument").await?;
        Ok(())
    }

    fn set_credentials(&self, id_token: Option<&str>) {
        self.set_id_token(id_token.map(str::to_string));
    }
}

// ---- Typed value codec ----

/// Builds a `runQuery` request body selecting `field == value`.
pub fn run_query_body(collection: &str, field: &str, value: &Value) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            }
        }
    })
}

/// Encodes a plain JSON value as a Firestore typed value.
///
/// # Examples
///
/// ```
/// use forte_tasks::store::firestore::encode_value;
/// use serde_json::json;
///
/// assert_eq!(encode_value(&json!("x")), json!({"stringValue": "x"}));
/// assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
/// assert_eq!(encode_value(&json!(7)), json!({"integerValue": "7"}));
/// ```
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encodes a field map as a Firestore `fields` object.
pub fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Decodes a Firestore typed value into plain JSON.
///
/// Timestamps, references, and bytes decode to their string form. Returns
/// `None` for shapes that are not a typed value.
///
/// # Examples
///
/// ```
/// use forte_tasks::store::firestore::decode_value;
/// use serde_json::json;
///
/// assert_eq!(decode_value(&json!({"integerValue": "42"})), Some(json!(42)));
/// assert_eq!(decode_value(&json!({"booleanValue": false})), Some(json!(false)));
/// assert_eq!(decode_value(&json!({"unknown": 1})), None);
/// ```
pub fn decode_value(value: &Value) -> Option<Value> {
    let (kind, inner) = value.as_object()?.iter().next()?;
    match kind.as_str() {
        "nullValue" => Some(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().ok().map(Value::from),
            Value::Number(n) => n.as_i64().map(Value::from),
            _ => None,
        },
        "doubleValue" => inner.as_f64().map(Value::from),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner.as_str().map(|s| Value::String(s.to_string()))
        },
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(decode_value).collect())
                .unwrap_or_default();
            Some(Value::Array(values))
        },
        "mapValue" => Some(Value::Object(
            inner.get("fields").map(decode_fields).unwrap_or_default(),
        )),
        _ => None,
    }
}

/// Decodes a Firestore `fields` object, dropping undecodable entries.
pub fn decode_fields(fields: &Value) -> Map<String, Value> {
    fields
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| Some((name.clone(), decode_value(value)?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decodes a Firestore document resource into a [`Document`].
///
/// The ID is the last segment of the resource `name`.
pub fn decode_document(resource: &Value) -> Option<Document> {
    let name = resource.get("name")?.as_str()?;
    let id = name.rsplit('/').next().filter(|id| !id.is_empty())?;
    let fields = resource.get("fields").map(decode_fields).unwrap_or_default();
    Some(Document {
        id: id.to_string(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_task_fields() {
        let fields = match json!({"owner": "alice", "content": "buy milk", "completed": false}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(
            encode_fields(&fields),
            json!({
                "owner": {"stringValue": "alice"},
                "content": {"stringValue": "buy milk"},
                "completed": {"booleanValue": false},
            })
        );
    }

    #[test]
    fn encode_nested_values() {
        assert_eq!(
            encode_value(&json!({"tags": ["a", 1.5, null]})),
            json!({
                "mapValue": {"fields": {
                    "tags": {"arrayValue": {"values": [
                        {"stringValue": "a"},
                        {"doubleValue": 1.5},
                        {"nullValue": null},
                    ]}}
                }}
            })
        );
    }

    #[test]
    fn decode_handles_empty_containers() {
        assert_eq!(decode_value(&json!({"arrayValue": {}})), Some(json!([])));
        assert_eq!(decode_value(&json!({"mapValue": {}})), Some(json!({})));
    }

    #[test]
    fn decode_timestamp_as_string() {
        assert_eq!(
            decode_value(&json!({"timestampValue": "2023-05-01T10:00:00Z"})),
            Some(json!("2023-05-01T10:00:00Z"))
        );
    }

    #[test]
    fn decode_rejects_malformed_integer() {
        assert_eq!(decode_value(&json!({"integerValue": "twelve"})), None);
    }

    #[test]
    fn decode_document_takes_last_name_segment() {
        let resource = json!({
            "name": "projects/p/databases/(default)/documents/todos/AbC123",
            "fields": {"owner": {"stringValue": "alice"}},
            "createTime": "2023-05-01T10:00:00Z",
        });
        let doc = decode_document(&resource).unwrap();
        assert_eq!(doc.id, "AbC123");
        assert_eq!(doc.field("owner"), Some(&json!("alice")));
    }

    #[test]
    fn decode_document_without_name_is_none() {
        assert!(decode_document(&json!({"fields": {}})).is_none());
        assert!(decode_document(&json!({"name": "projects/p/documents/todos/"})).is_none());
    }

    #[test]
    fn run_query_body_shape() {
        let body = run_query_body("todos", "owner", &json!("alice"));
        assert_eq!(
            body["structuredQuery"]["where"]["fieldFilter"],
            json!({
                "field": {"fieldPath": "owner"},
                "op": "EQUAL",
                "value": {"stringValue": "alice"},
            })
        );
        assert_eq!(
            body["structuredQuery"]["from"],
            json!([{"collectionId": "todos"}])
        );
    }

    #[test]
    fn documents_url_trims_trailing_slash() {
        let config = FirestoreConfig::new("p")
            .with_base_url("http://localhost:8080/v1/")
            .with_database("tasks");
        assert_eq!(
            config.documents_url(),
            "http://localhost:8080/v1/projects/p/databases/tasks/documents"
        );
    }

    #[test]
    fn query_string_includes_api_key_last() {
        let store = FirestoreDocumentStore::with_http_client(
            reqwest::Client::new(),
            FirestoreConfig::new("p").with_api_key("k 1"),
        );
        let url = store.with_query(
            "http://x/doc".to_string(),
            &[("updateMask.fieldPaths", "completed")],
        );
        assert_eq!(
            url,
            "http://x/doc?updateMask.fieldPaths=completed&key=k%201"
        );
    }
}
