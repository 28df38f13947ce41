//! Task repository, document store trait, and backends.
//!
//! # Architecture
//!
//! Task storage has three layers:
//!
//! 1. **[`TaskStore`]** -- A type-erasure interface for use as
//!    `Arc<dyn TaskStore>` in the
//!    [`SyncController`](crate::sync::SyncController).
//!
//! 2. **[`TaskRepository<S>`](repository::TaskRepository)** -- All domain
//!    logic (owner scoping, content validation, ownership checks before
//!    mutation, document decoding, timeouts). Has a blanket `TaskStore`
//!    impl.
//!
//! 3. **[`DocumentStore`]** -- Dumb collection-store trait that backends
//!    implement. No domain logic.
//!
//! To create a store: `TaskRepository::new(backend)` and wrap in
//! `Arc<dyn TaskStore>` for the controller.
//!
//! # Backends
//!
//! - [`InMemoryDocumentStore`](memory::InMemoryDocumentStore) -- Thread-safe
//!   in-memory store using `DashMap`.
//! - [`FirestoreDocumentStore`](firestore::FirestoreDocumentStore) -- Cloud
//!   Firestore over its REST API. Available behind the `firestore` feature
//!   flag.

pub mod backend;
#[cfg(feature = "firestore")]
pub mod firestore;
pub mod memory;
pub mod repository;

use std::time::Duration;

use async_trait::async_trait;

pub use backend::{Document, DocumentStore, StoreError};

use crate::constants::TODOS_COLLECTION;
use crate::domain::Task;
use crate::error::TaskError;

/// Repository-level settings.
///
/// # Defaults
///
/// | Setting           | Default   | Description                           |
/// |-------------------|-----------|---------------------------------------|
/// | `collection`      | `"todos"` | Collection holding task documents     |
/// | `request_timeout` | `None`    | Per-call deadline; `None` waits forever |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use forte_tasks::store::RepositoryConfig;
///
/// let config = RepositoryConfig::default();
/// assert_eq!(config.collection, "todos");
/// assert!(config.request_timeout.is_none());
///
/// let config = RepositoryConfig::default()
///     .with_request_timeout(Duration::from_secs(5));
/// assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Name of the collection holding task documents.
    pub collection: String,

    /// Deadline applied to every store call. An elapsed deadline is
    /// reported as [`TaskError::StoreUnavailable`].
    pub request_timeout: Option<Duration>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            collection: TODOS_COLLECTION.to_string(),
            request_timeout: None,
        }
    }
}

impl RepositoryConfig {
    /// Sets the collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the per-call deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Type-erasure interface for owner-scoped task storage.
///
/// Domain logic lives in
/// [`TaskRepository<S>`](repository::TaskRepository), not in trait
/// implementations. A blanket implementation is provided for
/// `TaskRepository<S>` where `S: DocumentStore + 'static`.
///
/// Every method takes the caller's owner ID; an empty owner ID is rejected
/// with [`TaskError::Unauthenticated`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Lists every task owned by `owner_id`, in store-defined order.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if `owner_id` is empty.
    /// - [`TaskError::StoreUnavailable`] on backend failures.
    async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>, TaskError>;

    /// Creates an uncompleted task with the given content.
    ///
    /// # Errors
    ///
    /// - [`TaskError::ValidationRejected`] if `content` is blank. No store
    ///   call is made.
    /// - [`TaskError::Unauthenticated`] if `owner_id` is empty.
    /// - [`TaskError::StoreUnavailable`] on backend failures.
    async fn create_task(&self, owner_id: &str, content: &str) -> Result<Task, TaskError>;

    /// Sets the `completed` flag of an owned task, touching no other field.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task does not exist or belongs to a
    ///   different owner.
    /// - [`TaskError::Unauthenticated`] if `owner_id` is empty.
    /// - [`TaskError::StoreUnavailable`] on backend failures.
    async fn set_completed(
        &self,
        owner_id: &str,
        task_id: &str,
        completed: bool,
    ) -> Result<Task, TaskError>;

    /// Deletes an owned task.
    ///
    /// Returns `true` if a task was removed and `false` if it was already
    /// absent (or not owned by `owner_id`, which looks the same).
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if `owner_id` is empty.
    /// - [`TaskError::StoreUnavailable`] on backend failures.
    async fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<bool, TaskError>;

    /// Installs the signed-in user's ID token for later calls, or clears it
    /// with `None`. The [`SyncController`](crate::sync::SyncController)
    /// calls this on every resolved auth state.
    fn set_credentials(&self, _id_token: Option<&str>) {}
}

// ---- Blanket impl for TaskRepository<S> ----

#[async_trait]
impl<S: DocumentStore + 'static> TaskStore for repository::TaskRepository<S> {
    async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>, TaskError> {
        self.list_tasks(owner_id).await
    }

    async fn create_task(&self, owner_id: &str, content: &str) -> Result<Task, TaskError> {
        self.create_task(owner_id, content).await
    }

    async fn set_completed(
        &self,
        owner_id: &str,
        task_id: &str,
        completed: bool,
    ) -> Result<Task, TaskError> {
        self.set_completed(owner_id, task_id, completed).await
    }

    async fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<bool, TaskError> {
        self.delete_task(owner_id, task_id).await
    }

    fn set_credentials(&self, id_token: Option<&str>) {
        self.set_credentials(id_token);
    }
}
