//! Owner-scoped task repository on top of a [`DocumentStore`].
//!
//! [`TaskRepository`] implements every task operation (list-by-owner,
//! create, set-completed, delete) on top of any [`DocumentStore`]. The
//! document store does not enforce ownership, so this is the one place
//! that does:
//!
//! - every query carries the `owner == caller` equality filter,
//! - every create writes the caller's owner ID,
//! - every update or delete first reads the record and checks its owner.
//!
//! # Owner Isolation
//!
//! A task owned by someone else is reported exactly like a missing task
//! (`NotFound` for updates, "absent" for deletes). The repository never
//! reveals that a foreign task exists.
//!
//! # Construction
//!
//! ```
//! use std::time::Duration;
//! use forte_tasks::store::memory::InMemoryDocumentStore;
//! use forte_tasks::store::repository::TaskRepository;
//! use forte_tasks::store::RepositoryConfig;
//!
//! let repo = TaskRepository::new(InMemoryDocumentStore::new()).with_config(
//!     RepositoryConfig::default().with_request_timeout(Duration::from_secs(10)),
//! );
//! assert_eq!(repo.config().collection, "todos");
//! ```

use std::future::Future;

use serde_json::{Map, Value};

use crate::constants::{COMPLETED_FIELD, OWNER_FIELD};
use crate::domain::{NewTask, Task};
use crate::error::TaskError;
use crate::store::backend::{DocumentStore, StoreError};
use crate::store::RepositoryConfig;

/// Owner-scoped task repository that delegates storage to a
/// [`DocumentStore`].
///
/// # Type Parameters
///
/// * `S` - A [`DocumentStore`] implementation (in-memory, Firestore, etc.)
#[derive(Debug)]
pub struct TaskRepository<S: DocumentStore> {
    store: S,
    config: RepositoryConfig,
}

impl<S: DocumentStore> TaskRepository<S> {
    /// Creates a repository over `store` with [`RepositoryConfig::default`].
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: RepositoryConfig::default(),
        }
    }

    /// Sets the repository configuration.
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a reference to the repository's configuration.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Forwards the signed-in user's ID token to the document store.
    pub fn set_credentials(&self, id_token: Option<&str>) {
        self.store.set_credentials(id_token);
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- Helpers (private) ----

    /// Runs a store call under the configured deadline.
    async fn call<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                StoreError::backend(format!(
                    "store call timed out after {}ms",
                    limit.as_millis()
                ))
            })?,
            None => fut.await,
        }
    }

    fn require_owner(owner_id: &str) -> Result<(), TaskError> {
        if owner_id.is_empty() {
            return Err(TaskError::Unauthenticated);
        }
        Ok(())
    }

    /// Reads a task and returns it only if `owner_id` owns it.
    async fn fetch_owned(&self, owner_id: &str, task_id: &str) -> Result<Option<Task>, TaskError> {
        let doc = self
            .call(self.store.get(&self.config.collection, task_id))
            .await
            .map_err(|e| TaskError::from_store(e, task_id))?;
        let Some(doc) = doc else {
            return Ok(None);
        };

        let task = Task::from_document(doc).map_err(|e| TaskError::StoreUnavailable {
            message: format!("malformed task document {task_id}"),
            source: Some(Box::new(e)),
        })?;

        if !task.is_owned_by(owner_id) {
            tracing::warn!(
                task_id = task_id,
                expected_owner = owner_id,
                actual_owner = task.owner,
                "owner mismatch on task access (treating as absent)"
            );
            return Ok(None);
        }

        Ok(Some(task))
    }

    // ---- Domain operations (public) ----

    /// Lists every task owned by `owner_id`.
    ///
    /// Documents that fail to decode are skipped with a warning. Documents
    /// returned by the store with a different owner are dropped as well, so
    /// a misbehaving backend cannot leak foreign tasks into a snapshot.
    pub async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>, TaskError> {
        Self::require_owner(owner_id)?;

        let owner_value = Value::String(owner_id.to_string());
        let docs = self
            .call(
                self.store
                    .query_eq(&self.config.collection, OWNER_FIELD, &owner_value),
            )
            .await
            .map_err(|e| TaskError::from_store(e, ""))?;

        let tasks: Vec<Task> = docs
            .into_iter()
            .filter_map(|doc| {
                let doc_id = doc.id.clone();
                match Task::from_document(doc) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        tracing::warn!(task_id = %doc_id, error = %e, "skipping malformed task document");
                        None
                    },
                }
            })
            .filter(|task| {
                let owned = task.is_owned_by(owner_id);
                if !owned {
                    tracing::warn!(
                        task_id = task.id,
                        expected_owner = owner_id,
                        actual_owner = task.owner,
                        "store returned foreign task for owner query (dropping)"
                    );
                }
                owned
            })
            .collect();

        tracing::debug!(owner = owner_id, count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    /// Creates an uncompleted task for `owner_id`.
    ///
    /// Blank content is rejected before any store call.
    pub async fn create_task(&self, owner_id: &str, content: &str) -> Result<Task, TaskError> {
        let new_task = NewTask::new(owner_id, content)?;

        let id = self
            .call(
                self.store
                    .insert(&self.config.collection, new_task.to_fields()),
            )
            .await
            .map_err(|e| TaskError::from_store(e, ""))?;

        tracing::debug!(owner = owner_id, task_id = %id, "created task");
        Ok(new_task.into_task(id))
    }

    /// Sets the `completed` flag of a task owned by `owner_id`.
    ///
    /// Only the `completed` field is written; `owner` and `content` are
    /// never part of the patch.
    pub async fn set_completed(
        &self,
        owner_id: &str,
        task_id: &str,
        completed: bool,
    ) -> Result<Task, TaskError> {
        Self::require_owner(owner_id)?;

        let mut task = self
            .fetch_owned(owner_id, task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound {
                task_id: task_id.to_string(),
            })?;

        let mut patch = Map::new();
        patch.insert(COMPLETED_FIELD.to_string(), Value::Bool(completed));
        self.call(
            self.store
                .update_fields(&self.config.collection, task_id, patch),
        )
        .await
        .map_err(|e| TaskError::from_store(e, task_id))?;

        task.completed = completed;
        tracing::debug!(owner = owner_id, task_id = task_id, completed, "updated task");
        Ok(task)
    }

    /// Deletes a task owned by `owner_id`.
    ///
    /// Returns `false` without touching the store when the task is absent
    /// or owned by someone else.
    pub async fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<bool, TaskError> {
        Self::require_owner(owner_id)?;

        if self.fetch_owned(owner_id, task_id).await?.is_none() {
            tracing::debug!(owner = owner_id, task_id = task_id, "delete of absent task");
            return Ok(false);
        }

        self.call(self.store.delete(&self.config.collection, task_id))
            .await
            .map_err(|e| TaskError::from_store(e, task_id))?;

        tracing::debug!(owner = owner_id, task_id = task_id, "deleted task");
        Ok(true)
    }
}
