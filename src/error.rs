//! Error types for task synchronization.
//!
//! [`TaskError`] is what repository and controller callers see. Backends
//! report the lower-level [`StoreError`](crate::store::StoreError), which
//! the repository maps into a `TaskError` before surfacing it.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during task operations.
///
/// Each variant carries enough context (task ID, failure message) to be
/// logged at the call site. The controller never treats any of these as
/// fatal: the previous snapshot stays visible and a later user action can
/// retry.
///
/// # Examples
///
/// ```
/// use forte_tasks::TaskError;
///
/// let err = TaskError::NotFound {
///     task_id: "missing-task".to_string(),
/// };
/// assert!(err.to_string().contains("missing-task"));
/// assert!(!err.is_store_unavailable());
/// ```
#[derive(Debug, Error)]
pub enum TaskError {
    /// The document store could not be reached or returned an unusable
    /// response. Transient and permanent failures are not distinguished.
    #[error("document store unavailable: {message}")]
    StoreUnavailable {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input was rejected before any network call (e.g., blank content).
    #[error("validation rejected: {reason}")]
    ValidationRejected {
        /// Why the input was rejected.
        reason: String,
    },

    /// The task does not exist, or belongs to a different owner.
    ///
    /// Owner mismatch is deliberately indistinguishable from absence.
    #[error("task not found: {task_id}")]
    NotFound {
        /// The task ID that was not found.
        task_id: String,
    },

    /// No authenticated user is available for the operation.
    #[error("no authenticated user")]
    Unauthenticated,
}

impl TaskError {
    /// Shorthand for a [`TaskError::StoreUnavailable`] without a source.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for [`TaskError::StoreUnavailable`].
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns `true` for [`TaskError::ValidationRejected`].
    pub fn is_validation_rejected(&self) -> bool {
        matches!(self, Self::ValidationRejected { .. })
    }

    /// Maps a backend error for an operation on `task_id`.
    ///
    /// A backend `NotFound` becomes [`TaskError::NotFound`]; everything
    /// else is reported as [`TaskError::StoreUnavailable`].
    pub(crate) fn from_store(err: StoreError, task_id: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound {
                task_id: task_id.to_string(),
            },
            StoreError::Backend { message, source } => Self::StoreUnavailable { message, source },
        }
    }
}
