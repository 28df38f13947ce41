//! Published list state.

use crate::domain::Task;

/// Lifecycle of the visible task list for one owner.
///
/// ```text
/// Uninitialized ──▶ Loading ──▶ Ready(list)
///                      │  ▲         │
///                      ▼  └─────────┘ (mutation / refresh)
///                    Error
/// ```
///
/// Any state returns to `Uninitialized` when the owner changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No owner loaded yet.
    #[default]
    Uninitialized,

    /// A fetch is in flight. `previous` keeps the last good list visible.
    Loading {
        /// The list shown before this fetch started, if any.
        previous: Option<Vec<Task>>,
    },

    /// The latest fetched list.
    Ready(Vec<Task>),

    /// The first load failed and there is no list to show.
    Error {
        /// Description of the failure.
        message: String,
    },
}

impl SyncState {
    /// Returns the list currently worth showing, if any.
    pub fn tasks(&self) -> Option<&[Task]> {
        match self {
            Self::Ready(tasks) => Some(tasks),
            Self::Loading {
                previous: Some(tasks),
            } => Some(tasks),
            _ => None,
        }
    }

    /// Returns `true` for [`SyncState::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns `true` for [`SyncState::Loading`].
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Returns `true` for [`SyncState::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// What subscribers receive on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncSnapshot {
    /// The owner this snapshot belongs to.
    pub owner: Option<String>,

    /// List state.
    pub state: SyncState,

    /// Most recent swallowed failure, cleared by the next good fetch.
    pub last_error: Option<String>,
}

impl SyncSnapshot {
    /// Returns the visible tasks, or an empty slice.
    pub fn tasks(&self) -> &[Task] {
        self.state.tasks().unwrap_or_default()
    }

    /// Looks up a visible task by ID.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks().iter().find(|task| task.id == task_id)
    }
}

/// Result of a controller mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the mutation and a re-fetch was issued.
    Applied,
    /// The input was blank; nothing was sent.
    Skipped,
}
