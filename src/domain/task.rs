//! Task entity and its document encoding.
//!
//! A task is stored as one document with three fields (`owner`, `content`,
//! `completed`). The document ID is assigned by the store and is not part
//! of the field map, so [`NewTask`] has no ID and [`Task`] always has one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::store::Document;

/// A stored task.
///
/// `owner` is set once at creation and never changes. `completed` is the
/// only field mutated after creation.
///
/// # Examples
///
/// ```
/// use forte_tasks::domain::Task;
/// use forte_tasks::store::Document;
/// use serde_json::json;
///
/// let doc = Document::new(
///     "t-1",
///     json!({"owner": "alice", "content": "buy milk", "completed": false}),
/// );
/// let task = Task::from_document(doc).unwrap();
/// assert_eq!(task.id, "t-1");
/// assert_eq!(task.owner, "alice");
/// assert!(!task.completed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned document ID.
    pub id: String,

    /// ID of the user who created the task.
    pub owner: String,

    /// Display text, non-empty after trimming.
    pub content: String,

    /// Completion flag, `false` at creation.
    pub completed: bool,
}

/// Field map of a task document, without its ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TaskFields {
    owner: String,
    content: String,
    #[serde(default)]
    completed: bool,
}

impl Task {
    /// Decodes a task from a stored document.
    ///
    /// A missing `completed` field decodes as `false`.
    ///
    /// # Errors
    ///
    /// Returns the decode error if `owner` or `content` is missing or any
    /// field has the wrong type.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let fields: TaskFields = serde_json::from_value(Value::Object(doc.fields))?;
        Ok(Self {
            id: doc.id,
            owner: fields.owner,
            content: fields.content,
            completed: fields.completed,
        })
    }

    /// Returns whether `owner_id` owns this task.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner == owner_id
    }
}

/// A validated task awaiting creation.
///
/// Construction rejects content that is empty after trimming, so holding
/// a `NewTask` means the create request is worth a network call. Content
/// is kept verbatim; only the emptiness check trims.
///
/// # Examples
///
/// ```
/// use forte_tasks::domain::NewTask;
///
/// let task = NewTask::new("alice", "write spec").unwrap();
/// assert_eq!(task.content(), "write spec");
///
/// assert!(NewTask::new("alice", "   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    fields: TaskFields,
}

impl NewTask {
    /// Validates `content` and builds an uncompleted task for `owner`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::ValidationRejected`] if `content` is blank.
    /// - [`TaskError::Unauthenticated`] if `owner` is empty.
    pub fn new(owner: impl Into<String>, content: impl Into<String>) -> Result<Self, TaskError> {
        let owner = owner.into();
        let content = content.into();
        if owner.is_empty() {
            return Err(TaskError::Unauthenticated);
        }
        if content.trim().is_empty() {
            return Err(TaskError::ValidationRejected {
                reason: "task content is empty".to_string(),
            });
        }
        Ok(Self {
            fields: TaskFields {
                owner,
                content,
                completed: false,
            },
        })
    }

    /// The owner this task will be written under.
    pub fn owner(&self) -> &str {
        &self.fields.owner
    }

    /// The task's display text.
    pub fn content(&self) -> &str {
        &self.fields.content
    }

    /// Encodes the task as a document field map.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            crate::constants::OWNER_FIELD.to_string(),
            Value::String(self.fields.owner.clone()),
        );
        fields.insert(
            crate::constants::CONTENT_FIELD.to_string(),
            Value::String(self.fields.content.clone()),
        );
        fields.insert(
            crate::constants::COMPLETED_FIELD.to_string(),
            Value::Bool(self.fields.completed),
        );
        fields
    }

    /// Attaches the store-assigned ID.
    pub fn into_task(self, id: impl Into<String>) -> Task {
        Task {
            id: id.into(),
            owner: self.fields.owner,
            content: self.fields.content,
            completed: self.fields.completed,
        }
    }
}
