//! Domain types for the task model.
//!
//! - [`Task`] - A stored task as seen by its owner.
//! - [`NewTask`] - A validated, not-yet-stored task.

pub mod task;

pub use task::{NewTask, Task};
