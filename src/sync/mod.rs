//! Synchronization between auth state, the task store, and the visible
//! task list.
//!
//! [`SyncController`] owns the list state for the current owner and
//! publishes [`SyncSnapshot`]s on a `tokio::sync::watch` channel. The
//! presentation layer subscribes and renders; it never mutates the list
//! itself.
//!
//! The list is a read-through snapshot. There is no optimistic update:
//! every successful mutation is followed by a full re-fetch.

mod controller;
mod state;

pub use controller::SyncController;
pub use state::{MutationOutcome, SyncSnapshot, SyncState};
