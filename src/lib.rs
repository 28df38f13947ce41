//! Authenticated per-owner task synchronization.
//!
//! This crate is the data layer of a personal todo list. It gates every
//! task operation behind a verified identity, scopes every read and write
//! to that identity, and keeps a subscriber-visible task list consistent
//! with a remote document store after each mutation.
//!
//! # Overview
//!
//! Data flows one way:
//!
//! ```text
//! IdentityGate ──▶ SyncController ──▶ TaskStore ──▶ DocumentStore
//!                       │
//!                       └──▶ watch::Receiver<SyncSnapshot> (presentation)
//! ```
//!
//! Tasks are stored one document per task in the `todos` collection with
//! fields `owner`, `content`, and `completed`. The store is the sole
//! source of truth; the controller's list is a read-through snapshot
//! rebuilt after every change.
//!
//! # Module Organization
//!
//! - [`identity`] - Auth state, the identity gate, and a local provider
//! - [`redirect`] - When to send anonymous sessions to sign-in
//! - [`store`] - Owner-scoped repository and document store backends
//! - [`sync`] - The synchronization controller and its published state
//! - [`domain`] - The task entity and its document encoding
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Error types
//! - [`constants`] - Collection, field, and route names
//!
//! # Feature Flags
//!
//! - `logging` (default) - [`logging::init_logging`] via `tracing-subscriber`
//! - `firestore` - Cloud Firestore REST backend

pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod identity;
#[cfg(feature = "logging")]
pub mod logging;
pub mod redirect;
pub mod store;
pub mod sync;

// Re-exports for ergonomic access
pub use config::{ConfigError, ForteConfig};
pub use domain::{NewTask, Task};
pub use error::TaskError;
pub use identity::{AuthState, IdentityGate, IdentityProvider, LocalIdentityProvider, User};
pub use redirect::{Navigator, Redirect, RedirectPolicy};
pub use store::{DocumentStore, StoreError, TaskStore};
pub use sync::{MutationOutcome, SyncController, SyncSnapshot, SyncState};
