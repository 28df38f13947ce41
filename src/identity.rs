//! Identity gate: who is signed in, and has auth resolved yet.
//!
//! An [`IdentityProvider`] publishes [`AuthState`] changes on a
//! `tokio::sync::watch` channel. The [`IdentityGate`] is the single
//! subscriber the rest of the crate reads through. It enforces the
//! transition model:
//!
//! ```text
//! Unresolved ──▶ Authenticated(user) ◀──▶ Anonymous
//!      │                                      ▲
//!      └──────────────────────────────────────┘
//! ```
//!
//! Once [`IdentityGate::wait_ready`] or [`IdentityGate::changed`] has
//! returned a resolved state the gate never reports `Unresolved` again; a
//! provider that publishes it anyway is skipped by `changed` with a
//! warning. Reads never change the gate.
//!
//! [`LocalIdentityProvider`] is an in-process provider driven by explicit
//! `sign_in` / `resolve_anonymous` / `sign_out` calls. It backs tests and
//! single-process sessions where the real sign-in flow happens elsewhere.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::TaskError;

/// A verified user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable, non-empty user ID. Used as the task owner ID.
    pub id: String,

    /// Optional display name.
    pub display_name: Option<String>,

    /// Bearer ID token for the remote store, when the provider has one.
    ///
    /// Never serialized and redacted from `Debug` output.
    #[serde(skip)]
    pub id_token: Option<String>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl User {
    /// Creates a user with no display name and no ID token.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            id_token: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Attaches the ID token the store should authenticate with.
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }
}

/// What the identity provider currently knows.
///
/// `Anonymous` is a valid, resolved state: it means "no one is signed in",
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The provider has not finished resolving the session.
    #[default]
    Unresolved,
    /// A user is signed in.
    Authenticated(User),
    /// Resolution finished and no user is signed in.
    Anonymous,
}

impl AuthState {
    /// Returns `true` for any state other than [`AuthState::Unresolved`].
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }

    /// Returns the signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Source of authentication state.
///
/// Implementations publish every change on a watch channel; the latest
/// value is always the current state.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns a receiver for auth state changes.
    ///
    /// The channel closes when the provider shuts down.
    fn subscribe(&self) -> watch::Receiver<AuthState>;

    /// Ends the current session.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the bundled provider never fails.
    async fn sign_out(&self) -> Result<(), TaskError>;
}

/// Read-side view of an [`IdentityProvider`].
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), forte_tasks::TaskError> {
/// use std::sync::Arc;
/// use forte_tasks::identity::{IdentityGate, LocalIdentityProvider, User};
///
/// let provider = Arc::new(LocalIdentityProvider::new());
/// let mut gate = IdentityGate::new(provider.clone());
/// assert!(!gate.auth_ready());
///
/// provider.sign_in(User::new("alice"))?;
/// gate.wait_ready().await;
/// assert_eq!(gate.owner_id().as_deref(), Some("alice"));
/// # Ok(())
/// # }
/// ```
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
    rx: watch::Receiver<AuthState>,
    /// Last resolved state seen by `wait_ready` or `changed`.
    last_resolved: Option<AuthState>,
}

impl std::fmt::Debug for IdentityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGate")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl IdentityGate {
    /// Subscribes to `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let rx = provider.subscribe();
        Self {
            provider,
            rx,
            last_resolved: None,
        }
    }

    /// Returns the current effective auth state.
    ///
    /// A re-published `Unresolved` reads as the last resolved state seen by
    /// [`wait_ready`](Self::wait_ready) or [`changed`](Self::changed).
    pub fn state(&self) -> AuthState {
        let latest = self.rx.borrow();
        if latest.is_resolved() {
            return latest.clone();
        }
        self.last_resolved.clone().unwrap_or_default()
    }

    /// Returns the signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.state().user().cloned()
    }

    /// Returns `true` once the provider has resolved the session.
    pub fn auth_ready(&self) -> bool {
        self.state().is_resolved()
    }

    /// Returns the signed-in user's ID, which doubles as the owner ID.
    pub fn owner_id(&self) -> Option<String> {
        self.current_user().map(|user| user.id)
    }

    /// Waits until auth has resolved and returns the resolved state.
    ///
    /// Returns `None` if the provider shut down first.
    pub async fn wait_ready(&mut self) -> Option<AuthState> {
        let latest = self.rx.borrow_and_update().clone();
        if latest.is_resolved() {
            self.last_resolved = Some(latest.clone());
            return Some(latest);
        }
        if let Some(ref state) = self.last_resolved {
            return Some(state.clone());
        }
        self.changed().await
    }

    /// Waits for the next resolved state change.
    ///
    /// `Unresolved` publications are skipped. Returns `None` once the
    /// provider shuts down.
    pub async fn changed(&mut self) -> Option<AuthState> {
        loop {
            self.rx.changed().await.ok()?;
            let latest = self.rx.borrow_and_update().clone();
            if latest.is_resolved() {
                self.last_resolved = Some(latest.clone());
                return Some(latest);
            }
            if self.last_resolved.is_some() {
                warn!("identity provider reported unresolved after resolution, ignoring");
            }
        }
    }

    /// Asks the provider to end the session.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error.
    pub async fn sign_out(&self) -> Result<(), TaskError> {
        self.provider.sign_out().await
    }
}

/// In-process [`IdentityProvider`].
///
/// Starts `Unresolved`. Dropping the provider, or calling
/// [`close`](Self::close), closes the channel and stops any controller
/// driver loop following it.
#[derive(Debug)]
pub struct LocalIdentityProvider {
    tx: Mutex<Option<watch::Sender<AuthState>>>,
    rx: watch::Receiver<AuthState>,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    /// Creates an unresolved provider.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(AuthState::Unresolved);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Signs `user` in, replacing any current session.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Unauthenticated`] if the user ID is empty.
    pub fn sign_in(&self, user: User) -> Result<(), TaskError> {
        if user.id.is_empty() {
            return Err(TaskError::Unauthenticated);
        }
        debug!(user_id = %user.id, "local sign-in");
        self.publish(AuthState::Authenticated(user));
        Ok(())
    }

    /// Resolves the session with no user.
    pub fn resolve_anonymous(&self) {
        self.publish(AuthState::Anonymous);
    }

    /// Closes the channel. Later calls are ignored.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Returns the latest published state.
    pub fn current(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    fn publish(&self, state: AuthState) {
        match self.tx.lock().as_ref() {
            Some(tx) => {
                tx.send_replace(state);
            },
            None => warn!("identity provider closed, ignoring state change"),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.rx.clone()
    }

    async fn sign_out(&self) -> Result<(), TaskError> {
        debug!("local sign-out");
        self.publish(AuthState::Anonymous);
        Ok(())
    }
}
