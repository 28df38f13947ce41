//! The synchronization controller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{MutationOutcome, SyncSnapshot, SyncState};
use crate::constants::DEFAULT_SIGN_IN_ROUTE;
use crate::error::TaskError;
use crate::identity::{AuthState, IdentityGate};
use crate::redirect::{Navigator, RedirectPolicy};
use crate::store::TaskStore;

/// An initial load the driver loop is polling.
type PendingLoad<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Mutable view state. Never held across an `.await`.
#[derive(Debug, Default)]
struct Inner {
    owner: Option<String>,
    /// Bumped on every owner change.
    generation: u64,
    /// Sequence number of the last issued fetch.
    issued_seq: u64,
    /// Sequence number of the last applied fetch.
    applied_seq: u64,
    state: SyncState,
    last_error: Option<String>,
}

impl Inner {
    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            owner: self.owner.clone(),
            state: self.state.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Keeps a per-owner task list consistent with the store.
///
/// The controller follows auth changes ([`handle_auth`](Self::handle_auth)
/// or the [`run`](Self::run) driver loop), loads the owner's tasks, and
/// re-fetches the full list after every successful mutation. Subscribers
/// receive a [`SyncSnapshot`] on every change.
///
/// Every fetch is tagged with the owner generation and a sequence number.
/// A result is applied only if the owner has not changed since it was
/// issued and no newer fetch has already been applied.
///
/// Failures never tear down the visible list: they are logged, recorded
/// in [`SyncSnapshot::last_error`], and the last good list stays in place.
/// There is no automatic retry.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), forte_tasks::TaskError> {
/// use std::sync::Arc;
/// use forte_tasks::identity::{AuthState, User};
/// use forte_tasks::store::memory::InMemoryDocumentStore;
/// use forte_tasks::store::repository::TaskRepository;
/// use forte_tasks::sync::SyncController;
///
/// let store = Arc::new(TaskRepository::new(InMemoryDocumentStore::new()));
/// let controller = SyncController::new(store);
///
/// controller
///     .handle_auth(&AuthState::Authenticated(User::new("alice")))
///     .await;
/// controller.create("write spec").await?;
///
/// let snapshot = controller.snapshot();
/// assert_eq!(snapshot.tasks().len(), 1);
/// assert_eq!(snapshot.tasks()[0].content, "write spec");
/// # Ok(())
/// # }
/// ```
pub struct SyncController {
    store: Arc<dyn TaskStore>,
    sign_in_route: String,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<SyncSnapshot>,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("sign_in_route", &self.sign_in_route)
            .field("inner", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl SyncController {
    /// Creates an uninitialized controller over `store`.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(SyncSnapshot::default());
        Self {
            store,
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.to_string(),
            inner: Mutex::new(Inner::default()),
            snapshot_tx,
        }
    }

    /// Sets the route [`run`](Self::run) redirects anonymous sessions to.
    pub fn with_sign_in_route(mut self, route: impl Into<String>) -> Self {
        self.sign_in_route = route.into();
        self
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.lock().snapshot()
    }

    /// Returns the current list state.
    pub fn state(&self) -> SyncState {
        self.inner.lock().state.clone()
    }

    /// Returns the owner currently loaded, if any.
    pub fn owner(&self) -> Option<String> {
        self.inner.lock().owner.clone()
    }

    // ---- Auth ----

    /// Reacts to an auth state.
    ///
    /// A new owner discards the previous snapshot and starts a load.
    /// Re-reporting the current owner does nothing. `Anonymous` clears the
    /// view. `Unresolved` is ignored.
    pub async fn handle_auth(&self, auth: &AuthState) {
        if let Some(generation) = self.switch_owner(auth) {
            self.load(generation).await;
        }
    }

    /// Follows `gate` until its provider shuts down.
    ///
    /// Each resolved state is passed to a [`RedirectPolicy`] (due redirects
    /// go to `navigator`) and then applied like
    /// [`handle_auth`](Self::handle_auth). A load in flight never blocks
    /// the next auth state: an owner change takes effect at once and the
    /// superseded load is dropped.
    pub async fn run(&self, mut gate: IdentityGate, navigator: &dyn Navigator) {
        let mut policy = RedirectPolicy::new(self.sign_in_route.clone());
        let mut pending: Option<PendingLoad<'_>> = None;
        let mut next = gate.wait_ready().await;

        while let Some(auth) = next.take() {
            if let Some(redirect) = policy.evaluate(&auth) {
                navigator.navigate(&redirect);
            }
            let before = self.current_generation();
            if let Some(generation) = self.switch_owner(&auth) {
                pending = Some(Box::pin(self.load(generation)));
            } else if self.current_generation() != before {
                pending = None;
            }

            while next.is_none() {
                tokio::select! {
                    changed = gate.changed() => match changed {
                        Some(state) => next = Some(state),
                        None => break,
                    },
                    () = async {
                        if let Some(load) = pending.as_mut() {
                            load.await;
                        }
                    }, if pending.is_some() => pending = None,
                }
            }
        }
        debug!("identity provider closed, sync driver stopping");
    }

    // ---- Mutations ----

    /// Creates a task and re-fetches.
    ///
    /// Blank content is skipped without any store call.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if no owner is loaded.
    /// - [`TaskError::StoreUnavailable`] if the create fails.
    pub async fn create(&self, content: &str) -> Result<MutationOutcome, TaskError> {
        let (owner, generation) = self.current_owner()?;
        if content.trim().is_empty() {
            debug!("ignoring blank task content");
            return Ok(MutationOutcome::Skipped);
        }
        let result = self.store.create_task(&owner, content).await;
        self.settle("create", generation, result).await?;
        Ok(MutationOutcome::Applied)
    }

    /// Sets a task's `completed` flag and re-fetches.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if no owner is loaded.
    /// - [`TaskError::NotFound`] if the task is missing or not owned.
    /// - [`TaskError::StoreUnavailable`] if the update fails.
    pub async fn set_completed(
        &self,
        task_id: &str,
        completed: bool,
    ) -> Result<MutationOutcome, TaskError> {
        let (owner, generation) = self.current_owner()?;
        let result = self.store.set_completed(&owner, task_id, completed).await;
        self.settle("set_completed", generation, result).await?;
        Ok(MutationOutcome::Applied)
    }

    /// Flips a visible task's `completed` flag.
    ///
    /// In `Error` state no task is visible; the attempt fails with
    /// `NotFound` and issues the same recovery fetch as a failed mutation.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task is not in the current list.
    /// - Otherwise as [`set_completed`](Self::set_completed).
    pub async fn toggle(&self, task_id: &str) -> Result<MutationOutcome, TaskError> {
        let (_, generation) = self.current_owner()?;
        let (visible, errored) = {
            let inner = self.inner.lock();
            let visible = inner
                .state
                .tasks()
                .and_then(|tasks| tasks.iter().find(|task| task.id == task_id))
                .map(|task| task.completed);
            (visible, inner.state.is_error())
        };
        match visible {
            Some(completed) => self.set_completed(task_id, !completed).await,
            None => {
                let not_found = TaskError::NotFound {
                    task_id: task_id.to_string(),
                };
                if errored {
                    self.settle("toggle", generation, Err(not_found))
                        .await
                        .map(|()| MutationOutcome::Applied)
                } else {
                    Err(not_found)
                }
            },
        }
    }

    /// Deletes a task and re-fetches.
    ///
    /// Deleting an already-absent task is not an error.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if no owner is loaded.
    /// - [`TaskError::StoreUnavailable`] if the delete fails.
    pub async fn delete(&self, task_id: &str) -> Result<MutationOutcome, TaskError> {
        let (owner, generation) = self.current_owner()?;
        let result = self.store.delete_task(&owner, task_id).await;
        let removed = self.settle("delete", generation, result).await?;
        if !removed {
            debug!(task_id, "task was already absent");
        }
        Ok(MutationOutcome::Applied)
    }

    /// Re-fetches the current owner's list.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Unauthenticated`] if no owner is loaded.
    /// - [`TaskError::StoreUnavailable`] if the fetch fails. The previous
    ///   list stays visible.
    pub async fn refresh(&self) -> Result<(), TaskError> {
        let (_, generation) = self.current_owner()?;
        self.fetch(generation).await
    }

    // ---- Internals ----

    /// Applies an auth state to the owner slot.
    ///
    /// Returns the new generation when a load for a new owner is due.
    fn switch_owner(&self, auth: &AuthState) -> Option<u64> {
        let next_owner = match auth {
            AuthState::Unresolved => return None,
            AuthState::Anonymous => {
                self.store.set_credentials(None);
                None
            },
            AuthState::Authenticated(user) => {
                self.store.set_credentials(user.id_token.as_deref());
                Some(user.id.clone())
            },
        };

        let mut inner = self.inner.lock();
        if inner.owner == next_owner {
            return None;
        }
        info!(
            from = ?inner.owner,
            to = ?next_owner,
            "task owner changed"
        );
        inner.owner = next_owner;
        inner.generation += 1;
        inner.state = SyncState::Uninitialized;
        inner.last_error = None;
        self.publish(&inner);
        inner.owner.as_ref().map(|_| inner.generation)
    }

    async fn load(&self, generation: u64) {
        if let Err(err) = self.fetch(generation).await {
            debug!(error = %err, "initial load failed");
        }
    }

    fn current_generation(&self) -> u64 {
        self.inner.lock().generation
    }

    fn current_owner(&self) -> Result<(String, u64), TaskError> {
        let inner = self.inner.lock();
        inner
            .owner
            .clone()
            .map(|owner| (owner, inner.generation))
            .ok_or(TaskError::Unauthenticated)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot());
    }

    /// Re-fetches after a mutation, or records its failure.
    ///
    /// A failure while the list is in `Error` also triggers a fetch.
    async fn settle<T>(
        &self,
        op: &'static str,
        generation: u64,
        result: Result<T, TaskError>,
    ) -> Result<T, TaskError> {
        match result {
            Ok(value) => {
                debug!(op, "mutation applied, re-fetching");
                if let Err(err) = self.fetch(generation).await {
                    debug!(op, error = %err, "re-fetch after mutation failed");
                }
                Ok(value)
            },
            Err(err) => {
                warn!(op, error = %err, "mutation failed");
                let errored = {
                    let mut inner = self.inner.lock();
                    if inner.generation != generation {
                        return Err(err);
                    }
                    inner.last_error = Some(err.to_string());
                    self.publish(&inner);
                    inner.state.is_error()
                };
                if errored {
                    if let Err(fetch_err) = self.fetch(generation).await {
                        debug!(op, error = %fetch_err, "recovery fetch failed");
                    }
                }
                Err(err)
            },
        }
    }

    /// Lists the owner's tasks and applies the result if still current.
    ///
    /// The fetch is pinned to an owner `generation`; if the owner has
    /// already changed, nothing is issued.
    async fn fetch(&self, generation: u64) -> Result<(), TaskError> {
        let (owner, seq) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                debug!("owner changed before fetch, skipping");
                return Ok(());
            }
            let owner = inner.owner.clone().ok_or(TaskError::Unauthenticated)?;
            inner.issued_seq += 1;
            let previous = inner.state.tasks().map(<[_]>::to_vec);
            inner.state = SyncState::Loading { previous };
            self.publish(&inner);
            (owner, inner.issued_seq)
        };

        let result = self.store.list_tasks(&owner).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            warn!(
                owner = %owner,
                "discarding fetch issued for a previous owner"
            );
            return Ok(());
        }
        if seq <= inner.applied_seq {
            debug!(seq, applied = inner.applied_seq, "discarding out-of-order fetch");
            return Ok(());
        }
        inner.applied_seq = seq;

        match result {
            Ok(tasks) => {
                debug!(owner = %owner, count = tasks.len(), "task list loaded");
                inner.state = SyncState::Ready(tasks);
                inner.last_error = None;
                self.publish(&inner);
                Ok(())
            },
            Err(err) => {
                warn!(owner = %owner, error = %err, "task list fetch failed");
                inner.state = match inner.state.tasks() {
                    Some(previous) => SyncState::Ready(previous.to_vec()),
                    None => SyncState::Error {
                        message: err.to_string(),
                    },
                };
                inner.last_error = Some(err.to_string());
                self.publish(&inner);
                Err(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::User;
    use crate::store::memory::InMemoryDocumentStore;
    use crate::store::repository::TaskRepository;
    use pretty_assertions::assert_eq;

    fn controller() -> SyncController {
        SyncController::new(Arc::new(TaskRepository::new(InMemoryDocumentStore::new())))
    }

    fn signed_in(id: &str) -> AuthState {
        AuthState::Authenticated(User::new(id))
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let controller = controller();
        assert_eq!(controller.snapshot(), SyncSnapshot::default());
        assert!(controller.owner().is_none());
    }

    #[tokio::test]
    async fn first_auth_loads_empty_list() {
        let controller = controller();
        controller.handle_auth(&signed_in("alice")).await;
        assert_eq!(controller.state(), SyncState::Ready(vec![]));
        assert_eq!(controller.owner().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unresolved_is_ignored() {
        let controller = controller();
        controller.handle_auth(&AuthState::Unresolved).await;
        assert_eq!(controller.state(), SyncState::Uninitialized);
    }

    #[tokio::test]
    async fn mutations_require_owner() {
        let controller = controller();
        assert!(matches!(
            controller.create("x").await,
            Err(TaskError::Unauthenticated)
        ));
        assert!(matches!(
            controller.toggle("id").await,
            Err(TaskError::Unauthenticated)
        ));
        assert!(matches!(
            controller.refresh().await,
            Err(TaskError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn blank_create_is_skipped() {
        let controller = controller();
        controller.handle_auth(&signed_in("alice")).await;
        let outcome = controller.create("  \t ").await.unwrap();
        assert_eq!(outcome, MutationOutcome::Skipped);
        assert!(controller.snapshot().tasks().is_empty());
    }

    #[tokio::test]
    async fn toggle_flips_visible_task() {
        let controller = controller();
        controller.handle_auth(&signed_in("alice")).await;
        controller.create("buy milk").await.unwrap();
        let id = controller.snapshot().tasks()[0].id.clone();

        controller.toggle(&id).await.unwrap();
        assert!(controller.snapshot().task(&id).unwrap().completed);
        controller.toggle(&id).await.unwrap();
        assert!(!controller.snapshot().task(&id).unwrap().completed);
    }

    #[tokio::test]
    async fn toggle_unknown_id_is_not_found() {
        let controller = controller();
        controller.handle_auth(&signed_in("alice")).await;
        assert!(matches!(
            controller.toggle("nope").await,
            Err(TaskError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn sign_out_discards_snapshot() {
        let controller = controller();
        controller.handle_auth(&signed_in("alice")).await;
        controller.create("secret").await.unwrap();

        controller.handle_auth(&AuthState::Anonymous).await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.owner, None);
        assert_eq!(snapshot.state, SyncState::Uninitialized);
    }
}
