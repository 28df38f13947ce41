//! Sign-in redirect policy.
//!
//! When auth resolves with no user, the presentation layer should be sent
//! to the sign-in route. [`RedirectPolicy`] decides when that happens and
//! the controller's driver loop hands the resulting [`Redirect`] to a
//! [`Navigator`].

use tracing::debug;

use crate::constants::DEFAULT_SIGN_IN_ROUTE;
use crate::identity::AuthState;

/// A navigation effect requested by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Route the user to the sign-in page.
    SignIn {
        /// Target route, e.g. `/login`.
        route: String,
    },
}

/// Receives navigation effects.
pub trait Navigator: Send + Sync {
    /// Performs (or schedules) the navigation.
    fn navigate(&self, redirect: &Redirect);
}

/// Decides when to redirect to sign-in.
///
/// Fires at most once per anonymous resolution and never while auth is
/// unresolved. Observing a signed-in user re-arms it, so a later sign-out
/// redirects again.
///
/// # Examples
///
/// ```
/// use forte_tasks::identity::{AuthState, User};
/// use forte_tasks::redirect::{Redirect, RedirectPolicy};
///
/// let mut policy = RedirectPolicy::default();
/// assert_eq!(policy.evaluate(&AuthState::Unresolved), None);
/// assert_eq!(
///     policy.evaluate(&AuthState::Anonymous),
///     Some(Redirect::SignIn { route: "/login".to_string() })
/// );
/// assert_eq!(policy.evaluate(&AuthState::Anonymous), None);
///
/// policy.evaluate(&AuthState::Authenticated(User::new("alice")));
/// assert!(policy.evaluate(&AuthState::Anonymous).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    route: String,
    armed: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SIGN_IN_ROUTE)
    }
}

impl RedirectPolicy {
    /// Creates an armed policy targeting `route`.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            armed: true,
        }
    }

    /// Returns the sign-in route.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Evaluates an auth state, returning a redirect if one is due.
    pub fn evaluate(&mut self, state: &AuthState) -> Option<Redirect> {
        match state {
            AuthState::Unresolved => None,
            AuthState::Authenticated(_) => {
                self.armed = true;
                None
            },
            AuthState::Anonymous if self.armed => {
                self.armed = false;
                debug!(route = %self.route, "redirecting anonymous session to sign-in");
                Some(Redirect::SignIn {
                    route: self.route.clone(),
                })
            },
            AuthState::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::User;

    #[test]
    fn never_fires_while_unresolved() {
        let mut policy = RedirectPolicy::new("/signin");
        for _ in 0..3 {
            assert!(policy.evaluate(&AuthState::Unresolved).is_none());
        }
        assert_eq!(
            policy.evaluate(&AuthState::Anonymous),
            Some(Redirect::SignIn {
                route: "/signin".to_string()
            })
        );
    }

    #[test]
    fn authenticated_never_redirects() {
        let mut policy = RedirectPolicy::default();
        let state = AuthState::Authenticated(User::new("alice"));
        assert!(policy.evaluate(&state).is_none());
        assert!(policy.evaluate(&state).is_none());
    }

    #[test]
    fn rearms_after_sign_in() {
        let mut policy = RedirectPolicy::default();
        assert!(policy.evaluate(&AuthState::Anonymous).is_some());
        assert!(policy.evaluate(&AuthState::Anonymous).is_none());
        assert!(policy
            .evaluate(&AuthState::Authenticated(User::new("bob")))
            .is_none());
        assert!(policy.evaluate(&AuthState::Anonymous).is_some());
        assert_eq!(policy.route(), "/login");
    }
}
