//! Guard for protected views.
//!
//! The gate decides, for each render, whether protected content may be
//! shown. It doesn't render anything itself: the caller passes a closure
//! that builds the content, and gets back either that content or a
//! request for a placeholder.
//!
//! Redirects are edge-triggered. An anonymous user is sent to the sign-in
//! destination once, when the state becomes `Anonymous`, not on every
//! render while it stays that way.

use std::sync::Arc;

use authsync_format::{FormattedState, FormattedUser};
use authsync_merge::MergeError;

use crate::CurrentUser;

/// Performs navigation for the gate.
pub trait Navigator {
    /// Navigates to `destination`.
    fn redirect(&mut self, destination: &str);
}

impl<F: FnMut(&str)> Navigator for F {
    fn redirect(&mut self, destination: &str) {
        self(destination)
    }
}

/// What the caller should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<R> {
    /// The user is signed in: render this.
    Content(R),
    /// Not yet known, or on the way to the sign-in page.
    Placeholder,
}

impl<R> GateOutcome<R> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// The rendered content, if any.
    pub fn content(self) -> Option<R> {
        match self {
            Self::Content(content) => Some(content),
            Self::Placeholder => None,
        }
    }
}

/// Guards a protected view.
///
/// Keep one gate per mounted view and call [`guard`](Self::guard) on every
/// render; the gate remembers whether it has already redirected.
pub struct Gate<N: Navigator> {
    navigator: N,
    destination: String,
    /// Whether the last state seen was `Anonymous`.
    anonymous: bool,
}

impl<N: Navigator> Gate<N> {
    /// Creates a gate that redirects anonymous users to `destination`.
    pub fn new(navigator: N, destination: impl Into<String>) -> Self {
        Self {
            navigator,
            destination: destination.into(),
            anonymous: false,
        }
    }

    /// The sign-in destination.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Decides what to render for `state`.
    ///
    /// `content` is only called when the user is authenticated.
    pub fn guard<R>(
        &mut self,
        state: &FormattedState,
        content: impl FnOnce(&Arc<FormattedUser>) -> R,
    ) -> GateOutcome<R> {
        match state {
            FormattedState::Authenticated(user) => {
                self.anonymous = false;
                GateOutcome::Content(content(user))
            }
            FormattedState::Loading => {
                self.anonymous = false;
                GateOutcome::Placeholder
            }
            FormattedState::Anonymous => {
                if !self.anonymous {
                    self.anonymous = true;
                    tracing::info!(destination = %self.destination, "redirecting to sign-in");
                    self.navigator.redirect(&self.destination);
                }
                GateOutcome::Placeholder
            }
        }
    }

    /// Like [`guard`](Self::guard), for the coordinator's output.
    ///
    /// A merge failure is returned untouched for an outer error boundary
    /// to handle; it doesn't count as a state change for redirects.
    pub fn guard_user<R>(
        &mut self,
        user: &CurrentUser,
        content: impl FnOnce(&Arc<FormattedUser>) -> R,
    ) -> Result<GateOutcome<R>, MergeError> {
        match user {
            Ok(state) => Ok(self.guard(state, content)),
            Err(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use authsync_protocol::UserId;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    #[derive(Default)]
    struct Recorder {
        redirects: Vec<String>,
    }

    impl Navigator for Recorder {
        fn redirect(&mut self, destination: &str) {
            self.redirects.push(destination.to_string());
        }
    }

    fn gate() -> Gate<Recorder> {
        Gate::new(Recorder::default(), "/auth/signin")
    }

    fn signed_in() -> FormattedState {
        FormattedState::Authenticated(Arc::new(FormattedUser {
            uid: UserId::new("u-1"),
            email: Some("ada@example.com".into()),
            name: Some("Ada".into()),
            picture: None,
            provider: "email".into(),
            providers: vec!["password".into()],
            customer_id: None,
            subscription_id: None,
            subscription_status: None,
            plan_id: None,
            plan_is_active: false,
        }))
    }

    fn name_of(user: &Arc<FormattedUser>) -> String {
        user.name.clone().unwrap_or_default()
    }

    // =====================================================================
    // guard()
    // =====================================================================

    #[test]
    fn test_guard_authenticated_renders_content() {
        let mut gate = gate();

        let outcome = gate.guard(&signed_in(), name_of);

        assert_eq!(outcome, GateOutcome::Content("Ada".to_string()));
        assert!(gate.navigator().redirects.is_empty());
    }

    #[test]
    fn test_guard_loading_renders_placeholder_without_redirect() {
        let mut gate = gate();

        let outcome = gate.guard(&FormattedState::Loading, name_of);

        assert!(outcome.is_placeholder());
        assert!(gate.navigator().redirects.is_empty());
    }

    #[test]
    fn test_guard_anonymous_redirects_once() {
        let mut gate = gate();

        for _ in 0..5 {
            let outcome = gate.guard(&FormattedState::Anonymous, name_of);
            assert!(outcome.is_placeholder());
        }

        assert_eq!(gate.navigator().redirects, vec!["/auth/signin".to_string()]);
    }

    #[test]
    fn test_guard_reentering_anonymous_redirects_again() {
        let mut gate = gate();

        gate.guard(&FormattedState::Anonymous, name_of);
        gate.guard(&signed_in(), name_of);
        gate.guard(&FormattedState::Anonymous, name_of);

        assert_eq!(gate.navigator().redirects.len(), 2);
    }

    #[test]
    fn test_guard_loading_then_anonymous_redirects() {
        let mut gate = gate();

        gate.guard(&FormattedState::Loading, name_of);
        gate.guard(&FormattedState::Anonymous, name_of);

        assert_eq!(gate.navigator().redirects.len(), 1);
    }

    #[test]
    fn test_guard_content_closure_not_called_when_anonymous() {
        let mut gate = gate();

        let outcome = gate.guard(&FormattedState::Anonymous, |_| -> String {
            panic!("content rendered for anonymous user")
        });

        assert!(outcome.content().is_none());
    }

    #[test]
    fn test_guard_closure_navigator() {
        let mut seen = Vec::new();
        {
            let mut gate = Gate::new(|to: &str| seen.push(to.to_string()), "/login");
            gate.guard(&FormattedState::Anonymous, name_of);
            gate.guard(&FormattedState::Anonymous, name_of);
        }
        assert_eq!(seen, vec!["/login".to_string()]);
    }

    // =====================================================================
    // guard_user()
    // =====================================================================

    #[test]
    fn test_guard_user_passes_merge_error_through() {
        let mut gate = gate();
        let failure = MergeError::ProfileFetch {
            reason: "permission denied".into(),
        };

        let result = gate.guard_user(&Err(failure.clone()), name_of);

        assert_eq!(result, Err(failure));
        assert!(gate.navigator().redirects.is_empty());
    }

    #[test]
    fn test_guard_user_error_does_not_reset_redirect_edge() {
        let mut gate = gate();
        let failure: CurrentUser = Err(MergeError::ProfileFetch {
            reason: "boom".into(),
        });

        gate.guard_user(&Ok(FormattedState::Anonymous), name_of).unwrap();
        let _ = gate.guard_user(&failure, name_of);
        gate.guard_user(&Ok(FormattedState::Anonymous), name_of).unwrap();

        assert_eq!(gate.navigator().redirects.len(), 1);
    }
}
