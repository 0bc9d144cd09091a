//! The session state machine: owns the canonical [`SessionUser`].
//!
//! The machine is the only writer of the session value. It changes it in
//! exactly three places:
//! - [`initialize`](SessionMachine::initialize) settles `Loading` from the
//!   provider's cached session,
//! - the subscription task applies provider events,
//! - a successful sign-up/sign-in with a confirmed email applies the
//!   returned identity.
//!
//! Everyone else reads it through a `tokio::sync::watch` receiver.
//!
//! # Lifecycle
//!
//! ```text
//!             initialize()
//! [Loading] ─────────────→ [Authenticated] ⇄ [Anonymous]
//!     │                          ↑ provider events ↓
//!     └──(redirect in flight)──→ waits for the first event
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use authsync_protocol::{AuthUser, ProviderUser, SessionEvent, SessionUser};
use authsync_provider::IdentityProvider;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::{RedirectFragment, SessionConfig, SessionError};

/// Applies `next` to the watched value, notifying receivers only when the
/// value actually changes. Returns `true` if it changed.
fn transition(state: &watch::Sender<SessionUser>, next: SessionUser) -> bool {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::info!(from = %current, to = %next, "session transition");
        *current = next;
        true
    })
}

fn apply_event(state: &watch::Sender<SessionUser>, event: &SessionEvent) -> bool {
    tracing::debug!(event = %event.event, "session event received");
    transition(state, SessionUser::from_session(event.session.as_ref()))
}

/// Owns the session value and drives it from the identity provider.
///
/// Construct one per application context and pass it by reference to
/// whatever needs it. Methods take `&self`; the value lives behind a watch
/// channel, and the subscription slot behind a mutex.
pub struct SessionMachine<P: IdentityProvider> {
    provider: Arc<P>,
    config: SessionConfig,
    /// Shared with the subscription task, which is the other writer.
    state: Arc<watch::Sender<SessionUser>>,
    /// The active subscription task, so a second `subscribe()` can
    /// release the first.
    subscription: Mutex<Option<AbortHandle>>,
}

impl<P: IdentityProvider> SessionMachine<P> {
    /// Creates a machine in the `Loading` state.
    pub fn new(provider: Arc<P>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionUser::Loading);
        Self {
            provider,
            config,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    /// The current session value.
    pub fn current(&self) -> SessionUser {
        self.state.borrow().clone()
    }

    /// A receiver that observes every session transition.
    pub fn watch(&self) -> watch::Receiver<SessionUser> {
        self.state.subscribe()
    }

    /// The configuration this machine was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Settles the startup state.
    ///
    /// `location` is the app's current URL. If its fragment shows a
    /// redirect sign-in completing, the machine stays `Loading` and the
    /// cached session is not consulted; the provider's event will settle
    /// it. Otherwise the cached session decides between `Authenticated`
    /// and `Anonymous`.
    ///
    /// Only acts while still `Loading`: if an event already settled the
    /// state, that event wins.
    pub fn initialize(&self, location: &str) -> SessionUser {
        let fragment = RedirectFragment::parse(location);
        if fragment.is_in_flight(&self.config.redirect_marker) {
            tracing::info!(
                flow = fragment.flow_type().as_deref().unwrap_or("unknown"),
                "redirect sign-in in flight, waiting for provider event"
            );
            return self.current();
        }

        if self.current().is_loading() {
            let cached = self.provider.current_session();
            transition(&self.state, SessionUser::from_session(cached.as_ref()));
        }
        self.current()
    }

    /// Registers for provider session-change events.
    ///
    /// Spawns a task that applies each event as it arrives, so this must
    /// be called from inside a Tokio runtime. The registration lasts until
    /// the returned [`SessionSubscription`] is dropped or released.
    /// Subscribing again releases the previous registration first.
    pub fn subscribe(&self) -> SessionSubscription {
        let mut events = self.provider.on_session_change();
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                apply_event(&state, &event);
            }
            tracing::debug!("session event stream closed");
        });

        if let Some(previous) = self.subscription.lock().replace(task.abort_handle()) {
            previous.abort();
            tracing::debug!("previous session subscription released");
        }

        SessionSubscription { task }
    }

    /// Applies one provider event directly.
    ///
    /// The subscription task uses the same path. Replaying an event is
    /// harmless: only a change notifies watchers.
    pub fn apply(&self, event: &SessionEvent) -> bool {
        apply_event(&self.state, event)
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    /// - [`SessionError::Provider`] — the provider rejected the sign-up
    /// - [`SessionError::UnconfirmedEmail`] — the account needs email
    ///   confirmation first; the session value is left untouched
    ///
    /// A provider event that lands while the call is in flight takes
    /// precedence: the returned identity is only applied if the session
    /// value hasn't changed since the call started.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, SessionError> {
        let before = self.state.subscribe();
        let user = self.provider.sign_up(email, password).await?;
        self.accept_confirmed(user, &before)
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    /// Same as [`sign_up`](Self::sign_up).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, SessionError> {
        let before = self.state.subscribe();
        let user = self.provider.sign_in(email, password).await?;
        self.accept_confirmed(user, &before)
    }

    /// `before` was subscribed when the provider call started; any change
    /// seen through it came from an event and must not be overwritten.
    fn accept_confirmed(
        &self,
        user: ProviderUser,
        before: &watch::Receiver<SessionUser>,
    ) -> Result<AuthUser, SessionError> {
        if user.email_confirmed_at.is_none() {
            tracing::info!(user_id = %user.id, "sign-in blocked, email not confirmed");
            return Err(SessionError::UnconfirmedEmail);
        }

        let user = AuthUser::from(&user);
        if matches!(before.has_changed(), Ok(false)) {
            transition(&self.state, SessionUser::Authenticated(user.clone()));
        } else {
            tracing::debug!(user_id = %user.id, "session changed during sign-in, keeping event state");
        }
        Ok(user)
    }

    /// Starts a redirect-based sign-in with an external provider.
    ///
    /// On success the browser navigates away and the flow finishes when
    /// the app loads again, so the returned future never completes. The
    /// `Infallible` success type spells that out.
    ///
    /// # Errors
    /// [`SessionError::Provider`] if the provider refuses to start the flow.
    pub async fn sign_in_with_provider(&self, name: &str) -> Result<Infallible, SessionError> {
        self.provider.sign_in_with_redirect(name).await?;
        tracing::info!(provider = name, "redirecting to external sign-in");
        std::future::pending().await
    }

    /// Signs out.
    ///
    /// Doesn't touch the session value: the provider's `SIGNED_OUT` event
    /// does, through the subscription.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.provider.sign_out().await?;
        Ok(())
    }

    /// Requests an email change.
    ///
    /// A no-op if `new_email` is the current address. Otherwise the
    /// provider is asked to start the change and the call fails with
    /// [`SessionError::ConfirmationPending`]; the session keeps the old
    /// email until a provider event carries the new one.
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] — nobody is signed in
    /// - [`SessionError::Provider`] — the provider rejected the change
    /// - [`SessionError::ConfirmationPending`] — the change was requested
    pub async fn update_email(&self, new_email: &str) -> Result<(), SessionError> {
        let current_email = match self.current() {
            SessionUser::Authenticated(user) => user.email,
            SessionUser::Loading | SessionUser::Anonymous => {
                return Err(SessionError::NotAuthenticated);
            }
        };
        if current_email == new_email {
            return Ok(());
        }

        self.provider.update_email(new_email).await?;
        tracing::info!("email change requested, waiting for confirmation");
        Err(SessionError::ConfirmationPending)
    }

    /// Sends a password-reset email.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), SessionError> {
        self.provider.reset_password_for_email(email).await?;
        Ok(())
    }

    /// Sets a new password for the signed-in user.
    pub async fn update_password(&self, password: &str) -> Result<(), SessionError> {
        self.provider.update_password(password).await?;
        Ok(())
    }

    /// Sends a passwordless sign-in link.
    ///
    /// # Errors
    /// [`SessionError::UnsupportedOperation`] if the provider has no magic
    /// link flow.
    pub async fn send_magic_link(&self, email: &str) -> Result<(), SessionError> {
        self.provider.send_magic_link(email).await?;
        Ok(())
    }
}

/// A live registration for provider session events.
///
/// Dropping the handle stops the task that applies events, which drops the
/// provider's receiver and so unregisters it.
/// [`release`](Self::release) does the same and waits for the task to end.
#[must_use = "dropping the subscription unregisters it immediately"]
pub struct SessionSubscription {
    task: JoinHandle<()>,
}

impl SessionSubscription {
    /// Returns `true` once the subscription task has stopped.
    pub fn is_released(&self) -> bool {
        self.task.is_finished()
    }

    /// Unregisters and waits until the event receiver has been dropped.
    pub async fn release(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
