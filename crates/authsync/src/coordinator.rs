//! The `Coordinator`: wires the session machine, merge stage and
//! formatter into one "current user" value.
//!
//! ```text
//! IdentityProvider ──events──→ SessionMachine ──watch──→ merge stage ──watch──→ presenter ──watch──→ consumers
//!                                                          ↑ live query
//!                                                     ProfileStore
//! ```
//!
//! Each arrow is a `tokio::sync::watch` channel, so every stage only ever
//! sees the latest value and a slow consumer can't back up the pipeline.

use std::convert::Infallible;
use std::sync::Arc;

use authsync_format::{FormattedState, Formatter, FormattedUser};
use authsync_merge::{spawn_merge_stage, MergeError, MergeHandle, MergeOutput};
use authsync_protocol::{AuthUser, SessionUser};
use authsync_provider::{IdentityProvider, PlanLookup, ProfileStore};
use authsync_session::{SessionError, SessionMachine, SessionSubscription};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gate::{Gate, Navigator};
use crate::{AuthsyncError, CoordinatorConfig};

/// What consumers see: the formatted user, or the merge failure that
/// prevented building one.
pub type CurrentUser = Result<FormattedState, MergeError>;

/// Profile key that is never written through
/// [`update_profile_fields`](Coordinator::update_profile_fields).
const EMAIL_FIELD: &str = "email";

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`Coordinator`].
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = Coordinator::builder(provider, store)
///     .config(CoordinatorConfig::from_json(&json)?)
///     .location("https://app.example.com/dashboard")
///     .start();
/// ```
pub struct CoordinatorBuilder<P: IdentityProvider, S: ProfileStore> {
    provider: Arc<P>,
    store: Arc<S>,
    config: CoordinatorConfig,
    plans: Option<Arc<dyn PlanLookup>>,
    location: String,
}

impl<P: IdentityProvider, S: ProfileStore> CoordinatorBuilder<P, S> {
    /// Sets the configuration.
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `plans` for price lookups instead of the configured catalog.
    pub fn plans(mut self, plans: Arc<dyn PlanLookup>) -> Self {
        self.plans = Some(plans);
        self
    }

    /// The app's current URL, checked for an in-flight redirect sign-in.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Settles the startup session state, registers for provider events
    /// and starts the merge and presentation tasks.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn start(self) -> Coordinator<P, S> {
        let plans: Arc<dyn PlanLookup> = match self.plans {
            Some(plans) => plans,
            None => Arc::new(self.config.plans.clone()),
        };

        let session = SessionMachine::new(self.provider, self.config.session.clone());
        let initial = session.initialize(&self.location);
        let subscription = session.subscribe();

        let merge = spawn_merge_stage(Arc::clone(&self.store), session.watch());

        let mut formatter = Formatter::new(plans);
        let (tx, user) = watch::channel(formatter.format_result(&merge.current()));
        let presenter = tokio::spawn(present(merge.watch(), formatter, tx));

        tracing::info!(session = %initial, "coordinator started");

        Coordinator {
            session,
            store: self.store,
            config: self.config,
            subscription,
            merge,
            presenter,
            user,
        }
    }
}

/// Formats every merged value and publishes the result.
///
/// Ends when the merge stage stops.
async fn present(
    mut merged: watch::Receiver<MergeOutput>,
    mut formatter: Formatter<dyn PlanLookup>,
    output: watch::Sender<CurrentUser>,
) {
    loop {
        let next = formatter.format_result(&merged.borrow_and_update());
        output.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(
                user = %next.as_ref().map_or_else(|e| e.to_string(), |s| s.to_string()),
                "current user updated"
            );
            *current = next;
            true
        });

        if merged.changed().await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// One application context's view of "who is signed in".
///
/// Owns the whole pipeline. Dropping the coordinator stops its tasks and
/// releases the provider registration and the profile query;
/// [`shutdown`](Self::shutdown) does the same and waits for it.
pub struct Coordinator<P: IdentityProvider, S: ProfileStore> {
    session: SessionMachine<P>,
    store: Arc<S>,
    config: CoordinatorConfig,
    subscription: SessionSubscription,
    merge: MergeHandle,
    presenter: JoinHandle<()>,
    user: watch::Receiver<CurrentUser>,
}

impl<P: IdentityProvider, S: ProfileStore> Coordinator<P, S> {
    /// Creates a builder with default configuration.
    pub fn builder(provider: Arc<P>, store: Arc<S>) -> CoordinatorBuilder<P, S> {
        CoordinatorBuilder {
            provider,
            store,
            config: CoordinatorConfig::default(),
            plans: None,
            location: String::new(),
        }
    }

    // -- Reading ----------------------------------------------------------

    /// The current formatted user.
    pub fn user(&self) -> CurrentUser {
        self.user.borrow().clone()
    }

    /// A receiver that observes every change of the formatted user.
    pub fn watch_user(&self) -> watch::Receiver<CurrentUser> {
        self.user.clone()
    }

    /// The formatted user if signed in with a profile.
    pub fn signed_in_user(&self) -> Option<Arc<FormattedUser>> {
        match &*self.user.borrow() {
            Ok(state) => state.user().cloned(),
            Err(_) => None,
        }
    }

    /// The raw session value.
    pub fn session_user(&self) -> SessionUser {
        self.session.current()
    }

    /// The merged value before formatting.
    pub fn merged_user(&self) -> MergeOutput {
        self.merge.current()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// A gate that sends anonymous users to the configured sign-in path.
    pub fn gate<N: Navigator>(&self, navigator: N) -> Gate<N> {
        Gate::new(navigator, self.config.sign_in_path.clone())
    }

    // -- Session operations -----------------------------------------------

    /// See [`SessionMachine::sign_up`].
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthsyncError> {
        Ok(self.session.sign_up(email, password).await?)
    }

    /// See [`SessionMachine::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthsyncError> {
        Ok(self.session.sign_in(email, password).await?)
    }

    /// See [`SessionMachine::sign_in_with_provider`]. Never resolves on
    /// success.
    pub async fn sign_in_with_provider(&self, name: &str) -> Result<Infallible, AuthsyncError> {
        Ok(self.session.sign_in_with_provider(name).await?)
    }

    /// See [`SessionMachine::sign_out`].
    pub async fn sign_out(&self) -> Result<(), AuthsyncError> {
        Ok(self.session.sign_out().await?)
    }

    /// See [`SessionMachine::update_email`].
    pub async fn update_email(&self, new_email: &str) -> Result<(), AuthsyncError> {
        Ok(self.session.update_email(new_email).await?)
    }

    /// See [`SessionMachine::send_password_reset`].
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthsyncError> {
        Ok(self.session.send_password_reset(email).await?)
    }

    /// See [`SessionMachine::update_password`].
    pub async fn update_password(&self, password: &str) -> Result<(), AuthsyncError> {
        Ok(self.session.update_password(password).await?)
    }

    /// See [`SessionMachine::send_magic_link`].
    pub async fn send_magic_link(&self, email: &str) -> Result<(), AuthsyncError> {
        Ok(self.session.send_magic_link(email).await?)
    }

    // -- Profile operations -----------------------------------------------

    /// Writes `fields` onto the signed-in user's profile.
    ///
    /// `email` is never written here: it belongs to the identity provider
    /// and changes through [`update_email`](Self::update_email). With
    /// nothing left after removing it, the call does nothing. The store
    /// pushes the new record through the open query, so the change shows
    /// up in [`user`](Self::user) without a refetch.
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] — nobody is signed in
    /// - [`AuthsyncError::Store`] — the store refused the write
    pub async fn update_profile_fields(
        &self,
        mut fields: Map<String, Value>,
    ) -> Result<(), AuthsyncError> {
        if fields.remove(EMAIL_FIELD).is_some() {
            tracing::debug!("email dropped from profile update");
        }
        if fields.is_empty() {
            return Ok(());
        }

        let Some(user_id) = self.session.current().user_id().cloned() else {
            return Err(SessionError::NotAuthenticated.into());
        };

        let count = fields.len();
        self.store.mutate(&user_id, fields).await?;
        tracing::info!(user_id = %user_id, fields = count, "profile updated");
        Ok(())
    }

    // -- Lifecycle --------------------------------------------------------

    /// Stops the pipeline and waits until the provider registration and
    /// the profile query are released.
    pub async fn shutdown(self) {
        self.subscription.release().await;
        self.merge.shutdown().await;
        // The presenter ends once the merge stage's output is gone.
        let _ = self.presenter.await;
        tracing::info!("coordinator stopped");
    }
}
