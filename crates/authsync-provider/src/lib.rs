//! External collaborator contracts for authsync.
//!
//! authsync doesn't talk to an identity provider or a database itself.
//! It depends on three traits, and whoever embeds it supplies the
//! implementations:
//!
//! - [`IdentityProvider`] — sign-up/sign-in/sign-out and a stream of
//!   session-change events.
//! - [`ProfileStore`] — live profile queries keyed by identity id, plus
//!   partial writes.
//! - [`PlanLookup`] — price id → friendly plan name.
//!
//! # Feature Flags
//!
//! - `memory` (default) — in-memory [`MemoryIdentityProvider`] and
//!   [`MemoryProfileStore`] for tests, demos, and local development.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::{ProviderFailure, StoreFailure};
#[cfg(feature = "memory")]
pub use memory::{MemoryIdentityProvider, MemoryProfileStore};

use std::future::Future;

use authsync_protocol::{ProviderUser, QuerySnapshot, Session, SessionEvent, UserId};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Receiving end of a session-change registration.
///
/// Dropping it unregisters: providers prune senders whose receiver is gone.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Receiving end of a live profile query.
///
/// The store pushes a fresh [`QuerySnapshot`] whenever the answer changes.
/// Dropping the receiver cancels interest in the key.
pub type ProfileQuery = mpsc::UnboundedReceiver<QuerySnapshot>;

/// The identity provider client.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the provider is shared through an `Arc`
///   between the session machine and its subscription task.
/// - Every async method returns a `Send` future so calls can be made from
///   spawned tasks.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Creates an account. The returned user may not have a confirmed email.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderFailure>> + Send;

    /// Signs in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderFailure>> + Send;

    /// Starts a redirect-based sign-in with an external provider
    /// (`"google"`, `"github"`, ...). On success the browser leaves the
    /// page; the flow completes when the app is loaded again.
    fn sign_in_with_redirect(
        &self,
        provider: &str,
    ) -> impl Future<Output = Result<(), ProviderFailure>> + Send;

    /// Ends the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderFailure>> + Send;

    /// The cached session, if any. Must not perform I/O.
    fn current_session(&self) -> Option<Session>;

    /// Registers for session-change events.
    fn on_session_change(&self) -> SessionEvents;

    /// Requests an email change. The change only takes effect after the
    /// user confirms it out-of-band.
    fn update_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderFailure>> + Send;

    /// Sets a new password for the signed-in user.
    fn update_password(
        &self,
        password: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderFailure>> + Send;

    /// Sends a password-reset email.
    fn reset_password_for_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<(), ProviderFailure>> + Send;

    /// Sends a passwordless sign-in link.
    ///
    /// Defaults to [`ProviderFailure::Unsupported`]. Providers that offer
    /// magic links should override this.
    fn send_magic_link(
        &self,
        _email: &str,
    ) -> impl Future<Output = Result<(), ProviderFailure>> + Send {
        std::future::ready(Err(ProviderFailure::Unsupported("magic link sign-in")))
    }
}

/// The application's profile store.
pub trait ProfileStore: Send + Sync + 'static {
    /// Opens a live query for the profile keyed by `key`.
    fn query(&self, key: &UserId) -> ProfileQuery;

    /// Writes `fields` onto the profile keyed by `key`.
    fn mutate(
        &self,
        key: &UserId,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<(), StoreFailure>> + Send;
}

/// Maps billing price ids to the application's plan names.
pub trait PlanLookup: Send + Sync + 'static {
    /// Returns the friendly plan name for `price_id`, or `None` if the
    /// price isn't one the application recognizes.
    fn friendly_name(&self, price_id: &str) -> Option<String>;
}
