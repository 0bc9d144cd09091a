//! In-memory collaborators.
//!
//! [`MemoryIdentityProvider`] and [`MemoryProfileStore`] behave like the
//! hosted services closely enough to drive the whole pipeline: events are
//! pushed to every registered receiver, profile queries answer immediately
//! and keep streaming updates. Both expose a few extra knobs (confirm an
//! email, provision a profile, inject failures) that tests and demos use to
//! play the part of the outside world.

use std::collections::HashMap;

use authsync_protocol::{
    AppMetadata, ProfileRecord, ProviderUser, QuerySnapshot, Session, SessionEvent,
    SessionEventKind, UserId,
};
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::{
    IdentityProvider, ProfileQuery, ProfileStore, ProviderFailure, SessionEvents, StoreFailure,
};

// ---------------------------------------------------------------------------
// MemoryIdentityProvider
// ---------------------------------------------------------------------------

struct Account {
    user: ProviderUser,
    password: String,
}

#[derive(Default)]
struct ProviderInner {
    /// Accounts keyed by email.
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    listeners: Vec<mpsc::UnboundedSender<SessionEvent>>,
    require_confirmation: bool,
    /// Email changes waiting for the user to confirm them.
    pending_emails: HashMap<UserId, String>,
    /// Set by `fail_next`; consumed by the next call.
    next_failure: Option<String>,
    redirects: Vec<String>,
    reset_requests: Vec<String>,
    magic_links: Vec<String>,
}

impl ProviderInner {
    fn take_failure(&mut self) -> Result<(), ProviderFailure> {
        match self.next_failure.take() {
            Some(message) => Err(ProviderFailure::rejected(message)),
            None => Ok(()),
        }
    }

    fn session_user_id(&self) -> Result<UserId, ProviderFailure> {
        self.session
            .as_ref()
            .map(|s| s.user.id.clone())
            .ok_or_else(|| ProviderFailure::rejected("Auth session missing!"))
    }

    fn account_by_id(&mut self, id: &UserId) -> Option<&mut Account> {
        self.accounts.values_mut().find(|a| &a.user.id == id)
    }

    /// Starts a session for `user` and tells every listener.
    fn establish(&mut self, user: ProviderUser) {
        let session = Session {
            access_token: generate_token(),
            refresh_token: Some(generate_token()),
            user,
        };
        self.session = Some(session.clone());
        self.emit(SessionEvent::signed_in(session));
    }

    /// Delivers an event, pruning receivers that have been dropped.
    fn emit(&mut self, event: SessionEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::debug!(
            event = %event.event,
            listeners = self.listeners.len(),
            "identity event emitted"
        );
    }
}

/// An identity provider that keeps accounts in memory.
///
/// By default sign-up confirms the email immediately and signs the user in.
/// Use [`with_email_confirmation`](Self::with_email_confirmation) to model
/// a provider that requires the user to click a confirmation link first.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    inner: Mutex<ProviderInner>,
}

impl MemoryIdentityProvider {
    /// Creates a provider that confirms emails at sign-up.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that leaves new accounts unconfirmed until
    /// [`confirm_email`](Self::confirm_email) is called.
    pub fn with_email_confirmation() -> Self {
        let provider = Self::default();
        provider.inner.lock().require_confirmation = true;
        provider
    }

    /// Marks an account's email as confirmed (the user clicked the link).
    pub fn confirm_email(&self, email: &str) {
        let mut inner = self.inner.lock();
        if let Some(account) = inner.accounts.get_mut(email) {
            account.user.email_confirmed_at = Some(Utc::now());
        }
    }

    /// Applies a pending email change (the user confirmed the new address)
    /// and emits `USER_UPDATED` if that user is signed in.
    pub fn confirm_email_change(&self, user_id: &UserId) {
        let mut inner = self.inner.lock();
        let Some(new_email) = inner.pending_emails.remove(user_id) else {
            return;
        };

        let Some(old_email) = inner
            .account_by_id(user_id)
            .map(|a| a.user.email.clone())
        else {
            return;
        };
        if let Some(mut account) = inner.accounts.remove(&old_email) {
            account.user.email = new_email.clone();
            let user = account.user.clone();
            inner.accounts.insert(new_email, account);

            if let Some(session) = inner.session.as_mut().filter(|s| &s.user.id == user_id) {
                session.user = user;
                let event = SessionEvent {
                    event: SessionEventKind::UserUpdated,
                    session: Some(session.clone()),
                };
                inner.emit(event);
            }
        }
    }

    /// Makes the next provider call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.inner.lock().next_failure = Some(message.into());
    }

    /// Pushes an arbitrary event to every listener, as the hosted service
    /// would after a token refresh or a sign-in in another tab.
    pub fn emit(&self, event: SessionEvent) {
        let mut inner = self.inner.lock();
        inner.session = event.session.clone();
        inner.emit(event);
    }

    /// Number of live session-change registrations.
    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|tx| !tx.is_closed());
        inner.listeners.len()
    }

    /// External providers a redirect sign-in was started for, in order.
    pub fn redirects(&self) -> Vec<String> {
        self.inner.lock().redirects.clone()
    }

    /// Emails a password reset was requested for, in order.
    pub fn reset_requests(&self) -> Vec<String> {
        self.inner.lock().reset_requests.clone()
    }

    /// Emails a magic link was sent to, in order.
    pub fn magic_links(&self) -> Vec<String> {
        self.inner.lock().magic_links.clone()
    }

    /// The email change waiting for confirmation, if any.
    pub fn pending_email(&self, user_id: &UserId) -> Option<String> {
        self.inner.lock().pending_emails.get(user_id).cloned()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        if inner.accounts.contains_key(email) {
            return Err(ProviderFailure::rejected("User already registered"));
        }

        let confirmed = !inner.require_confirmation;
        let user = ProviderUser {
            id: UserId::new(generate_token()),
            email: email.to_string(),
            email_confirmed_at: confirmed.then(Utc::now),
            app_metadata: AppMetadata::default(),
            user_metadata: Map::new(),
        };
        inner.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        tracing::info!(user_id = %user.id, confirmed, "account created");

        if confirmed {
            inner.establish(user.clone());
        }
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let user = match inner.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(ProviderFailure::Rejected {
                    message: "Invalid login credentials".into(),
                    status: Some(400),
                });
            }
        };

        if user.email_confirmed_at.is_some() {
            inner.establish(user.clone());
        }
        Ok(user)
    }

    async fn sign_in_with_redirect(&self, provider: &str) -> Result<(), ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        inner.redirects.push(provider.to_string());
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        inner.session = None;
        inner.emit(SessionEvent::signed_out());
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    fn on_session_change(&self) -> SessionEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().listeners.push(tx);
        rx
    }

    async fn update_email(&self, email: &str) -> Result<ProviderUser, ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let user_id = inner.session_user_id()?;
        if inner.accounts.contains_key(email) {
            return Err(ProviderFailure::rejected(
                "A user with this email address has already been registered",
            ));
        }
        inner.pending_emails.insert(user_id.clone(), email.to_string());

        inner
            .account_by_id(&user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| ProviderFailure::rejected("User not found"))
    }

    async fn update_password(&self, password: &str) -> Result<ProviderUser, ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let user_id = inner.session_user_id()?;
        let account = inner
            .account_by_id(&user_id)
            .ok_or_else(|| ProviderFailure::rejected("User not found"))?;
        account.password = password.to_string();
        Ok(account.user.clone())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        inner.reset_requests.push(email.to_string());
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), ProviderFailure> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        inner.magic_links.push(email.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryProfileStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    records: HashMap<UserId, ProfileRecord>,
    watchers: HashMap<UserId, Vec<mpsc::UnboundedSender<QuerySnapshot>>>,
    /// When set, queries answer with this error.
    failure: Option<String>,
}

impl StoreInner {
    fn answer(&self, key: &UserId) -> QuerySnapshot {
        match &self.failure {
            Some(message) => QuerySnapshot::error(message.clone()),
            None => QuerySnapshot::success(self.records.get(key).cloned()),
        }
    }

    /// Pushes the current answer for `key` to its live queries.
    fn notify(&mut self, key: &UserId) {
        let snapshot = self.answer(key);
        if let Some(watchers) = self.watchers.get_mut(key) {
            watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
            if watchers.is_empty() {
                self.watchers.remove(key);
            }
        }
    }

    /// Drops closed queries for `key`, and the key itself once none are
    /// left. Returns how many remain.
    fn prune(&mut self, key: &UserId) -> usize {
        let Some(watchers) = self.watchers.get_mut(key) else {
            return 0;
        };
        watchers.retain(|tx| !tx.is_closed());
        let remaining = watchers.len();
        if remaining == 0 {
            self.watchers.remove(key);
        }
        remaining
    }
}

/// A profile store that keeps records in memory and streams changes to
/// open queries.
#[derive(Default)]
pub struct MemoryProfileStore {
    inner: Mutex<StoreInner>,
}

impl MemoryProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the record for `key`, as the external
    /// provisioning process does after sign-up.
    pub fn insert(&self, key: &UserId, record: ProfileRecord) {
        let mut inner = self.inner.lock();
        inner.records.insert(key.clone(), record);
        inner.notify(key);
    }

    /// The stored record for `key`.
    pub fn get(&self, key: &UserId) -> Option<ProfileRecord> {
        self.inner.lock().records.get(key).cloned()
    }

    /// Makes every query (open and future) fail with `message`;
    /// `None` clears the failure.
    pub fn set_failure(&self, message: Option<String>) {
        let mut inner = self.inner.lock();
        inner.failure = message;
        let keys: Vec<UserId> = inner.watchers.keys().cloned().collect();
        for key in &keys {
            inner.notify(key);
        }
    }

    /// Number of live queries for `key`.
    pub fn watcher_count(&self, key: &UserId) -> usize {
        self.inner.lock().prune(key)
    }

    /// Number of keys with at least one live query.
    pub fn watched_keys(&self) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<UserId> = inner.watchers.keys().cloned().collect();
        keys.iter().filter(|key| inner.prune(key) > 0).count()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn query(&self, key: &UserId) -> ProfileQuery {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();

        // Same sequence a remote store produces: loading, then the answer.
        let _ = tx.send(QuerySnapshot::loading());
        let _ = tx.send(inner.answer(key));

        inner.watchers.entry(key.clone()).or_default().push(tx);
        rx
    }

    async fn mutate(&self, key: &UserId, fields: Map<String, Value>) -> Result<(), StoreFailure> {
        let mut inner = self.inner.lock();
        if let Some(message) = &inner.failure {
            return Err(StoreFailure::Rejected(message.clone()));
        }

        inner
            .records
            .entry(key.clone())
            .or_default()
            .fields
            .extend(fields);
        inner.notify(key);
        Ok(())
    }
}

/// Generates a random 32-character hex string (128 bits of entropy),
/// used for user ids and tokens.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
