//! Identity-side types: what the identity provider tells us about a user.
//!
//! Everything in this module mirrors the shapes the provider puts on the
//! wire (JSON), so each type derives `Serialize`/`Deserialize` and the tests
//! at the bottom pin the exact JSON layout.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The identity provider's id for a user.
///
/// A newtype around `String` so an id can't be mixed up with an email or
/// an access token, even though all three are strings underneath.
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The provider name used when the provider doesn't report one.
pub const DEFAULT_PROVIDER: &str = "email";

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

/// Provider-managed metadata attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// The auth provider the user signed in with (`"email"`, `"google"`, ...).
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

/// A user as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: UserId,
    pub email: String,

    /// When the user confirmed their email address. `None` means the
    /// account exists but can't be used yet.
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub app_metadata: AppMetadata,

    /// Free-form metadata (full name, avatar, ...) collected at sign-up or
    /// copied from a social provider.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

/// A provider-issued session: proof of authentication plus identity claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: ProviderUser,
}

// ---------------------------------------------------------------------------
// Session events
// ---------------------------------------------------------------------------

/// The kind of change the provider is reporting.
///
/// The names match the provider's event strings, e.g. `"SIGNED_IN"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        };
        f.write_str(name)
    }
}

/// A session change pushed by the identity provider.
///
/// Only `session` decides the resulting state: present means
/// authenticated, absent means anonymous. `event` is kept for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event: SessionEventKind,
    pub session: Option<Session>,
}

impl SessionEvent {
    /// Parses an event from the provider's JSON representation.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Shorthand for a `SIGNED_IN` event carrying `session`.
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: SessionEventKind::SignedIn,
            session: Some(session),
        }
    }

    /// Shorthand for a `SIGNED_OUT` event.
    pub fn signed_out() -> Self {
        Self {
            event: SessionEventKind::SignedOut,
            session: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionUser
// ---------------------------------------------------------------------------

/// The session fields of an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub provider: String,
    pub metadata: Map<String, Value>,
}

impl From<&ProviderUser> for AuthUser {
    fn from(user: &ProviderUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            email_confirmed_at: user.email_confirmed_at,
            provider: user.app_metadata.provider.clone(),
            metadata: user.user_metadata.clone(),
        }
    }
}

/// Who is logged in, as far as the identity provider is concerned.
///
/// ```text
///   Loading ──→ Authenticated ⇄ Anonymous
///      └──────→ Anonymous
/// ```
///
/// `Loading` is only ever the starting state; nothing transitions back
/// into it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionUser {
    /// Not known yet (startup, or a redirect sign-in is completing).
    #[default]
    Loading,
    /// Explicitly logged out.
    Anonymous,
    /// Logged in.
    Authenticated(AuthUser),
}

impl SessionUser {
    /// Maps an optional provider session onto the two settled states.
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self::Authenticated(AuthUser::from(&session.user)),
            None => Self::Anonymous,
        }
    }

    /// The authenticated user's id, if any.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Authenticated(user) => Some(&user.id),
            Self::Loading | Self::Anonymous => None,
        }
    }

    /// Returns `true` while the session is still indeterminate.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::Authenticated(user) => write!(f, "authenticated({})", user.id),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Wire-shape tests: the provider sends JSON, so the serde attributes
    //! have to line up with what it actually emits.

    use super::*;

    fn provider_user(confirmed: bool) -> ProviderUser {
        ProviderUser {
            id: UserId::new("u-1"),
            email: "ada@example.com".into(),
            email_confirmed_at: confirmed.then(Utc::now),
            app_metadata: AppMetadata::default(),
            user_metadata: Map::new(),
        }
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_provider_user_missing_optional_fields_use_defaults() {
        let json = r#"{ "id": "u-1", "email": "ada@example.com" }"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();

        assert_eq!(user.email_confirmed_at, None);
        assert_eq!(user.app_metadata.provider, "email");
        assert!(user.user_metadata.is_empty());
    }

    #[test]
    fn test_provider_user_parses_confirmation_timestamp() {
        let json = r#"{
            "id": "u-1",
            "email": "ada@example.com",
            "email_confirmed_at": "2024-03-01T12:00:00Z",
            "app_metadata": { "provider": "github" },
            "user_metadata": { "full_name": "Ada Lovelace" }
        }"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();

        assert!(user.email_confirmed_at.is_some());
        assert_eq!(user.app_metadata.provider, "github");
        assert_eq!(user.user_metadata["full_name"], "Ada Lovelace");
    }

    #[test]
    fn test_session_event_kind_uses_provider_names() {
        let json = serde_json::to_string(&SessionEventKind::SignedIn).unwrap();
        assert_eq!(json, "\"SIGNED_IN\"");

        let kind: SessionEventKind = serde_json::from_str("\"PASSWORD_RECOVERY\"").unwrap();
        assert_eq!(kind, SessionEventKind::PasswordRecovery);
    }

    #[test]
    fn test_session_event_from_json_signed_out_has_no_session() {
        let event = SessionEvent::from_json(br#"{ "event": "SIGNED_OUT", "session": null }"#).unwrap();

        assert_eq!(event, SessionEvent::signed_out());
    }

    #[test]
    fn test_session_event_from_json_rejects_unknown_kind() {
        let result = SessionEvent::from_json(br#"{ "event": "EXPLODED", "session": null }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_user_from_session_present_is_authenticated() {
        let session = Session {
            access_token: "tok".into(),
            refresh_token: None,
            user: provider_user(true),
        };

        let state = SessionUser::from_session(Some(&session));

        assert_eq!(state.user_id(), Some(&UserId::new("u-1")));
        assert!(matches!(state, SessionUser::Authenticated(ref u) if u.provider == "email"));
    }

    #[test]
    fn test_session_user_from_session_absent_is_anonymous() {
        assert_eq!(SessionUser::from_session(None), SessionUser::Anonymous);
    }

    #[test]
    fn test_session_user_default_is_loading() {
        assert!(SessionUser::default().is_loading());
        assert_eq!(SessionUser::default().user_id(), None);
    }

    #[test]
    fn test_session_user_display() {
        let user = AuthUser::from(&provider_user(false));
        assert_eq!(SessionUser::Loading.to_string(), "loading");
        assert_eq!(SessionUser::Anonymous.to_string(), "anonymous");
        assert_eq!(SessionUser::Authenticated(user).to_string(), "authenticated(u-1)");
    }
}
