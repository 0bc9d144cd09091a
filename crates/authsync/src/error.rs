//! Unified error type for authsync.

use authsync_merge::MergeError;
use authsync_provider::StoreFailure;
use authsync_session::SessionError;

/// Top-level error that wraps every crate-specific error.
///
/// When using the `authsync` meta-crate you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthsyncError {
    /// A session operation failed or needs out-of-band user action.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The merged user couldn't be built (profile store misconfigured).
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// A profile write failed.
    #[error(transparent)]
    Store(#[from] StoreFailure),

    /// The configuration document couldn't be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl AuthsyncError {
    /// The session error inside, if that's what this is.
    pub fn as_session(&self) -> Option<&SessionError> {
        match self {
            Self::Session(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_session_error() {
        let err: AuthsyncError = SessionError::UnconfirmedEmail.into();
        assert!(matches!(err, AuthsyncError::Session(SessionError::UnconfirmedEmail)));
        assert_eq!(err.as_session(), Some(&SessionError::UnconfirmedEmail));
    }

    #[test]
    fn test_from_merge_error_keeps_reason() {
        let err: AuthsyncError = MergeError::ProfileFetch {
            reason: "permission denied".into(),
        }
        .into();
        assert!(matches!(err, AuthsyncError::Merge(_)));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_from_store_failure() {
        let err: AuthsyncError = StoreFailure::Unavailable("timeout".into()).into();
        assert!(matches!(err, AuthsyncError::Store(_)));
        assert_eq!(err.as_session(), None);
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AuthsyncError = json_err.into();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
