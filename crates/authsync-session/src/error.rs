//! Error types for the session layer.

use authsync_provider::ProviderFailure;

/// Errors returned by [`SessionMachine`](crate::SessionMachine) operations.
///
/// Only `Provider` describes something that went wrong. The others are
/// user-facing outcomes: the request was understood, but the user has to
/// do something out-of-band (click a link) before anything changes.
/// None of them are worth retrying automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The identity provider rejected the call. `details` is the provider's
    /// message, passed through unchanged.
    #[error("identity provider error: {details}")]
    Provider { details: String },

    /// The account exists but its email hasn't been confirmed yet.
    #[error("email address has not been confirmed")]
    UnconfirmedEmail,

    /// The email change was accepted but only takes effect once the user
    /// confirms the new address.
    #[error("email change is waiting for confirmation")]
    ConfirmationPending,

    /// The provider doesn't offer this flow.
    #[error("{0} is not supported")]
    UnsupportedOperation(&'static str),

    /// The operation needs a signed-in user and there isn't one.
    #[error("no user is signed in")]
    NotAuthenticated,
}

impl From<ProviderFailure> for SessionError {
    fn from(failure: ProviderFailure) -> Self {
        match failure {
            ProviderFailure::Rejected { message, .. } => Self::Provider { details: message },
            ProviderFailure::Unsupported(operation) => Self::UnsupportedOperation(operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rejected_keeps_message() {
        let err: SessionError = ProviderFailure::rejected("Invalid login credentials").into();
        assert_eq!(
            err,
            SessionError::Provider {
                details: "Invalid login credentials".into()
            }
        );
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[test]
    fn test_from_unsupported_maps_to_unsupported_operation() {
        let err: SessionError = ProviderFailure::Unsupported("magic link sign-in").into();
        assert_eq!(err, SessionError::UnsupportedOperation("magic link sign-in"));
    }
}
