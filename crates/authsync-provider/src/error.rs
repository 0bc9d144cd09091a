//! Failure types reported by the external collaborators.

/// A failure reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderFailure {
    /// The provider answered with an error (bad credentials, rate limit,
    /// missing session, ...). `message` is user-visible and passed through.
    #[error("{message}")]
    Rejected {
        message: String,
        /// HTTP-style status code, when the provider reports one.
        status: Option<u16>,
    },

    /// The provider doesn't offer this flow at all.
    #[error("{0} is not supported by this identity provider")]
    Unsupported(&'static str),
}

impl ProviderFailure {
    /// Shorthand for a [`ProviderFailure::Rejected`] without a status code.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            status: None,
        }
    }
}

/// A failure reported by the profile store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreFailure {
    /// The store refused the write (permissions, constraint violation).
    #[error("profile store rejected the write: {0}")]
    Rejected(String),

    /// The store couldn't be reached.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_displays_message_verbatim() {
        let err = ProviderFailure::rejected("Invalid login credentials");
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_unsupported_names_the_flow() {
        let err = ProviderFailure::Unsupported("magic link sign-in");
        assert!(err.to_string().contains("magic link sign-in"));
    }
}
