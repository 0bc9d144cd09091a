//! Memoizing formatter over the merged user.

use std::fmt;
use std::sync::Arc;

use authsync_merge::{MergeError, MergeOutput};
use authsync_protocol::MergedUser;
use authsync_provider::PlanLookup;

use crate::{format_user, FormattedUser};

/// The tri-state value consumers see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormattedState {
    #[default]
    Loading,
    Anonymous,
    Authenticated(Arc<FormattedUser>),
}

impl FormattedState {
    /// The formatted user, if signed in with a profile.
    pub fn user(&self) -> Option<&Arc<FormattedUser>> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

impl fmt::Display for FormattedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::Authenticated(user) => write!(f, "authenticated({})", user.uid),
        }
    }
}

/// Formats merged users, reusing the previous result when the input is
/// unchanged.
///
/// Consumers that compare by pointer (`Arc::ptr_eq`) see the same
/// allocation for as long as the merged user stays structurally equal.
pub struct Formatter<L: PlanLookup + ?Sized> {
    plans: Arc<L>,
    last: Option<(MergedUser, FormattedState)>,
}

impl<L: PlanLookup + ?Sized> Formatter<L> {
    pub fn new(plans: Arc<L>) -> Self {
        Self { plans, last: None }
    }

    /// Projects a merged user.
    pub fn format(&mut self, merged: &MergedUser) -> FormattedState {
        if let Some((input, output)) = &self.last {
            if input == merged {
                return output.clone();
            }
        }

        let output = match merged {
            MergedUser::Loading => FormattedState::Loading,
            MergedUser::Anonymous => FormattedState::Anonymous,
            MergedUser::Authenticated(account) => {
                FormattedState::Authenticated(Arc::new(format_user(account, self.plans.as_ref())))
            }
        };
        self.last = Some((merged.clone(), output.clone()));
        output
    }

    /// Projects a merge stage output. A merge failure passes through
    /// untouched rather than turning into `Loading` or `Anonymous`.
    pub fn format_result(&mut self, merged: &MergeOutput) -> Result<FormattedState, MergeError> {
        match merged {
            Ok(user) => Ok(self.format(user)),
            Err(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use authsync_protocol::{AuthUser, MergedAccount, ProfileRecord, UserId};
    use chrono::Utc;
    use serde_json::Map;

    use super::*;
    use crate::PlanCatalog;

    fn merged(name: &str) -> MergedUser {
        let user = AuthUser {
            id: UserId::new("u-1"),
            email: "ada@example.com".into(),
            email_confirmed_at: Some(Utc::now()),
            provider: "email".into(),
            metadata: Map::new(),
        };
        MergedUser::Authenticated(MergedAccount::new(
            &user,
            &ProfileRecord::from_pairs([("name", name)]),
        ))
    }

    fn formatter() -> Formatter<PlanCatalog> {
        Formatter::new(Arc::new(PlanCatalog::new()))
    }

    #[test]
    fn test_format_loading_and_anonymous() {
        let mut formatter = formatter();
        assert_eq!(formatter.format(&MergedUser::Loading), FormattedState::Loading);
        assert_eq!(formatter.format(&MergedUser::Anonymous), FormattedState::Anonymous);
    }

    #[test]
    fn test_format_equal_input_reuses_allocation() {
        let mut formatter = formatter();
        let input = merged("Ada");

        let first = formatter.format(&input);
        let second = formatter.format(&input.clone());

        let (Some(a), Some(b)) = (first.user(), second.user()) else {
            panic!("expected authenticated");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_format_changed_input_allocates_new_value() {
        let mut formatter = formatter();

        let first = formatter.format(&merged("Ada"));
        let second = formatter.format(&merged("Countess"));

        assert_ne!(first, second);
        assert_eq!(second.user().unwrap().name.as_deref(), Some("Countess"));
    }

    #[test]
    fn test_format_separate_formatters_agree_structurally() {
        let input = merged("Ada");
        assert_eq!(formatter().format(&input), formatter().format(&input));
    }

    #[test]
    fn test_format_result_passes_error_through() {
        let mut formatter = formatter();
        let failure = MergeError::ProfileFetch {
            reason: "permission denied".into(),
        };

        assert_eq!(formatter.format_result(&Err(failure.clone())), Err(failure));
    }

    #[test]
    fn test_format_result_formats_ok() {
        let mut formatter = formatter();
        assert_eq!(
            formatter.format_result(&Ok(MergedUser::Anonymous)),
            Ok(FormattedState::Anonymous)
        );
    }

    #[test]
    fn test_formatted_state_display() {
        let mut formatter = formatter();
        assert_eq!(formatter.format(&merged("Ada")).to_string(), "authenticated(u-1)");
        assert_eq!(FormattedState::Loading.to_string(), "loading");
    }
}
