//! The pure half of the merge stage.
//!
//! [`merge`] decides what the rest of the app sees for a given pair of
//! inputs. [`MergeState`] remembers the latest inputs and which identity
//! the profile query belongs to, so results for a superseded identity are
//! dropped instead of merged.

use authsync_protocol::{MergedAccount, MergedUser, ProfileQueryResult, SessionUser, UserId};

use crate::MergeError;

/// What the merge stage publishes.
pub type MergeOutput = Result<MergedUser, MergeError>;

/// Combines the session and the profile query result.
///
/// | session         | profile               | merged                 |
/// |-----------------|-----------------------|------------------------|
/// | `Loading`       | any                   | `Loading`              |
/// | `Anonymous`     | any                   | `Anonymous`            |
/// | `Authenticated` | `Pending`             | `Loading`              |
/// | `Authenticated` | `Succeeded(None)`     | `Loading`              |
/// | `Authenticated` | `Succeeded(Some(p))`  | `Authenticated(s ∪ p)` |
/// | `Authenticated` | `Failed { reason }`   | `Err(ProfileFetch)`    |
///
/// Pure: same inputs, same output.
pub fn merge(session: &SessionUser, profile: &ProfileQueryResult) -> MergeOutput {
    match (session, profile) {
        (SessionUser::Loading, _) => Ok(MergedUser::Loading),
        (SessionUser::Anonymous, _) => Ok(MergedUser::Anonymous),
        (SessionUser::Authenticated(_), ProfileQueryResult::Pending) => Ok(MergedUser::Loading),
        // No profile yet: it's provisioned asynchronously after sign-up
        // and the query will report it once it exists.
        (SessionUser::Authenticated(_), ProfileQueryResult::Succeeded(None)) => {
            Ok(MergedUser::Loading)
        }
        (SessionUser::Authenticated(user), ProfileQueryResult::Succeeded(Some(record))) => Ok(
            MergedUser::Authenticated(MergedAccount::new(user, record)),
        ),
        (SessionUser::Authenticated(_), ProfileQueryResult::Failed { reason }) => {
            Err(MergeError::ProfileFetch {
                reason: reason.clone(),
            })
        }
    }
}

/// What the stage should do with its profile query after a session change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCommand {
    /// Start (or switch to) a query for this identity.
    Open(UserId),
    /// No identity any more: stop querying.
    Close,
    /// Same identity as before: keep the current query.
    Keep,
}

/// Latest inputs of the merge stage.
#[derive(Debug, Clone, Default)]
pub struct MergeState {
    session: SessionUser,
    /// Identity the current profile query was issued for.
    key: Option<UserId>,
    profile: ProfileQueryResult,
}

impl MergeState {
    /// Starts with `Loading` and no query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity the active profile query belongs to.
    pub fn active_key(&self) -> Option<&UserId> {
        self.key.as_ref()
    }

    /// Records a new session value and says what to do with the query.
    ///
    /// Switching identity resets the profile to `Pending`: nothing known
    /// about the previous identity carries over.
    pub fn on_session(&mut self, session: SessionUser) -> QueryCommand {
        let wanted = session.user_id().cloned();
        self.session = session;

        if wanted == self.key {
            return QueryCommand::Keep;
        }
        self.key = wanted.clone();
        self.profile = ProfileQueryResult::Pending;

        match wanted {
            Some(key) => QueryCommand::Open(key),
            None => QueryCommand::Close,
        }
    }

    /// Records a profile result issued for `key`.
    ///
    /// Returns `false` (and changes nothing) when `key` isn't the identity
    /// currently queried.
    pub fn on_profile(&mut self, key: &UserId, result: ProfileQueryResult) -> bool {
        if self.key.as_ref() != Some(key) {
            tracing::debug!(
                user_id = %key,
                "discarding profile result for superseded identity"
            );
            return false;
        }
        self.profile = result;
        true
    }

    /// The merged value for the current inputs.
    pub fn output(&self) -> MergeOutput {
        merge(&self.session, &self.profile)
    }
}
