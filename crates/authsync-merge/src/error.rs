//! Error types for the merge stage.

/// Errors that end up in the merged output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The profile store answered the query with an error. This points at
    /// a misconfigured or unreachable store, not a transient blip.
    #[error("profile fetch failed: {reason}")]
    ProfileFetch { reason: String },
}
