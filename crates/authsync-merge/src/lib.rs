//! Data merge stage for authsync.
//!
//! Overlays the application's profile record onto the session user. The
//! result is a second tri-state value that also covers "signed in, but the
//! profile doesn't exist yet".
//!
//! # Key types
//!
//! - [`merge`] — the pure combination rule
//! - [`MergeState`] — latest inputs plus the stale-result guard
//! - [`spawn_merge_stage`] / [`MergeHandle`] — the actor task that keeps
//!   the merged value up to date
//! - [`MergeError`] — failures surfaced in the merged value

mod error;
mod merge;
mod stage;

pub use authsync_protocol::MergedUser;
pub use error::MergeError;
pub use merge::{merge, MergeOutput, MergeState, QueryCommand};
pub use stage::{spawn_merge_stage, MergeHandle};
