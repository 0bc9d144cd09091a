//! Presentation layer for authsync.
//!
//! Turns the merged user into the flat, read-only [`FormattedUser`] that UI
//! code reads: display name, avatar, provider list in the application's
//! vocabulary, and billing-plan flags.
//!
//! # Key types
//!
//! - [`format_user`] — the pure projection of one merged account
//! - [`Formatter`] — memoizes the projection so unchanged input keeps the
//!   same `Arc<FormattedUser>`
//! - [`FormattedState`] — `Loading` / `Anonymous` / `Authenticated`
//! - [`PlanCatalog`] — a static [`PlanLookup`](authsync_provider::PlanLookup)
//!   table

mod catalog;
mod formatter;
mod view;

pub use catalog::PlanCatalog;
pub use formatter::{FormattedState, Formatter};
pub use view::{format_user, is_active_status, provider_label, FormattedUser, ACTIVE_STATUSES};
