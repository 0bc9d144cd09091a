//! Data model for authsync.
//!
//! This crate defines the values that flow through the pipeline:
//!
//! - **Identity side** ([`ProviderUser`], [`Session`], [`SessionEvent`],
//!   [`SessionUser`]) — what the identity provider reports.
//! - **Profile side** ([`ProfileRecord`], [`BillingRecord`],
//!   [`QuerySnapshot`], [`ProfileQueryResult`]) — what the application's
//!   profile store reports.
//! - **Merged** ([`MergedUser`], [`MergedAccount`]) — both sides combined.
//!
//! # Architecture
//!
//! ```text
//! Provider events → SessionUser ─┐
//!                                ├→ MergedUser → FormattedUser
//! Profile store  → QueryResult ──┘
//! ```
//!
//! Nothing here performs I/O; these are plain values.

mod profile;
mod types;

pub use profile::{
    billing_keys, BillingRecord, MergedAccount, MergedUser, ProfileQueryResult, ProfileRecord,
    QuerySnapshot, QueryStatus,
};
pub use types::{
    AppMetadata, AuthUser, ProviderUser, Session, SessionEvent, SessionEventKind, SessionUser,
    UserId, DEFAULT_PROVIDER,
};
