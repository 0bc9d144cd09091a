//! # authsync
//!
//! Client-side auth/session coordinator.
//!
//! authsync combines a third-party identity provider's session with the
//! application's own profile and billing records, and exposes a single
//! consistent "current user" value to the rest of the application.
//!
//! ## Layers
//!
//! - `authsync-session` — the session state machine, driven by provider
//!   events
//! - `authsync-merge` — overlays the profile record onto the session user
//! - `authsync-format` — the flat, read-only view UI code reads
//! - this crate — [`Coordinator`] to wire them together, [`Gate`] for
//!   protected views, and one [`AuthsyncError`] for everything
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use authsync::prelude::*;
//!
//! # async fn run() -> Result<(), AuthsyncError> {
//! let provider = Arc::new(MemoryIdentityProvider::new());
//! let store = Arc::new(MemoryProfileStore::new());
//!
//! let coordinator = Coordinator::builder(provider, store)
//!     .location("https://app.example.com/")
//!     .start();
//!
//! coordinator.sign_in("ada@example.com", "hunter2").await?;
//! let mut user = coordinator.watch_user();
//! user.changed().await.ok();
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
pub mod gate;
pub mod telemetry;

pub use config::{CoordinatorConfig, DEFAULT_SIGN_IN_PATH};
pub use coordinator::{Coordinator, CoordinatorBuilder, CurrentUser};
pub use error::AuthsyncError;
pub use gate::{Gate, GateOutcome, Navigator};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        AuthsyncError, Coordinator, CoordinatorConfig, CurrentUser, Gate, GateOutcome, Navigator,
    };
    pub use authsync_format::{FormattedState, FormattedUser, PlanCatalog};
    pub use authsync_merge::MergeError;
    pub use authsync_protocol::{MergedUser, ProfileRecord, SessionUser, UserId};
    pub use authsync_provider::{
        IdentityProvider, PlanLookup, ProfileStore, ProviderFailure, StoreFailure,
    };
    #[cfg(feature = "memory")]
    pub use authsync_provider::{MemoryIdentityProvider, MemoryProfileStore};
    pub use authsync_session::{SessionConfig, SessionError};
}
