//! Coordinator configuration.

use authsync_format::PlanCatalog;
use authsync_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::AuthsyncError;

/// Where the gate sends anonymous visitors by default.
pub const DEFAULT_SIGN_IN_PATH: &str = "/auth/signin";

fn default_sign_in_path() -> String {
    DEFAULT_SIGN_IN_PATH.to_string()
}

/// Configuration for a [`Coordinator`](crate::Coordinator).
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration:
///
/// ```json
/// {
///   "session": { "redirect_marker": "access_token=" },
///   "sign_in_path": "/auth/signin",
///   "plans": { "price_1Nabc": "pro" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub session: SessionConfig,

    /// Sign-in destination the gate redirects anonymous users to.
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,

    /// Price id → plan name table used when no other
    /// [`PlanLookup`](authsync_provider::PlanLookup) is supplied.
    #[serde(default)]
    pub plans: PlanCatalog,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            sign_in_path: default_sign_in_path(),
            plans: PlanCatalog::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Parses a configuration document.
    pub fn from_json(json: &str) -> Result<Self, AuthsyncError> {
        let config: Self = serde_json::from_str(json)?;
        if config.session.redirect_marker.is_empty() {
            tracing::warn!("empty redirect marker: redirect sign-ins will never be detected");
        }
        Ok(config)
    }
}
