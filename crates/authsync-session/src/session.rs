//! Session configuration and redirect detection.
//!
//! When a redirect-based sign-in (OAuth, magic link, email confirmation)
//! completes, the provider sends the browser back to the app with the
//! credentials in the URL fragment:
//!
//! ```text
//! https://app.example.com/dashboard#access_token=eyJ...&type=magiclink
//! ```
//!
//! At that moment the cached session still says "logged out". Reading it
//! would make the app redirect to the sign-in page before the provider has
//! finished. [`RedirectFragment`] detects that situation so
//! [`SessionMachine::initialize`](crate::SessionMachine::initialize) can
//! wait for the provider's event instead.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Literal text whose presence in the URL fragment means a redirect
    /// sign-in is completing. Matched exactly.
    ///
    /// Default: `"access_token="`. An empty marker disables the check.
    pub redirect_marker: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redirect_marker: "access_token=".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// RedirectFragment
// ---------------------------------------------------------------------------

/// The fragment part (after `#`) of the app's current URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectFragment<'a> {
    raw: &'a str,
}

impl<'a> RedirectFragment<'a> {
    /// Extracts the fragment from a full URL or a bare `#...` string.
    /// A location without `#` has an empty fragment.
    pub fn parse(location: &'a str) -> Self {
        let raw = location.split_once('#').map_or("", |(_, fragment)| fragment);
        Self { raw }
    }

    /// The fragment text, without the leading `#`.
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Returns `true` if the fragment contains `marker` verbatim.
    pub fn is_in_flight(&self, marker: &str) -> bool {
        !marker.is_empty() && self.raw.contains(marker)
    }

    /// Looks up a `key=value` parameter, percent-decoding the value.
    pub fn param(&self, key: &str) -> Option<Cow<'a, str>> {
        self.raw
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .and_then(|(_, value)| urlencoding::decode(value).ok())
    }

    /// The redirect flow that produced the fragment (`signup`, `magiclink`,
    /// `recovery`, ...), when the provider says.
    pub fn flow_type(&self) -> Option<Cow<'a, str>> {
        self.param("type")
    }
}
