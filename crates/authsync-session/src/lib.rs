//! Session state machine for authsync.
//!
//! This crate turns identity-provider activity into one canonical value,
//! [`SessionUser`](authsync_protocol::SessionUser):
//!
//! 1. **Startup** — [`SessionMachine::initialize`] settles the initial
//!    state from the cached session, unless a redirect sign-in is
//!    completing ([`RedirectFragment`]).
//! 2. **Events** — [`SessionMachine::subscribe`] applies provider events
//!    for as long as the [`SessionSubscription`] handle lives.
//! 3. **Operations** — sign-up, sign-in, sign-out, email/password changes,
//!    each reporting user-facing outcomes as [`SessionError`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Merge stage (above)  ← watches SessionUser, fetches the profile
//!     ↕
//! Session layer (this crate)  ← owns SessionUser
//!     ↕
//! Identity provider (below)  ← events and auth calls
//! ```

mod error;
mod machine;
mod session;

pub use error::SessionError;
pub use machine::{SessionMachine, SessionSubscription};
pub use session::{RedirectFragment, SessionConfig};
