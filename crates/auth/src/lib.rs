//! `tracknow-auth` — the session boundary.
//!
//! An opaque provider of the current user id plus sign-in/sign-up/sign-out.
//! The core treats this as an external collaborator: it only ever consumes
//! `current_user_id` as the explicit owner passed to `start(owner)`.

pub mod session;

pub use session::{AuthError, LocalSessionProvider, SessionProvider};
