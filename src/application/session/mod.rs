//! Live conversation session.
//!
//! [`SessionController`] is the single source of truth for which
//! conversation is active, what has been said and whether a reply is
//! outstanding. The presentation layer drives it through a
//! [`SessionHandle`] and renders [`SessionSnapshot`]s.

mod controller;
mod error;
mod handle;

pub use controller::SessionController;
pub use error::SessionError;
pub use handle::{SendOutcome, SessionHandle, SessionSnapshot};
