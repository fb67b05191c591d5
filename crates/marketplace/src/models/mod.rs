//! Models owned by the marketplace front-end.
//!
//! Profiles and listings live in `zesty_core`; this module only holds what
//! the web layer keeps per visitor.

pub mod session;

pub use session::{AuthSession, keys as session_keys};
