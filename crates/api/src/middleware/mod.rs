//! Request middleware.
//!
//! - [`auth::require_session`] -- the session gate every non-public route sits behind.

pub mod auth;
