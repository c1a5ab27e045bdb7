//! Authentication primitives.
//!
//! - [`token`] -- access/refresh token minting and verification.
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`identity`] -- the per-request identity established by the session gate.

pub mod identity;
pub mod password;
pub mod token;
