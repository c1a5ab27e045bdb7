//! Domain types shared by the store and API crates.
//!
//! Nothing in this crate performs I/O; time is read through [`clock::Clock`]
//! and row access goes through [`pagination::CursorSource`].

pub mod clock;
pub mod error;
pub mod pagination;
pub mod types;
