//! Row models and create DTOs.

pub mod session;
pub mod user;
