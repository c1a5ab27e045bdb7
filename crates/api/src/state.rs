use std::sync::Arc;

use stormhead_db::{SessionStore, UserStore};

use crate::auth::token::TokenIssuer;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenIssuer>,
}
