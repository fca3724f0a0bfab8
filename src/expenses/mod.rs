mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

/// Expense CRUD; every route expects an [`crate::auth::extractors::AuthUser`].
pub fn router() -> Router<AppState> {
    handlers::routes()
}
