use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Registration and login; reachable without a token.
pub fn public_router() -> Router<AppState> {
    handlers::auth_routes()
}

/// Routes that sit behind [`extractors::require_auth`].
pub fn protected_router() -> Router<AppState> {
    handlers::me_routes()
}
