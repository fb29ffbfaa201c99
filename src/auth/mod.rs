use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;

/// Public registration and login plus the caller's own profile.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(handlers::profile))
        .route_layer(from_fn_with_state(state, middleware::authenticate))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
}
