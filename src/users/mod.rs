use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{post, put},
    Router,
};

use crate::{
    auth::middleware::{authenticate, require_admin},
    state::AppState,
};

pub mod dto;
pub mod handlers;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Admin user management. Every route authenticates, then requires `ADMIN`.
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create).get(handlers::list))
        .route("/users/:id", put(handlers::update).delete(handlers::delete))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, authenticate))
}
