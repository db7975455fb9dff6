//! ShareSpace
//!
//! Anonymous peer-support feed with a personal journal and profile. The
//! library carries both halves: the REST server (authority and content API
//! over SQLite) and the client-side managers that talk to either that server
//! or an embedded store.

pub mod api;
pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod moderation;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use backend::LocalBackend;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<LocalBackend>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authority = state.backend.clone();

    // Routes that need a live bearer token
    let protected_routes = Router::new()
        .route("/auth/me", get(api::me))
        .route("/auth/logout", post(api::logout))
        .route("/posts", get(api::list_posts).post(api::create_post))
        .route("/posts/mine", get(api::list_my_posts))
        .route("/posts/{id}/kindness", post(api::send_kindness))
        .route(
            "/posts/{id}/comments",
            get(api::list_comments).post(api::create_comment),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(authority.clone(), req, next)
        }));

    let public_routes = Router::new()
        .route("/auth/login", post(api::login))
        .route("/auth/signup", post(api::signup))
        .route("/auth/session", post(api::exchange_session));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", protected_routes.merge(public_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
