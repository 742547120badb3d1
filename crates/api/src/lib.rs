//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for payment records and the cash ledger (caja)
//! - Bearer-token authentication middleware
//! - The storage backend the routes run against

pub mod backend;
pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use campus_core::tuition::TuitionService;
use campus_shared::JwtService;

pub use backend::TuitionBackend;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Tuition operations over the configured backend.
    pub tuition: Arc<TuitionService<TuitionBackend>>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// Creates application state for a backend.
    #[must_use]
    pub fn new(backend: TuitionBackend, jwt_service: JwtService) -> Self {
        Self {
            tuition: Arc::new(TuitionService::new(Arc::new(backend))),
            jwt_service: Arc::new(jwt_service),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
