//! Postwall HTTP API.
//!
//! Commands go through the command dispatcher into the event store; lookups
//! read the projected read model through the query dispatcher.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router with every route mounted under `/api/v1`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::posts::router())
        .merge(routes::post_lookup::router())
        .merge(routes::restore::router());

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
