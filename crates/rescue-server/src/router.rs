//! Axum router construction for the dispatch API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// See [`handlers`] for the REST table and [`ws`] for the live channels.
/// CORS allows any origin so the console and field apps can be served from
/// their own hosts.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Live channels
        .route("/ws/dispatch", get(ws::ws_dispatch))
        .route("/ws/responder", get(ws::ws_responder))
        // Calls
        .route(
            "/api/calls",
            get(handlers::list_calls).post(handlers::create_call),
        )
        .route("/api/calls/{id}", get(handlers::get_call))
        .route("/api/calls/{id}/dispatch", post(handlers::dispatch_call))
        .route("/api/calls/{id}/status", patch(handlers::update_status))
        .route("/api/calls/{id}/cancel", post(handlers::cancel_call))
        .route("/api/snapshot", get(handlers::snapshot))
        // Fleet
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/vehicles/{id}", get(handlers::get_vehicle))
        .route(
            "/api/vehicles/{id}/availability",
            post(handlers::set_vehicle_availability),
        )
        .route(
            "/api/vehicles/{id}/position",
            post(handlers::report_position),
        )
        // Responders
        .route("/api/responders", get(handlers::list_responders))
        .route(
            "/api/responders/{id}/availability",
            post(handlers::set_responder_availability),
        )
        // Facilities
        .route("/api/facilities", get(handlers::list_facilities))
        .route("/api/facilities/{id}", get(handlers::get_facility))
        .route(
            "/api/facilities/{id}/capacity",
            post(handlers::update_capacity),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
