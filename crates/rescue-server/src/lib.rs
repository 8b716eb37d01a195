//! Dispatch API server for the Rescue engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for call intake, dispatch, status updates,
//!   cancellation, fleet and responder management, facility capacity, and
//!   snapshot reads
//! - **`WebSocket` live channels** for the dispatch audience
//!   (`/ws/dispatch`) and per-responder audiences (`/ws/responder`)
//!
//! # Architecture
//!
//! Handlers are thin: they resolve the caller's [`Actor`](auth::Actor)
//! from headers set by the upstream auth collaborator, check capability
//! once, and call the [`DispatchEngine`](rescue_core::DispatchEngine).
//! Live channels subscribe to the engine's fanout hub, send a snapshot,
//! then forward filtered events.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
