//! Shared application state for the dispatch API server.

use std::sync::Arc;

use rescue_core::{DispatchEngine, FanoutHub};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Live
/// channels subscribe through the engine's fanout hub.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The dispatch engine.
    pub engine: Arc<DispatchEngine>,
}

impl AppState {
    /// Wrap an existing engine.
    pub const fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    /// State around an empty engine whose audiences buffer `capacity`
    /// events per member.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Arc::new(DispatchEngine::new(FanoutHub::new(capacity))))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(DispatchEngine::default()))
    }
}
