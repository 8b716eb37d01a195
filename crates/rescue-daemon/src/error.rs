//! Error types for the dispatch daemon.

/// Top-level error for the daemon binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: rescue_core::config::ConfigError,
    },

    /// Registering a seeded resource failed.
    #[error("seed error: {source}")]
    Seed {
        /// The underlying dispatch error.
        #[from]
        source: rescue_core::DispatchError,
    },

    /// The API server failed to start or stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: rescue_server::ServerError,
    },
}
