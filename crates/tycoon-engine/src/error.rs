//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tycoon_core::config::ConfigError,
    },

    /// Opening, migrating or seeding the store failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying store error.
        #[from]
        source: tycoon_db::DbError,
    },

    /// The tick scheduler could not start.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: tycoon_core::SchedulerError,
    },

    /// The broadcast hub failed to bind or serve.
    #[error("hub error: {source}")]
    Hub {
        /// The underlying hub error.
        #[from]
        source: tycoon_hub::HubError,
    },

    /// The token verifier could not be built or a token issued.
    #[error("auth error: {source}")]
    Auth {
        /// The underlying auth error.
        #[from]
        source: tycoon_hub::AuthError,
    },
}
