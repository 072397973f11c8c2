//! Error types for the persistence gateway.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the entity/id context the tick pipeline logs.

use tycoon_types::ParseEnumError;
use uuid::Uuid;

/// Errors that can occur in the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored enum column held an unknown value.
    #[error("Decode error: {0}")]
    Decode(#[from] ParseEnumError),

    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"position"`.
        entity: &'static str,
        /// Row id.
        id: Uuid,
    },

    /// The row exists but is in a state that forbids the write.
    #[error("{entity} {id} is {state}, update rejected")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// Row id.
        id: Uuid,
        /// Current state of the row.
        state: String,
    },

    /// A unique key would be duplicated.
    #[error("{entity} {key} already exists")]
    Duplicate {
        /// Entity kind.
        entity: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
