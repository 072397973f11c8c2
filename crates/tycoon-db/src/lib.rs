//! Persistence gateway for the Tycoon simulation.
//!
//! The tick engine only needs get/list/create/update per entity plus an
//! append-only tick snapshot table. Those contracts are the [`Store`]
//! trait; two implementations ship here.
//!
//! ```text
//! Tick pipeline
//!     |
//!     +-- dyn Store
//!           |-- MemoryStore  (tokio RwLock, demo world, tests)
//!           +-- PgStore      (sqlx, PostgreSQL, migrations/)
//! ```
//!
//! Writes are not retried. A failed write surfaces as [`DbError`] and the
//! caller decides whether to skip the entity or fail the stage.
//!
//! # Modules
//!
//! - [`store`] -- The [`Store`] trait, filters and update payloads
//! - [`memory`] -- In-process store
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`pg_store`] -- [`Store`] over `PostgreSQL`
//! - [`demo`] -- Demo company for database-less runs
//! - [`error`] -- Shared error types

pub mod demo;
pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{
    BalanceDelta, CompanyQuestFilter, CompanyQuestUpdate, PositionFilter, PositionUpdate,
    ResearchFilter, ResearchUpdate, SiteUpdate, Store,
};
