//! Tick clock, per-tick pipeline and scheduler for the Tycoon simulation.
//!
//! This crate owns the only writer of simulation state. Once per interval
//! the [`Scheduler`] runs the seven-stage [`run_tick`] pipeline: Market,
//! Mining, Positions, Research, Quests (throttled), Events and Snapshot.
//! Completed ticks go out through the [`TickPublisher`].
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter with checked arithmetic.
//! - [`config`] -- Configuration loading from `tycoon-config.yaml` into
//!   strongly-typed structs.
//! - [`state`] -- The single-writer [`SimulationState`].
//! - [`tick`] -- The tick pipeline.
//! - [`publisher`] -- Broadcast and watch channels carrying tick output.
//! - [`scheduler`] -- Fixed-cadence loop with start/stop and counters.
//! - [`seed`] -- Starter quest seeding and enrolment.
//!
//! [`Scheduler`]: scheduler::Scheduler
//! [`run_tick`]: tick::run_tick
//! [`TickPublisher`]: publisher::TickPublisher
//! [`SimulationState`]: state::SimulationState

pub mod clock;
pub mod config;
pub mod publisher;
pub mod scheduler;
pub mod seed;
pub mod state;
pub mod tick;

pub use config::EngineConfig;
pub use publisher::TickPublisher;
pub use scheduler::{Scheduler, SchedulerError, StatsSnapshot, TickStats};
pub use state::SimulationState;
pub use tick::{TickContext, TickError, TickReport, run_tick};
