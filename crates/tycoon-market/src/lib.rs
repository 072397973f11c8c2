//! Shared market model for the Tycoon simulation.
//!
//! Everything here is a pure function of the previous state, a parameter
//! block and a caller-supplied random source. The scheduler owns the RNG,
//! which keeps a seeded run reproducible.
//!
//! # Modules
//!
//! - [`market`] -- BTC price walk, difficulty drift, network hashrate
//! - [`regions`] -- Per-region energy price, temperature and reliability
//! - [`events`] -- Low-probability narrative world events
//! - [`effects`] -- Hook for events to influence the model
//! - [`error`] -- Parameter validation errors

pub mod effects;
pub mod error;
pub mod events;
pub mod market;
pub mod regions;

pub use effects::{EffectModifier, NoEffects};
pub use error::MarketError;
pub use events::{EventParams, roll_event};
pub use market::{MarketParams, MarketSample, advance_market};
pub use regions::{RegionParams, advance_regional_data, regional_for};
