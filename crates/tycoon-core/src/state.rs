//! The single-writer simulation state.
//!
//! [`SimulationState`] is owned by the scheduler's loop task and passed by
//! `&mut` into each tick. Nobody else holds it; the hub and HTTP handlers
//! see immutable [`TickState`] copies published after each tick.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tycoon_market::{EffectModifier, MarketParams, advance_regional_data};
use tycoon_types::{Region, RegionalData, TickSnapshot, TickState};

use crate::clock::{ClockError, TickClock};
use crate::config::EngineConfig;

/// Market state, tick counter and random source for one engine.
#[derive(Debug)]
pub struct SimulationState {
    /// Tick counter.
    pub clock: TickClock,
    /// State as of the last tick attempt.
    pub current: TickState,
    /// Random source for every stochastic stage.
    pub rng: StdRng,
}

impl SimulationState {
    /// A fresh market at the configured initial price and difficulty, with
    /// one regional sample so readers never see an empty region map.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroInterval`] for a zero tick interval.
    pub fn fresh<E>(
        config: &EngineConfig,
        effects: &E,
        now: DateTime<Utc>,
    ) -> Result<Self, ClockError>
    where
        E: EffectModifier + ?Sized,
    {
        let mut rng = rng_for(config.engine.seed);
        let regional_data = advance_regional_data(&mut rng, &config.regions, effects);
        Ok(Self {
            clock: TickClock::new(config.engine.tick_interval())?,
            current: initial_state(&config.market, regional_data, now),
            rng,
        })
    }

    /// Resume from a persisted snapshot. The next tick is
    /// `snapshot.tick_number + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroInterval`] for a zero tick interval.
    pub fn restore(config: &EngineConfig, snapshot: TickSnapshot) -> Result<Self, ClockError> {
        Ok(Self {
            clock: TickClock::resume(snapshot.tick_number, config.engine.tick_interval())?,
            current: snapshot.into(),
            rng: rng_for(config.engine.seed),
        })
    }

    /// Restore when a snapshot exists, otherwise start fresh.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroInterval`] for a zero tick interval.
    pub fn resume_or_fresh<E>(
        config: &EngineConfig,
        effects: &E,
        snapshot: Option<TickSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<Self, ClockError>
    where
        E: EffectModifier + ?Sized,
    {
        match snapshot {
            Some(snapshot) => Self::restore(config, snapshot),
            None => Self::fresh(config, effects, now),
        }
    }

    /// The record persisted for the current tick.
    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot::from(&self.current)
    }

    /// This tick's regional samples.
    pub const fn regional_data(&self) -> &BTreeMap<Region, RegionalData> {
        &self.current.regional_data
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn initial_state(
    market: &MarketParams,
    regional_data: BTreeMap<Region, RegionalData>,
    now: DateTime<Utc>,
) -> TickState {
    TickState {
        tick_number: 0,
        btc_price: market.initial_price,
        difficulty: market.initial_difficulty,
        network_hashrate: market.initial_network_hashrate,
        regional_data,
        timestamp: now,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use tycoon_market::NoEffects;

    use super::*;

    fn seeded() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.engine.seed = Some(11);
        config
    }

    #[test]
    fn fresh_state_uses_initial_market() {
        let state = SimulationState::fresh(&seeded(), &NoEffects, Utc::now()).unwrap();
        assert_eq!(state.clock.tick(), 0);
        assert_eq!(state.current.btc_price, 43_250.0);
        assert_eq!(state.current.network_hashrate, 450e6);
        assert_eq!(state.current.regional_data.len(), Region::ALL.len());
    }

    #[test]
    fn restore_keeps_snapshot_fields() {
        let snapshot = TickSnapshot {
            tick_number: 120,
            btc_price: 41_000.0,
            difficulty: 63e12,
            network_hashrate: 63e12 * 12_000.0,
            regional_data: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let mut state = SimulationState::restore(&seeded(), snapshot.clone()).unwrap();
        assert_eq!(state.snapshot(), snapshot);
        assert_eq!(state.clock.advance().unwrap(), 121);
    }

    #[test]
    fn resume_or_fresh_prefers_snapshot() {
        let snapshot = TickSnapshot {
            tick_number: 7,
            btc_price: 30_000.0,
            difficulty: 1e12,
            network_hashrate: 1.2e16,
            regional_data: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let state =
            SimulationState::resume_or_fresh(&seeded(), &NoEffects, Some(snapshot), Utc::now())
                .unwrap();
        assert_eq!(state.clock.tick(), 7);

        let state = SimulationState::resume_or_fresh(&seeded(), &NoEffects, None, Utc::now())
            .unwrap();
        assert_eq!(state.clock.tick(), 0);
    }
}
