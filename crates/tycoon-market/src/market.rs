//! BTC price, difficulty and network hashrate.
//!
//! # Model
//!
//! - Price is a bounded random walk: `max(floor, prev + U(-max_step, +max_step))`.
//! - Difficulty drifts rarely. With probability `difficulty_adjust_probability`
//!   it is multiplied by `1 + (u - difficulty_bias) * difficulty_max_change`
//!   for `u ~ U(0, 1)`. A bias below `0.5` tilts the drift upward.
//! - Network hashrate is `difficulty * hashrate_per_difficulty`, independent
//!   of any company's mining.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::effects::EffectModifier;
use crate::error::{self, MarketError};

/// Tunables for the shared market.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParams {
    /// BTC price on a fresh start.
    pub initial_price: f64,
    /// Lowest price the walk may reach.
    pub price_floor: f64,
    /// Half-width of the uniform per-tick price step.
    pub max_step: f64,
    /// Difficulty on a fresh start.
    pub initial_difficulty: f64,
    /// Network hashrate on a fresh start, before the first tick derives it.
    pub initial_network_hashrate: f64,
    /// Chance per tick that difficulty moves.
    pub difficulty_adjust_probability: f64,
    /// Scale of a difficulty move.
    pub difficulty_max_change: f64,
    /// Centre of the difficulty draw.
    pub difficulty_bias: f64,
    /// TH/s of network hashrate per unit of difficulty.
    pub hashrate_per_difficulty: f64,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            initial_price: 43_250.0,
            price_floor: 10_000.0,
            max_step: 100.0,
            initial_difficulty: 62.5e12,
            initial_network_hashrate: 450e6,
            difficulty_adjust_probability: 0.01,
            difficulty_max_change: 0.05,
            difficulty_bias: 0.48,
            hashrate_per_difficulty: 7.2e6 / 600.0,
        }
    }
}

impl MarketParams {
    /// Rejects parameter blocks the model cannot run with.
    pub fn validate(&self) -> Result<(), MarketError> {
        error::positive("market.initial_price", self.initial_price)?;
        error::positive("market.price_floor", self.price_floor)?;
        error::non_negative("market.max_step", self.max_step)?;
        error::positive("market.initial_difficulty", self.initial_difficulty)?;
        error::positive(
            "market.initial_network_hashrate",
            self.initial_network_hashrate,
        )?;
        error::probability(
            "market.difficulty_adjust_probability",
            self.difficulty_adjust_probability,
        )?;
        error::non_negative("market.difficulty_max_change", self.difficulty_max_change)?;
        error::probability("market.difficulty_bias", self.difficulty_bias)?;
        error::positive(
            "market.hashrate_per_difficulty",
            self.hashrate_per_difficulty,
        )
    }
}

/// The market fields produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSample {
    /// New BTC price.
    pub btc_price: f64,
    /// New difficulty.
    pub difficulty: f64,
    /// New network hashrate.
    pub network_hashrate: f64,
}

/// Produces the next market sample from the previous price and difficulty.
pub fn advance_market<R, E>(
    rng: &mut R,
    params: &MarketParams,
    effects: &E,
    prev_price: f64,
    prev_difficulty: f64,
) -> MarketSample
where
    R: Rng + ?Sized,
    E: EffectModifier + ?Sized,
{
    let step = (params.max_step * effects.price_volatility()).abs();
    let delta = if step > 0.0 {
        rng.random_range(-step..=step)
    } else {
        0.0
    };
    let btc_price = (prev_price + delta).max(params.price_floor);

    let mut difficulty = prev_difficulty;
    if rng.random_bool(params.difficulty_adjust_probability) {
        let change = (rng.random::<f64>() - params.difficulty_bias) * params.difficulty_max_change;
        difficulty *= 1.0 + change;
    }
    difficulty *= effects.difficulty_factor();

    MarketSample {
        btc_price,
        difficulty,
        network_hashrate: network_hashrate(params, difficulty),
    }
}

/// Network hashrate implied by `difficulty`.
pub fn network_hashrate(params: &MarketParams, difficulty: f64) -> f64 {
    difficulty * params.hashrate_per_difficulty
}
