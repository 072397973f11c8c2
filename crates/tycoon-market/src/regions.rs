//! Per-region environmental sampling.
//!
//! Each region is sampled independently every tick:
//!
//! | Field        | Draw                                            |
//! |--------------|-------------------------------------------------|
//! | energy price | `max(floor, base + U(-noise/2, +noise/2))`      |
//! | temperature  | `U(temperature_min, temperature_max)`           |
//! | reliability  | `U(reliability_min, reliability_max)`           |

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tycoon_types::{Region, RegionalData};

use crate::effects::EffectModifier;
use crate::error::{self, MarketError};

/// Base price used when neither the region nor the default region is
/// configured.
pub const FALLBACK_BASE_PRICE: f64 = 0.08;

/// Tunables for regional sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionParams {
    /// Base energy price per region in USD per kWh.
    pub base_prices: BTreeMap<Region, f64>,
    /// Region whose base price stands in for an unconfigured region.
    pub default_region: Region,
    /// Total width of the uniform energy price noise.
    pub price_noise: f64,
    /// Lowest sampled energy price.
    pub price_floor: f64,
    /// Lowest sampled temperature.
    pub temperature_min: f64,
    /// Highest sampled temperature.
    pub temperature_max: f64,
    /// Lowest sampled reliability.
    pub reliability_min: f64,
    /// Highest sampled reliability.
    pub reliability_max: f64,
}

impl Default for RegionParams {
    fn default() -> Self {
        let base_prices = BTreeMap::from([
            (Region::UsWest, 0.08),
            (Region::UsEast, 0.10),
            (Region::Europe, 0.15),
            (Region::Asia, 0.06),
            (Region::SouthAmerica, 0.05),
        ]);
        Self {
            base_prices,
            default_region: Region::UsWest,
            price_noise: 0.02,
            price_floor: 0.03,
            temperature_min: 20.0,
            temperature_max: 35.0,
            reliability_min: 0.95,
            reliability_max: 1.0,
        }
    }
}

impl RegionParams {
    /// Base energy price for `region`, falling back to the default region.
    pub fn base_price(&self, region: Region) -> f64 {
        self.base_prices
            .get(&region)
            .or_else(|| self.base_prices.get(&self.default_region))
            .copied()
            .unwrap_or(FALLBACK_BASE_PRICE)
    }

    /// Rejects parameter blocks the sampler cannot run with.
    pub fn validate(&self) -> Result<(), MarketError> {
        for price in self.base_prices.values() {
            error::positive("regions.base_prices", *price)?;
        }
        error::non_negative("regions.price_noise", self.price_noise)?;
        error::positive("regions.price_floor", self.price_floor)?;
        error::range(
            "regions.temperature",
            self.temperature_min,
            self.temperature_max,
        )?;
        error::range(
            "regions.reliability",
            self.reliability_min,
            self.reliability_max,
        )?;
        error::probability("regions.reliability_min", self.reliability_min)?;
        error::probability("regions.reliability_max", self.reliability_max)
    }
}

/// Samples fresh environmental data for every region.
pub fn advance_regional_data<R, E>(
    rng: &mut R,
    params: &RegionParams,
    effects: &E,
) -> BTreeMap<Region, RegionalData>
where
    R: Rng + ?Sized,
    E: EffectModifier + ?Sized,
{
    Region::ALL
        .iter()
        .map(|&region| (region, sample_region(rng, params, effects, region)))
        .collect()
}

fn sample_region<R, E>(rng: &mut R, params: &RegionParams, effects: &E, region: Region) -> RegionalData
where
    R: Rng + ?Sized,
    E: EffectModifier + ?Sized,
{
    let half = params.price_noise / 2.0;
    let noise = if half > 0.0 {
        rng.random_range(-half..=half)
    } else {
        0.0
    };
    let energy_price =
        (params.base_price(region) + noise).max(params.price_floor) * effects.energy_price_factor(region);
    let temperature = rng.random_range(params.temperature_min..=params.temperature_max);
    let reliability = (rng.random_range(params.reliability_min..=params.reliability_max)
        * effects.reliability_factor(region))
    .clamp(0.0, 1.0);

    RegionalData {
        energy_price,
        temperature,
        reliability,
    }
}

/// Looks up a region's data, falling back to the default region.
pub fn regional_for<'a>(
    data: &'a BTreeMap<Region, RegionalData>,
    params: &RegionParams,
    region: Region,
) -> Option<&'a RegionalData> {
    data.get(&region).or_else(|| data.get(&params.default_region))
}
