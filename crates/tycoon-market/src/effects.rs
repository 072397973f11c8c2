//! Extension point for world events to feed back into the model.
//!
//! World events are recorded but do not change the market or mining math
//! today. An [`EffectModifier`] is consulted at every point where an event
//! could plausibly matter; [`NoEffects`] is the identity and is what the
//! scheduler wires in.

use tycoon_types::Region;

/// Multipliers applied on top of the sampled market and regional values.
///
/// Every method defaults to `1.0`, so an implementation only overrides the
/// factors it cares about.
pub trait EffectModifier: Send + Sync {
    /// Scales the width of this tick's price step.
    fn price_volatility(&self) -> f64 {
        1.0
    }

    /// Scales network difficulty after the drift is applied.
    fn difficulty_factor(&self) -> f64 {
        1.0
    }

    /// Scales a region's sampled energy price.
    fn energy_price_factor(&self, _region: Region) -> f64 {
        1.0
    }

    /// Scales a region's sampled grid reliability.
    fn reliability_factor(&self, _region: Region) -> f64 {
        1.0
    }
}

/// The identity modifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl EffectModifier for NoEffects {}
