//! Stochastic world events.
//!
//! One independent draw per tick. On a hit, an event kind and a region are
//! chosen uniformly and the region's current data is captured in the event
//! payload. Events are observational only.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tycoon_types::{Event, EventId, EventKind, EventSeverity, Region, RegionalData};

use crate::error::{self, MarketError};

/// Tunables for the event generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventParams {
    /// Chance per tick that an event fires.
    pub probability: f64,
}

impl Default for EventParams {
    fn default() -> Self {
        Self { probability: 0.01 }
    }
}

impl EventParams {
    /// Rejects a probability outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), MarketError> {
        error::probability("events.probability", self.probability)
    }
}

/// Rolls for a world event on `tick_number`.
pub fn roll_event<R>(
    rng: &mut R,
    params: &EventParams,
    tick_number: u64,
    regional_data: &BTreeMap<Region, RegionalData>,
) -> Option<Event>
where
    R: Rng + ?Sized,
{
    if !rng.random_bool(params.probability) {
        return None;
    }
    let kind = *EventKind::ALL.choose(rng)?;
    let region = *Region::ALL.choose(rng)?;
    let label = kind.label();
    let payload = serde_json::json!({ "regionalData": regional_data.get(&region) });

    Some(Event {
        id: EventId::new(),
        kind,
        severity: EventSeverity::Medium,
        title: format!("{} in {region}", label.to_uppercase()),
        description: format!("A {label} event has occurred in {region}"),
        region,
        payload,
        tick_number,
        created_at: Utc::now(),
    })
}
