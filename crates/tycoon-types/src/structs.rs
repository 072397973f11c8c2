//! Entity structs for the Tycoon simulation.
//!
//! Wire-facing structs serialize with `camelCase` field names so clients see
//! `tickNumber`, `btcPrice`, `usdBalance` and so on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    AlertCategory, AlertType, EventKind, EventSeverity, Faction, PositionSide, PositionStatus,
    QuestCategory, QuestStatus, QuestType, Region, ResearchStatus, RigStatus,
};
use crate::ids::{
    AlertId, CompanyId, CompanyQuestId, ContractId, EventId, PositionId, QuestId, ResearchId,
    RigId, SiteId, UserId,
};
use crate::quest::QuestRequirement;

// ---------------------------------------------------------------------------
// Shared market state
// ---------------------------------------------------------------------------

/// Environmental sample for one region, regenerated every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RegionalData {
    /// Spot energy price in USD per kWh.
    pub energy_price: f64,
    /// Ambient temperature in degrees Celsius.
    pub temperature: f64,
    /// Grid reliability in `[0, 1]`.
    pub reliability: f64,
}

/// The process-wide market state produced by one completed tick.
///
/// Exactly one writer (the scheduler) ever mutates a `TickState`; everyone
/// else receives immutable copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TickState {
    /// Monotonic tick counter.
    pub tick_number: u64,
    /// BTC price in USD. Never below the configured floor.
    pub btc_price: f64,
    /// Network difficulty.
    pub difficulty: f64,
    /// Network hashrate in TH/s, derived from difficulty.
    pub network_hashrate: f64,
    /// Per-region environmental data.
    pub regional_data: BTreeMap<Region, RegionalData>,
    /// Wall-clock time the tick was produced.
    pub timestamp: DateTime<Utc>,
}

/// Durable record of a completed tick, used to resume after restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSnapshot {
    /// Tick number the snapshot was taken at.
    pub tick_number: u64,
    /// BTC price at that tick.
    pub btc_price: f64,
    /// Difficulty at that tick.
    pub difficulty: f64,
    /// Network hashrate at that tick.
    pub network_hashrate: f64,
    /// Regional data at that tick.
    pub regional_data: BTreeMap<Region, RegionalData>,
    /// Time the tick was produced.
    pub timestamp: DateTime<Utc>,
}

impl From<&TickState> for TickSnapshot {
    fn from(state: &TickState) -> Self {
        Self {
            tick_number: state.tick_number,
            btc_price: state.btc_price,
            difficulty: state.difficulty,
            network_hashrate: state.network_hashrate,
            regional_data: state.regional_data.clone(),
            timestamp: state.timestamp,
        }
    }
}

impl From<TickSnapshot> for TickState {
    fn from(snapshot: TickSnapshot) -> Self {
        Self {
            tick_number: snapshot.tick_number,
            btc_price: snapshot.btc_price,
            difficulty: snapshot.difficulty,
            network_hashrate: snapshot.network_hashrate,
            regional_data: snapshot.regional_data,
            timestamp: snapshot.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

/// Reputation with each faction, each bounded to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Reputation {
    /// Standing with the mining guild.
    pub miners: f64,
    /// Standing with trading desks.
    pub traders: f64,
    /// Standing with regulators.
    pub regulators: f64,
    /// Standing with anarchists.
    pub anarchists: f64,
}

impl Reputation {
    /// Upper bound of every score.
    pub const MAX: f64 = 100.0;

    /// Score for a single faction.
    pub const fn get(&self, faction: Faction) -> f64 {
        match faction {
            Faction::Miners => self.miners,
            Faction::Traders => self.traders,
            Faction::Regulators => self.regulators,
            Faction::Anarchists => self.anarchists,
        }
    }

    /// Highest score across all factions.
    pub fn max(&self) -> f64 {
        self.miners
            .max(self.traders)
            .max(self.regulators)
            .max(self.anarchists)
    }

    /// Adds `amount` to a faction's score, clamped to `[0, 100]`.
    pub fn adjust(&mut self, faction: Faction, amount: f64) {
        let slot = match faction {
            Faction::Miners => &mut self.miners,
            Faction::Traders => &mut self.traders,
            Faction::Regulators => &mut self.regulators,
            Faction::Anarchists => &mut self.anarchists,
        };
        *slot = (*slot + amount).clamp(0.0, Self::MAX);
    }
}

impl Default for Reputation {
    fn default() -> Self {
        Self {
            miners: 50.0,
            traders: 50.0,
            regulators: 50.0,
            anarchists: 50.0,
        }
    }
}

/// A player-owned company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Company {
    /// Unique identifier.
    pub id: CompanyId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Cash balance in USD.
    pub usd_balance: f64,
    /// BTC holdings.
    pub btc_balance: f64,
    /// Faction standings.
    pub reputation: Reputation,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Balance/reputation push sent to a company's live connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CompanyUpdate {
    /// Company the update concerns.
    pub company_id: CompanyId,
    /// Tick that produced the update.
    pub tick_number: u64,
    /// Balances after the tick.
    pub balances: Balances,
    /// Reputation after the tick.
    pub reputation: Reputation,
}

/// A company's two balances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Balances {
    /// Cash balance in USD.
    pub usd: f64,
    /// BTC holdings.
    pub btc: f64,
}

impl CompanyUpdate {
    /// The update describing `company` as it stands after `tick_number`.
    pub const fn from_company(company: &Company, tick_number: u64) -> Self {
        Self {
            company_id: company.id,
            tick_number,
            balances: Balances {
                usd: company.usd_balance,
                btc: company.btc_balance,
            },
            reputation: company.reputation,
        }
    }
}

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// A mining facility in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Site {
    /// Unique identifier.
    pub id: SiteId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Display name.
    pub name: String,
    /// Region the site draws power in.
    pub region: Region,
    /// Percentage of the tick the site was online, `[90, 100]`.
    pub uptime: f64,
    /// Effective hashrate in TH/s, recomputed every tick.
    pub total_hashrate: f64,
    /// Power draw in kW, recomputed every tick.
    pub power_usage: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A single mining machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Rig {
    /// Unique identifier.
    pub id: RigId,
    /// Site the rig is racked in.
    pub site_id: SiteId,
    /// Hardware model name.
    pub model: String,
    /// Nameplate hashrate in TH/s.
    pub hashrate: f64,
    /// Energy efficiency in J/TH.
    pub efficiency: f64,
    /// Accumulated wear, `[0, 100]`.
    pub wear: f64,
    /// Operational status.
    pub status: RigStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A fixed-price power agreement for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EnergyContract {
    /// Unique identifier.
    pub id: ContractId,
    /// Site the contract supplies.
    pub site_id: SiteId,
    /// Contracted price in USD per kWh.
    pub price_per_kwh: f64,
    /// Start of the contract window (inclusive).
    pub starts_at: DateTime<Utc>,
    /// End of the contract window (exclusive).
    pub ends_at: DateTime<Utc>,
}

impl EnergyContract {
    /// Whether `at` falls inside `[starts_at, ends_at)`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

/// A trade or leveraged position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Unique identifier.
    pub id: PositionId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Traded instrument, e.g. `BTC-PERP`.
    pub instrument: String,
    /// Direction.
    pub side: PositionSide,
    /// Size in BTC.
    pub quantity: f64,
    /// Fill price in USD.
    pub entry_price: f64,
    /// Leverage multiplier. `1.0` for spot.
    pub leverage: f64,
    /// Collateral locked at open, if leveraged.
    pub margin: Option<f64>,
    /// Forced-close threshold fixed at open, if leveraged.
    pub liquidation_price: Option<f64>,
    /// Lifecycle state.
    pub status: PositionStatus,
    /// Realized or mark-to-market profit and loss in USD.
    pub pnl: f64,
    /// Open time.
    pub opened_at: DateTime<Utc>,
    /// Time the position reached a terminal state.
    pub closed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// A company's progress on one research node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Research {
    /// Unique identifier.
    pub id: ResearchId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Research tree node key. Unique per company.
    pub node_id: String,
    /// Lifecycle state.
    pub status: ResearchStatus,
    /// Progress in `[0, 100]`.
    pub progress: f64,
    /// Time research began.
    pub started_at: DateTime<Utc>,
    /// Time research completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Rewards granted when a completed quest is claimed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct QuestRewards {
    /// USD credited.
    #[serde(default)]
    pub usd: f64,
    /// BTC credited.
    #[serde(default)]
    pub btc: f64,
    /// Reputation gained per faction.
    #[serde(default)]
    pub reputation: BTreeMap<Faction, f64>,
    /// Research points granted.
    #[serde(default)]
    pub research_points: f64,
}

/// A quest definition shared by all companies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Quest {
    /// Unique identifier.
    pub id: QuestId,
    /// Display title.
    pub title: String,
    /// Flavour text.
    pub description: String,
    /// Cadence class.
    pub quest_type: QuestType,
    /// Thematic category.
    pub category: QuestCategory,
    /// Every requirement must hold at once for completion.
    pub requirements: Vec<QuestRequirement>,
    /// Rewards paid on claim.
    pub rewards: QuestRewards,
    /// Start of the availability window for timed quests.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the availability window for timed quests.
    pub ends_at: Option<DateTime<Utc>>,
}

/// A company's enrolment in a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CompanyQuest {
    /// Unique identifier.
    pub id: CompanyQuestId,
    /// Enrolled company.
    pub company_id: CompanyId,
    /// Quest definition.
    pub quest_id: QuestId,
    /// Lifecycle state.
    pub status: QuestStatus,
    /// Last measured value per requirement key.
    pub progress: BTreeMap<String, f64>,
    /// Enrolment time.
    pub started_at: DateTime<Utc>,
    /// Set when the reward is claimed, not when requirements are met.
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// An append-only notification for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Alert {
    /// Unique identifier.
    pub id: AlertId,
    /// Recipient company.
    pub company_id: CompanyId,
    /// Severity.
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Originating subsystem.
    pub category: AlertCategory,
    /// Human-readable text.
    pub message: String,
    /// Structured context.
    pub data: serde_json::Value,
    /// Whether the player dismissed it.
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Builds an unread alert stamped with the current time.
    pub fn new(
        company_id: CompanyId,
        alert_type: AlertType,
        category: AlertCategory,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: AlertId::new(),
            company_id,
            alert_type,
            category,
            message: message.into(),
            data,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// An append-only world event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Catalog entry.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Impact grade.
    pub severity: EventSeverity,
    /// Short headline.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Affected region.
    pub region: Region,
    /// Snapshot of the region's data when the event fired.
    pub payload: serde_json::Value,
    /// Tick the event fired on.
    pub tick_number: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn tick_state_uses_camel_case() {
        let state = TickState {
            tick_number: 7,
            btc_price: 43_250.0,
            difficulty: 62.5e12,
            network_hashrate: 450e6,
            regional_data: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["tickNumber"], 7);
        assert!(json.get("btcPrice").is_some());
        assert!(json.get("regionalData").is_some());
    }

    #[test]
    fn snapshot_round_trips_state() {
        let mut regional = BTreeMap::new();
        regional.insert(
            Region::Asia,
            RegionalData {
                energy_price: 0.06,
                temperature: 25.0,
                reliability: 0.97,
            },
        );
        let state = TickState {
            tick_number: 42,
            btc_price: 41_000.0,
            difficulty: 63e12,
            network_hashrate: 756e6,
            regional_data: regional,
            timestamp: Utc::now(),
        };
        let restored = TickState::from(TickSnapshot::from(&state));
        assert_eq!(restored, state);
    }

    #[test]
    fn reputation_adjust_is_clamped() {
        let mut rep = Reputation::default();
        rep.adjust(Faction::Traders, 80.0);
        assert_eq!(rep.traders, 100.0);
        rep.adjust(Faction::Miners, -75.0);
        assert_eq!(rep.miners, 0.0);
        assert_eq!(rep.max(), 100.0);
        assert_eq!(rep.get(Faction::Regulators), 50.0);
    }

    #[test]
    fn contract_window_is_half_open() {
        let start = Utc::now();
        let contract = EnergyContract {
            id: ContractId::new(),
            site_id: SiteId::new(),
            price_per_kwh: 0.05,
            starts_at: start,
            ends_at: start + Duration::days(30),
        };
        assert!(contract.is_active_at(start));
        assert!(contract.is_active_at(start + Duration::days(1)));
        assert!(!contract.is_active_at(start + Duration::days(30)));
        assert!(!contract.is_active_at(start - Duration::seconds(1)));
    }

    #[test]
    fn alert_type_field_is_renamed() {
        let alert = Alert::new(
            CompanyId::new(),
            AlertType::Warning,
            AlertCategory::System,
            "Low USD balance",
            serde_json::json!({ "balance": 900.0 }),
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "WARNING");
        assert_eq!(json["category"], "SYSTEM");
        assert_eq!(json["read"], false);
    }
}
