//! The persistence contract the tick engine depends on.
//!
//! Every method is a single independent operation. The pipeline may call
//! many of them concurrently within one stage; implementations must not
//! hold locks across calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tycoon_types::{
    Alert, Company, CompanyId, CompanyQuest, CompanyQuestId, EnergyContract, Event, Position,
    PositionId, PositionStatus, Quest, QuestStatus, Research, ResearchId, ResearchStatus, Rig,
    RigId, Site, SiteId, TickSnapshot,
};

use crate::error::DbError;

/// Additive change to a company's balances.
///
/// Applied atomically by the store so external writes between the engine's
/// read and its write are not overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BalanceDelta {
    /// Added to the USD balance (negative to debit).
    pub usd: f64,
    /// Added to the BTC balance (negative to debit).
    pub btc: f64,
}

/// Recomputed per-tick site fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteUpdate {
    /// Wear-adjusted hashrate of active rigs.
    pub total_hashrate: f64,
    /// Nameplate power draw of active rigs in kW.
    pub power_usage: f64,
    /// Uptime carried into the next tick.
    pub uptime: f64,
}

/// Mark or terminal transition of an open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    /// New pnl.
    pub pnl: f64,
    /// New status.
    pub status: PositionStatus,
    /// Set when `status` is terminal.
    pub closed_at: Option<DateTime<Utc>>,
}

/// Progress or completion of an in-progress research row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResearchUpdate {
    /// New progress.
    pub progress: f64,
    /// New status.
    pub status: ResearchStatus,
    /// Set on completion.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Re-measured quest progress.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyQuestUpdate {
    /// Measured value per requirement key.
    pub progress: BTreeMap<String, f64>,
    /// New status.
    pub status: QuestStatus,
}

/// Selects positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionFilter {
    /// Only this company's positions.
    pub company_id: Option<CompanyId>,
    /// Only positions in this status.
    pub status: Option<PositionStatus>,
}

/// Selects research rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResearchFilter {
    /// Only this company's rows.
    pub company_id: Option<CompanyId>,
    /// Only rows in this status.
    pub status: Option<ResearchStatus>,
}

/// Selects company quest enrolments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyQuestFilter {
    /// Only this company's enrolments.
    pub company_id: Option<CompanyId>,
    /// Only enrolments in this status.
    pub status: Option<QuestStatus>,
}

impl PositionFilter {
    /// Whether `position` passes the filter.
    pub fn matches(&self, position: &Position) -> bool {
        self.company_id.is_none_or(|id| id == position.company_id)
            && self.status.is_none_or(|s| s == position.status)
    }
}

impl ResearchFilter {
    /// Whether `research` passes the filter.
    pub fn matches(&self, research: &Research) -> bool {
        self.company_id.is_none_or(|id| id == research.company_id)
            && self.status.is_none_or(|s| s == research.status)
    }
}

impl CompanyQuestFilter {
    /// Whether `enrolment` passes the filter.
    pub fn matches(&self, enrolment: &CompanyQuest) -> bool {
        self.company_id.is_none_or(|id| id == enrolment.company_id)
            && self.status.is_none_or(|s| s == enrolment.status)
    }
}

/// Durable storage for every entity the engine reads or writes.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Companies ----------------------------------------------------------

    /// Every company.
    async fn list_companies(&self) -> Result<Vec<Company>, DbError>;

    /// One company by id.
    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, DbError>;

    /// Inserts a company.
    async fn create_company(&self, company: Company) -> Result<Company, DbError>;

    /// Atomically adds `delta` to a company's balances and returns the result.
    async fn apply_balance_delta(
        &self,
        id: CompanyId,
        delta: BalanceDelta,
    ) -> Result<Company, DbError>;

    // -- Mining -------------------------------------------------------------

    /// Sites, optionally restricted to one company.
    async fn list_sites(&self, company_id: Option<CompanyId>) -> Result<Vec<Site>, DbError>;

    /// Inserts a site.
    async fn create_site(&self, site: Site) -> Result<Site, DbError>;

    /// Writes a site's recomputed fields.
    async fn update_site(&self, id: SiteId, update: SiteUpdate) -> Result<(), DbError>;

    /// Rigs, optionally restricted to one site.
    async fn list_rigs(&self, site_id: Option<SiteId>) -> Result<Vec<Rig>, DbError>;

    /// Inserts a rig.
    async fn create_rig(&self, rig: Rig) -> Result<Rig, DbError>;

    /// Writes a rig's wear.
    async fn update_rig_wear(&self, id: RigId, wear: f64) -> Result<(), DbError>;

    /// Energy contracts, optionally restricted to one site.
    async fn list_energy_contracts(
        &self,
        site_id: Option<SiteId>,
    ) -> Result<Vec<EnergyContract>, DbError>;

    /// Inserts an energy contract.
    async fn create_energy_contract(
        &self,
        contract: EnergyContract,
    ) -> Result<EnergyContract, DbError>;

    // -- Trading ------------------------------------------------------------

    /// Positions matching `filter`.
    async fn list_positions(&self, filter: PositionFilter) -> Result<Vec<Position>, DbError>;

    /// One position by id.
    async fn get_position(&self, id: PositionId) -> Result<Option<Position>, DbError>;

    /// Inserts a position.
    async fn create_position(&self, position: Position) -> Result<Position, DbError>;

    /// Updates an `OPEN` position. Terminal positions are rejected with
    /// [`DbError::Conflict`].
    async fn update_position(&self, id: PositionId, update: PositionUpdate)
    -> Result<(), DbError>;

    // -- Research -----------------------------------------------------------

    /// Research rows matching `filter`.
    async fn list_research(&self, filter: ResearchFilter) -> Result<Vec<Research>, DbError>;

    /// Inserts a research row. `(company_id, node_id)` is unique.
    async fn create_research(&self, research: Research) -> Result<Research, DbError>;

    /// Updates an `IN_PROGRESS` row. Completed rows are rejected with
    /// [`DbError::Conflict`].
    async fn update_research(&self, id: ResearchId, update: ResearchUpdate)
    -> Result<(), DbError>;

    // -- Quests -------------------------------------------------------------

    /// Every quest definition.
    async fn list_quests(&self) -> Result<Vec<Quest>, DbError>;

    /// Inserts a quest definition.
    async fn create_quest(&self, quest: Quest) -> Result<Quest, DbError>;

    /// Enrolments matching `filter`.
    async fn list_company_quests(
        &self,
        filter: CompanyQuestFilter,
    ) -> Result<Vec<CompanyQuest>, DbError>;

    /// Inserts an enrolment.
    async fn create_company_quest(&self, enrolment: CompanyQuest)
    -> Result<CompanyQuest, DbError>;

    /// Writes re-measured progress and status.
    async fn update_company_quest(
        &self,
        id: CompanyQuestId,
        update: CompanyQuestUpdate,
    ) -> Result<(), DbError>;

    // -- Notifications ------------------------------------------------------

    /// Appends an alert.
    async fn create_alert(&self, alert: Alert) -> Result<Alert, DbError>;

    /// A company's alerts, newest first.
    async fn list_alerts(&self, company_id: CompanyId) -> Result<Vec<Alert>, DbError>;

    /// Appends a world event.
    async fn create_event(&self, event: Event) -> Result<Event, DbError>;

    /// The most recent world events, newest first.
    async fn list_recent_events(&self, limit: usize) -> Result<Vec<Event>, DbError>;

    // -- Tick snapshots -----------------------------------------------------

    /// Appends the snapshot of a completed tick.
    async fn append_tick_snapshot(&self, snapshot: &TickSnapshot) -> Result<(), DbError>;

    /// The snapshot with the highest tick number, if any.
    async fn latest_tick_snapshot(&self) -> Result<Option<TickSnapshot>, DbError>;
}
