//! Shared fixtures for the pipeline and scheduler tests.

#![allow(dead_code, clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tycoon_core::EngineConfig;
use tycoon_db::{
    BalanceDelta, CompanyQuestFilter, CompanyQuestUpdate, DbError, MemoryStore, PositionFilter,
    PositionUpdate, ResearchFilter, ResearchUpdate, SiteUpdate, Store,
};
use tycoon_types::{
    Alert, Company, CompanyId, CompanyQuest, CompanyQuestId, EnergyContract, Event, Position,
    PositionId, Quest, Research, ResearchId, Rig, RigId, RigStatus, Site, SiteId, TickSnapshot,
};
use uuid::Uuid;

/// Deterministic config: fixed seed, no events, no difficulty drift.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.seed = Some(42);
    config.events.probability = 0.0;
    config.market.difficulty_adjust_probability = 0.0;
    config
}

pub fn rig(site_id: SiteId, hashrate: f64, efficiency: f64, now: DateTime<Utc>) -> Rig {
    Rig {
        id: RigId::new(),
        site_id,
        model: "ANTMINER_S19".to_owned(),
        hashrate,
        efficiency,
        wear: 0.0,
        status: RigStatus::Active,
        created_at: now,
    }
}

/// A [`MemoryStore`] that can fail chosen writes, delay list calls and
/// record how many ticks read from it at once.
#[derive(Debug, Default)]
pub struct ProbeStore {
    pub inner: MemoryStore,
    pub fail_snapshots: AtomicBool,
    pub fail_site_writes: AtomicBool,
    pub list_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    company_reads: AtomicUsize,
}

impl ProbeStore {
    pub fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Highest number of overlapping `list_companies` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of `list_companies` calls so far.
    pub fn company_reads(&self) -> usize {
        self.company_reads.load(Ordering::SeqCst)
    }

    fn injected(entity: &'static str) -> DbError {
        DbError::Conflict {
            entity,
            id: Uuid::nil(),
            state: "injected failure".to_owned(),
        }
    }
}

#[async_trait]
impl Store for ProbeStore {
    async fn list_companies(&self) -> Result<Vec<Company>, DbError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.company_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.inner.list_companies().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, DbError> {
        self.inner.get_company(id).await
    }

    async fn create_company(&self, company: Company) -> Result<Company, DbError> {
        self.inner.create_company(company).await
    }

    async fn apply_balance_delta(
        &self,
        id: CompanyId,
        delta: BalanceDelta,
    ) -> Result<Company, DbError> {
        self.inner.apply_balance_delta(id, delta).await
    }

    async fn list_sites(&self, company_id: Option<CompanyId>) -> Result<Vec<Site>, DbError> {
        self.inner.list_sites(company_id).await
    }

    async fn create_site(&self, site: Site) -> Result<Site, DbError> {
        self.inner.create_site(site).await
    }

    async fn update_site(&self, id: SiteId, update: SiteUpdate) -> Result<(), DbError> {
        if self.fail_site_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("site"));
        }
        self.inner.update_site(id, update).await
    }

    async fn list_rigs(&self, site_id: Option<SiteId>) -> Result<Vec<Rig>, DbError> {
        self.inner.list_rigs(site_id).await
    }

    async fn create_rig(&self, rig: Rig) -> Result<Rig, DbError> {
        self.inner.create_rig(rig).await
    }

    async fn update_rig_wear(&self, id: RigId, wear: f64) -> Result<(), DbError> {
        self.inner.update_rig_wear(id, wear).await
    }

    async fn list_energy_contracts(
        &self,
        site_id: Option<SiteId>,
    ) -> Result<Vec<EnergyContract>, DbError> {
        self.inner.list_energy_contracts(site_id).await
    }

    async fn create_energy_contract(
        &self,
        contract: EnergyContract,
    ) -> Result<EnergyContract, DbError> {
        self.inner.create_energy_contract(contract).await
    }

    async fn list_positions(&self, filter: PositionFilter) -> Result<Vec<Position>, DbError> {
        self.inner.list_positions(filter).await
    }

    async fn get_position(&self, id: PositionId) -> Result<Option<Position>, DbError> {
        self.inner.get_position(id).await
    }

    async fn create_position(&self, position: Position) -> Result<Position, DbError> {
        self.inner.create_position(position).await
    }

    async fn update_position(
        &self,
        id: PositionId,
        update: PositionUpdate,
    ) -> Result<(), DbError> {
        self.inner.update_position(id, update).await
    }

    async fn list_research(&self, filter: ResearchFilter) -> Result<Vec<Research>, DbError> {
        self.inner.list_research(filter).await
    }

    async fn create_research(&self, research: Research) -> Result<Research, DbError> {
        self.inner.create_research(research).await
    }

    async fn update_research(
        &self,
        id: ResearchId,
        update: ResearchUpdate,
    ) -> Result<(), DbError> {
        self.inner.update_research(id, update).await
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, DbError> {
        self.inner.list_quests().await
    }

    async fn create_quest(&self, quest: Quest) -> Result<Quest, DbError> {
        self.inner.create_quest(quest).await
    }

    async fn list_company_quests(
        &self,
        filter: CompanyQuestFilter,
    ) -> Result<Vec<CompanyQuest>, DbError> {
        self.inner.list_company_quests(filter).await
    }

    async fn create_company_quest(
        &self,
        enrolment: CompanyQuest,
    ) -> Result<CompanyQuest, DbError> {
        self.inner.create_company_quest(enrolment).await
    }

    async fn update_company_quest(
        &self,
        id: CompanyQuestId,
        update: CompanyQuestUpdate,
    ) -> Result<(), DbError> {
        self.inner.update_company_quest(id, update).await
    }

    async fn create_alert(&self, alert: Alert) -> Result<Alert, DbError> {
        self.inner.create_alert(alert).await
    }

    async fn list_alerts(&self, company_id: CompanyId) -> Result<Vec<Alert>, DbError> {
        self.inner.list_alerts(company_id).await
    }

    async fn create_event(&self, event: Event) -> Result<Event, DbError> {
        self.inner.create_event(event).await
    }

    async fn list_recent_events(&self, limit: usize) -> Result<Vec<Event>, DbError> {
        self.inner.list_recent_events(limit).await
    }

    async fn append_tick_snapshot(&self, snapshot: &TickSnapshot) -> Result<(), DbError> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(Self::injected("tick_snapshot"));
        }
        self.inner.append_tick_snapshot(snapshot).await
    }

    async fn latest_tick_snapshot(&self) -> Result<Option<TickSnapshot>, DbError> {
        self.inner.latest_tick_snapshot().await
    }
}
