//! In-process [`Store`] backed by ordered maps under a `tokio` lock.
//!
//! Used when no database is configured and by tests. Each call takes the
//! lock for the duration of that call only.
//!
//! Alerts, events and tick snapshots are append-only. Only the newest
//! entries of each are retained, so a long run holds bounded memory.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tycoon_types::{
    Alert, Company, CompanyId, CompanyQuest, CompanyQuestId, EnergyContract, Event, Position,
    PositionId, PositionStatus, Quest, QuestId, Research, ResearchId, ResearchStatus, Rig, RigId,
    Site, SiteId, TickSnapshot,
};

use crate::error::DbError;
use crate::store::{
    BalanceDelta, CompanyQuestFilter, CompanyQuestUpdate, PositionFilter, PositionUpdate,
    ResearchFilter, ResearchUpdate, SiteUpdate, Store,
};

/// Alerts and events kept by default.
pub const DEFAULT_LOG_RETENTION: usize = 10_000;

/// Tick snapshots kept by default. Only the latest is ever read back.
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 64;

/// Append-only log holding at most `limit` of the newest entries.
#[derive(Debug)]
struct RetainedLog<T> {
    entries: VecDeque<T>,
    limit: usize,
    appended: usize,
}

impl<T> RetainedLog<T> {
    fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            appended: 0,
        }
    }

    fn push(&mut self, entry: T) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.appended = self.appended.saturating_add(1);
    }

    fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.entries.iter()
    }
}

#[derive(Debug)]
struct Tables {
    companies: BTreeMap<CompanyId, Company>,
    sites: BTreeMap<SiteId, Site>,
    rigs: BTreeMap<RigId, Rig>,
    contracts: Vec<EnergyContract>,
    positions: BTreeMap<PositionId, Position>,
    research: BTreeMap<ResearchId, Research>,
    quests: BTreeMap<QuestId, Quest>,
    company_quests: BTreeMap<CompanyQuestId, CompanyQuest>,
    alerts: RetainedLog<Alert>,
    events: RetainedLog<Event>,
    snapshots: RetainedLog<TickSnapshot>,
}

impl Tables {
    fn new(log_retention: usize, snapshot_retention: usize) -> Self {
        Self {
            companies: BTreeMap::new(),
            sites: BTreeMap::new(),
            rigs: BTreeMap::new(),
            contracts: Vec::new(),
            positions: BTreeMap::new(),
            research: BTreeMap::new(),
            quests: BTreeMap::new(),
            company_quests: BTreeMap::new(),
            alerts: RetainedLog::new(log_retention),
            events: RetainedLog::new(log_retention),
            snapshots: RetainedLog::new(snapshot_retention),
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_RETENTION, DEFAULT_SNAPSHOT_RETENTION)
    }
}

/// A [`Store`] that lives in memory for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store keeping at most `log_retention` alerts and events
    /// and `snapshot_retention` tick snapshots.
    pub fn with_retention(log_retention: usize, snapshot_retention: usize) -> Self {
        Self {
            tables: RwLock::new(Tables::new(log_retention, snapshot_retention)),
        }
    }

    /// Number of tick snapshots appended so far, retained or not.
    pub async fn snapshot_count(&self) -> usize {
        self.tables.read().await.snapshots.appended
    }

    /// Retained world events in insertion order.
    pub async fn events(&self) -> Vec<Event> {
        self.tables.read().await.events.iter().cloned().collect()
    }
}

fn not_found(entity: &'static str, id: impl Into<uuid::Uuid>) -> DbError {
    DbError::NotFound {
        entity,
        id: id.into(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_companies(&self) -> Result<Vec<Company>, DbError> {
        Ok(self.tables.read().await.companies.values().cloned().collect())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, DbError> {
        Ok(self.tables.read().await.companies.get(&id).cloned())
    }

    async fn create_company(&self, company: Company) -> Result<Company, DbError> {
        self.tables
            .write()
            .await
            .companies
            .insert(company.id, company.clone());
        Ok(company)
    }

    async fn apply_balance_delta(
        &self,
        id: CompanyId,
        delta: BalanceDelta,
    ) -> Result<Company, DbError> {
        let mut tables = self.tables.write().await;
        let company = tables
            .companies
            .get_mut(&id)
            .ok_or_else(|| not_found("company", id))?;
        company.usd_balance += delta.usd;
        company.btc_balance += delta.btc;
        Ok(company.clone())
    }

    async fn list_sites(&self, company_id: Option<CompanyId>) -> Result<Vec<Site>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .sites
            .values()
            .filter(|s| company_id.is_none_or(|id| id == s.company_id))
            .cloned()
            .collect())
    }

    async fn create_site(&self, site: Site) -> Result<Site, DbError> {
        self.tables.write().await.sites.insert(site.id, site.clone());
        Ok(site)
    }

    async fn update_site(&self, id: SiteId, update: SiteUpdate) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let site = tables.sites.get_mut(&id).ok_or_else(|| not_found("site", id))?;
        site.total_hashrate = update.total_hashrate;
        site.power_usage = update.power_usage;
        site.uptime = update.uptime;
        Ok(())
    }

    async fn list_rigs(&self, site_id: Option<SiteId>) -> Result<Vec<Rig>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .rigs
            .values()
            .filter(|r| site_id.is_none_or(|id| id == r.site_id))
            .cloned()
            .collect())
    }

    async fn create_rig(&self, rig: Rig) -> Result<Rig, DbError> {
        self.tables.write().await.rigs.insert(rig.id, rig.clone());
        Ok(rig)
    }

    async fn update_rig_wear(&self, id: RigId, wear: f64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let rig = tables.rigs.get_mut(&id).ok_or_else(|| not_found("rig", id))?;
        rig.wear = wear;
        Ok(())
    }

    async fn list_energy_contracts(
        &self,
        site_id: Option<SiteId>,
    ) -> Result<Vec<EnergyContract>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .contracts
            .iter()
            .filter(|c| site_id.is_none_or(|id| id == c.site_id))
            .cloned()
            .collect())
    }

    async fn create_energy_contract(
        &self,
        contract: EnergyContract,
    ) -> Result<EnergyContract, DbError> {
        self.tables.write().await.contracts.push(contract.clone());
        Ok(contract)
    }

    async fn list_positions(&self, filter: PositionFilter) -> Result<Vec<Position>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .positions
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get_position(&self, id: PositionId) -> Result<Option<Position>, DbError> {
        Ok(self.tables.read().await.positions.get(&id).cloned())
    }

    async fn create_position(&self, position: Position) -> Result<Position, DbError> {
        self.tables
            .write()
            .await
            .positions
            .insert(position.id, position.clone());
        Ok(position)
    }

    async fn update_position(
        &self,
        id: PositionId,
        update: PositionUpdate,
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let position = tables
            .positions
            .get_mut(&id)
            .ok_or_else(|| not_found("position", id))?;
        if position.status != PositionStatus::Open {
            return Err(DbError::Conflict {
                entity: "position",
                id: id.into_inner(),
                state: position.status.to_string(),
            });
        }
        position.pnl = update.pnl;
        position.status = update.status;
        position.closed_at = update.closed_at;
        Ok(())
    }

    async fn list_research(&self, filter: ResearchFilter) -> Result<Vec<Research>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .research
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn create_research(&self, research: Research) -> Result<Research, DbError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .research
            .values()
            .any(|r| r.company_id == research.company_id && r.node_id == research.node_id);
        if duplicate {
            return Err(DbError::Duplicate {
                entity: "research",
                key: format!("{}/{}", research.company_id, research.node_id),
            });
        }
        tables.research.insert(research.id, research.clone());
        Ok(research)
    }

    async fn update_research(
        &self,
        id: ResearchId,
        update: ResearchUpdate,
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let research = tables
            .research
            .get_mut(&id)
            .ok_or_else(|| not_found("research", id))?;
        if research.status != ResearchStatus::InProgress {
            return Err(DbError::Conflict {
                entity: "research",
                id: id.into_inner(),
                state: research.status.to_string(),
            });
        }
        research.progress = update.progress;
        research.status = update.status;
        research.completed_at = update.completed_at;
        Ok(())
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, DbError> {
        Ok(self.tables.read().await.quests.values().cloned().collect())
    }

    async fn create_quest(&self, quest: Quest) -> Result<Quest, DbError> {
        self.tables
            .write()
            .await
            .quests
            .insert(quest.id, quest.clone());
        Ok(quest)
    }

    async fn list_company_quests(
        &self,
        filter: CompanyQuestFilter,
    ) -> Result<Vec<CompanyQuest>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .company_quests
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }

    async fn create_company_quest(
        &self,
        enrolment: CompanyQuest,
    ) -> Result<CompanyQuest, DbError> {
        self.tables
            .write()
            .await
            .company_quests
            .insert(enrolment.id, enrolment.clone());
        Ok(enrolment)
    }

    async fn update_company_quest(
        &self,
        id: CompanyQuestId,
        update: CompanyQuestUpdate,
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let enrolment = tables
            .company_quests
            .get_mut(&id)
            .ok_or_else(|| not_found("company_quest", id))?;
        enrolment.progress = update.progress;
        enrolment.status = update.status;
        Ok(())
    }

    async fn create_alert(&self, alert: Alert) -> Result<Alert, DbError> {
        self.tables.write().await.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn list_alerts(&self, company_id: CompanyId) -> Result<Vec<Alert>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .alerts
            .iter()
            .rev()
            .filter(|a| a.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: Event) -> Result<Event, DbError> {
        self.tables.write().await.events.push(event.clone());
        Ok(event)
    }

    async fn list_recent_events(&self, limit: usize) -> Result<Vec<Event>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_tick_snapshot(&self, snapshot: &TickSnapshot) -> Result<(), DbError> {
        self.tables.write().await.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn latest_tick_snapshot(&self) -> Result<Option<TickSnapshot>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .snapshots
            .iter()
            .max_by_key(|s| s.tick_number)
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::Utc;
    use tycoon_types::{AlertCategory, AlertType, PositionSide, Reputation, UserId};

    use super::*;

    fn company() -> Company {
        Company {
            id: CompanyId::new(),
            user_id: UserId::new(),
            name: "Blockworks".to_owned(),
            usd_balance: 5_000.0,
            btc_balance: 0.0,
            reputation: Reputation::default(),
            created_at: Utc::now(),
        }
    }

    fn open_position(company_id: CompanyId) -> Position {
        Position {
            id: PositionId::new(),
            company_id,
            instrument: "BTC_PERP".to_owned(),
            side: PositionSide::Long,
            quantity: 1.0,
            entry_price: 40_000.0,
            leverage: 5.0,
            margin: Some(8_000.0),
            liquidation_price: Some(33_600.0),
            status: PositionStatus::Open,
            pnl: 0.0,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[tokio::test]
    async fn balance_delta_is_additive() {
        let store = MemoryStore::new();
        let c = store.create_company(company()).await.unwrap();
        let after = store
            .apply_balance_delta(
                c.id,
                BalanceDelta {
                    usd: -250.0,
                    btc: 0.5,
                },
            )
            .await
            .unwrap();
        assert_eq!(after.usd_balance, 4_750.0);
        assert_eq!(after.btc_balance, 0.5);
    }

    #[tokio::test]
    async fn missing_company_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .apply_balance_delta(CompanyId::new(), BalanceDelta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { entity: "company", .. }));
    }

    #[tokio::test]
    async fn terminal_position_rejects_updates() {
        let store = MemoryStore::new();
        let p = store
            .create_position(open_position(CompanyId::new()))
            .await
            .unwrap();
        let liquidate = PositionUpdate {
            pnl: -8_000.0,
            status: PositionStatus::Liquidated,
            closed_at: Some(Utc::now()),
        };
        store.update_position(p.id, liquidate).await.unwrap();
        let again = store.update_position(p.id, liquidate).await.unwrap_err();
        assert!(matches!(again, DbError::Conflict { .. }));

        let stored = store.get_position(p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PositionStatus::Liquidated);
    }

    #[tokio::test]
    async fn position_filter_by_status() {
        let store = MemoryStore::new();
        let company_id = CompanyId::new();
        store.create_position(open_position(company_id)).await.unwrap();
        let mut closed = open_position(company_id);
        closed.status = PositionStatus::Closed;
        store.create_position(closed).await.unwrap();

        let open = store
            .list_positions(PositionFilter {
                status: Some(PositionStatus::Open),
                ..PositionFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn research_node_is_unique_per_company() {
        let store = MemoryStore::new();
        let row = Research {
            id: ResearchId::new(),
            company_id: CompanyId::new(),
            node_id: "asic_tuning".to_owned(),
            status: ResearchStatus::InProgress,
            progress: 0.0,
            started_at: Utc::now(),
            completed_at: None,
        };
        store.create_research(row.clone()).await.unwrap();
        let dup = Research {
            id: ResearchId::new(),
            ..row
        };
        assert!(matches!(
            store.create_research(dup).await,
            Err(DbError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn latest_snapshot_wins() {
        let store = MemoryStore::new();
        assert!(store.latest_tick_snapshot().await.unwrap().is_none());
        for tick in [3_u64, 9, 5] {
            let snapshot = TickSnapshot {
                tick_number: tick,
                btc_price: 40_000.0,
                difficulty: 1.0,
                network_hashrate: 1.0,
                regional_data: BTreeMap::new(),
                timestamp: Utc::now(),
            };
            store.append_tick_snapshot(&snapshot).await.unwrap();
        }
        let latest = store.latest_tick_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.tick_number, 9);
        assert_eq!(store.snapshot_count().await, 3);
    }

    #[tokio::test]
    async fn append_only_logs_keep_only_the_newest_entries() {
        let store = MemoryStore::with_retention(2, 2);
        let company_id = CompanyId::new();
        for n in 1..=3 {
            store
                .create_alert(Alert::new(
                    company_id,
                    AlertType::Info,
                    AlertCategory::System,
                    format!("alert {n}"),
                    serde_json::Value::Null,
                ))
                .await
                .unwrap();
        }
        for tick in 1..=3_u64 {
            let snapshot = TickSnapshot {
                tick_number: tick,
                btc_price: 40_000.0,
                difficulty: 1.0,
                network_hashrate: 1.0,
                regional_data: BTreeMap::new(),
                timestamp: Utc::now(),
            };
            store.append_tick_snapshot(&snapshot).await.unwrap();
        }

        let messages: Vec<_> = store
            .list_alerts(company_id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.message)
            .collect();
        assert_eq!(messages, ["alert 3", "alert 2"]);
        assert_eq!(store.snapshot_count().await, 3);
        assert_eq!(store.tables.read().await.snapshots.iter().count(), 2);
        let latest = store.latest_tick_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.tick_number, 3);
    }
}
