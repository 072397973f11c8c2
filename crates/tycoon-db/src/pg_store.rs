//! [`Store`] over `PostgreSQL`.
//!
//! Enum columns are TEXT holding the wire names; JSON-shaped fields
//! (quest requirements, rewards, progress, alert data, event payloads,
//! regional data) are JSONB. Optional filters are expressed as
//! `($n IS NULL OR column = $n)` so each query has one fixed shape.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tycoon_types::{
    Alert, Company, CompanyId, CompanyQuest, CompanyQuestId, EnergyContract, Event, Position,
    PositionId, Quest, QuestRequirement, QuestRewards, Region, RegionalData, Reputation,
    Research, ResearchId, Rig, RigId, Site, SiteId, TickSnapshot,
};
use uuid::Uuid;

use crate::error::DbError;
use crate::store::{
    BalanceDelta, CompanyQuestFilter, CompanyQuestUpdate, PositionFilter, PositionUpdate,
    ResearchFilter, ResearchUpdate, SiteUpdate, Store,
};

/// Entity access over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return a reference to the underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn tick_to_db(tick: u64) -> i64 {
    i64::try_from(tick).unwrap_or(i64::MAX)
}

fn tick_from_db(tick: i64) -> u64 {
    u64::try_from(tick).unwrap_or(0)
}

/// Turns "no row touched" into [`DbError::NotFound`] or, when the row
/// exists in a guarded state, [`DbError::Conflict`].
async fn explain_miss(
    pool: &PgPool,
    table_query: &str,
    entity: &'static str,
    id: Uuid,
) -> DbError {
    let state: Result<Option<String>, sqlx::Error> = sqlx::query_scalar(table_query)
        .bind(id)
        .fetch_optional(pool)
        .await;
    match state {
        Ok(Some(state)) => DbError::Conflict { entity, id, state },
        Ok(None) => DbError::NotFound { entity, id },
        Err(e) => DbError::Postgres(e),
    }
}

// =============================================================================
// Rows
// =============================================================================

/// A row from the `companies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    usd_balance: f64,
    btc_balance: f64,
    rep_miners: f64,
    rep_traders: f64,
    rep_regulators: f64,
    rep_anarchists: f64,
    created_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            name: row.name,
            usd_balance: row.usd_balance,
            btc_balance: row.btc_balance,
            reputation: Reputation {
                miners: row.rep_miners,
                traders: row.rep_traders,
                regulators: row.rep_regulators,
                anarchists: row.rep_anarchists,
            },
            created_at: row.created_at,
        }
    }
}

const COMPANY_COLUMNS: &str = "id, user_id, name, usd_balance, btc_balance, rep_miners, \
     rep_traders, rep_regulators, rep_anarchists, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct SiteRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    region: String,
    uptime: f64,
    total_hashrate: f64,
    power_usage: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<SiteRow> for Site {
    type Error = DbError;

    fn try_from(row: SiteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            company_id: row.company_id.into(),
            name: row.name,
            region: row.region.parse()?,
            uptime: row.uptime,
            total_hashrate: row.total_hashrate,
            power_usage: row.power_usage,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RigRow {
    id: Uuid,
    site_id: Uuid,
    model: String,
    hashrate: f64,
    efficiency: f64,
    wear: f64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RigRow> for Rig {
    type Error = DbError;

    fn try_from(row: RigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            site_id: row.site_id.into(),
            model: row.model,
            hashrate: row.hashrate,
            efficiency: row.efficiency,
            wear: row.wear,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ContractRow {
    id: Uuid,
    site_id: Uuid,
    price_per_kwh: f64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl From<ContractRow> for EnergyContract {
    fn from(row: ContractRow) -> Self {
        Self {
            id: row.id.into(),
            site_id: row.site_id.into(),
            price_per_kwh: row.price_per_kwh,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PositionRow {
    id: Uuid,
    company_id: Uuid,
    instrument: String,
    side: String,
    quantity: f64,
    entry_price: f64,
    leverage: f64,
    margin: Option<f64>,
    liquidation_price: Option<f64>,
    status: String,
    pnl: f64,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PositionRow> for Position {
    type Error = DbError;

    fn try_from(row: PositionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            company_id: row.company_id.into(),
            instrument: row.instrument,
            side: row.side.parse()?,
            quantity: row.quantity,
            entry_price: row.entry_price,
            leverage: row.leverage,
            margin: row.margin,
            liquidation_price: row.liquidation_price,
            status: row.status.parse()?,
            pnl: row.pnl,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
        })
    }
}

const POSITION_COLUMNS: &str = "id, company_id, instrument, side, quantity, entry_price, \
     leverage, margin, liquidation_price, status, pnl, opened_at, closed_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct ResearchRow {
    id: Uuid,
    company_id: Uuid,
    node_id: String,
    status: String,
    progress: f64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ResearchRow> for Research {
    type Error = DbError;

    fn try_from(row: ResearchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            company_id: row.company_id.into(),
            node_id: row.node_id,
            status: row.status.parse()?,
            progress: row.progress,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct QuestRow {
    id: Uuid,
    title: String,
    description: String,
    quest_type: String,
    category: String,
    requirements: Json<Vec<QuestRequirement>>,
    rewards: Json<QuestRewards>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuestRow> for Quest {
    type Error = DbError;

    fn try_from(row: QuestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            quest_type: row.quest_type.parse()?,
            category: row.category.parse()?,
            requirements: row.requirements.0,
            rewards: row.rewards.0,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CompanyQuestRow {
    id: Uuid,
    company_id: Uuid,
    quest_id: Uuid,
    status: String,
    progress: Json<BTreeMap<String, f64>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<CompanyQuestRow> for CompanyQuest {
    type Error = DbError;

    fn try_from(row: CompanyQuestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            company_id: row.company_id.into(),
            quest_id: row.quest_id.into(),
            status: row.status.parse()?,
            progress: row.progress.0,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    company_id: Uuid,
    alert_type: String,
    category: String,
    message: String,
    data: serde_json::Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = DbError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            company_id: row.company_id.into(),
            alert_type: row.alert_type.parse()?,
            category: row.category.parse()?,
            message: row.message,
            data: row.data,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    kind: String,
    severity: String,
    title: String,
    description: String,
    region: String,
    payload: serde_json::Value,
    tick_number: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            kind: row.kind.parse()?,
            severity: row.severity.parse()?,
            title: row.title,
            description: row.description,
            region: row.region.parse()?,
            payload: row.payload,
            tick_number: tick_from_db(row.tick_number),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SnapshotRow {
    tick_number: i64,
    btc_price: f64,
    difficulty: f64,
    network_hashrate: f64,
    regional_data: Json<BTreeMap<Region, RegionalData>>,
    timestamp: DateTime<Utc>,
}

impl From<SnapshotRow> for TickSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            tick_number: tick_from_db(row.tick_number),
            btc_price: row.btc_price,
            difficulty: row.difficulty,
            network_hashrate: row.network_hashrate,
            regional_data: row.regional_data.0,
            timestamp: row.timestamp,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DbError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn list_companies(&self) -> Result<Vec<Company>, DbError> {
        let rows = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, DbError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Company::from))
    }

    async fn create_company(&self, company: Company) -> Result<Company, DbError> {
        sqlx::query(
            r"INSERT INTO companies
              (id, user_id, name, usd_balance, btc_balance, rep_miners, rep_traders,
               rep_regulators, rep_anarchists, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(company.id.into_inner())
        .bind(company.user_id.into_inner())
        .bind(&company.name)
        .bind(company.usd_balance)
        .bind(company.btc_balance)
        .bind(company.reputation.miners)
        .bind(company.reputation.traders)
        .bind(company.reputation.regulators)
        .bind(company.reputation.anarchists)
        .bind(company.created_at)
        .execute(&self.pool)
        .await?;
        Ok(company)
    }

    async fn apply_balance_delta(
        &self,
        id: CompanyId,
        delta: BalanceDelta,
    ) -> Result<Company, DbError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "UPDATE companies
             SET usd_balance = usd_balance + $2, btc_balance = btc_balance + $3
             WHERE id = $1
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id.into_inner())
        .bind(delta.usd)
        .bind(delta.btc)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Company::from).ok_or(DbError::NotFound {
            entity: "company",
            id: id.into_inner(),
        })
    }

    async fn list_sites(&self, company_id: Option<CompanyId>) -> Result<Vec<Site>, DbError> {
        let rows = sqlx::query_as::<_, SiteRow>(
            r"SELECT id, company_id, name, region, uptime, total_hashrate, power_usage, created_at
              FROM sites
              WHERE ($1::uuid IS NULL OR company_id = $1)
              ORDER BY created_at",
        )
        .bind(company_id.map(CompanyId::into_inner))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_site(&self, site: Site) -> Result<Site, DbError> {
        sqlx::query(
            r"INSERT INTO sites
              (id, company_id, name, region, uptime, total_hashrate, power_usage, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(site.id.into_inner())
        .bind(site.company_id.into_inner())
        .bind(&site.name)
        .bind(site.region.as_str())
        .bind(site.uptime)
        .bind(site.total_hashrate)
        .bind(site.power_usage)
        .bind(site.created_at)
        .execute(&self.pool)
        .await?;
        Ok(site)
    }

    async fn update_site(&self, id: SiteId, update: SiteUpdate) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE sites SET total_hashrate = $2, power_usage = $3, uptime = $4 WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(update.total_hashrate)
        .bind(update.power_usage)
        .bind(update.uptime)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "site",
                id: id.into_inner(),
            });
        }
        Ok(())
    }

    async fn list_rigs(&self, site_id: Option<SiteId>) -> Result<Vec<Rig>, DbError> {
        let rows = sqlx::query_as::<_, RigRow>(
            r"SELECT id, site_id, model, hashrate, efficiency, wear, status, created_at
              FROM rigs
              WHERE ($1::uuid IS NULL OR site_id = $1)
              ORDER BY created_at",
        )
        .bind(site_id.map(SiteId::into_inner))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_rig(&self, rig: Rig) -> Result<Rig, DbError> {
        sqlx::query(
            r"INSERT INTO rigs
              (id, site_id, model, hashrate, efficiency, wear, status, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(rig.id.into_inner())
        .bind(rig.site_id.into_inner())
        .bind(&rig.model)
        .bind(rig.hashrate)
        .bind(rig.efficiency)
        .bind(rig.wear)
        .bind(rig.status.as_str())
        .bind(rig.created_at)
        .execute(&self.pool)
        .await?;
        Ok(rig)
    }

    async fn update_rig_wear(&self, id: RigId, wear: f64) -> Result<(), DbError> {
        let result = sqlx::query(r"UPDATE rigs SET wear = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(wear)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "rig",
                id: id.into_inner(),
            });
        }
        Ok(())
    }

    async fn list_energy_contracts(
        &self,
        site_id: Option<SiteId>,
    ) -> Result<Vec<EnergyContract>, DbError> {
        let rows = sqlx::query_as::<_, ContractRow>(
            r"SELECT id, site_id, price_per_kwh, starts_at, ends_at
              FROM energy_contracts
              WHERE ($1::uuid IS NULL OR site_id = $1)
              ORDER BY starts_at",
        )
        .bind(site_id.map(SiteId::into_inner))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EnergyContract::from).collect())
    }

    async fn create_energy_contract(
        &self,
        contract: EnergyContract,
    ) -> Result<EnergyContract, DbError> {
        sqlx::query(
            r"INSERT INTO energy_contracts (id, site_id, price_per_kwh, starts_at, ends_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(contract.id.into_inner())
        .bind(contract.site_id.into_inner())
        .bind(contract.price_per_kwh)
        .bind(contract.starts_at)
        .bind(contract.ends_at)
        .execute(&self.pool)
        .await?;
        Ok(contract)
    }

    async fn list_positions(&self, filter: PositionFilter) -> Result<Vec<Position>, DbError> {
        let rows = sqlx::query_as::<_, PositionRow>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions
             WHERE ($1::uuid IS NULL OR company_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY opened_at"
        ))
        .bind(filter.company_id.map(CompanyId::into_inner))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn get_position(&self, id: PositionId) -> Result<Option<Position>, DbError> {
        let row = sqlx::query_as::<_, PositionRow>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Position::try_from).transpose()
    }

    async fn create_position(&self, position: Position) -> Result<Position, DbError> {
        sqlx::query(&format!(
            "INSERT INTO positions ({POSITION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(position.id.into_inner())
        .bind(position.company_id.into_inner())
        .bind(&position.instrument)
        .bind(position.side.as_str())
        .bind(position.quantity)
        .bind(position.entry_price)
        .bind(position.leverage)
        .bind(position.margin)
        .bind(position.liquidation_price)
        .bind(position.status.as_str())
        .bind(position.pnl)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(position)
    }

    async fn update_position(
        &self,
        id: PositionId,
        update: PositionUpdate,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE positions SET pnl = $2, status = $3, closed_at = $4
              WHERE id = $1 AND status = 'OPEN'",
        )
        .bind(id.into_inner())
        .bind(update.pnl)
        .bind(update.status.as_str())
        .bind(update.closed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(explain_miss(
                &self.pool,
                "SELECT status FROM positions WHERE id = $1",
                "position",
                id.into_inner(),
            )
            .await);
        }
        Ok(())
    }

    async fn list_research(&self, filter: ResearchFilter) -> Result<Vec<Research>, DbError> {
        let rows = sqlx::query_as::<_, ResearchRow>(
            r"SELECT id, company_id, node_id, status, progress, started_at, completed_at
              FROM research
              WHERE ($1::uuid IS NULL OR company_id = $1)
                AND ($2::text IS NULL OR status = $2)
              ORDER BY started_at",
        )
        .bind(filter.company_id.map(CompanyId::into_inner))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_research(&self, research: Research) -> Result<Research, DbError> {
        let result = sqlx::query(
            r"INSERT INTO research
              (id, company_id, node_id, status, progress, started_at, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (company_id, node_id) DO NOTHING",
        )
        .bind(research.id.into_inner())
        .bind(research.company_id.into_inner())
        .bind(&research.node_id)
        .bind(research.status.as_str())
        .bind(research.progress)
        .bind(research.started_at)
        .bind(research.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::Duplicate {
                entity: "research",
                key: format!("{}/{}", research.company_id, research.node_id),
            });
        }
        Ok(research)
    }

    async fn update_research(
        &self,
        id: ResearchId,
        update: ResearchUpdate,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE research SET progress = $2, status = $3, completed_at = $4
              WHERE id = $1 AND status = 'IN_PROGRESS'",
        )
        .bind(id.into_inner())
        .bind(update.progress)
        .bind(update.status.as_str())
        .bind(update.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(explain_miss(
                &self.pool,
                "SELECT status FROM research WHERE id = $1",
                "research",
                id.into_inner(),
            )
            .await);
        }
        Ok(())
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, DbError> {
        let rows = sqlx::query_as::<_, QuestRow>(
            r"SELECT id, title, description, quest_type, category, requirements, rewards,
                     starts_at, ends_at
              FROM quests",
        )
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_quest(&self, quest: Quest) -> Result<Quest, DbError> {
        sqlx::query(
            r"INSERT INTO quests
              (id, title, description, quest_type, category, requirements, rewards,
               starts_at, ends_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(quest.id.into_inner())
        .bind(&quest.title)
        .bind(&quest.description)
        .bind(quest.quest_type.as_str())
        .bind(quest.category.as_str())
        .bind(Json(&quest.requirements))
        .bind(Json(&quest.rewards))
        .bind(quest.starts_at)
        .bind(quest.ends_at)
        .execute(&self.pool)
        .await?;
        Ok(quest)
    }

    async fn list_company_quests(
        &self,
        filter: CompanyQuestFilter,
    ) -> Result<Vec<CompanyQuest>, DbError> {
        let rows = sqlx::query_as::<_, CompanyQuestRow>(
            r"SELECT id, company_id, quest_id, status, progress, started_at, completed_at
              FROM company_quests
              WHERE ($1::uuid IS NULL OR company_id = $1)
                AND ($2::text IS NULL OR status = $2)",
        )
        .bind(filter.company_id.map(CompanyId::into_inner))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_company_quest(
        &self,
        enrolment: CompanyQuest,
    ) -> Result<CompanyQuest, DbError> {
        sqlx::query(
            r"INSERT INTO company_quests
              (id, company_id, quest_id, status, progress, started_at, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(enrolment.id.into_inner())
        .bind(enrolment.company_id.into_inner())
        .bind(enrolment.quest_id.into_inner())
        .bind(enrolment.status.as_str())
        .bind(Json(&enrolment.progress))
        .bind(enrolment.started_at)
        .bind(enrolment.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(enrolment)
    }

    async fn update_company_quest(
        &self,
        id: CompanyQuestId,
        update: CompanyQuestUpdate,
    ) -> Result<(), DbError> {
        let result =
            sqlx::query(r"UPDATE company_quests SET progress = $2, status = $3 WHERE id = $1")
                .bind(id.into_inner())
                .bind(Json(&update.progress))
                .bind(update.status.as_str())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "company_quest",
                id: id.into_inner(),
            });
        }
        Ok(())
    }

    async fn create_alert(&self, alert: Alert) -> Result<Alert, DbError> {
        sqlx::query(
            r"INSERT INTO alerts
              (id, company_id, alert_type, category, message, data, read, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(alert.id.into_inner())
        .bind(alert.company_id.into_inner())
        .bind(alert.alert_type.as_str())
        .bind(alert.category.as_str())
        .bind(&alert.message)
        .bind(&alert.data)
        .bind(alert.read)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        tracing::debug!(alert_id = %alert.id, company_id = %alert.company_id, "Inserted alert");
        Ok(alert)
    }

    async fn list_alerts(&self, company_id: CompanyId) -> Result<Vec<Alert>, DbError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r"SELECT id, company_id, alert_type, category, message, data, read, created_at
              FROM alerts
              WHERE company_id = $1
              ORDER BY created_at DESC",
        )
        .bind(company_id.into_inner())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_event(&self, event: Event) -> Result<Event, DbError> {
        sqlx::query(
            r"INSERT INTO events
              (id, kind, severity, title, description, region, payload, tick_number, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id.into_inner())
        .bind(event.kind.as_str())
        .bind(event.severity.as_str())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.region.as_str())
        .bind(&event.payload)
        .bind(tick_to_db(event.tick_number))
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_recent_events(&self, limit: usize) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, kind, severity, title, description, region, payload, tick_number,
                     created_at
              FROM events
              ORDER BY created_at DESC
              LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn append_tick_snapshot(&self, snapshot: &TickSnapshot) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO tick_snapshots
              (tick_number, btc_price, difficulty, network_hashrate, regional_data, timestamp)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (tick_number) DO UPDATE SET
                btc_price = EXCLUDED.btc_price,
                difficulty = EXCLUDED.difficulty,
                network_hashrate = EXCLUDED.network_hashrate,
                regional_data = EXCLUDED.regional_data,
                timestamp = EXCLUDED.timestamp",
        )
        .bind(tick_to_db(snapshot.tick_number))
        .bind(snapshot.btc_price)
        .bind(snapshot.difficulty)
        .bind(snapshot.network_hashrate)
        .bind(Json(&snapshot.regional_data))
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(tick = snapshot.tick_number, "Inserted tick snapshot");
        Ok(())
    }

    async fn latest_tick_snapshot(&self) -> Result<Option<TickSnapshot>, DbError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"SELECT tick_number, btc_price, difficulty, network_hashrate, regional_data, timestamp
              FROM tick_snapshots
              ORDER BY tick_number DESC
              LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TickSnapshot::from))
    }
}
