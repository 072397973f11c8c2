//! Demo company for runs without a database.
//!
//! Seeds one company with a site in US West, three rigs, a discounted
//! energy contract, a leveraged long and one research node in progress,
//! enough for every tick stage to have something to do.

use chrono::{DateTime, Duration, Utc};
use tycoon_types::{
    Company, CompanyId, ContractId, EnergyContract, Position, PositionId, PositionSide,
    PositionStatus, Region, Reputation, Research, ResearchId, ResearchStatus, Rig, RigId,
    RigStatus, Site, SiteId, UserId,
};

use crate::error::DbError;
use crate::store::Store;

/// USD balance a newly registered company starts with.
pub const STARTING_USD_BALANCE: f64 = 50_000.0;

/// `(model, hashrate TH/s, efficiency J/TH)` of the demo rigs.
const DEMO_RIGS: [(&str, f64, f64); 3] = [
    ("ANTMINER_S19", 110.0, 29.5),
    ("WHATSMINER_M30S", 86.0, 38.0),
    ("WHATSMINER_M50", 114.0, 26.0),
];

/// Ids of the seeded rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoWorld {
    /// The demo company.
    pub company_id: CompanyId,
    /// Its only site.
    pub site_id: SiteId,
    /// The open leveraged position.
    pub position_id: PositionId,
    /// The in-progress research row.
    pub research_id: ResearchId,
}

/// A fresh company with the starting balance and neutral reputation.
pub fn new_company(user_id: UserId, name: &str, now: DateTime<Utc>) -> Company {
    Company {
        id: CompanyId::new(),
        user_id,
        name: name.to_owned(),
        usd_balance: STARTING_USD_BALANCE,
        btc_balance: 0.0,
        reputation: Reputation::default(),
        created_at: now,
    }
}

/// Insert the demo company and its assets.
///
/// `btc_price` sets the entry of the demo position so it starts near
/// break-even.
///
/// # Errors
///
/// Propagates the first failed insert.
pub async fn seed_demo_world<S: Store + ?Sized>(
    store: &S,
    btc_price: f64,
    now: DateTime<Utc>,
) -> Result<DemoWorld, DbError> {
    let company = store
        .create_company(new_company(UserId::new(), "Demo Mining Co", now))
        .await?;

    let site = store
        .create_site(Site {
            id: SiteId::new(),
            company_id: company.id,
            name: "Demo Site".to_owned(),
            region: Region::UsWest,
            uptime: 100.0,
            total_hashrate: 0.0,
            power_usage: 0.0,
            created_at: now,
        })
        .await?;

    for (model, hashrate, efficiency) in DEMO_RIGS {
        store
            .create_rig(Rig {
                id: RigId::new(),
                site_id: site.id,
                model: model.to_owned(),
                hashrate,
                efficiency,
                wear: 0.0,
                status: RigStatus::Active,
                created_at: now,
            })
            .await?;
    }

    store
        .create_energy_contract(EnergyContract {
            id: ContractId::new(),
            site_id: site.id,
            price_per_kwh: 0.065,
            starts_at: now.checked_sub_signed(Duration::days(1)).unwrap_or(now),
            ends_at: now
                .checked_add_signed(Duration::days(30))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
        .await?;

    let quantity = 0.5;
    let leverage = 5.0;
    let margin = quantity * btc_price / leverage;
    let position = store
        .create_position(Position {
            id: PositionId::new(),
            company_id: company.id,
            instrument: "BTC_PERP".to_owned(),
            side: PositionSide::Long,
            quantity,
            entry_price: btc_price,
            leverage,
            margin: Some(margin),
            liquidation_price: Some(btc_price * (1.0 - 1.0 / leverage * 0.8)),
            status: PositionStatus::Open,
            pnl: 0.0,
            opened_at: now,
            closed_at: None,
        })
        .await?;

    let research = store
        .create_research(Research {
            id: ResearchId::new(),
            company_id: company.id,
            node_id: "efficient_cooling".to_owned(),
            status: ResearchStatus::InProgress,
            progress: 0.0,
            started_at: now,
            completed_at: None,
        })
        .await?;

    tracing::info!(company_id = %company.id, site_id = %site.id, "Seeded demo world");

    Ok(DemoWorld {
        company_id: company.id,
        site_id: site.id,
        position_id: position.id,
        research_id: research.id,
    })
}
