//! End-to-end tick pipeline tests against the in-memory store.
//!
//! Every test runs with a fixed seed, no world events and no difficulty
//! drift so the market stages are deterministic.

#![allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Duration, Utc};
use common::{ProbeStore, quiet_config, rig};
use tycoon_core::{EngineConfig, SimulationState, TickContext, TickError, TickReport, run_tick};
use tycoon_db::demo::new_company;
use tycoon_db::{CompanyQuestFilter, PositionFilter, ResearchFilter, Store};
use tycoon_market::NoEffects;
use tycoon_types::{
    AlertCategory, AlertType, Company, CompanyQuest, CompanyQuestId, ContractId, EnergyContract,
    Position, PositionId, PositionSide, PositionStatus, Quest, QuestCategory, QuestId,
    QuestRequirement, QuestRewards, QuestStatus, QuestType, Region, RequirementKind, Research,
    ResearchId, ResearchStatus, Site, SiteId, UserId,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

struct Harness {
    store: ProbeStore,
    config: EngineConfig,
    state: SimulationState,
    now: DateTime<Utc>,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        let now = Utc::now();
        let state = SimulationState::fresh(&config, &NoEffects, now).unwrap();
        Self {
            store: ProbeStore::default(),
            config,
            state,
            now,
        }
    }

    async fn tick(&mut self) -> Result<TickReport, TickError> {
        let ctx = TickContext {
            store: &self.store,
            config: &self.config,
            effects: &NoEffects,
        };
        run_tick(&mut self.state, ctx, self.now).await
    }

    async fn company(&self, usd: f64) -> Company {
        let mut company = new_company(UserId::new(), "Test Co", self.now);
        company.usd_balance = usd;
        self.store.create_company(company).await.unwrap()
    }

    async fn site(&self, company: &Company) -> Site {
        let site = Site {
            id: SiteId::new(),
            company_id: company.id,
            name: "Test Site".to_owned(),
            region: Region::UsWest,
            uptime: 100.0,
            total_hashrate: 0.0,
            power_usage: 0.0,
            created_at: self.now,
        };
        self.store.create_site(site).await.unwrap()
    }
}

#[tokio::test]
async fn tick_numbers_increase_by_one_and_each_tick_is_snapshotted() {
    let mut h = Harness::new(quiet_config());
    for expected in 1..=5 {
        let report = h.tick().await.unwrap();
        assert_eq!(report.state.tick_number, expected);
    }
    assert_eq!(h.store.inner.snapshot_count().await, 5);
    let latest = h.store.latest_tick_snapshot().await.unwrap().unwrap();
    assert_eq!(latest.tick_number, 5);
    assert_eq!(latest.btc_price, h.state.current.btc_price);
}

#[tokio::test]
async fn price_walk_never_drops_below_floor() {
    let mut config = quiet_config();
    config.market.max_step = 50_000.0;
    let floor = config.market.price_floor;
    let mut h = Harness::new(config);
    for _ in 0..200 {
        let report = h.tick().await.unwrap();
        assert!(report.state.btc_price >= floor);
    }
}

#[tokio::test]
async fn mining_credits_yield_and_charges_contract_energy() {
    let mut config = quiet_config();
    config.mining.uptime_noise = 0.0;
    let mut h = Harness::new(config);
    let company = h.company(50_000.0).await;
    let site = h.site(&company).await;
    let rig = h
        .store
        .create_rig(rig(site.id, 100.0, 30.0, h.now))
        .await
        .unwrap();
    h.store
        .create_energy_contract(EnergyContract {
            id: ContractId::new(),
            site_id: site.id,
            price_per_kwh: 0.05,
            starts_at: h.now - Duration::days(1),
            ends_at: h.now + Duration::days(1),
        })
        .await
        .unwrap();

    let report = h.tick().await.unwrap();

    let tick_secs = 5.0;
    let expected_cost = 3.0 * 0.05 * tick_secs / 3600.0;
    let expected_btc = 100.0 / report.state.network_hashrate * 6.25 * tick_secs / 600.0;

    let stored = h.store.get_company(company.id).await.unwrap().unwrap();
    assert!(approx(stored.usd_balance, 50_000.0 - expected_cost));
    assert!(approx(stored.btc_balance, expected_btc));

    let sites = h.store.list_sites(Some(company.id)).await.unwrap();
    assert_eq!(sites.len(), 1);
    assert!(approx(sites[0].total_hashrate, 100.0));
    assert!(approx(sites[0].power_usage, 3.0));
    assert!(approx(sites[0].uptime, 100.0));

    let rigs = h.store.list_rigs(Some(site.id)).await.unwrap();
    assert_eq!(rigs[0].id, rig.id);
    assert!(approx(rigs[0].wear, 0.001));

    assert_eq!(report.company_updates.len(), 1);
    let update = &report.company_updates[0];
    assert_eq!(update.company_id, company.id);
    assert_eq!(update.tick_number, 1);
    assert!(approx(update.balances.usd, stored.usd_balance));
    assert!(report.alerts.is_empty());
}

#[tokio::test]
async fn idle_company_below_threshold_gets_low_balance_warning() {
    let mut h = Harness::new(quiet_config());
    let company = h.company(500.0).await;

    let report = h.tick().await.unwrap();

    assert!(report.company_updates.is_empty());
    assert_eq!(report.alerts.len(), 1);
    let alert = &report.alerts[0];
    assert_eq!(alert.company_id, company.id);
    assert_eq!(alert.alert_type, AlertType::Warning);
    assert_eq!(alert.category, AlertCategory::System);
    assert_eq!(alert.data["balance"], 500.0);

    let stored = h.store.list_alerts(company.id).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn long_position_is_liquidated_once() {
    let mut config = quiet_config();
    config.market.initial_price = 33_000.0;
    config.market.max_step = 0.0;
    let mut h = Harness::new(config);
    let company = h.company(50_000.0).await;
    let position = h
        .store
        .create_position(Position {
            id: PositionId::new(),
            company_id: company.id,
            instrument: "BTC_PERP".to_owned(),
            side: PositionSide::Long,
            quantity: 1.0,
            entry_price: 40_000.0,
            leverage: 5.0,
            margin: Some(8_000.0),
            liquidation_price: Some(33_600.0),
            status: PositionStatus::Open,
            pnl: 0.0,
            opened_at: h.now,
            closed_at: None,
        })
        .await
        .unwrap();

    let report = h.tick().await.unwrap();
    assert_eq!(report.state.btc_price, 33_000.0);

    let stored = h.store.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PositionStatus::Liquidated);
    assert_eq!(stored.pnl, -8_000.0);
    assert!(stored.closed_at.is_some());

    let liquidations: Vec<_> = report
        .alerts
        .iter()
        .filter(|a| a.category == AlertCategory::Trading)
        .collect();
    assert_eq!(liquidations.len(), 1);
    assert_eq!(liquidations[0].alert_type, AlertType::Critical);
    assert_eq!(liquidations[0].message, "Position liquidated: BTC_PERP");
    assert_eq!(liquidations[0].data["loss"], 8_000.0);

    let report = h.tick().await.unwrap();
    assert!(
        report
            .alerts
            .iter()
            .all(|a| a.category != AlertCategory::Trading)
    );
    let open = h
        .store
        .list_positions(PositionFilter {
            company_id: Some(company.id),
            status: Some(PositionStatus::Open),
        })
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn open_position_is_marked_to_market() {
    let mut config = quiet_config();
    config.market.initial_price = 41_000.0;
    config.market.max_step = 0.0;
    let mut h = Harness::new(config);
    let company = h.company(50_000.0).await;
    let position = h
        .store
        .create_position(Position {
            id: PositionId::new(),
            company_id: company.id,
            instrument: "BTC_PERP".to_owned(),
            side: PositionSide::Long,
            quantity: 0.5,
            entry_price: 40_000.0,
            leverage: 2.0,
            margin: Some(10_000.0),
            liquidation_price: Some(24_000.0),
            status: PositionStatus::Open,
            pnl: 0.0,
            opened_at: h.now,
            closed_at: None,
        })
        .await
        .unwrap();

    h.tick().await.unwrap();

    let stored = h.store.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PositionStatus::Open);
    assert!(approx(stored.pnl, 1_000.0));
}

#[tokio::test]
async fn research_completes_with_one_alert() {
    let mut h = Harness::new(quiet_config());
    let company = h.company(50_000.0).await;
    let research = h
        .store
        .create_research(Research {
            id: ResearchId::new(),
            company_id: company.id,
            node_id: "efficient_cooling".to_owned(),
            status: ResearchStatus::InProgress,
            progress: 99.95,
            started_at: h.now,
            completed_at: None,
        })
        .await
        .unwrap();

    let report = h.tick().await.unwrap();
    let alerts: Vec<_> = report
        .alerts
        .iter()
        .filter(|a| a.category == AlertCategory::Research)
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "Research completed: efficient_cooling");

    let rows = h
        .store
        .list_research(ResearchFilter {
            company_id: Some(company.id),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(rows[0].id, research.id);
    assert_eq!(rows[0].status, ResearchStatus::Completed);
    assert_eq!(rows[0].progress, 100.0);
    assert!(rows[0].completed_at.is_some());

    let report = h.tick().await.unwrap();
    assert!(
        report
            .alerts
            .iter()
            .all(|a| a.category != AlertCategory::Research)
    );
}

async fn enrol(h: &Harness, company: &Company, requirements: Vec<QuestRequirement>) -> CompanyQuest {
    let quest = h
        .store
        .create_quest(Quest {
            id: QuestId::new(),
            title: "First Rig".to_owned(),
            description: "Buy a site and a rig".to_owned(),
            quest_type: QuestType::Main,
            category: QuestCategory::Mining,
            requirements,
            rewards: QuestRewards::default(),
            starts_at: None,
            ends_at: None,
        })
        .await
        .unwrap();
    h.store
        .create_company_quest(CompanyQuest {
            id: CompanyQuestId::new(),
            company_id: company.id,
            quest_id: quest.id,
            status: QuestStatus::Active,
            progress: BTreeMap::new(),
            started_at: h.now,
            completed_at: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn quest_completes_once_requirements_are_met() {
    let mut config = quiet_config();
    config.engine.quest_eval_every = 1;
    let mut h = Harness::new(config);
    let company = h.company(50_000.0).await;
    let site = h.site(&company).await;
    let enrolment = enrol(
        &h,
        &company,
        vec![
            QuestRequirement {
                kind: RequirementKind::SiteCount,
                target: 1.0,
            },
            QuestRequirement {
                kind: RequirementKind::RigCount,
                target: 1.0,
            },
        ],
    )
    .await;
    let filter = CompanyQuestFilter {
        company_id: Some(company.id),
        status: None,
    };

    let report = h.tick().await.unwrap();
    assert!(report.quests_evaluated);
    assert!(report.alerts.is_empty());
    let rows = h.store.list_company_quests(filter).await.unwrap();
    assert_eq!(rows[0].id, enrolment.id);
    assert_eq!(rows[0].status, QuestStatus::Active);
    assert_eq!(rows[0].progress["site_count"], 1.0);
    assert_eq!(rows[0].progress["rig_count"], 0.0);

    h.store
        .create_rig(rig(site.id, 100.0, 30.0, h.now))
        .await
        .unwrap();

    let report = h.tick().await.unwrap();
    let completions: Vec<_> = report
        .alerts
        .iter()
        .filter(|a| a.message.starts_with("Quest completed"))
        .collect();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].message, "Quest completed: First Rig! Claim your reward.");
    assert_eq!(completions[0].alert_type, AlertType::Info);
    let rows = h.store.list_company_quests(filter).await.unwrap();
    assert_eq!(rows[0].status, QuestStatus::Completed);
    assert_eq!(rows[0].progress["rig_count"], 1.0);

    let report = h.tick().await.unwrap();
    assert!(
        report
            .alerts
            .iter()
            .all(|a| !a.message.starts_with("Quest completed"))
    );
}

#[tokio::test]
async fn quests_are_evaluated_on_the_configured_cadence() {
    let mut h = Harness::new(quiet_config());
    let company = h.company(50_000.0).await;
    enrol(
        &h,
        &company,
        vec![QuestRequirement {
            kind: RequirementKind::SiteCount,
            target: 1.0,
        }],
    )
    .await;

    for tick in 1..=10_u64 {
        let report = h.tick().await.unwrap();
        assert_eq!(report.quests_evaluated, tick == 10, "tick {tick}");
    }
}

#[tokio::test]
async fn failed_site_write_is_skipped_and_balance_still_applied() {
    let mut config = quiet_config();
    config.mining.uptime_noise = 0.0;
    let mut h = Harness::new(config);
    let company = h.company(50_000.0).await;
    let site = h.site(&company).await;
    h.store
        .create_rig(rig(site.id, 100.0, 30.0, h.now))
        .await
        .unwrap();
    h.store.fail_site_writes.store(true, Ordering::SeqCst);

    let report = h.tick().await.unwrap();

    assert_eq!(report.write_failures, 1);
    assert_eq!(report.company_updates.len(), 1);
    let sites = h.store.list_sites(Some(company.id)).await.unwrap();
    assert_eq!(sites[0].total_hashrate, 0.0);
    let stored = h.store.get_company(company.id).await.unwrap().unwrap();
    assert!(stored.usd_balance < 50_000.0);
}

#[tokio::test]
async fn snapshot_failure_fails_the_tick_but_consumes_its_number() {
    let mut h = Harness::new(quiet_config());
    h.store.fail_snapshots.store(true, Ordering::SeqCst);

    let err = h.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Snapshot { tick: 1, .. }));
    assert_eq!(h.state.clock.tick(), 1);
    assert_eq!(h.store.inner.snapshot_count().await, 0);

    h.store.fail_snapshots.store(false, Ordering::SeqCst);
    let report = h.tick().await.unwrap();
    assert_eq!(report.state.tick_number, 2);
}
