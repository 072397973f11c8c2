//! Tick pipeline: the fixed sequence of stages run once per tick.
//!
//! 1. **Market** -- advance the tick number, walk the BTC price, drift
//!    difficulty, resample every region.
//! 2. **Mining** -- per site yield, energy cost, wear and uptime; then one
//!    atomic balance delta per company and low-balance alerts.
//! 3. **Positions** -- mark every open position, liquidate those past their
//!    liquidation price.
//! 4. **Research** -- advance in-progress rows, complete those reaching 100.
//! 5. **Quests** -- on every `quest_eval_every`-th tick, re-measure active
//!    enrolments against live company state.
//! 6. **Events** -- maybe append one world event.
//! 7. **Snapshot** -- persist the tick for resume.
//!
//! Within a stage, per-entity writes run concurrently and a failed write is
//! logged and skipped. Failing to load a stage's input, or to persist the
//! snapshot, fails the tick. Writes already applied stay applied.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use futures::future::{join, join_all};
use serde_json::json;
use tracing::{debug, info, warn};
use tycoon_db::{
    BalanceDelta, CompanyQuestFilter, CompanyQuestUpdate, DbError, PositionFilter,
    PositionUpdate, ResearchFilter, ResearchUpdate, SiteUpdate, Store,
};
use tycoon_ledger::{
    CompanyYield, MarkOutcome, MiningEnv, SiteOutcome, active_contract_price, apply_mark,
    compute_site, mark_position,
};
use tycoon_market::{
    EffectModifier, advance_market, advance_regional_data, regional_for, roll_event,
};
use tycoon_progress::{
    CompanyAggregate, ResearchStep, advance_research, completion_message, evaluate_quest,
};
use tycoon_types::{
    Alert, AlertCategory, AlertType, Company, CompanyId, CompanyUpdate, EnergyContract, Event,
    PositionStatus, QuestStatus, ResearchStatus, Rig, SiteId, TickState,
};

use crate::clock::{ClockError, TickClock};
use crate::config::EngineConfig;
use crate::state::SimulationState;

/// Errors that fail a whole tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The tick counter could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A stage could not read its input.
    #[error("{stage} stage failed to load: {source}")]
    Load {
        /// Stage that failed.
        stage: &'static str,
        /// The underlying store error.
        source: DbError,
    },

    /// The tick snapshot could not be persisted.
    #[error("failed to persist snapshot for tick {tick}: {source}")]
    Snapshot {
        /// Tick whose snapshot was lost.
        tick: u64,
        /// The underlying store error.
        source: DbError,
    },
}

fn load_error(stage: &'static str) -> impl FnOnce(DbError) -> TickError {
    move |source| TickError::Load { stage, source }
}

/// Collaborators a tick runs against.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Durable entity store.
    pub store: &'a dyn Store,
    /// Model tunables and throttles.
    pub config: &'a EngineConfig,
    /// Hook for world events to bend the market.
    pub effects: &'a dyn EffectModifier,
}

/// What one successful tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The new market state.
    pub state: TickState,
    /// Alerts persisted during the tick.
    pub alerts: Vec<Alert>,
    /// Post-mining balances of companies that mined or paid for energy.
    pub company_updates: Vec<CompanyUpdate>,
    /// World event appended this tick, if one fired.
    pub event: Option<Event>,
    /// Whether quest progress was recomputed.
    pub quests_evaluated: bool,
    /// Per-entity writes that failed and were skipped.
    pub write_failures: usize,
}

impl TickReport {
    const fn new(state: TickState) -> Self {
        Self {
            state,
            alerts: Vec::new(),
            company_updates: Vec::new(),
            event: None,
            quests_evaluated: false,
            write_failures: 0,
        }
    }
}

/// One failed per-entity write.
struct WriteFailure {
    entity: &'static str,
    id: String,
    source: DbError,
}

impl WriteFailure {
    fn new(entity: &'static str, id: impl Display, source: DbError) -> Self {
        Self {
            entity,
            id: id.to_string(),
            source,
        }
    }
}

/// Logs failed writes and keeps the successes.
fn settle<T>(
    report: &mut TickReport,
    stage: &'static str,
    results: impl IntoIterator<Item = Result<T, WriteFailure>>,
) -> Vec<T> {
    let tick = report.state.tick_number;
    let mut ok = Vec::new();
    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(failure) => {
                warn!(
                    tick,
                    stage,
                    entity = failure.entity,
                    id = %failure.id,
                    error = %failure.source,
                    "Write failed, entity skipped this tick"
                );
                report.write_failures = report.write_failures.saturating_add(1);
            }
        }
    }
    ok
}

/// Execute one complete tick.
///
/// The tick number is consumed before any stage runs, so a failed tick is
/// never retried under the same number.
pub async fn run_tick(
    state: &mut SimulationState,
    ctx: TickContext<'_>,
    now: DateTime<Utc>,
) -> Result<TickReport, TickError> {
    // --- Stage 1: Market ---
    let tick = state.clock.advance()?;
    advance_market_state(state, ctx, tick, now);
    debug!(
        tick,
        btc_price = state.current.btc_price,
        difficulty = state.current.difficulty,
        "Market advanced"
    );

    let mut report = TickReport::new(state.current.clone());

    // --- Stage 2: Mining ---
    mining_stage(state, ctx, now, &mut report).await?;

    // --- Stage 3: Positions ---
    positions_stage(ctx, state.current.btc_price, now, &mut report).await?;

    // --- Stage 4: Research ---
    research_stage(ctx, now, &mut report).await?;

    // --- Stage 5: Quests ---
    if TickClock::is_every(tick, ctx.config.engine.quest_eval_every) {
        quest_stage(ctx, &mut report).await?;
        report.quests_evaluated = true;
    }

    // --- Stage 6: Events ---
    if let Some(event) = roll_event(
        &mut state.rng,
        &ctx.config.events,
        tick,
        &state.current.regional_data,
    ) {
        match ctx.store.create_event(event).await {
            Ok(event) => {
                info!(tick, kind = %event.kind, region = %event.region, "World event");
                report.event = Some(event);
            }
            Err(source) => {
                settle::<()>(
                    &mut report,
                    "events",
                    [Err(WriteFailure::new("event", tick, source))],
                );
            }
        }
    }

    // --- Stage 7: Snapshot ---
    ctx.store
        .append_tick_snapshot(&state.snapshot())
        .await
        .map_err(|source| TickError::Snapshot { tick, source })?;

    Ok(report)
}

fn advance_market_state(
    state: &mut SimulationState,
    ctx: TickContext<'_>,
    tick: u64,
    now: DateTime<Utc>,
) {
    let sample = advance_market(
        &mut state.rng,
        &ctx.config.market,
        ctx.effects,
        state.current.btc_price,
        state.current.difficulty,
    );
    let regional_data = advance_regional_data(&mut state.rng, &ctx.config.regions, ctx.effects);
    state.current = TickState {
        tick_number: tick,
        btc_price: sample.btc_price,
        difficulty: sample.difficulty,
        network_hashrate: sample.network_hashrate,
        regional_data,
        timestamp: now,
    };
}

// =============================================================================
// Mining
// =============================================================================

async fn mining_stage(
    state: &mut SimulationState,
    ctx: TickContext<'_>,
    now: DateTime<Utc>,
    report: &mut TickReport,
) -> Result<(), TickError> {
    let store = ctx.store;
    let (companies, sites, rigs, contracts) = tokio::try_join!(
        store.list_companies(),
        store.list_sites(None),
        store.list_rigs(None),
        store.list_energy_contracts(None),
    )
    .map_err(load_error("mining"))?;

    let rigs_by_site = group_by(rigs, |r: &Rig| r.site_id);
    let contracts_by_site = group_by(contracts, |c: &EnergyContract| c.site_id);

    let env = MiningEnv {
        params: &ctx.config.mining,
        tick_secs: state.clock.tick_secs(),
        network_hashrate: state.current.network_hashrate,
    };
    let mut yields: BTreeMap<CompanyId, CompanyYield> = BTreeMap::new();
    let mut outcomes: Vec<SiteOutcome> = Vec::with_capacity(sites.len());
    for site in &sites {
        let site_rigs = rigs_by_site.get(&site.id).map_or(&[][..], Vec::as_slice);
        let spot = regional_for(&state.current.regional_data, &ctx.config.regions, site.region)
            .map_or_else(
                || ctx.config.regions.base_price(site.region),
                |r| r.energy_price,
            );
        let contract = contracts_by_site
            .get(&site.id)
            .and_then(|c| active_contract_price(c, now));
        let outcome = compute_site(&mut state.rng, env, site, site_rigs, spot, contract);
        yields.entry(site.company_id).or_default().add(&outcome);
        outcomes.push(outcome);
    }

    let site_writes = outcomes.iter().map(|o| async move {
        let update = SiteUpdate {
            total_hashrate: o.total_hashrate,
            power_usage: o.power_kw,
            uptime: o.next_uptime,
        };
        store
            .update_site(o.site_id, update)
            .await
            .map_err(|e| WriteFailure::new("site", o.site_id, e))
    });
    let rig_writes = outcomes
        .iter()
        .flat_map(|o| o.rig_wear.iter())
        .map(|w| async move {
            store
                .update_rig_wear(w.rig_id, w.wear)
                .await
                .map_err(|e| WriteFailure::new("rig", w.rig_id, e))
        });
    let (site_results, rig_results) = join(join_all(site_writes), join_all(rig_writes)).await;
    settle(report, "mining", site_results);
    settle(report, "mining", rig_results);

    // Balances after site and rig writes so stage order is observable.
    let params = &ctx.config.mining;
    let balance_writes = companies.iter().map(|company| {
        let mined = yields.get(&company.id).copied().unwrap_or_default();
        async move {
            if mined.is_empty() {
                return Ok((company.clone(), mined));
            }
            let delta = BalanceDelta {
                usd: -mined.energy_cost,
                btc: mined.btc_mined,
            };
            store
                .apply_balance_delta(company.id, delta)
                .await
                .map(|updated| (updated, mined))
                .map_err(|e| WriteFailure::new("company", company.id, e))
        }
    });
    let balances = join_all(balance_writes).await;

    let tick = report.state.tick_number;
    let mut alerts = Vec::new();
    for (company, mined) in settle(report, "mining", balances) {
        if !mined.is_empty() {
            report
                .company_updates
                .push(CompanyUpdate::from_company(&company, tick));
        }
        if params.is_low_balance(company.usd_balance) {
            alerts.push(low_balance_alert(&company));
        }
    }
    persist_alerts(store, report, "mining", alerts).await;
    Ok(())
}

fn low_balance_alert(company: &Company) -> Alert {
    Alert::new(
        company.id,
        AlertType::Warning,
        AlertCategory::System,
        "Low USD balance! Consider selling BTC or reducing operations.",
        json!({ "balance": company.usd_balance }),
    )
}

fn group_by<T, K: Ord>(items: Vec<T>, key: impl Fn(&T) -> K) -> BTreeMap<K, Vec<T>> {
    let mut grouped: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    grouped
}

async fn persist_alerts(
    store: &dyn Store,
    report: &mut TickReport,
    stage: &'static str,
    alerts: Vec<Alert>,
) {
    if alerts.is_empty() {
        return;
    }
    let writes = alerts.into_iter().map(|alert| async move {
        let id = alert.id;
        store
            .create_alert(alert)
            .await
            .map_err(|e| WriteFailure::new("alert", id, e))
    });
    let created = join_all(writes).await;
    let created = settle(report, stage, created);
    report.alerts.extend(created);
}

// =============================================================================
// Positions
// =============================================================================

async fn positions_stage(
    ctx: TickContext<'_>,
    price: f64,
    now: DateTime<Utc>,
    report: &mut TickReport,
) -> Result<(), TickError> {
    let store = ctx.store;
    let open = store
        .list_positions(PositionFilter {
            company_id: None,
            status: Some(PositionStatus::Open),
        })
        .await
        .map_err(load_error("positions"))?;

    let tick = report.state.tick_number;
    let marked = open.into_iter().filter_map(|position| {
        match mark_position(&position, price) {
            Ok(outcome) => Some((position, outcome)),
            Err(e) => {
                warn!(tick, position_id = %position.id, error = %e, "Skipping unmarkable position");
                None
            }
        }
    });
    let writes = marked.map(|(mut position, outcome)| async move {
        apply_mark(&mut position, outcome, now);
        let update = PositionUpdate {
            pnl: position.pnl,
            status: position.status,
            closed_at: position.closed_at,
        };
        store
            .update_position(position.id, update)
            .await
            .map_err(|e| WriteFailure::new("position", position.id, e))?;
        Ok::<_, WriteFailure>(match outcome {
            MarkOutcome::Liquidated { margin, .. } => {
                info!(
                    tick,
                    position_id = %position.id,
                    company_id = %position.company_id,
                    margin,
                    "Position liquidated"
                );
                Some(Alert::new(
                    position.company_id,
                    AlertType::Critical,
                    AlertCategory::Trading,
                    format!("Position liquidated: {}", position.instrument),
                    json!({ "positionId": position.id, "loss": margin }),
                ))
            }
            MarkOutcome::Marked { .. } => None,
        })
    });
    let results = join_all(writes).await;
    let alerts = settle(report, "positions", results)
        .into_iter()
        .flatten()
        .collect();
    persist_alerts(store, report, "positions", alerts).await;
    Ok(())
}

// =============================================================================
// Research
// =============================================================================

async fn research_stage(
    ctx: TickContext<'_>,
    now: DateTime<Utc>,
    report: &mut TickReport,
) -> Result<(), TickError> {
    let store = ctx.store;
    let rows = store
        .list_research(ResearchFilter {
            company_id: None,
            status: Some(ResearchStatus::InProgress),
        })
        .await
        .map_err(load_error("research"))?;

    let tick = report.state.tick_number;
    let params = &ctx.config.research;
    let stepped = rows.into_iter().filter_map(|research| {
        match advance_research(&research, params, now) {
            Ok(step) => Some((research, step)),
            Err(e) => {
                warn!(tick, research_id = %research.id, error = %e, "Skipping research row");
                None
            }
        }
    });
    let writes = stepped.map(|(mut research, step)| async move {
        step.apply(&mut research);
        let update = ResearchUpdate {
            progress: research.progress,
            status: research.status,
            completed_at: research.completed_at,
        };
        store
            .update_research(research.id, update)
            .await
            .map_err(|e| WriteFailure::new("research", research.id, e))?;
        Ok::<_, WriteFailure>(match step {
            ResearchStep::Completed { .. } => Some(Alert::new(
                research.company_id,
                AlertType::Info,
                AlertCategory::Research,
                format!("Research completed: {}", research.node_id),
                json!({ "researchId": research.id }),
            )),
            ResearchStep::Advanced { .. } => None,
        })
    });
    let results = join_all(writes).await;
    let alerts = settle(report, "research", results)
        .into_iter()
        .flatten()
        .collect();
    persist_alerts(store, report, "research", alerts).await;
    Ok(())
}

// =============================================================================
// Quests
// =============================================================================

async fn quest_stage(ctx: TickContext<'_>, report: &mut TickReport) -> Result<(), TickError> {
    let store = ctx.store;
    let (quests, enrolments) = tokio::try_join!(
        store.list_quests(),
        store.list_company_quests(CompanyQuestFilter {
            company_id: None,
            status: Some(QuestStatus::Active),
        }),
    )
    .map_err(load_error("quests"))?;
    if enrolments.is_empty() {
        return Ok(());
    }

    let (companies, sites, rigs, positions, research) = tokio::try_join!(
        store.list_companies(),
        store.list_sites(None),
        store.list_rigs(None),
        store.list_positions(PositionFilter::default()),
        store.list_research(ResearchFilter::default()),
    )
    .map_err(load_error("quests"))?;

    let site_owner: BTreeMap<SiteId, CompanyId> =
        sites.iter().map(|s| (s.id, s.company_id)).collect();
    let sites = group_by(sites, |s| s.company_id);
    let rigs = group_by(rigs, |r| site_owner.get(&r.site_id).copied());
    let positions = group_by(positions, |p| p.company_id);
    let research = group_by(research, |r| r.company_id);

    let aggregates: BTreeMap<CompanyId, CompanyAggregate> = companies
        .iter()
        .map(|company| {
            let id = company.id;
            let aggregate = CompanyAggregate::collect(
                company,
                sites.get(&id).map_or(&[][..], Vec::as_slice),
                rigs.get(&Some(id)).map_or(&[][..], Vec::as_slice),
                positions.get(&id).map_or(&[][..], Vec::as_slice),
                research.get(&id).map_or(&[][..], Vec::as_slice),
            );
            (id, aggregate)
        })
        .collect();
    let quests: BTreeMap<_, _> = quests.into_iter().map(|q| (q.id, q)).collect();

    let tick = report.state.tick_number;
    let mut evaluated = Vec::with_capacity(enrolments.len());
    for enrolment in &enrolments {
        let (Some(quest), Some(aggregate)) = (
            quests.get(&enrolment.quest_id),
            aggregates.get(&enrolment.company_id),
        ) else {
            warn!(tick, company_quest_id = %enrolment.id, "Quest or company missing, skipping");
            continue;
        };
        match evaluate_quest(enrolment, quest, aggregate) {
            Ok(evaluation) => evaluated.push((enrolment, quest, evaluation)),
            Err(e) => warn!(tick, company_quest_id = %enrolment.id, error = %e, "Skipping quest"),
        }
    }

    let writes = evaluated.into_iter().map(|(enrolment, quest, evaluation)| async move {
        let status = evaluation.status();
        let newly_completed = evaluation.newly_completed;
        let update = CompanyQuestUpdate {
            progress: evaluation.progress,
            status,
        };
        store
            .update_company_quest(enrolment.id, update)
            .await
            .map_err(|e| WriteFailure::new("company_quest", enrolment.id, e))?;
        Ok::<_, WriteFailure>(newly_completed.then(|| {
            Alert::new(
                enrolment.company_id,
                AlertType::Info,
                AlertCategory::System,
                completion_message(quest),
                serde_json::Value::Null,
            )
        }))
    });
    let results = join_all(writes).await;
    let alerts = settle(report, "quests", results)
        .into_iter()
        .flatten()
        .collect();
    persist_alerts(store, report, "quests", alerts).await;
    Ok(())
}
