//! The tick scheduler.
//!
//! One loop task owns the [`SimulationState`] and runs [`run_tick`] inline
//! on a fixed interval, so tick `n + 1` never starts before tick `n` has
//! returned. [`Scheduler::start`] is idempotent and resumes from the latest
//! snapshot; [`Scheduler::stop`] lets an in-flight tick finish and returns
//! only once the loop has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tycoon_db::{DbError, Store};
use tycoon_market::EffectModifier;

use crate::clock::ClockError;
use crate::config::EngineConfig;
use crate::publisher::TickPublisher;
use crate::state::SimulationState;
use crate::tick::{TickContext, TickReport, run_tick};

/// Errors returned by [`Scheduler::start`].
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The latest snapshot could not be read.
    #[error("failed to restore from snapshot: {0}")]
    Restore(#[from] DbError),

    /// The configured interval is unusable.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Lifetime counters, readable while the scheduler runs.
#[derive(Debug, Default)]
pub struct TickStats {
    completed: AtomicU64,
    failed: AtomicU64,
    last_tick: AtomicU64,
    last_duration_ms: AtomicU64,
}

/// Point-in-time copy of [`TickStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Ticks that ran every stage.
    pub ticks_completed: u64,
    /// Ticks that failed at a stage boundary.
    pub ticks_failed: u64,
    /// Number of the last attempted tick.
    pub last_tick: u64,
    /// Wall-clock duration of the last attempted tick.
    pub last_tick_duration_ms: u64,
}

impl TickStats {
    /// Read every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks_completed: self.completed.load(Ordering::Relaxed),
            ticks_failed: self.failed.load(Ordering::Relaxed),
            last_tick: self.last_tick.load(Ordering::Relaxed),
            last_tick_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
        }
    }

    fn record(&self, tick: u64, duration: Duration, ok: bool) {
        let counter = if ok { &self.completed } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_tick.store(tick, Ordering::Relaxed);
        self.last_duration_ms.store(
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }
}

/// Everything the loop task needs besides the state it owns.
struct Shared {
    store: Arc<dyn Store>,
    config: Arc<EngineConfig>,
    effects: Arc<dyn EffectModifier>,
    publisher: Arc<TickPublisher>,
    stats: Arc<TickStats>,
}

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives the tick pipeline on a fixed cadence.
pub struct Scheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    /// A stopped scheduler.
    pub fn new(
        store: Arc<dyn Store>,
        config: Arc<EngineConfig>,
        effects: Arc<dyn EffectModifier>,
        publisher: Arc<TickPublisher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                effects,
                publisher,
                stats: Arc::new(TickStats::default()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Restore state and begin ticking. A no-op when already running.
    ///
    /// The first tick fires one interval after this returns. The restored
    /// (or fresh) state is published as the latest state immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Restore`] if the latest snapshot cannot be
    /// read and [`SchedulerError::Clock`] for a zero interval.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Tick scheduler already running");
            return Ok(());
        }

        let shared = &self.shared;
        let snapshot = shared.store.latest_tick_snapshot().await?;
        if let Some(snapshot) = &snapshot {
            info!(tick = snapshot.tick_number, "Resuming from snapshot");
        }
        let state = SimulationState::resume_or_fresh(
            &shared.config,
            shared.effects.as_ref(),
            snapshot,
            Utc::now(),
        )?;
        shared
            .publisher
            .set_latest(Arc::new(state.current.clone()));

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(tick_loop(Arc::clone(shared), state, stop_rx));
        *running = Some(Running { stop, handle });

        info!(
            interval_ms = shared.config.engine.tick_interval_ms,
            "Tick scheduler started"
        );
        Ok(())
    }

    /// Stop scheduling ticks and wait for the loop to exit. An in-flight
    /// tick runs to completion first. A no-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        let _ = running.stop.send(true);
        if let Err(e) = running.handle.await {
            error!(error = %e, "Tick loop ended abnormally");
        }
        info!("Tick scheduler stopped");
    }

    /// Whether the loop is running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Shared tick counters.
    pub fn stats(&self) -> Arc<TickStats> {
        Arc::clone(&self.shared.stats)
    }
}

async fn tick_loop(
    shared: Arc<Shared>,
    mut state: SimulationState,
    mut stop: watch::Receiver<bool>,
) {
    let period = state.clock.interval();
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = tokio::time::interval_at(first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        execute_tick(&shared, &mut state).await;
    }
    debug!(tick = state.clock.tick(), "Tick loop exited");
}

async fn execute_tick(shared: &Shared, state: &mut SimulationState) {
    let started = Instant::now();
    let ctx = TickContext {
        store: shared.store.as_ref(),
        config: &shared.config,
        effects: shared.effects.as_ref(),
    };
    let result = run_tick(state, ctx, Utc::now()).await;
    let elapsed = started.elapsed();
    let tick = state.clock.tick();

    match result {
        Ok(report) => {
            shared.stats.record(tick, elapsed, true);
            publish(&shared.publisher, report);
        }
        Err(e) => {
            shared.stats.record(tick, elapsed, false);
            error!(tick, error = %e, "Tick failed");
        }
    }

    if elapsed > shared.config.engine.slow_tick_warn() {
        warn!(
            tick,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Slow tick"
        );
    }
}

fn publish(publisher: &TickPublisher, report: TickReport) {
    debug!(
        tick = report.state.tick_number,
        alerts = report.alerts.len(),
        company_updates = report.company_updates.len(),
        write_failures = report.write_failures,
        "Tick completed"
    );
    publisher.publish_tick(Arc::new(report.state));
    for alert in report.alerts {
        publisher.publish_alert(alert);
    }
    for update in report.company_updates {
        publisher.publish_company_update(update);
    }
}
