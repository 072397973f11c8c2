//! Scheduler lifecycle tests under paused tokio time.

#![allow(clippy::unwrap_used, clippy::float_cmp, clippy::arithmetic_side_effects)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{ProbeStore, quiet_config};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{Instant, sleep};
use tycoon_core::{EngineConfig, Scheduler, TickPublisher};
use tycoon_db::Store;
use tycoon_market::NoEffects;

const INTERVAL: Duration = Duration::from_secs(5);

fn scheduler(store: &Arc<ProbeStore>, config: EngineConfig) -> (Scheduler, Arc<TickPublisher>) {
    let publisher = Arc::new(TickPublisher::new(64));
    let scheduler = Scheduler::new(
        Arc::clone(store) as Arc<dyn Store>,
        Arc::new(config),
        Arc::new(NoEffects),
        Arc::clone(&publisher),
    );
    (scheduler, publisher)
}

#[tokio::test(start_paused = true)]
async fn ticks_are_published_once_per_interval() {
    let store = Arc::new(ProbeStore::default());
    let (scheduler, publisher) = scheduler(&store, quiet_config());
    let mut ticks = publisher.subscribe_ticks();

    let started = Instant::now();
    scheduler.start().await.unwrap();
    for expected in 1..=3_u64 {
        let state = ticks.recv().await.unwrap();
        assert_eq!(state.tick_number, expected);
    }
    assert!(started.elapsed() >= INTERVAL * 3);
    assert_eq!(publisher.latest().unwrap().tick_number, 3);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let store = Arc::new(ProbeStore::default());
    let (scheduler, _publisher) = scheduler(&store, quiet_config());

    scheduler.start().await.unwrap();
    scheduler.start().await.unwrap();
    assert!(scheduler.is_running().await);

    sleep(INTERVAL * 2 + Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert_eq!(store.inner.snapshot_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn no_ticks_follow_stop() {
    let store = Arc::new(ProbeStore::default());
    let (scheduler, publisher) = scheduler(&store, quiet_config());
    let mut ticks = publisher.subscribe_ticks();

    scheduler.start().await.unwrap();
    ticks.recv().await.unwrap();
    scheduler.stop().await;
    assert!(!scheduler.is_running().await);

    sleep(INTERVAL * 4).await;
    assert!(matches!(ticks.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(store.inner.snapshot_count().await, 1);

    // Stopping twice is harmless.
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_the_in_flight_tick() {
    let store = Arc::new(ProbeStore::with_list_delay(Duration::from_secs(2)));
    let (scheduler, _publisher) = scheduler(&store, quiet_config());

    scheduler.start().await.unwrap();
    // Inside the first tick's delayed company read.
    sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(store.company_reads(), 1);
    scheduler.stop().await;

    assert_eq!(store.inner.snapshot_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_from_latest_snapshot() {
    let store = Arc::new(ProbeStore::default());
    let (first, first_publisher) = scheduler(&store, quiet_config());
    let mut ticks = first_publisher.subscribe_ticks();
    first.start().await.unwrap();
    ticks.recv().await.unwrap();
    let last = ticks.recv().await.unwrap();
    first.stop().await;
    assert_eq!(last.tick_number, 2);

    let (second, second_publisher) = scheduler(&store, quiet_config());
    let mut ticks = second_publisher.subscribe_ticks();
    second.start().await.unwrap();

    let resumed = second_publisher.latest().unwrap();
    assert_eq!(resumed.tick_number, 2);
    assert_eq!(resumed.btc_price, last.btc_price);
    assert_eq!(resumed.difficulty, last.difficulty);
    assert_eq!(resumed.network_hashrate, last.network_hashrate);
    assert_eq!(resumed.regional_data, last.regional_data);
    assert!(!resumed.regional_data.is_empty());

    let next = ticks.recv().await.unwrap();
    assert_eq!(next.tick_number, 3);
    second.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_ticks_never_overlap() {
    let store = Arc::new(ProbeStore::with_list_delay(INTERVAL * 2 + Duration::from_secs(1)));
    let (scheduler, publisher) = scheduler(&store, quiet_config());
    let mut ticks = publisher.subscribe_ticks();

    scheduler.start().await.unwrap();
    for expected in 1..=3_u64 {
        assert_eq!(ticks.recv().await.unwrap().tick_number, expected);
    }
    scheduler.stop().await;

    assert!(store.company_reads() >= 3);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_ticks_are_counted_and_not_published() {
    let store = Arc::new(ProbeStore::default());
    store.fail_snapshots.store(true, Ordering::SeqCst);
    let (scheduler, publisher) = scheduler(&store, quiet_config());
    let mut ticks = publisher.subscribe_ticks();

    scheduler.start().await.unwrap();
    sleep(INTERVAL * 2 + Duration::from_millis(100)).await;

    let stats = scheduler.stats().snapshot();
    assert_eq!(stats.ticks_failed, 2);
    assert_eq!(stats.ticks_completed, 0);
    assert_eq!(stats.last_tick, 2);
    assert!(matches!(ticks.try_recv(), Err(TryRecvError::Empty)));

    store.fail_snapshots.store(false, Ordering::SeqCst);
    assert_eq!(ticks.recv().await.unwrap().tick_number, 3);
    scheduler.stop().await;

    let stats = scheduler.stats().snapshot();
    assert_eq!(stats.ticks_completed, 1);
}
