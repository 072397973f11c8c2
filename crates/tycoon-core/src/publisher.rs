//! Fan-out of tick results to readers.
//!
//! The scheduler is the only publisher. Every send is non-blocking: a
//! `broadcast` channel drops the oldest messages for a subscriber that
//! falls behind, and the `watch` channel keeps only the latest state for
//! late joiners. A slow reader therefore never delays the next tick.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tycoon_types::{Alert, CompanyUpdate, TickState};

/// Buffered messages per subscriber before the oldest are dropped.
const DEFAULT_CAPACITY: usize = 256;

/// Channels carrying tick output.
#[derive(Debug)]
pub struct TickPublisher {
    ticks: broadcast::Sender<Arc<TickState>>,
    alerts: broadcast::Sender<Alert>,
    company_updates: broadcast::Sender<CompanyUpdate>,
    latest: watch::Sender<Option<Arc<TickState>>>,
}

impl Default for TickPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TickPublisher {
    /// Channels with room for `capacity` messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (ticks, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        let (company_updates, _) = broadcast::channel(capacity);
        let (latest, _) = watch::channel(None);
        Self {
            ticks,
            alerts,
            company_updates,
            latest,
        }
    }

    /// Publish a completed tick and make it the latest state.
    pub fn publish_tick(&self, state: Arc<TickState>) {
        self.latest.send_replace(Some(Arc::clone(&state)));
        // No subscribers is not an error.
        let _ = self.ticks.send(state);
    }

    /// Replace the latest state without announcing a tick. Used on start
    /// so readers see the restored market before the first tick.
    pub fn set_latest(&self, state: Arc<TickState>) {
        self.latest.send_replace(Some(state));
    }

    /// Publish an alert for relay to its company.
    pub fn publish_alert(&self, alert: Alert) {
        let _ = self.alerts.send(alert);
    }

    /// Publish a company's post-tick balances.
    pub fn publish_company_update(&self, update: CompanyUpdate) {
        let _ = self.company_updates.send(update);
    }

    /// Receive every tick published from now on.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<Arc<TickState>> {
        self.ticks.subscribe()
    }

    /// Receive every alert published from now on.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Receive every company update published from now on.
    pub fn subscribe_company_updates(&self) -> broadcast::Receiver<CompanyUpdate> {
        self.company_updates.subscribe()
    }

    /// Watch the latest state.
    pub fn watch_latest(&self) -> watch::Receiver<Option<Arc<TickState>>> {
        self.latest.subscribe()
    }

    /// The most recent state, if any tick has been published or restored.
    pub fn latest(&self) -> Option<Arc<TickState>> {
        self.latest.borrow().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    fn state(tick_number: u64) -> Arc<TickState> {
        Arc::new(TickState {
            tick_number,
            btc_price: 43_250.0,
            difficulty: 62.5e12,
            network_hashrate: 450e6,
            regional_data: BTreeMap::new(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let publisher = TickPublisher::default();
        publisher.publish_tick(state(1));
        assert_eq!(publisher.latest().unwrap().tick_number, 1);
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let publisher = TickPublisher::default();
        let mut rx = publisher.subscribe_ticks();
        publisher.publish_tick(state(1));
        publisher.publish_tick(state(2));
        assert_eq!(rx.recv().await.unwrap().tick_number, 1);
        assert_eq!(rx.recv().await.unwrap().tick_number, 2);
    }

    #[tokio::test]
    async fn lagging_subscriber_does_not_block_publisher() {
        let publisher = TickPublisher::new(2);
        let mut rx = publisher.subscribe_ticks();
        for tick in 1..=5 {
            publisher.publish_tick(state(tick));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap().tick_number, 4);
        assert_eq!(publisher.latest().unwrap().tick_number, 5);
    }

    #[test]
    fn set_latest_does_not_announce() {
        let publisher = TickPublisher::default();
        let mut rx = publisher.subscribe_ticks();
        publisher.set_latest(state(9));
        assert!(rx.try_recv().is_err());
        assert_eq!(publisher.latest().unwrap().tick_number, 9);
    }
}
