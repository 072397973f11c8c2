//! Shared state injected into every handler.

use std::sync::Arc;
use std::time::Duration;

use tycoon_core::{TickPublisher, TickStats};
use tycoon_core::config::HubConfig;

use crate::auth::TokenVerifier;
use crate::registry::Registry;

/// Everything the hub's handlers and background tasks share.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct HubState {
    /// Open connections.
    pub registry: Arc<Registry>,
    /// Tick output from the scheduler.
    pub publisher: Arc<TickPublisher>,
    /// Token checker for `auth` messages and bearer headers.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Scheduler counters for `/api/health`, when a scheduler is attached.
    pub stats: Option<Arc<TickStats>>,
    /// Frames buffered per connection before messages are dropped.
    pub outbound_buffer: usize,
    /// Heartbeat period.
    pub ping_interval: Duration,
}

impl HubState {
    /// State for `config`, with an empty registry.
    pub fn new(
        config: &HubConfig,
        publisher: Arc<TickPublisher>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            publisher,
            verifier,
            stats: None,
            outbound_buffer: config.outbound_buffer.max(1),
            ping_interval: config.ping_interval(),
        }
    }

    /// Attach scheduler counters.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<TickStats>) -> Self {
        self.stats = Some(stats);
        self
    }
}
