//! Bridge from the tick publisher to connected clients.
//!
//! Ticks fan out to every authenticated connection; alerts and company
//! updates go to the owning company's connections only. A connection is
//! never sent a tick it already has from its greeting. Each message is
//! encoded once. A relay that falls behind the publisher skips ahead
//! rather than slowing the scheduler.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use tycoon_core::TickPublisher;
use tycoon_types::{Alert, CompanyUpdate, TickState};

use crate::protocol::ServerMessage;
use crate::registry::Registry;

/// Subscriptions taken before the hub starts serving, so nothing published
/// in between is missed.
#[derive(Debug)]
pub struct Relay {
    ticks: Receiver<Arc<TickState>>,
    alerts: Receiver<Alert>,
    company_updates: Receiver<CompanyUpdate>,
}

impl Relay {
    /// Subscribe to every stream of `publisher`.
    pub fn subscribe(publisher: &TickPublisher) -> Self {
        Self {
            ticks: publisher.subscribe_ticks(),
            alerts: publisher.subscribe_alerts(),
            company_updates: publisher.subscribe_company_updates(),
        }
    }

    /// Forward until the publisher goes away.
    pub async fn run(mut self, registry: Arc<Registry>) {
        loop {
            tokio::select! {
                tick = self.ticks.recv() => match tick {
                    Ok(state) => {
                        if let Some(text) = encode(&ServerMessage::TickUpdate(&state)) {
                            let sent = registry.broadcast_tick(state.tick_number, &text).await;
                            debug!(tick = state.tick_number, sent, "Tick relayed");
                        }
                    }
                    Err(e) => if closed("ticks", e) { break },
                },
                alert = self.alerts.recv() => match alert {
                    Ok(alert) => {
                        if let Some(text) = encode(&ServerMessage::Alert(&alert)) {
                            registry.send_to_company(alert.company_id, &text).await;
                        }
                    }
                    Err(e) => if closed("alerts", e) { break },
                },
                update = self.company_updates.recv() => match update {
                    Ok(update) => {
                        if let Some(text) = encode(&ServerMessage::PlayerUpdate(&update)) {
                            registry.send_to_company(update.company_id, &text).await;
                        }
                    }
                    Err(e) => if closed("company_updates", e) { break },
                },
            }
        }
        debug!("Relay stopped");
    }
}

fn encode(message: &ServerMessage<'_>) -> Option<Utf8Bytes> {
    message
        .encode()
        .map_err(|e| warn!(error = %e, "Failed to encode broadcast"))
        .ok()
}

/// Logs a receive error; returns whether the stream has ended.
fn closed(stream: &'static str, error: RecvError) -> bool {
    match error {
        RecvError::Lagged(skipped) => {
            warn!(stream, skipped, "Relay lagged, skipping ahead");
            false
        }
        RecvError::Closed => true,
    }
}
