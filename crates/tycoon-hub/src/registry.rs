//! Live connections and their identities.
//!
//! Each connection owns a bounded outbound queue drained by its own writer
//! task. The registry only ever `try_send`s into those queues, so fan-out
//! never waits on a slow socket: a full queue drops the message for that
//! connection alone. Removing a connection drops the registry's sender,
//! which ends the writer and closes the socket.
//!
//! Each connection remembers the newest tick it has been sent, so a tick
//! already delivered in the authentication greeting, or one older than it,
//! is never sent again.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use tycoon_types::{CompanyId, UserId};

/// Hub-local handle for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Who an authenticated connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// The user's company, if any.
    pub company_id: Option<CompanyId>,
}

#[derive(Debug)]
struct Connection {
    tx: mpsc::Sender<Message>,
    identity: Option<Identity>,
    alive: bool,
    last_tick: Option<u64>,
}

impl Connection {
    fn deliver(&self, id: ConnectionId, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(connection = %id, "Outbound queue full, message dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Outcome of one heartbeat sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Connections that had not answered the previous ping.
    pub pruned: usize,
    /// Connections pinged for the next sweep.
    pub pinged: usize,
}

/// Every open connection, authenticated or not.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: AtomicU64,
    connections: RwLock<BTreeMap<ConnectionId, Connection>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new, unauthenticated connection.
    pub async fn register(&self, tx: mpsc::Sender<Message>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.write().await.insert(
            id,
            Connection {
                tx,
                identity: None,
                alive: true,
                last_tick: None,
            },
        );
        id
    }

    /// Forget a connection. Returns whether it was still registered.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.connections.write().await.remove(&id).is_some()
    }

    /// Attach `identity` to a connection and queue `greeting` to it under
    /// the same lock, so no broadcast lands between the two.
    ///
    /// `greeting_tick` is the tick number carried by the greeting, if any;
    /// [`Registry::broadcast_tick`] skips that tick and older ones for this
    /// connection.
    pub async fn authenticate(
        &self,
        id: ConnectionId,
        identity: Identity,
        greeting: &[Utf8Bytes],
        greeting_tick: Option<u64>,
    ) -> bool {
        let mut connections = self.connections.write().await;
        let Some(connection) = connections.get_mut(&id) else {
            return false;
        };
        connection.identity = Some(identity);
        connection.last_tick = connection.last_tick.max(greeting_tick);
        for text in greeting {
            connection.deliver(id, Message::Text(text.clone()));
        }
        true
    }

    /// Identity of a connection, if it has authenticated.
    pub async fn identity(&self, id: ConnectionId) -> Option<Identity> {
        self.connections
            .read()
            .await
            .get(&id)
            .and_then(|c| c.identity)
    }

    /// Queue a frame to one connection.
    pub async fn send_to(&self, id: ConnectionId, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(&id)
            .is_some_and(|c| c.deliver(id, message))
    }

    /// Record a pong.
    pub async fn mark_alive(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.alive = true;
        }
    }

    /// Queue `text` to every authenticated connection.
    pub async fn broadcast(&self, text: &Utf8Bytes) -> usize {
        self.fan_out(text, |_| true).await
    }

    /// Queue the encoded `tick:update` for `tick` to every authenticated
    /// connection that has not yet been sent that tick or a newer one.
    pub async fn broadcast_tick(&self, tick: u64, text: &Utf8Bytes) -> usize {
        let mut connections = self.connections.write().await;
        let mut sent = 0_usize;
        for (id, connection) in connections.iter_mut() {
            if connection.identity.is_none() || connection.last_tick.is_some_and(|t| t >= tick) {
                continue;
            }
            if connection.deliver(*id, Message::Text(text.clone())) {
                connection.last_tick = Some(tick);
                sent = sent.saturating_add(1);
            }
        }
        sent
    }

    /// Queue `text` to every connection of `user_id`.
    pub async fn send_to_user(&self, user_id: UserId, text: &Utf8Bytes) -> usize {
        self.fan_out(text, |identity| identity.user_id == user_id)
            .await
    }

    /// Queue `text` to every connection of `company_id`.
    pub async fn send_to_company(&self, company_id: CompanyId, text: &Utf8Bytes) -> usize {
        self.fan_out(text, |identity| identity.company_id == Some(company_id))
            .await
    }

    async fn fan_out(&self, text: &Utf8Bytes, wanted: impl Fn(&Identity) -> bool) -> usize {
        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|(_, c)| c.identity.as_ref().is_some_and(&wanted))
            .filter(|(id, c)| c.deliver(**id, Message::Text(text.clone())))
            .count()
    }

    /// Drop connections that missed the previous ping, then ping the rest.
    pub async fn sweep(&self) -> Sweep {
        let mut sweep = Sweep::default();
        self.connections.write().await.retain(|id, connection| {
            if !connection.alive {
                warn!(connection = %id, "Connection missed heartbeat, pruning");
                sweep.pruned = sweep.pruned.saturating_add(1);
                return false;
            }
            connection.alive = false;
            if connection.deliver(*id, Message::Ping(Bytes::new())) {
                sweep.pinged = sweep.pinged.saturating_add(1);
            }
            true
        });
        sweep
    }

    /// Number of open connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connection is open.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Number of authenticated connections.
    pub async fn authenticated(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.identity.is_some())
            .count()
    }
}
