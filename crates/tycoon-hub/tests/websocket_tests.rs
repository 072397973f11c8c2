//! End-to-end `WebSocket` tests against a hub bound to an ephemeral port.
//!
//! A real `tokio-tungstenite` client walks the connection lifecycle:
//! greeting, authentication, broadcasts, targeted messages and heartbeat
//! pruning.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tycoon_core::TickPublisher;
use tycoon_core::config::HubConfig;
use tycoon_hub::{Claims, HmacTokenVerifier, HubState, serve};
use tycoon_types::{
    Alert, AlertCategory, AlertType, Balances, CompanyId, CompanyUpdate, Reputation, TickState,
    UserId,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "test-secret";
const WAIT: Duration = Duration::from_secs(5);

struct Hub {
    addr: SocketAddr,
    state: Arc<HubState>,
    stop: Option<oneshot::Sender<()>>,
}

impl Hub {
    async fn start(ping_interval_secs: u64) -> Self {
        let config = HubConfig {
            ping_interval_secs,
            ..HubConfig::default()
        };
        let state = Arc::new(HubState::new(
            &config,
            Arc::new(TickPublisher::default()),
            Arc::new(HmacTokenVerifier::new(SECRET).unwrap()),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, Arc::clone(&state), async {
            let _ = stopped.await;
        }));
        Self {
            addr,
            state,
            stop: Some(stop),
        }
    }

    async fn connect(&self) -> Client {
        let (mut client, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .unwrap();
        let hello = next_json(&mut client).await;
        assert_eq!(hello["type"], "connected");
        client
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn token(company_id: Option<CompanyId>) -> (UserId, String) {
    let user_id = UserId::new();
    let claims = Claims::new(user_id, company_id, Utc::now(), chrono::Duration::hours(1));
    let token = HmacTokenVerifier::new(SECRET)
        .unwrap()
        .issue(&claims)
        .unwrap();
    (user_id, token)
}

fn tick(tick_number: u64) -> Arc<TickState> {
    Arc::new(TickState {
        tick_number,
        btc_price: 43_250.0,
        difficulty: 62.5e12,
        network_hashrate: 7.5e17,
        regional_data: BTreeMap::new(),
        timestamp: Utc::now(),
    })
}

async fn send(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn authenticate(hub: &Hub, company_id: Option<CompanyId>) -> (UserId, Client) {
    let mut client = hub.connect().await;
    let (user_id, token) = token(company_id);
    send(&mut client, json!({"type": "auth", "data": {"token": token}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "auth_success");
    (user_id, client)
}

#[tokio::test]
async fn unauthenticated_connection_gets_errors_and_stays_open() {
    let hub = Hub::start(30).await;
    let mut client = hub.connect().await;

    send(&mut client, json!({"type": "ping"})).await;
    let pong = next_json(&mut client).await;
    assert_eq!(pong["type"], "pong");
    assert!(pong["data"]["timestamp"].is_i64());

    send(&mut client, json!({"type": "subscribe", "data": {"channel": "market"}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply, json!({"type": "error", "data": {"message": "Not authenticated"}}));

    client.send(Message::text("{not json")).await.unwrap();
    let reply = next_json(&mut client).await;
    assert_eq!(reply["data"]["message"], "Invalid message format");

    send(&mut client, json!({"type": "trade", "data": {}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["data"]["message"], "Unknown message type");

    send(&mut client, json!({"type": "auth", "data": {}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply, json!({"type": "auth_error", "data": {"message": "No token provided"}}));

    send(&mut client, json!({"type": "auth", "data": {"token": "deadbeef.cafe"}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "auth_error");
    assert_eq!(reply["data"]["message"], "Invalid token");

    // A failed attempt does not close the connection; a retry succeeds.
    let (user_id, token) = token(None);
    send(&mut client, json!({"type": "auth", "data": {"token": token}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "auth_success");
    assert_eq!(reply["data"]["userId"], json!(user_id.into_inner()));
}

#[tokio::test]
async fn authentication_pushes_latest_tick_then_broadcasts() {
    let hub = Hub::start(30).await;
    hub.state.publisher.set_latest(tick(4));
    let company_id = CompanyId::new();

    let (_, mut client) = authenticate(&hub, Some(company_id)).await;
    let current = next_json(&mut client).await;
    assert_eq!(current["type"], "tick:update");
    assert_eq!(current["data"]["tickNumber"], 4);

    send(&mut client, json!({"type": "subscribe", "data": {"channel": "market"}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply, json!({"type": "subscribed", "data": {"channel": "market"}}));

    hub.state.publisher.publish_tick(tick(5));
    let update = next_json(&mut client).await;
    assert_eq!(update["type"], "tick:update");
    assert_eq!(update["data"]["tickNumber"], 5);
    assert_eq!(hub.state.registry.authenticated().await, 1);
}

#[tokio::test]
async fn alerts_and_player_updates_reach_only_their_company() {
    let hub = Hub::start(30).await;
    let company_id = CompanyId::new();
    let (_, mut mine) = authenticate(&hub, Some(company_id)).await;
    let (_, mut other) = authenticate(&hub, Some(CompanyId::new())).await;

    hub.state.publisher.publish_alert(Alert::new(
        company_id,
        AlertType::Critical,
        AlertCategory::Trading,
        "Position liquidated: BTC_PERP",
        json!({"loss": 8000.0}),
    ));
    let alert = next_json(&mut mine).await;
    assert_eq!(alert["type"], "alert");
    assert_eq!(alert["data"]["message"], "Position liquidated: BTC_PERP");

    hub.state.publisher.publish_company_update(CompanyUpdate {
        company_id,
        tick_number: 6,
        balances: Balances {
            usd: 42_000.0,
            btc: 0.25,
        },
        reputation: Reputation::default(),
    });
    let update = next_json(&mut mine).await;
    assert_eq!(update["type"], "player:update");
    assert_eq!(update["data"]["balances"]["btc"], 0.25);

    // The other company only sees the next broadcast tick.
    hub.state.publisher.publish_tick(tick(7));
    let first = next_json(&mut other).await;
    assert_eq!(first["type"], "tick:update");
    assert_eq!(first["data"]["tickNumber"], 7);
}

#[tokio::test]
async fn silent_client_is_pruned_and_receives_no_more_ticks() {
    let hub = Hub::start(1).await;
    let (_, live) = authenticate(&hub, None).await;
    let (_, mut silent) = authenticate(&hub, None).await;

    // Keep reading the live client so its pongs go out.
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut live = live;
        while let Some(Ok(frame)) = live.next().await {
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if frames_tx.send(value).is_err() {
                    break;
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(hub.state.registry.authenticated().await, 1);

    hub.state.publisher.publish_tick(tick(9));
    let update = timeout(WAIT, frames.recv()).await.unwrap().unwrap();
    assert_eq!(update["data"]["tickNumber"], 9);

    // Drain what the silent client was sent before it was closed.
    let mut ticks_after_prune = 0;
    loop {
        match timeout(WAIT, silent.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == "tick:update" && value["data"]["tickNumber"] == 9 {
                    ticks_after_prune += 1;
                }
            }
            Some(Ok(Message::Close(_)) | Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }
    assert_eq!(ticks_after_prune, 0);
}
