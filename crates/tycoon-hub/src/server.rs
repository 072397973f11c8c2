//! Hub server lifecycle.
//!
//! [`serve`] runs the HTTP listener together with the two background tasks
//! that keep connections current: the publisher relay and the heartbeat.
//! Both are stopped when the listener shuts down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tycoon_core::config::HubConfig;

use crate::heartbeat::run_heartbeat;
use crate::error::HubError;
use crate::relay::Relay;
use crate::router::build_router;
use crate::state::HubState;

/// Bind the configured host and port.
pub async fn bind(config: &HubConfig) -> Result<TcpListener, HubError> {
    let raw = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw.parse().map_err(|e: std::net::AddrParseError| {
        HubError::InvalidAddress {
            addr: raw.clone(),
            reason: e.to_string(),
        }
    })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| HubError::Bind { addr: raw, source })
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<HubState>,
    shutdown: F,
) -> Result<(), HubError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let relay = Relay::subscribe(&state.publisher);
    let relay_task = tokio::spawn(relay.run(Arc::clone(&state.registry)));
    let heartbeat_task = tokio::spawn(run_heartbeat(
        Arc::clone(&state.registry),
        state.ping_interval,
    ));

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Hub listening");
    }
    let result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(HubError::Serve);

    relay_task.abort();
    heartbeat_task.abort();
    info!("Hub stopped");
    result
}

/// [`bind`] then [`serve`].
pub async fn start_server<F>(
    config: &HubConfig,
    state: Arc<HubState>,
    shutdown: F,
) -> Result<(), HubError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(config).await?;
    serve(listener, state, shutdown).await
}
