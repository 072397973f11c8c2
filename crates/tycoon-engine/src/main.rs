//! Engine binary for the Tycoon simulation.
//!
//! Wires the persistence gateway, the tick scheduler and the broadcast hub
//! together and runs them until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (path argument, `tycoon-config.yaml`, or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Open the store: `PostgreSQL` when a URL is configured, otherwise an
//!    in-memory store seeded with a demo company
//! 4. Seed the starter quest catalog
//! 5. Start the tick scheduler
//! 6. Serve the hub until shutdown
//!
//! # Shutdown
//!
//! The scheduler is stopped first so the in-flight tick finishes, then the
//! hub drains, then the pool closes.

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tycoon_core::config::{EngineConfig, LogFormat, LoggingConfig};
use tycoon_core::seed::{create_starter_quests, seed_quests};
use tycoon_core::{Scheduler, TickPublisher};
use tycoon_db::demo::seed_demo_world;
use tycoon_db::{MemoryStore, PostgresConfig, PostgresPool, Store};
use tycoon_hub::{Claims, HmacTokenVerifier, HubState, start_server};
use tycoon_market::NoEffects;

use crate::error::EngineError;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_PATH: &str = "tycoon-config.yaml";

/// Lifetime of the token logged for the demo company.
const DEMO_TOKEN_TTL_HOURS: i64 = 24;

/// The opened store and, for `PostgreSQL`, the pool to close on exit.
struct Backend {
    store: Arc<dyn Store>,
    pool: Option<PostgresPool>,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any startup step fails or the hub stops serving.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration. Logging depends on it, so report the source after.
    let path = config_path(std::env::args().nth(1).map(PathBuf::from));
    let config = load_config(path.as_deref())?;

    // 2. Logging.
    init_logging(&config.logging);
    info!("tycoon-engine starting");
    match &path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        tick_interval_ms = config.engine.tick_interval_ms,
        quest_eval_every = config.engine.quest_eval_every,
        seed = ?config.engine.seed,
        hub_port = config.hub.port,
        "Engine configuration"
    );
    if config.auth.is_default_secret() {
        warn!("Using the development token secret; set TOKEN_SECRET in production");
    }

    let verifier = HmacTokenVerifier::new(config.auth.token_secret.as_bytes())?;

    // 3-4. Store and seed data.
    let backend = open_store(&config, &verifier).await?;

    // 5. Scheduler.
    let config = Arc::new(config);
    let publisher = Arc::new(TickPublisher::default());
    let scheduler = Scheduler::new(
        Arc::clone(&backend.store),
        Arc::clone(&config),
        Arc::new(NoEffects),
        Arc::clone(&publisher),
    );
    scheduler.start().await.map_err(EngineError::from)?;

    // 6. Hub.
    let hub_state = Arc::new(
        HubState::new(&config.hub, publisher, Arc::new(verifier)).with_stats(scheduler.stats()),
    );
    let (stop_hub, hub_stop_rx) = oneshot::channel::<()>();
    let hub_config = config.hub.clone();
    let mut hub = tokio::spawn(async move {
        start_server(&hub_config, hub_state, async move {
            let _ = hub_stop_rx.await;
        })
        .await
    });

    let hub_exited = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
            }
            info!("Shutdown requested");
            None
        }
        result = &mut hub => Some(result),
    };

    scheduler.stop().await;
    let hub_result = match hub_exited {
        Some(result) => result,
        None => {
            let _ = stop_hub.send(());
            hub.await
        }
    };
    if let Some(pool) = backend.pool {
        pool.close().await;
    }

    match hub_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(EngineError::from(e).into()),
        Err(e) => error!(error = %e, "Hub task ended abnormally"),
    }

    let stats = scheduler.stats().snapshot();
    info!(
        ticks_completed = stats.ticks_completed,
        ticks_failed = stats.ticks_failed,
        last_tick = stats.last_tick,
        "tycoon-engine shutdown complete"
    );
    Ok(())
}

/// The explicit path if given, else [`DEFAULT_CONFIG_PATH`] when it exists.
fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, EngineError> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    Ok(config)
}

/// `RUST_LOG` when set and valid, else the configured level, else `info`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_e| EnvFilter::try_new(level))
        .unwrap_or_else(|_e| EnvFilter::new("info"))
}

fn init_logging(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&logging.level))
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Connect to `PostgreSQL` or build the demo world in memory, then make
/// sure the quest catalog exists.
async fn open_store(
    config: &EngineConfig,
    verifier: &HmacTokenVerifier,
) -> Result<Backend, EngineError> {
    let now = Utc::now();

    if let Some(url) = &config.infrastructure.postgres_url {
        let pg_config =
            PostgresConfig::new(url).with_max_connections(config.infrastructure.max_connections);
        let pool = PostgresPool::connect(&pg_config).await?;
        let store: Arc<dyn Store> = Arc::new(pool.store());
        seed_quests(store.as_ref(), now).await?;
        return Ok(Backend {
            store,
            pool: Some(pool),
        });
    }

    info!("No database configured, running against the in-memory store");
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    seed_quests(store.as_ref(), now).await?;

    let demo = seed_demo_world(store.as_ref(), config.market.initial_price, now).await?;
    let enrolled = create_starter_quests(store.as_ref(), demo.company_id, now).await?;
    if let Some(company) = store.get_company(demo.company_id).await? {
        let claims = Claims::new(
            company.user_id,
            Some(company.id),
            now,
            Duration::hours(DEMO_TOKEN_TTL_HOURS),
        );
        let token = verifier.issue(&claims)?;
        info!(
            company_id = %company.id,
            user_id = %company.user_id,
            quests = enrolled,
            "Demo company ready"
        );
        // Credentials stay out of info-level sinks.
        debug!(company_id = %company.id, token, "Demo company bearer token");
    }

    Ok(Backend { store, pool: None })
}
