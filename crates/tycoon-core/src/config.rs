//! Configuration loading and typed config structures for the Tycoon engine.
//!
//! The canonical configuration lives in `tycoon-config.yaml` at the project
//! root. Every section is optional; missing keys take the defaults below.
//! Model tunables are the parameter structs of the model crates, so the
//! YAML maps one-to-one onto what the pipeline consumes.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tycoon_ledger::{LedgerError, MiningParams, TradingParams};
use tycoon_market::{EventParams, MarketError, MarketParams, RegionParams};
use tycoon_progress::{ProgressError, ResearchParams};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A market, region or event tunable is out of range.
    #[error("invalid market configuration: {0}")]
    Market(#[from] MarketError),

    /// A mining or trading tunable is out of range.
    #[error("invalid ledger configuration: {0}")]
    Ledger(#[from] LedgerError),

    /// A research tunable is out of range.
    #[error("invalid research configuration: {0}")]
    Progress(#[from] ProgressError),

    /// Any other rejected value.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `tycoon-config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Scheduler cadence and throttles.
    #[serde(default)]
    pub engine: SchedulerConfig,

    /// Price walk and difficulty drift.
    #[serde(default)]
    pub market: MarketParams,

    /// Regional energy, temperature and reliability sampling.
    #[serde(default)]
    pub regions: RegionParams,

    /// Yield, wear, uptime and low-balance threshold.
    #[serde(default)]
    pub mining: MiningParams,

    /// Liquidation tunables.
    #[serde(default)]
    pub trading: TradingParams,

    /// Research increment.
    #[serde(default)]
    pub research: ResearchParams,

    /// World event probability.
    #[serde(default)]
    pub events: EventParams,

    /// Broadcast hub listener and liveness.
    #[serde(default)]
    pub hub: HubConfig,

    /// Token verification.
    #[serde(default)]
    pub auth: AuthConfig,

    /// External services.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Log level and output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file, apply environment overrides
    /// and validate.
    ///
    /// Environment variables take precedence over the file:
    /// - `DATABASE_URL` overrides `infrastructure.postgres_url`
    /// - `TOKEN_SECRET` overrides `auth.token_secret`
    /// - `PORT` overrides `hub.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, and a validation
    /// variant if any value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML string. Environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed YAML or a validation
    /// variant for out-of-range values.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from `DATABASE_URL`, `TOKEN_SECRET` and `PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is not a port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.infrastructure.postgres_url = Some(val);
        }
        if let Ok(val) = std::env::var("TOKEN_SECRET") {
            self.auth.token_secret = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            self.hub.port = val.parse().map_err(|e| ConfigError::Invalid {
                field: "hub.port",
                reason: format!("PORT={val}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.market.validate()?;
        self.regions.validate()?;
        self.events.validate()?;
        self.mining.validate()?;
        self.trading.validate()?;
        self.research.validate()?;
        self.hub.validate()?;
        if self.auth.token_secret.is_empty() {
            return Err(ConfigError::Invalid {
                field: "auth.token_secret",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Real-time milliseconds between tick starts.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// A tick slower than this is logged as a warning.
    #[serde(default = "default_slow_tick_warn_ms")]
    pub slow_tick_warn_ms: u64,

    /// Quest progress is recomputed on ticks divisible by this.
    #[serde(default = "default_quest_eval_every")]
    pub quest_eval_every: u64,

    /// Seed for the simulation RNG. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SchedulerConfig {
    /// Tick length as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Slow-tick threshold as a [`Duration`].
    pub const fn slow_tick_warn(&self) -> Duration {
        Duration::from_millis(self.slow_tick_warn_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.tick_interval_ms",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.quest_eval_every == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.quest_eval_every",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            slow_tick_warn_ms: default_slow_tick_warn_ms(),
            quest_eval_every: default_quest_eval_every(),
            seed: None,
        }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Bind address.
    #[serde(default = "default_hub_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_hub_port")]
    pub port: u16,

    /// Seconds between liveness pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Messages queued per connection before new ones are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl HubConfig {
    /// Ping interval as a [`Duration`].
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.ping_interval_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.outbound_buffer",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: default_hub_host(),
            port: default_hub_port(),
            ping_interval_secs: default_ping_interval_secs(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Token verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// HMAC key shared with the token issuer.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

impl AuthConfig {
    /// Whether the built-in development secret is still in use.
    pub fn is_default_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
        }
    }
}

/// External service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` connection string. The in-memory store is used when
    /// absent.
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const DEV_TOKEN_SECRET: &str = "tycoon-dev-secret";

const fn default_tick_interval_ms() -> u64 {
    5_000
}

const fn default_slow_tick_warn_ms() -> u64 {
    1_000
}

const fn default_quest_eval_every() -> u64 {
    10
}

fn default_hub_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_hub_port() -> u16 {
    3000
}

const fn default_ping_interval_secs() -> u64 {
    30
}

const fn default_outbound_buffer() -> usize {
    64
}

fn default_token_secret() -> String {
    DEV_TOKEN_SECRET.to_owned()
}

const fn default_max_connections() -> u32 {
    16
}

fn default_log_level() -> String {
    "info".to_owned()
}
