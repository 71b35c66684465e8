use serde::Deserialize;

use bubblepop_core::config::{ConfigError, RoundConfig};

/// Top-level server configuration, loaded from `bubblepop.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// JSON file backing persistent player stats. In memory only when unset.
    pub stats_path: Option<String>,
    pub limits: LimitsConfig,
    pub world: WorldConfig,
    /// Round constants. When the file has no `[round]` table they come from
    /// `RoundConfig::load`.
    pub round: Option<RoundConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            stats_path: None,
            limits: LimitsConfig::default(),
            world: WorldConfig::default(),
            round: None,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub broadcast_capacity: usize,
    pub command_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            broadcast_capacity: 1024,
            command_buffer: 512,
            ws_rate_limit_per_sec: 50.0,
        }
    }
}

/// Simulated world timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Delay between a spawn request and its completion (milliseconds).
    pub spawn_latency_ms: u64,
    /// Bubble movement step (milliseconds).
    pub frame_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            spawn_latency_ms: 20,
            frame_interval_ms: 100,
        }
    }
}

impl ServerConfig {
    /// Round constants in effect.
    pub fn round_config(&self) -> RoundConfig {
        self.round.clone().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            )));
        }
        if self.limits.max_ws_connections == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_ws_connections must be > 0".into(),
            ));
        }
        if self.limits.broadcast_capacity == 0 || self.limits.command_buffer == 0 {
            return Err(ConfigError::Invalid(
                "limits.broadcast_capacity and limits.command_buffer must be > 0".into(),
            ));
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::Invalid(
                "limits.ws_rate_limit_per_sec must be > 0".into(),
            ));
        }
        if self.world.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "world.frame_interval_ms must be > 0".into(),
            ));
        }
        self.round_config().validate()
    }

    /// Load config from `bubblepop.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("bubblepop.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from bubblepop.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse bubblepop.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No bubblepop.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if config.round.is_none() {
            config.round = Some(RoundConfig::load());
        }

        if let Ok(addr) = std::env::var("BUBBLEPOP_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("BUBBLEPOP_STATS_PATH")
            && !path.is_empty()
        {
            config.stats_path = Some(path);
        }
        if let Ok(val) = std::env::var("BUBBLEPOP_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("BUBBLEPOP_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("BUBBLEPOP_ROUND_DURATION")
            && let Ok(n) = val.parse::<u32>()
            && let Some(round) = config.round.as_mut()
        {
            round.round_duration_secs = n;
        }

        config
    }
}
