//! Server Configuration
//!
//! Defaults, then an optional TOML file named by `ORB_RUSH_CONFIG`, then
//! `ORB_RUSH_*` environment overrides, then validation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::game::config::{ArenaConfig, ArenaConfigError, DebuffTarget, ObjectPolicy};
use crate::game::world::MAX_PLAYERS;
use crate::network::session::SessionConfig;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "ORB_RUSH_CONFIG";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "ORB_RUSH_";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Period of the round clock.
    pub tick_interval: Duration,
    /// Arena session settings.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8765)),
            max_connections: 16,
            tick_interval: Duration::from_secs(1),
            session: SessionConfig::default(),
        }
    }
}

/// On-disk layout. Missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind_addr: Option<SocketAddr>,
    max_connections: Option<usize>,
    tick_interval_ms: Option<u64>,
    max_players: Option<usize>,
    verify_replay: Option<bool>,
    arena: Option<ArenaConfig>,
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::from_sources(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from an optional file and an environment lookup.
    pub fn from_sources(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_toml(&content)?;
                info!(path = %path.display(), "loaded configuration file");
                config
            }
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(addr) = file.bind_addr {
            config.bind_addr = addr;
        }
        if let Some(n) = file.max_connections {
            config.max_connections = n;
        }
        if let Some(ms) = file.tick_interval_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(n) = file.max_players {
            config.session.max_players = n;
        }
        if let Some(verify) = file.verify_replay {
            config.session.verify_replay = verify;
        }
        if let Some(arena) = file.arena {
            config.session.arena = arena;
        }
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            env(&key).filter(|v| !v.is_empty()).map(|v| (key, v))
        };

        if let Some((key, value)) = var("BIND_ADDR") {
            self.bind_addr = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("MAX_CONNECTIONS") {
            self.max_connections = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("TICK_INTERVAL_MS") {
            self.tick_interval = Duration::from_millis(parse_env(key, value)?);
        }
        if let Some((key, value)) = var("MAX_PLAYERS") {
            self.session.max_players = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("ROUND_DURATION_SECS") {
            self.session.arena.round_duration_secs = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("OBJECT_POLICY") {
            self.session.arena.object_policy = match value.as_str() {
                "relay" => ObjectPolicy::Relay,
                "carry" => ObjectPolicy::Carry,
                _ => return Err(ConfigError::InvalidEnv { key, value }),
            };
        }
        if let Some((key, value)) = var("DEBUFF_TARGET") {
            self.session.arena.debuff_target = match value.as_str() {
                "opponents" => DebuffTarget::Opponents,
                "collector" => DebuffTarget::Collector,
                _ => return Err(ConfigError::InvalidEnv { key, value }),
            };
        }
        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be > 0".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be > 0".into()));
        }
        if !(1..=MAX_PLAYERS).contains(&self.session.max_players) {
            return Err(ConfigError::Invalid(format!(
                "max_players must be between 1 and {MAX_PLAYERS}"
            )));
        }
        self.session.arena.validate()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: String, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this layout.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override could not be parsed.
    #[error("Invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },

    /// Server settings failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Arena settings failed validation.
    #[error("Invalid arena configuration: {0}")]
    Arena(#[from] ArenaConfigError),
}
