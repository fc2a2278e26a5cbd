use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "pollmq.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How long in-flight requests may keep running after a shutdown signal.
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            drain_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConsumeConfig {
    /// Upper bound on a requested wait. `0` leaves waits uncapped.
    pub max_wait_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub consume: ConsumeConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

impl Config {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.server.drain_timeout_secs)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        match self.consume.max_wait_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Replaces the port of `server.bind_addr`, keeping its host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.server.bind_addr.rsplit_once(':') {
            Some((host, _)) => host,
            None => self.server.bind_addr.as_str(),
        };
        self.server.bind_addr = format!("{host}:{port}");
    }

    /// Applies `POLLMQ_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var("POLLMQ_BIND_ADDR") {
            self.server.bind_addr = v;
        }

        if let Ok(v) = env::var("POLLMQ_DRAIN_TIMEOUT_SECS") {
            self.server.drain_timeout_secs = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("POLLMQ_DRAIN_TIMEOUT_SECS: {e}")))?;
        }

        if let Ok(v) = env::var("POLLMQ_MAX_WAIT_SECS") {
            self.consume.max_wait_secs = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("POLLMQ_MAX_WAIT_SECS: {e}")))?;
        }

        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw: String = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&raw)?;
    Ok(config)
}

/// Loads configuration from an optional file path and environment variables.
///
/// Precedence: defaults, then the file, then the environment. The path falls
/// back to `POLLMQ_CONFIG` and then to [`DEFAULT_CONFIG_PATH`]; only an
/// explicitly named file is required to exist.
pub fn load(path: Option<&str>) -> Result<Config, ConfigError> {
    let explicit = path
        .map(str::to_string)
        .or_else(|| env::var("POLLMQ_CONFIG").ok());

    let mut config = match explicit {
        Some(p) => load_config(p)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };

    config.apply_env()?;
    Ok(config)
}
