//! TOML-backed service configuration.

use std::path::Path;
use std::time::Duration;

use courier_delivery::DispatchConfig;
use courier_pool::{Credentials, PoolConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("relay address must be set")]
    MissingRelayAddress,

    #[error("sender address must be set")]
    MissingSender,

    #[error("relay username and password must be set together")]
    PartialCredentials,

    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("max attempts must be at least 1")]
    ZeroMaxAttempts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub relay: RelaySettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default = "default_language")]
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Relay address as `host:port`.
    pub address: String,
    /// Envelope sender and From header address.
    pub sender: String,
    /// TLS verification name; defaults to the host part of `address`.
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default = "default_helo_domain")]
    pub helo_domain: String,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_pool_size")]
    pub size: usize,
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            max_idle_secs: default_max_idle_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            op_timeout_secs: default_op_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_helo_domain() -> String {
    "localhost".to_string()
}

const fn default_pool_size() -> usize {
    4
}

const fn default_max_idle_secs() -> u64 {
    300
}

const fn default_max_lifetime_secs() -> u64 {
    3600
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_op_timeout_secs() -> u64 {
    30
}

const fn default_queue_capacity() -> usize {
    128
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_interval_secs() -> u64 {
    60
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.address.is_empty() {
            return Err(ConfigError::MissingRelayAddress);
        }
        if self.relay.sender.is_empty() {
            return Err(ConfigError::MissingSender);
        }
        if self.relay.username.is_some() != self.relay.password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        if self.pool.size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        Ok(())
    }

    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        let server_name = self.relay.server_name.clone().unwrap_or_else(|| {
            self.relay
                .address
                .split(':')
                .next()
                .unwrap_or(&self.relay.address)
                .to_string()
        });

        PoolConfig {
            relay_addr: self.relay.address.clone(),
            server_name,
            helo_domain: self.relay.helo_domain.clone(),
            starttls: self.relay.starttls,
            credentials: match (&self.relay.username, &self.relay.password) {
                (Some(username), Some(password)) => Some(Credentials {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => None,
            },
            capacity: self.pool.size,
            max_idle: Duration::from_secs(self.pool.max_idle_secs),
            max_lifetime: Duration::from_secs(self.pool.max_lifetime_secs),
            sweep_interval: Duration::from_secs(self.pool.sweep_interval_secs),
            op_timeout: Duration::from_secs(self.pool.op_timeout_secs),
        }
    }

    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            sender: self.relay.sender.clone(),
            op_timeout: Duration::from_secs(self.pool.op_timeout_secs),
            default_language: self.default_language.clone(),
        }
    }

    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.queue.retry_interval_secs)
    }
}
