// src/config.rs

//! Manages gateway configuration: loading, resolving defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Which message bus implementation the gateway talks to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// A Kafka cluster reached through `broker_list`. Requires the `kafka` feature.
    #[default]
    Kafka,
    /// An in-process bus, for local development and tests.
    Memory,
}

/// Settings for the bus loop.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BusConfig {
    #[serde(default)]
    pub backend: BusBackend,
    /// How long one consumer poll may block, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl BusConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn default_poll_timeout_ms() -> u64 {
    10
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9187
}

/// The resolved and validated gateway configuration.
#[derive(Serialize, Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_clients: usize,
    /// Comma separated `host:port` list of bus brokers.
    pub broker_list: String,
    /// Consumer group of this gateway on the bus.
    pub group_id: String,
    /// Identity of this gateway. Replies are routed to `server-<server_id>`.
    pub server_id: u32,
    /// Connection string of the backing database. Only validated and passed along.
    pub connection_string: String,
    pub log_level: String,
    /// How long shutdown waits for client connections to wind down.
    pub shutdown_grace_ms: u64,
    pub bus: BusConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses, resolves and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let server_id = match raw_config.server_id {
            None => return Err(anyhow!("server_id missing")),
            Some(id) if id <= 0 => {
                return Err(anyhow!("server_id must be greater than 0, got {id}"));
            }
            Some(id) => u32::try_from(id)
                .map_err(|_| anyhow!("server_id {id} is out of range"))?,
        };

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            max_clients: raw_config.max_clients,
            broker_list: required(raw_config.broker_list, "broker_list")?,
            group_id: required(raw_config.group_id, "group_id")?,
            server_id,
            connection_string: required(raw_config.connection_string, "connection_string")?,
            log_level: normalize_log_level(&raw_config.log_level),
            shutdown_grace_ms: raw_config.shutdown_grace_ms,
            bus: raw_config.bus,
            metrics: raw_config.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.server_id == 0 {
            return Err(anyhow!("server_id must be greater than 0"));
        }
        if self.bus.poll_timeout_ms == 0 {
            return Err(anyhow!("bus.poll_timeout_ms cannot be 0"));
        }
        if self.bus.poll_timeout_ms > 1000 {
            warn!(
                "bus.poll_timeout_ms is {} ms; shutdown will take at least that long.",
                self.bus.poll_timeout_ms
            );
        }
        if self.bus.backend == BusBackend::Kafka && !cfg!(feature = "kafka") {
            return Err(anyhow!(
                "bus.backend is 'kafka' but this build does not include the 'kafka' feature"
            ));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }

    /// The address the WebSocket listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(anyhow!("{name} cannot be empty")),
        None => Err(anyhow!("{name} missing")),
    }
}

/// Maps the level names used in deployment configs onto `tracing` filter directives.
fn normalize_log_level(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    broker_list: Option<String>,
    group_id: Option<String>,
    server_id: Option<i64>,
    connection_string: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_shutdown_grace_ms")]
    shutdown_grace_ms: u64,
    #[serde(default)]
    bus: BusConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_clients() -> usize {
    10000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_shutdown_grace_ms() -> u64 {
    2000
}
