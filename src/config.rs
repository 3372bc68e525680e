use crate::kafka::KeyStrategy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub kafka: KafkaConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,
    #[serde(default)]
    pub create_topics: bool,
    #[serde(default = "default_topic_partitions")]
    pub topic_partitions: i32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i32,
}

/// How the publisher obtains a broker connection for each publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// One long-lived producer checked out by every publish.
    #[default]
    Shared,
    /// A dedicated producer opened before and released after each publish.
    PerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerKind {
    /// Partition with the fewest pending bytes.
    #[default]
    LeastBytes,
    /// librdkafka murmur2 hash of the message key.
    KeyHash,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub connection: ConnectionMode,
    #[serde(default)]
    pub partitioner: PartitionerKind,
    #[serde(default)]
    pub key_strategy: KeyStrategy,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Config {
    /// Loads configuration from an optional file layered under the
    /// `CAT_EVENTS_*` environment.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("CAT_EVENTS")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must not be empty".to_string()));
        }
        if self.publish.ack_timeout_ms == 0 {
            return Err(Error::Config(
                "publish.ack_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let retry = &self.publish.retry;
        if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "publish.retry.multiplier must be >= 1.0, got {}",
                retry.multiplier
            )));
        }
        if retry.max_backoff_ms < retry.initial_backoff_ms {
            return Err(Error::Config(format!(
                "publish.retry.max_backoff_ms ({}) is below initial_backoff_ms ({})",
                retry.max_backoff_ms, retry.initial_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn bootstrap_servers(&self) -> String {
        self.kafka
            .brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PublishConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

impl KafkaConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            compression: default_compression(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            create_topics: false,
            topic_partitions: default_topic_partitions(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionMode::default(),
            partitioner: PartitionerKind::default(),
            key_strategy: KeyStrategy::default(),
            ack_timeout_ms: default_ack_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_compression() -> String {
    "none".to_string()
}

fn default_metadata_timeout_ms() -> u64 {
    5000
}

fn default_topic_partitions() -> i32 {
    3
}

fn default_replication_factor() -> i32 {
    1
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_multiplier() -> f64 {
    2.0
}
