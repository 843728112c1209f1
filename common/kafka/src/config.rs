use std::{fmt, str::FromStr, time::Duration};

use envconfig::Envconfig;
use rdkafka::ClientConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    #[envconfig(from = "KAFKA_BROKERS", default = "kafka:9092")]
    pub kafka_hosts: String, // comma-separated host:port list

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "false")]
    pub kafka_verify_ssl_certificate: bool,

    #[envconfig(default = "cdc-consumer")]
    pub kafka_client_id: String,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    #[envconfig(default = "cdc-consumer-group")]
    pub kafka_consumer_group: String,

    // "beginning" replays every topic from the start of its log on each process start.
    // "committed" resumes after the group's committed offsets.
    #[envconfig(default = "beginning")]
    pub kafka_consumer_start_from: StartPosition,

    #[envconfig(default = "10000")]
    pub kafka_session_timeout_ms: u32,

    // Upper bound on the metadata fetch used to decide whether the brokers are reachable
    #[envconfig(default = "10000")]
    pub kafka_connect_timeout_ms: u64,
}

impl ConsumerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_connect_timeout_ms)
    }
}

/// Where a consumer starts reading when it joins the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Never commit offsets, and rewind every assigned partition to its earliest offset, even when
    /// the group has offsets committed by an earlier run.
    Beginning,
    /// Commit offsets as messages are consumed and resume from them on restart.
    Committed,
}

impl StartPosition {
    pub fn commits_offsets(&self) -> bool {
        matches!(self, StartPosition::Committed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid start position '{0}', expected 'beginning' or 'committed'")]
pub struct ParseStartPositionError(String);

impl FromStr for StartPosition {
    type Err = ParseStartPositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginning" | "earliest" => Ok(StartPosition::Beginning),
            "committed" => Ok(StartPosition::Committed),
            _ => Err(ParseStartPositionError(s.to_string())),
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::Beginning => write!(f, "beginning"),
            StartPosition::Committed => write!(f, "committed"),
        }
    }
}

/// rdkafka settings for a group consumer built from the two config sections.
pub fn client_config(kafka: &KafkaConfig, consumer: &ConsumerConfig) -> ClientConfig {
    let commit = consumer.kafka_consumer_start_from.commits_offsets();

    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &kafka.kafka_hosts)
        .set("client.id", &kafka.kafka_client_id)
        .set("group.id", &consumer.kafka_consumer_group)
        .set(
            "session.timeout.ms",
            consumer.kafka_session_timeout_ms.to_string(),
        )
        // Only consulted for partitions without a committed offset
        .set("auto.offset.reset", "earliest")
        .set("enable.partition.eof", "false")
        .set("enable.auto.commit", commit.to_string())
        .set("enable.auto.offset.store", commit.to_string());

    if kafka.kafka_tls {
        config.set("security.protocol", "ssl").set(
            "enable.ssl.certificate.verification",
            kafka.kafka_verify_ssl_certificate.to_string(),
        );
    };
    config
}
