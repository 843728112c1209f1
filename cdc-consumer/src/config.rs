use std::time::Duration;

use common_kafka::config::{ConsumerConfig, KafkaConfig};
use envconfig::Envconfig;

use crate::connection::RetryPolicy;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(from = "CONNECT_MAX_ATTEMPTS", default = "30")]
    pub connect_max_attempts: u32,

    #[envconfig(from = "CONNECT_RETRY_DELAY_MS", default = "5000")]
    pub connect_retry_delay_ms: u64,

    // Upper bound on the broker disconnect once shutdown has been requested
    #[envconfig(from = "SHUTDOWN_GRACE_PERIOD_MS", default = "10000")]
    pub shutdown_grace_period_ms: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_max_attempts,
            delay: Duration::from_millis(self.connect_retry_delay_ms),
        }
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_kafka::config::StartPosition;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.kafka.kafka_hosts, "kafka:9092");
        assert_eq!(config.kafka.kafka_client_id, "cdc-consumer");
        assert_eq!(config.consumer.kafka_consumer_group, "cdc-consumer-group");
        assert_eq!(
            config.consumer.kafka_consumer_start_from,
            StartPosition::Beginning
        );
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.shutdown_grace_period(), Duration::from_secs(10));
    }

    #[test]
    fn overrides() {
        let env = HashMap::from([
            ("KAFKA_BROKERS".to_string(), "broker-1:9092,broker-2:9092".to_string()),
            ("KAFKA_CONSUMER_START_FROM".to_string(), "committed".to_string()),
            ("CONNECT_MAX_ATTEMPTS".to_string(), "3".to_string()),
            ("CONNECT_RETRY_DELAY_MS".to_string(), "250".to_string()),
        ]);
        let config = Config::init_from_hashmap(&env).unwrap();

        assert_eq!(config.kafka.kafka_hosts, "broker-1:9092,broker-2:9092");
        assert_eq!(
            config.consumer.kafka_consumer_start_from,
            StartPosition::Committed
        );
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(250),
            }
        );
    }

    #[test]
    fn invalid_start_position_is_rejected() {
        let env = HashMap::from([(
            "KAFKA_CONSUMER_START_FROM".to_string(),
            "latest".to_string(),
        )]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }
}
