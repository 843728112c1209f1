use async_trait::async_trait;
use common_kafka::config::{ConsumerConfig, KafkaConfig};
use common_kafka::kafka_consumer::TopicConsumer;
use rdkafka::error::KafkaError;
use thiserror::Error;
use tokio::task::JoinError;

pub use common_kafka::kafka_consumer::ReceivedMessage as RawMessage;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("session is not connected")]
    NotConnected,
    #[error("Kafka client task failed: {0}")]
    Task(#[from] JoinError),
}

/// A broker session: connect, subscribe, pull messages one at a time, disconnect.
///
/// Where consumption starts (log beginning or committed offsets) is a property of the session,
/// fixed when it is constructed.
#[async_trait]
pub trait BrokerSession: Send {
    async fn connect(&mut self) -> Result<(), SessionError>;

    async fn subscribe(&mut self, topics: &[&str]) -> Result<(), SessionError>;

    /// `None` once the session will never deliver another message.
    async fn next_message(&mut self) -> Option<Result<RawMessage, SessionError>>;

    async fn disconnect(&mut self) -> Result<(), SessionError>;
}

pub struct KafkaSession {
    kafka: KafkaConfig,
    consumer: ConsumerConfig,
    inner: Option<TopicConsumer>,
}

impl KafkaSession {
    pub fn new(kafka: KafkaConfig, consumer: ConsumerConfig) -> Self {
        Self {
            kafka,
            consumer,
            inner: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl BrokerSession for KafkaSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        if self.inner.is_some() {
            return Ok(());
        }

        let kafka = self.kafka.clone();
        let consumer = self.consumer.clone();
        let topic_consumer =
            tokio::task::spawn_blocking(move || TopicConsumer::connect(&kafka, &consumer))
                .await??;

        self.inner = Some(topic_consumer);
        Ok(())
    }

    async fn subscribe(&mut self, topics: &[&str]) -> Result<(), SessionError> {
        let consumer = self.inner.as_ref().ok_or(SessionError::NotConnected)?;
        consumer.subscribe(topics)?;
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<RawMessage, SessionError>> {
        let consumer = self.inner.as_ref()?;
        Some(consumer.recv().await.map_err(SessionError::from))
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        let Some(consumer) = self.inner.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || consumer.close()).await??;
        Ok(())
    }
}
