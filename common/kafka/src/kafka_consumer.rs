use rdkafka::{
    consumer::{BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer},
    error::KafkaError,
    types::RDKafkaErrorCode,
    ClientContext, Message, Offset,
};
use tracing::{debug, error, info};

use crate::config::{client_config, ConsumerConfig, KafkaConfig, StartPosition};

/// A message copied out of rdkafka's buffer, so it can outlive the consumer borrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Applies the start position on every partition assignment. `auto.offset.reset` alone only
/// covers partitions the group never committed, so replaying from the beginning has to rewind the
/// assignment explicitly.
pub struct StartPositionContext {
    start_from: StartPosition,
}

impl StartPositionContext {
    pub fn new(start_from: StartPosition) -> Self {
        Self { start_from }
    }
}

impl ClientContext for StartPositionContext {}

impl ConsumerContext for StartPositionContext {
    fn post_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                if self.start_from != StartPosition::Beginning || partitions.count() == 0 {
                    return;
                }

                let mut rewound = (*partitions).clone();
                if let Err(e) = rewound.set_all_offsets(Offset::Beginning) {
                    error!("Failed to rewind assigned partitions: {}", e);
                    return;
                }
                match base_consumer.assign(&rewound) {
                    Ok(()) => info!(
                        "Rewound {} assigned partitions to the beginning of the log",
                        rewound.count()
                    ),
                    Err(e) => error!("Failed to reassign partitions from the beginning: {}", e),
                }
            }
            Rebalance::Revoke(partitions) => {
                debug!("Revoked {} partitions", partitions.count());
            }
            Rebalance::Error(e) => {
                error!("Rebalance error: {}", e);
            }
        }
    }
}

/// Group consumer over any number of topics.
pub struct TopicConsumer {
    consumer: StreamConsumer<StartPositionContext>,
    commit_on_close: bool,
}

impl TopicConsumer {
    /// Creates the consumer and "pings" the brokers by requesting cluster metadata. Creating an
    /// rdkafka client alone never touches the network, so this is what tells us Kafka is up.
    ///
    /// Blocks for up to `kafka_connect_timeout_ms`, callers on a runtime should use
    /// `spawn_blocking`.
    pub fn connect(kafka: &KafkaConfig, consumer: &ConsumerConfig) -> Result<Self, KafkaError> {
        let client_config = client_config(kafka, consumer);
        debug!("rdkafka configuration: {:?}", client_config);

        let context = StartPositionContext::new(consumer.kafka_consumer_start_from);
        let stream_consumer: StreamConsumer<StartPositionContext> =
            client_config.create_with_context(context)?;
        let metadata = stream_consumer.fetch_metadata(None, consumer.connect_timeout())?;
        info!(
            "Reached Kafka brokers at {}, found {} topics",
            kafka.kafka_hosts,
            metadata.topics().len()
        );

        Ok(Self {
            consumer: stream_consumer,
            commit_on_close: consumer.kafka_consumer_start_from.commits_offsets(),
        })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<(), KafkaError> {
        self.consumer.subscribe(topics)
    }

    pub async fn recv(&self) -> Result<ReceivedMessage, KafkaError> {
        let message = self.consumer.recv().await?;

        Ok(ReceivedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        })
    }

    /// Commits (when offsets are tracked) and leaves the consumer group. The group membership is
    /// released when the underlying consumer is dropped, which blocks until the broker answers.
    pub fn close(self) -> Result<(), KafkaError> {
        let committed = if self.commit_on_close {
            match self.consumer.commit_consumer_state(CommitMode::Sync) {
                // Nothing consumed since the last auto-commit
                Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
                other => other,
            }
        } else {
            Ok(())
        };

        self.consumer.unsubscribe();
        drop(self.consumer);

        committed
    }
}
