use thiserror::Error;

use crate::session::SessionError;

/// Failures that end the consumer. Per-message problems never surface here: they become
/// records on the log stream instead.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to connect to Kafka after {attempts} attempts: {last_error}")]
    ConnectionFailure {
        attempts: u32,
        last_error: SessionError,
    },

    #[error("Failed to subscribe to topics: {0}")]
    Subscribe(SessionError),

    #[error("Failed to write log record: {0}")]
    Sink(#[from] std::io::Error),
}
