use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ConsumerError;
use crate::pipeline;
use crate::router::TopicRouter;
use crate::session::BrokerSession;
use crate::sink::LogSink;

// Pause after a broker-side receive error, so a flapping connection doesn't spin the loop
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Fixed-delay retry budget for establishing the session. There is no backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Started {
    Connected { attempts: u32 },
    /// Shutdown was requested before a session could be established.
    Cancelled,
}

/// Owns the broker session for the lifetime of the process:
/// construct, [`start`](Self::start), [`run`](Self::run), [`shutdown`](Self::shutdown).
pub struct ConnectionManager<S> {
    session: S,
    router: TopicRouter,
    retry: RetryPolicy,
    grace_period: Duration,
}

impl<S: BrokerSession> ConnectionManager<S> {
    pub fn new(session: S, router: TopicRouter, retry: RetryPolicy, grace_period: Duration) -> Self {
        Self {
            session,
            router,
            retry,
            grace_period,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Connects with bounded retry, then subscribes to every routed topic.
    pub async fn start(&mut self, shutdown: &CancellationToken) -> Result<Started, ConsumerError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(Started::Cancelled),
                result = self.session.connect() => result,
            };

            match result {
                Ok(()) => {
                    info!(attempts = attempt, "Connected to Kafka");
                    break;
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(ConsumerError::ConnectionFailure {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Kafka not ready, retrying in {:?}... ({}/{})",
                        self.retry.delay,
                        attempt,
                        max_attempts
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Ok(Started::Cancelled),
                        _ = tokio::time::sleep(self.retry.delay) => {}
                    }
                }
            }
        }

        let topics = self.router.topics();
        self.session
            .subscribe(&topics)
            .await
            .map_err(ConsumerError::Subscribe)?;
        info!("Subscribed to topics: {}", topics.join(", "));

        Ok(Started::Connected { attempts: attempt })
    }

    /// Pulls messages until shutdown is requested or the session runs dry. Each message goes
    /// through the pipeline to completion before the next one is pulled; cancellation is only
    /// observed between messages.
    pub async fn run<L>(&mut self, sink: &L, shutdown: &CancellationToken) -> Result<(), ConsumerError>
    where
        L: LogSink + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer consuming");
                    return Ok(());
                }
                next = self.session.next_message() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!(error = %e, "Kafka consumer error");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    continue;
                }
                None => {
                    warn!("Kafka session closed, no more messages");
                    return Ok(());
                }
            };

            if let Some(entry) = pipeline::process(&self.router, &message) {
                sink.emit(&entry)?;
            }
        }
    }

    /// Best-effort disconnect, bounded by the grace period. Never fails: a broken or slow
    /// disconnect is logged and shutdown carries on.
    pub async fn shutdown(&mut self) {
        info!("Disconnecting from Kafka");
        match tokio::time::timeout(self.grace_period, self.session.disconnect()).await {
            Ok(Ok(())) => info!("Disconnected from Kafka"),
            Ok(Err(e)) => warn!(error = %e, "Failed to disconnect from Kafka cleanly"),
            Err(_) => warn!(
                "Disconnect did not finish within {:?}, giving up",
                self.grace_period
            ),
        }
    }

    /// Full lifecycle: start, run until shutdown, disconnect. A session that never connected is
    /// not disconnected.
    pub async fn run_until_shutdown<L>(
        &mut self,
        sink: &L,
        shutdown: &CancellationToken,
    ) -> Result<(), ConsumerError>
    where
        L: LogSink + ?Sized,
    {
        let result = match self.start(shutdown).await {
            Ok(Started::Cancelled) => {
                info!("Shutdown requested before connecting");
                return Ok(());
            }
            Err(e @ ConsumerError::ConnectionFailure { .. }) => return Err(e),
            Err(e) => Err(e),
            Ok(Started::Connected { .. }) => self.run(sink, shutdown).await,
        };

        self.shutdown().await;
        result
    }
}
