use std::process::ExitCode;

use envconfig::Envconfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use cdc_consumer::config::Config;
use cdc_consumer::connection::ConnectionManager;
use cdc_consumer::lifecycle::{block_on_bounded, exit_code};
use cdc_consumer::router::TopicRouter;
use cdc_consumer::session::KafkaSession;
use cdc_consumer::signals::wait_for_shutdown_signal;
use cdc_consumer::sink::StdioSink;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stdout)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        );
    tracing_subscriber::registry().with(log_layer).init();
}

async fn run(config: Config) -> ExitCode {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                info!("Received {signal}, shutting down...");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to install shutdown signal handlers: {e}"),
        }
    });

    let session = KafkaSession::new(config.kafka.clone(), config.consumer.clone());
    let mut manager = ConnectionManager::new(
        session,
        TopicRouter::default(),
        config.retry_policy(),
        config.shutdown_grace_period(),
    );

    let consumer = tokio::spawn(async move {
        manager
            .run_until_shutdown(&StdioSink, &shutdown)
            .await
    });

    match consumer.await {
        Ok(result) => exit_code(&result),
        Err(e) => {
            error!("CDC consumer task panicked: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    setup_tracing();
    info!("Starting CDC consumer...");

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration from env: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        brokers = %config.kafka.kafka_hosts,
        group = %config.consumer.kafka_consumer_group,
        start_from = %config.consumer.kafka_consumer_start_from,
        "Loaded configuration"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let grace_period = config.shutdown_grace_period();
    block_on_bounded(runtime, grace_period, run(config))
}
