use std::future::Future;
use std::process::ExitCode;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use crate::error::ConsumerError;

/// `0` after a graceful shutdown, `1` for any failure of the consumer.
pub fn exit_code(result: &Result<(), ConsumerError>) -> ExitCode {
    match result {
        Ok(()) => {
            info!("CDC consumer stopped");
            ExitCode::SUCCESS
        }
        Err(e @ ConsumerError::ConnectionFailure { .. }) => {
            error!("Giving up on Kafka: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("CDC consumer failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Drives `future` to completion, then shuts the runtime down without waiting more than `grace`
/// for blocking tasks. A broker close that outlived its timeout keeps running on a blocking
/// thread, and dropping the runtime normally would wait for it.
pub fn block_on_bounded<F: Future>(runtime: Runtime, grace: Duration, future: F) -> F::Output {
    let output = runtime.block_on(future);

    let started = std::time::Instant::now();
    runtime.shutdown_timeout(grace);
    if started.elapsed() >= grace {
        warn!("Runtime shutdown hit the {:?} grace period", grace);
    }

    output
}
