use tokio::signal::unix::SignalKind;

/// Resolves with the name of the first termination signal received (SIGINT or SIGTERM).
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        result = ctrl_c => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
