use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Listen for SIGTERM / SIGINT and cancel the returned token on the first
/// one. The run loop watches this token: throttled workers wake from their
/// cooling sleep and the coordinator abandons its collection barrier.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, stopping run");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, stopping run");
            }
        }

        signal_token.cancel();
    });

    token
}
