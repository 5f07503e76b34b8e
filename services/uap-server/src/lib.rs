// server: the UAP Server — multiplexes many concurrent sessions over one
// UDP socket (spec §2, §4.4, §4.5).

mod dispatcher;
mod session;

pub use dispatcher::{Dispatcher, INACTIVITY_LIMIT};
pub use session::{classify, Session, SequenceOutcome};

use tracing::info;

/// Bind and run the server until a shutdown signal arrives.
///
/// # Panics
/// Panics if the UDP socket cannot be bound — an unrecoverable startup
/// error, matching how the teacher's binaries treat bind failures.
pub async fn run(port: u16) {
    let dispatcher = Dispatcher::bind(port)
        .await
        .unwrap_or_else(|e| panic!("failed to bind UDP port {port}: {e}"));
    info!(addr = %dispatcher.local_addr(), "server listening");

    tokio::select! {
        () = dispatcher.run() => {},
        () = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

/// Waits for SIGTERM or Ctrl-C (SIGINT).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C"); },
        () = terminate => { info!("received SIGTERM"); },
    }
}
