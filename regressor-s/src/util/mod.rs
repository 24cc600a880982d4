pub mod cmd;
pub mod msg;

use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Compact console logging. `RUST_LOG` overrides the build default
/// (DEBUG for debug builds, INFO for release builds).
pub fn init_logging() {
    #[cfg(not(debug_assertions))]
    let default_level = Level::INFO;
    #[cfg(debug_assertions)]
    let default_level = Level::DEBUG;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!cfg!(windows))
        .with_target(false)
        .with_thread_ids(cfg!(debug_assertions))
        .with_file(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions))
        .compact()
        .init();

    debug!("Logging initialized");
}

/// Resolves once the process is asked to stop.
pub async fn shutdown_signal() {
    #[cfg(target_os = "linux")]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully...");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                }
                return;
            }
            _ => warn!("Failed to install unix signal listeners, falling back to ctrl-c"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received ctrl-c, shutting down gracefully..."),
        Err(e) => {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
