mod app_state;
mod auth;
mod clerk;
mod config;
mod error;
mod github;
mod installations;
mod routes;
mod store;
mod sync;
mod users;
mod utils;
mod webhooks;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::build_app_state;
use crate::config::Config;
use crate::routes::router;
use crate::webhooks::dispatch::replay_unhandled;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.tokio_console);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server exited with an error");
        std::process::exit(1);
    }
}

fn init_tracing(tokio_console: bool) {
    if tokio_console {
        console_subscriber::init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(build_app_state(&config)?);

    if config.replay_on_start {
        let state = state.clone();
        tokio::spawn(async move {
            match replay_unhandled(&state).await {
                Ok(handled) => info!(handled, "Replay of unhandled deliveries finished"),
                Err(e) => warn!(error = %e, "Could not replay unhandled deliveries"),
            }
        });
    }

    let app = router(state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
