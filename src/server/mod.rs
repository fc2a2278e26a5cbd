//! Listener startup and graceful shutdown.
//!
//! On SIGINT/SIGTERM the server stops accepting connections and lets
//! in-flight requests, long polls included, run to completion for up to
//! `server.drain_timeout_secs`.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::core::broker::Broker;

/// Binds `config.server.bind_addr` and serves until a shutdown signal.
pub async fn serve(config: &Config, broker: Arc<Broker>) -> anyhow::Result<()> {
    let listener: TcpListener = TcpListener::bind(&config.server.bind_addr).await?;
    info!("pollmq listening on {}", listener.local_addr()?);

    serve_with_shutdown(listener, config, broker, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves, then
/// drains.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    config: &Config,
    broker: Arc<Broker>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = api::router(AppState::new(Arc::clone(&broker), config.max_wait()));
    let drain_timeout = config.drain_timeout();

    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown requested; draining in-flight requests");
            let _ = draining_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async move {
        match draining_rx.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            // Server finished on its own.
            Err(_) => std::future::pending().await,
        }
    };

    tokio::select! {
        result = &mut server => result?,
        _ = drain_deadline => {
            warn!(?drain_timeout, "drain timed out; abandoning remaining requests");
        }
    }

    info!(
        buffered = broker.store().total_len(),
        queues = broker.store().queue_count(),
        "pollmq stopped"
    );
    info!("final counters:\n{}", broker.stats().snapshot());
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
