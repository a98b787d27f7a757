mod config;
mod routes;
mod scheduler;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing::info;

use livecast_gateway::Dispatcher;
use livecast_source::GraphClient;
use livecast_store::CommentStore;

use crate::config::Config;
use crate::routes::AppState;
use crate::scheduler::Schedule;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "livecast=debug,livecast_source=debug,livecast_store=debug,livecast_gateway=debug,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your environment or .env file and restart.");
            std::process::exit(1);
        }
    };

    let store = CommentStore::new();
    let dispatcher = Dispatcher::new();
    let client = GraphClient::new(config.graph.clone())?;

    let state = AppState {
        store: store.clone(),
        dispatcher: dispatcher.clone(),
    };
    let app = routes::app(state, &config.static_dir);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Live comments overlay listening on {}", addr);
    info!("Token set: {}", !config.graph.access_token.is_empty());
    info!("Video ID: {}", config.graph.resource_id);
    info!(
        "Refresh every {:?}, display {} shuffled comments every {:?}",
        config.refresh_interval, config.sample_size, config.display_interval
    );
    info!("Fetching starts in {:?}", config.startup_delay);

    // Background loops start after the listener is bound
    let cancel = CancellationToken::new();
    let scheduler = scheduler::spawn(
        Schedule {
            startup_delay: config.startup_delay,
            refresh_interval: config.refresh_interval,
            display_interval: config.display_interval,
            sample_size: config.sample_size,
        },
        client,
        store,
        dispatcher,
        cancel.clone(),
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    scheduler.join().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_covers_workspace_crates() {
        for target in ["livecast", "livecast_source", "livecast_store", "livecast_gateway"] {
            let directive = format!("{}=debug", target);
            assert!(
                DEFAULT_LOG_FILTER.split(',').any(|d| d == directive),
                "missing {}",
                directive
            );
        }
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
