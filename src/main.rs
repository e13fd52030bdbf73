use clap::Parser;
use pageshot::{
    build_router, setup_logging, AppState, Cli, Config, ScreenshotService, SessionRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose).map_err(|e| anyhow::anyhow!("logging setup failed: {e}"))?;

    info!("starting pageshot v{}", env!("CARGO_PKG_VERSION"));

    // Bad configuration is fatal: refuse to start rather than run degraded.
    let mut config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // The browser executable is resolved once, up front, so a misconfigured
    // host fails here instead of on the first request.
    let chrome = match config.resolve_executable() {
        Ok(chrome) => chrome,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    config.chrome_path = Some(chrome.clone());
    info!("using browser executable {}", chrome.display());
    info!(
        "max concurrent captures: {}, navigation timeout: {:?}",
        config.max_concurrent_captures, config.navigation_timeout
    );

    let metrics_handle = pageshot::metrics::install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    let registry = SessionRegistry::new();
    let service = Arc::new(ScreenshotService::new(config.clone(), registry.clone()));
    let state = Arc::new(AppState::new(service, &config, Some(metrics_handle)));
    let router = build_router(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");
    info!("screenshot service is ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The server has stopped accepting connections; whatever sessions are
    // still live belong to aborted requests and must not outlive us.
    info!("shutting down...");
    registry.shutdown().await;
    info!("pageshot stopped");

    Ok(())
}

async fn shutdown_signal() {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to create SIGINT handler");
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to create SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {
            info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}
