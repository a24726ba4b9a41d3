use anyhow::{anyhow, Context, Result};
use obs_instrument::api::{create_api_router, AppState};
use obs_instrument::config::AppConfig;
use obs_instrument::metrics::MetricsRegistry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal service error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;
    let addr = config.socket_addr().context("parse bind address")?;

    let metrics = MetricsRegistry::new();
    if config.process_metrics {
        metrics
            .register_process_collector()
            .context("register process collector")?;
    }

    let state = AppState::build(&config, metrics).context("build application state")?;
    if state.debug.is_none() {
        info!("debug endpoints disabled");
    }
    let app = create_api_router(state, &config.metrics_path);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind HTTP listener on {addr}"))?;

    info!(
        address = %addr,
        metrics_path = %config.metrics_path,
        debug = config.debug_enabled(),
        "HTTP server online"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, exiting"),
        Err(err) => warn!(error = %err, "ctrl_c listener error"),
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,hyper=warn,tower_http=debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
