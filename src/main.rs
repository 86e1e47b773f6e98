//! Prediction Server - Main Entry Point
//!
//! Serves model listings and predictions over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use prediction_server::{
    api::{create_router, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prediction-server")]
#[command(version)]
#[command(about = "Serve predictions from serialized models", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PREDICTION_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory containing model artifacts
    #[arg(short, long)]
    models_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(models_dir) = cli.models_dir {
        config.models.models_dir = models_dir;
    }

    init_logging(&config.logging)?;

    info!("Starting Prediction Server");
    info!(
        models_dir = %config.models.models_dir,
        onnx_threads = config.models.onnx_threads,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    let engine = Arc::new(InferenceEngine::from_config(&config).with_metrics(metrics.clone()));

    let available = engine.list_available_models();
    info!(count = available.len(), models = ?available, "Models available");

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let mut state = AppState::new(engine, metrics.clone());
    if let Some(dir) = &config.frontend.dir {
        state = state.with_frontend_dir(dir);
    }
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Prediction server shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
