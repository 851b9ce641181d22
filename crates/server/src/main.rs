use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytdls_core::{
    config_path_from_env, load_config, validate_config, FfmpegTranscoder, JobPipeline, Retriever,
    Transcoder, YtDlpRetriever,
};
use ytdls_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<()> {
    init_tracing();

    // Determine config path
    let config_path = config_path_from_env();

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        "Retrieval pool: {} concurrent, queue {}",
        config.retrieval.max_concurrent, config.retrieval.max_queue_depth
    );
    info!(
        "Transcode pool: {} concurrent, {}s timeout",
        config.transcode.max_concurrent, config.transcode.timeout_secs
    );
    info!("Downloads root: {:?}", config.pipeline.downloads_dir);

    tokio::fs::create_dir_all(&config.pipeline.downloads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create downloads directory {:?}",
                config.pipeline.downloads_dir
            )
        })?;

    let retriever = YtDlpRetriever::new(config.retrieval.clone());
    if let Err(e) = retriever.ensure_ready().await {
        // Jobs are refused until the binary and cookies are in place
        warn!("Retriever not ready: {}", e);
    }

    let transcoder = FfmpegTranscoder::new(config.transcode.clone());
    if let Err(e) = transcoder.validate().await {
        warn!("Transcoder not available: {}", e);
    }

    let pipeline = JobPipeline::from_config(&config, Arc::new(retriever), Arc::new(transcoder));
    info!("Job pipeline ready");

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, pipeline));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
