pub mod api;
pub mod config;
pub mod core_state;
pub mod models;
pub mod pipeline;
pub mod store;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Core(#[from] core_state::CoreError),

    #[error(transparent)]
    Server(#[from] api::ServerError),

    #[error("Failed to create upload directory {path}: {source}")]
    UploadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Load config, train the pipeline and serve until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Doctriage starting v{}", config::APP_VERSION);

    let config = config::TriageConfig::load()?;
    std::fs::create_dir_all(&config.upload_dir).map_err(|source| RunError::UploadDir {
        path: config.upload_dir.clone(),
        source,
    })?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        approval_threshold = config.thresholds.approval_amount,
        review_threshold = config.thresholds.review_word_count,
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr.clone();
    let core = Arc::new(core_state::CoreState::new(config)?);
    let mut server = api::start_api_server(core, &bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C, serving until exit: {e}");
        server.wait().await?;
        return Ok(());
    }
    tracing::info!("Ctrl-C received");
    server.shutdown();
    server.wait().await?;

    tracing::info!("Doctriage stopped");
    Ok(())
}
