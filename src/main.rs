use anyhow::{Context, Result};
use file_portal::{config::Config, routes, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("file_portal=info,server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::open(&config)
        .await
        .context("Failed to initialize storage")?;

    let app = routes::create_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    info!("File portal running on http://{}", listener.local_addr()?);
    info!("Data directory: {}", config.data_dir.display());

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
