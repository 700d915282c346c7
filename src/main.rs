use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stockroom::auth::SessionKeys;
use stockroom::config::{Cli, Config};
use stockroom::media::{build_relay, sweep};
use stockroom::state::AppState;
use stockroom::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let sessions = SessionKeys::from_config(&config.auth)?;

    let uploads_path = config.uploads_path();
    std::fs::create_dir_all(&uploads_path)?;
    let media = build_relay(&config.media, uploads_path)?;
    tracing::info!("Media backend: {:?}", config.media.backend);

    let state = AppState::new(pool, config.clone(), sessions, media);

    if config.media.sweep_interval_secs > 0 {
        sweep::spawn_sweeper(
            state.orphans.clone(),
            state.media.clone(),
            Duration::from_secs(config.media.sweep_interval_secs),
        );
    }

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
