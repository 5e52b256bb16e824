use std::net::SocketAddr;
use std::sync::Arc;

use hirebot_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    repository::{MemoryRepository, PgRepository, Repository},
    routes,
    services::bot_registry::BotRegistry,
    utils::crypto::hash_password,
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running on the in-memory repository");
            Arc::new(MemoryRepository::new())
        }
    };

    ensure_admin(&config, repo.as_ref()).await?;

    let bots = Arc::new(BotRegistry::new());
    let started = bots.start_all(repo.as_ref(), &config).await?;
    info!("Started {} bot(s)", started);

    let addr: SocketAddr = config.server_address.parse()?;
    let state = AppState::new(config, repo, bots.clone());
    state.hub.start();

    let app = routes::app(state.clone());

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.hub.stop();
    bots.stop_all();
    Ok(())
}

async fn ensure_admin(config: &Config, repo: &dyn Repository) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    if repo.find_operator_by_email(email).await?.is_some() {
        return Ok(());
    }
    let hash = hash_password(password)?;
    repo.insert_operator(email, "Administrator", &hash, "admin")
        .await?;
    info!("Created admin operator {}", email);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
