use std::sync::Arc;

use anyhow::Result;
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger::{
    config::Settings,
    repositories::{InMemoryLedger, LedgerRepository, PgLedgerRepository},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ledger service");

    let settings = Settings::from_env()?;

    let ledger: Arc<dyn LedgerRepository> = if settings.use_database {
        let db_config = DatabaseConfig::from_env()?;
        let pool = init_pool(&db_config).await?;
        if !health_check(&pool).await? {
            anyhow::bail!("Failed to connect to database");
        }
        run_migrations(&pool).await?;
        info!("Database connection successful");
        Arc::new(PgLedgerRepository::new(pool))
    } else {
        warn!("Database disabled; ledger records are kept in memory");
        Arc::new(InMemoryLedger::new())
    };

    let app = routes::create_router(AppState { ledger });

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Ledger service listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down ledger service");
        })
        .await?;

    Ok(())
}
