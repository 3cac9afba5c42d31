use std::sync::Arc;

use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisStore},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notifier::{
    cleanup::start_cleanup_job,
    config::{KvBackend, Settings},
    device::LocalDevice,
    facade::NotificationFacade,
    gateway::ExpoGateway,
    identity::SessionIdentity,
    kv::{KeyValueStore, MemoryKeyValueStore},
    manager::{Collaborators, NotificationManager},
    repositories::{
        HistoryRepository, InMemoryRecordStore, PgHistoryRepository, PgPushTokenRepository,
        PushTokenRepository,
    },
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

    info!("Starting notifier service");

    let settings = Settings::from_env()?;

    let (tokens, history): (Arc<dyn PushTokenRepository>, Arc<dyn HistoryRepository>) =
        if settings.use_database {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;
            if !health_check(&pool).await? {
                anyhow::bail!("Failed to connect to database");
            }
            run_migrations(&pool).await?;
            info!("Database connection successful");
            let tokens: Arc<dyn PushTokenRepository> =
                Arc::new(PgPushTokenRepository::new(pool.clone()));
            let history: Arc<dyn HistoryRepository> = Arc::new(PgHistoryRepository::new(pool));
            (tokens, history)
        } else {
            warn!("Database disabled; push tokens and history are kept in memory");
            let store = Arc::new(InMemoryRecordStore::new());
            let tokens: Arc<dyn PushTokenRepository> = store.clone();
            let history: Arc<dyn HistoryRepository> = store;
            (tokens, history)
        };

    let kv: Arc<dyn KeyValueStore> = match settings.kv_backend {
        KvBackend::Redis => {
            let store = RedisStore::new(&RedisConfig::from_env())?;
            if !store.health_check().await.unwrap_or(false) {
                warn!("Redis is not reachable yet; token caching will fail until it is");
            }
            Arc::new(store)
        }
        KvBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
    };

    let identity = Arc::new(SessionIdentity::new());
    let manager = Arc::new(NotificationManager::new(Collaborators {
        device: Arc::new(LocalDevice::new(settings.device_config())),
        kv,
        tokens,
        history,
        gateway: Arc::new(ExpoGateway::new(settings.gateway_url.clone())),
        identity: identity.clone(),
    }));

    let facade = NotificationFacade::new(manager.clone(), identity.clone());
    let _mounted = facade.mount().await;

    let _cleanup = if settings.cleanup_enabled() {
        Some(
            start_cleanup_job(
                manager.clone(),
                &settings.cleanup_schedule,
                settings.retention_days,
            )
            .await?,
        )
    } else {
        info!("Token cleanup job disabled");
        None
    };

    let app = routes::create_router(AppState { facade, identity });

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Notifier service listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down notifier service");
        })
        .await?;

    Ok(())
}
