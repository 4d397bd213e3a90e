//! postguard server

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postguard::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            catalog_drift, RoleRepository, SqlxPostRepository, SqlxRoleRepository, SqlxUserRepository,
        },
    },
    services::Seeder,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postguard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting postguard...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // The permission table in code is authoritative; report stored drift
    let role_repo = SqlxRoleRepository::new(pool.clone());
    for drift in catalog_drift(&role_repo.catalog().await?) {
        tracing::warn!("Permission catalog drift: {}", drift);
    }

    if config.seed.demo_data {
        Seeder::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
        )
        .run()
        .await?;
    }

    let state = AppState::new(pool.clone(), &config.auth);

    // Housekeeping every 5 minutes: throttle entries, and expired sessions
    // when sessions can expire at all
    {
        let limiter = state.rate_limiter.clone();
        let auth_service = state.auth_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;

                if auth_service.session_ttl().is_some() {
                    match auth_service.purge_expired_sessions().await {
                        Ok(0) => {}
                        Ok(purged) => tracing::info!("Purged {} expired sessions", purged),
                        Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
                    }
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
