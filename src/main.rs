use smart_test::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes,
    services::retention_service::RetentionService,
    store::postgres::PgAttemptStore,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    init_config()?;
    let config = get_config()?;

    let pool = create_pool(config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let retention = RetentionService::new(
        Arc::new(PgAttemptStore::new(pool.clone())),
        config.attempt_retention_days,
    );
    let _scheduler = retention.schedule(&config.retention_cron).await?;
    info!(
        cron = %config.retention_cron,
        days = config.attempt_retention_days,
        "Attempt retention sweep scheduled"
    );

    let app = routes::app(AppState::new(pool, &config.jwt_secret));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
