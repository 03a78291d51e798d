use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use invoice_api::auth::TokenService;
use invoice_api::config::AppConfig;
use invoice_api::identity::IdentityService;
use invoice_api::repository::{PgInvoiceRepository, PgUserRepository};
use invoice_api::routes::{cors_layer, create_router};
use invoice_api::{db, AppState};

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Invoice API...");

    let config = AppConfig::from_env()?;

    // Initialize database connection pool and schema
    let pool = db::connect_with_retry(&config.database).await?;
    db::run_migrations(&pool).await?;

    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let invoices = Arc::new(PgInvoiceRepository::new(pool.clone()));

    let app_state = AppState {
        db: pool,
        identity: IdentityService::new(users, config.bcrypt_cost),
        invoices,
        tokens: Arc::new(TokenService::new(&config.jwt_secret)),
    };

    let app = create_router(app_state).layer(cors_layer(&config.cors));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Invoice API stopped");
    Ok(())
}
