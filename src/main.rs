/// Repair Desk server binary
use repair_desk::{config::ServerConfig, context::AppContext, error::DeskResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> DeskResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Repair Desk v{}", env!("CARGO_PKG_VERSION"));

    // Create application context
    let ctx = AppContext::new(config).await?;

    // First admin, if requested
    ctx.account_manager
        .ensure_bootstrap_admin(&ctx.config.bootstrap)
        .await?;

    let ctx = Arc::new(ctx);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}
