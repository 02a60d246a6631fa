use budget_streak::{
    config::{database, settings},
    errors::Result,
    insight::MinimaxClient,
    scheduler::TaskRunner,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = settings::load_app_configuration()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;

    // 4. Connect and make sure every table exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. The insight generator is optional; without a key callers get fallbacks
    if MinimaxClient::is_configured() {
        info!("Insight generator enabled ({})", app_config.insight.model);
    } else {
        warn!("MINIMAX_API_KEY not set, insight generator will use fallbacks");
    }

    // 6. Run the scheduled jobs until Ctrl-C
    let runner = TaskRunner::new(db, app_config.schedule).start();
    info!("Task runner started, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    runner.shutdown().await;

    Ok(())
}
