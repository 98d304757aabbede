//! Matchday notification worker.
//!
//! Runs the device reconciliation scheduler and hosts the operational
//! commands around the notification catalog and user preferences.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use matchday_core::catalog::Catalog;
use matchday_db::repositories::CatalogRepo;
use matchday_db::DbPool;
use matchday_notify::config::CatalogSource;
use matchday_notify::preferences::seed_user_defaults;
use matchday_notify::{
    EngineConfig, HttpPushProvider, PgStore, ReconcileScheduler, ReconciliationJob,
};

#[derive(Parser)]
#[command(name = "matchday-worker", version, about = "Matchday notification worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the device reconciliation scheduler until Ctrl-C (default).
    Run,
    /// Reconcile every registered device once and print the JSON report.
    ReconcileOnce,
    /// Validate the catalog file and upsert it into `notification_catalog`.
    SyncCatalog,
    /// Seed catalog preference defaults for one user.
    SeedPreferences { user_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("Invalid configuration")?;

    let pool = matchday_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    matchday_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    matchday_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduler(&config, pool).await,
        Command::ReconcileOnce => reconcile_once(&config, pool).await,
        Command::SyncCatalog => sync_catalog(&config, &pool).await,
        Command::SeedPreferences { user_id } => seed_preferences(&config, pool, user_id).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,matchday_notify=debug,matchday_worker=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Load and validate the catalog. Any error is fatal at start-up.
async fn load_catalog(config: &EngineConfig, pool: &DbPool) -> anyhow::Result<Catalog> {
    let catalog = match config.catalog_source {
        CatalogSource::File => Catalog::load_file(&config.catalog_path)
            .with_context(|| format!("Failed to load catalog {}", config.catalog_path.display()))?,
        CatalogSource::Database => {
            let rows = CatalogRepo::list(pool)
                .await
                .context("Failed to read notification_catalog")?;
            Catalog::from_definitions(rows.into_iter().map(|row| row.definition))
                .context("Invalid catalog in notification_catalog")?
        }
    };
    tracing::info!(
        source = ?config.catalog_source,
        types = catalog.len(),
        "Notification catalog loaded"
    );
    Ok(catalog)
}

fn reconciliation_job(config: &EngineConfig, pool: DbPool) -> anyhow::Result<ReconciliationJob> {
    let provider =
        HttpPushProvider::new(&config.provider).context("Failed to build push provider client")?;
    Ok(ReconciliationJob::from_config(
        config,
        Arc::new(PgStore::new(pool)),
        Arc::new(provider),
    ))
}

async fn run_scheduler(config: &EngineConfig, pool: DbPool) -> anyhow::Result<()> {
    load_catalog(config, &pool).await?;

    let scheduler = ReconcileScheduler::new(
        reconciliation_job(config, pool)?,
        config.reconcile_interval,
    );
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    scheduler.run(cancel).await;
    Ok(())
}

async fn reconcile_once(config: &EngineConfig, pool: DbPool) -> anyhow::Result<()> {
    let report = reconciliation_job(config, pool)?
        .run()
        .await
        .context("Failed to list registered devices")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn sync_catalog(config: &EngineConfig, pool: &DbPool) -> anyhow::Result<()> {
    let catalog = Catalog::load_file(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {}", config.catalog_path.display()))?;

    for entry in catalog.iter() {
        let definition = serde_json::to_value(entry)?;
        CatalogRepo::upsert(pool, &entry.notification_key, &definition)
            .await
            .with_context(|| format!("Failed to store {}", entry.notification_key))?;
        tracing::info!(notification_key = %entry.notification_key, "Catalog entry synced");
    }
    Ok(())
}

async fn seed_preferences(
    config: &EngineConfig,
    pool: DbPool,
    user_id: Uuid,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config, &pool).await?;
    let store = PgStore::new(pool);
    let seeded = seed_user_defaults(&catalog, &store, user_id)
        .await
        .context("Failed to seed preferences")?;
    println!("{}", serde_json::to_string_pretty(&seeded)?);
    Ok(())
}
