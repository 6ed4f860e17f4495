use std::sync::Arc;

use users_backfill::config::BackfillConfig;
use users_backfill::error::Error;
use users_backfill::migrator::{Migrator, Summary};
use users_backfill::store::{DocumentStore, LibSqlBackend};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(summary) => {
            println!("Migration complete.");
            println!("Processed: {}", summary.processed);
            println!("Updated: {}", summary.updated);
            println!("Skipped (no changes needed): {}", summary.skipped);
        }
        Err(e) => {
            tracing::error!(error = %e, "Backfill aborted");
            eprintln!("Migration failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<Summary, Error> {
    let config = BackfillConfig::from_env()?;

    eprintln!("users-backfill v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Collection: {}", config.collection);
    eprintln!("   Batch size: {}", config.batch_size);
    if config.dry_run {
        eprintln!("   Mode: dry run (nothing will be written)");
    }

    let store: Arc<dyn DocumentStore> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let migrator = Migrator::new(store, config);
    let summary = migrator
        .run_with_progress(|report| println!("{report}"))
        .await?;
    Ok(summary)
}
