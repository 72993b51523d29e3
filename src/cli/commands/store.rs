use anyhow::{bail, Context};
use serde_json::json;
use tracing::warn;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{self, StorageBackend};
use crate::database::PgStore;
use crate::services::purge_marked_files;
use crate::AppState;

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let storage = &config::config().storage;
    if storage.database_url.is_empty() {
        bail!("DATABASE_URL must be set to migrate");
    }

    let store = PgStore::connect(&storage.database_url, 1)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("migration failed")?;

    output_success(&output_format, "Database schema is up to date", None)
}

pub async fn sweep(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config().clone();
    if config.storage.backend == StorageBackend::Memory {
        warn!("Sweeping an in-memory store only affects this process");
    }

    let state = AppState::from_config(config).await?;
    let report = purge_marked_files(state.store.as_ref(), state.blobs.as_ref()).await?;

    output_success(
        &output_format,
        &format!(
            "Purged {} file(s), skipped {}, failed {}",
            report.purged, report.skipped, report.failed
        ),
        Some(json!({ "report": report })),
    )?;

    if report.failed > 0 {
        bail!("{} file(s) could not be purged", report.failed);
    }
    Ok(())
}
