//! Paginated batch migrator.
//!
//! Scans one collection in id order, one page per cycle. Each page is
//! evaluated against the default rules and every non-empty patch is staged
//! into a single batch, which is committed atomically before the next page
//! is fetched. The scan ends at the first empty page.
//!
//! Any fetch or commit failure aborts the run. Batches already committed
//! stay applied; re-running is the recovery path.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::BackfillConfig;
use crate::error::MigrationError;
use crate::store::{DocumentStore, PendingWrite};
use crate::users::{self, UserDocument};

/// Running totals for a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Documents evaluated.
    pub processed: u64,
    /// Documents written (or that would be written, in a dry run).
    pub updated: u64,
    /// Documents on pages where nothing needed a change.
    pub skipped: u64,
    /// Non-empty pages handled.
    pub batches: u64,
}

/// Outcome of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based batch sequence number.
    pub index: u64,
    /// Documents on the page.
    pub page_size: u64,
    /// Documents staged for a write.
    pub updated: u64,
    /// Whether a write hit the store.
    pub committed: bool,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch {}: processed {}, updated {}",
            self.index, self.page_size, self.updated
        )
    }
}

/// Drives the keyset-paginated scan against an injected store.
pub struct Migrator {
    config: BackfillConfig,
    store: Arc<dyn DocumentStore>,
}

impl Migrator {
    pub fn new(store: Arc<dyn DocumentStore>, config: BackfillConfig) -> Self {
        Self { config, store }
    }

    /// Run the backfill to completion.
    pub async fn run(&self) -> Result<Summary, MigrationError> {
        self.run_with_progress(|_| {}).await
    }

    /// Run the backfill, calling `on_batch` after every page.
    pub async fn run_with_progress<F>(&self, mut on_batch: F) -> Result<Summary, MigrationError>
    where
        F: FnMut(&BatchReport),
    {
        self.config.validate()?;
        let collection = self.config.collection.as_str();

        if self.config.dry_run {
            warn!(collection, "Dry run: no batches will be committed");
        }

        let mut summary = Summary::default();
        let mut cursor: Option<String> = None;

        loop {
            let index = summary.batches + 1;

            let page = self
                .store
                .fetch_page(collection, cursor.as_deref(), self.config.batch_size)
                .await
                .map_err(|source| MigrationError::Fetch {
                    batch: index,
                    source,
                })?;

            let Some(last) = page.last() else {
                break;
            };
            let next_cursor = last.id.clone();

            let writes = stage_writes(&page);
            let page_size = page.len() as u64;
            let batch_updates = writes.len() as u64;
            summary.processed += page_size;

            let mut committed = false;
            if batch_updates > 0 {
                if !self.config.dry_run {
                    self.store
                        .commit_batch(collection, &writes)
                        .await
                        .map_err(|source| MigrationError::Commit {
                            batch: index,
                            source,
                        })?;
                    committed = true;
                }
                summary.updated += batch_updates;
            } else {
                summary.skipped += page_size;
            }

            summary.batches = index;
            cursor = Some(next_cursor);

            let report = BatchReport {
                index,
                page_size,
                updated: batch_updates,
                committed,
            };
            info!(
                batch = report.index,
                processed = report.page_size,
                updated = report.updated,
                committed = report.committed,
                cursor = cursor.as_deref().unwrap_or_default(),
                "Batch done"
            );
            on_batch(&report);
        }

        info!(
            processed = summary.processed,
            updated = summary.updated,
            skipped = summary.skipped,
            batches = summary.batches,
            dry_run = self.config.dry_run,
            "Backfill complete"
        );
        Ok(summary)
    }
}

/// Evaluate every document on a page, keeping only non-empty patches.
fn stage_writes(page: &[UserDocument]) -> Vec<PendingWrite> {
    page.iter()
        .filter_map(|doc| {
            let patch = users::evaluate(&doc.fields);
            if patch.is_empty() {
                return None;
            }
            debug!(id = %doc.id, fields = patch.len(), "Staged defaults");
            Some(PendingWrite::new(doc.id.clone(), patch))
        })
        .collect()
}
