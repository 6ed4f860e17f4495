//! `DocumentStore` trait — the async interface the backfill runs against.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::users::{Patch, UserDocument};

/// A merge-write staged for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub id: String,
    pub patch: Patch,
}

impl PendingWrite {
    pub fn new(id: impl Into<String>, patch: Patch) -> Self {
        Self {
            id: id.into(),
            patch,
        }
    }
}

/// Backend-agnostic document store.
///
/// Documents are grouped into named collections and keyed by a unique,
/// immutable id. Pages are ordered by id so a scan can resume strictly after
/// the last id it saw.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Fetch up to `limit` documents with id strictly greater than `after`,
    /// ordered by id. `after = None` starts at the beginning.
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UserDocument>, DatabaseError>;

    /// Merge every write into its document as one atomic unit.
    ///
    /// Only the patched paths change; missing documents are created. Server
    /// timestamps in all patches resolve to the same commit time. Either all
    /// writes land or none do.
    async fn commit_batch(
        &self,
        collection: &str,
        writes: &[PendingWrite],
    ) -> Result<(), DatabaseError>;

    /// Insert or fully replace a document.
    async fn put_document(
        &self,
        collection: &str,
        doc: &UserDocument,
    ) -> Result<(), DatabaseError>;

    /// Look up a document by id.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<UserDocument>, DatabaseError>;
}
