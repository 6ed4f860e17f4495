//! libSQL backend — async `DocumentStore` implementation.
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`
//! with the field map stored as JSON. Supports local file and in-memory
//! databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{DocumentStore, PendingWrite};
use crate::users::{FieldMap, UserDocument};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn encode_fields(fields: &FieldMap) -> Result<String, DatabaseError> {
    serde_json::to_string(fields)
        .map_err(|e| DatabaseError::Serialization(format!("encode fields: {e}")))
}

fn decode_fields(id: &str, data: &str) -> Result<FieldMap, DatabaseError> {
    serde_json::from_str(data)
        .map_err(|e| DatabaseError::Serialization(format!("decode document {id}: {e}")))
}

/// Map a libsql Row to a UserDocument.
///
/// Column order matches DOCUMENT_COLUMNS: 0:id, 1:data
fn row_to_document(row: &libsql::Row) -> Result<UserDocument, DatabaseError> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("document row id: {e}")))?;
    let data: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("document row data: {e}")))?;
    let fields = decode_fields(&id, &data)?;
    Ok(UserDocument { id, fields })
}

async fn load_fields(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<FieldMap>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("load_fields: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let data: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("load_fields row parse: {e}")))?;
            Ok(Some(decode_fields(id, &data)?))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("load_fields: {e}"))),
    }
}

async fn upsert_fields(
    conn: &Connection,
    collection: &str,
    id: &str,
    fields: &FieldMap,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (collection, id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![collection, id, encode_fields(fields)?, now.to_rfc3339()],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("upsert document {id}: {e}")))?;
    Ok(())
}

/// Apply every write on `conn`. Caller owns the surrounding transaction.
async fn merge_writes(
    conn: &Connection,
    collection: &str,
    writes: &[PendingWrite],
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    for write in writes {
        let mut fields = load_fields(conn, collection, &write.id)
            .await?
            .unwrap_or_default();
        write
            .patch
            .apply_to(&mut fields, now)
            .map_err(|e| DatabaseError::Constraint(format!("document {}: {e}", write.id)))?;
        upsert_fields(conn, collection, &write.id, &fields, now).await?;
    }
    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

const DOCUMENT_COLUMNS: &str = "id, data";

#[async_trait]
impl DocumentStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UserDocument>, DatabaseError> {
        let conn = self.conn();
        let limit = i64::try_from(limit)
            .map_err(|e| DatabaseError::Query(format!("fetch_page limit: {e}")))?;

        let mut rows = match after {
            Some(cursor) => {
                conn.query(
                    &format!(
                        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = ?1 AND id > ?2 ORDER BY id LIMIT ?3"
                    ),
                    params![collection, cursor, limit],
                )
                .await
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = ?1 ORDER BY id LIMIT ?2"
                    ),
                    params![collection, limit],
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::Query(format!("fetch_page: {e}")))?;

        let mut docs = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => docs.push(row_to_document(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("fetch_page: {e}"))),
            }
        }

        debug!(collection, after = ?after, count = docs.len(), "Fetched page");
        Ok(docs)
    }

    async fn commit_batch(
        &self,
        collection: &str,
        writes: &[PendingWrite],
    ) -> Result<(), DatabaseError> {
        if writes.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_batch begin: {e}")))?;

        if let Err(e) = merge_writes(&tx, collection, writes, now).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback after failed batch also failed");
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_batch commit: {e}")))?;

        debug!(collection, writes = writes.len(), "Batch committed");
        Ok(())
    }

    async fn put_document(
        &self,
        collection: &str,
        doc: &UserDocument,
    ) -> Result<(), DatabaseError> {
        upsert_fields(self.conn(), collection, &doc.id, &doc.fields, Utc::now()).await?;
        debug!(collection, id = %doc.id, "Document stored");
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<UserDocument>, DatabaseError> {
        Ok(load_fields(self.conn(), collection, id)
            .await?
            .map(|fields| UserDocument {
                id: id.to_string(),
                fields,
            }))
    }
}
