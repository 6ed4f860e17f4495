//! Error types for the users backfill.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while merging a patch into a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("Field path {path:?} contains an empty segment")]
    EmptySegment { path: String },

    #[error("Cannot write {path:?}: {segment:?} holds a {found}, not a map")]
    NotAMap {
        path: String,
        segment: String,
        found: &'static str,
    },
}

/// Errors that abort a backfill run.
///
/// Batches committed before the failure stay applied.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetching page for batch {batch} failed: {source}")]
    Fetch { batch: u64, source: DatabaseError },

    #[error("Committing batch {batch} failed: {source}")]
    Commit { batch: u64, source: DatabaseError },
}

impl MigrationError {
    /// 1-based index of the batch that failed, if the failure happened mid-scan.
    pub fn batch(&self) -> Option<u64> {
        match self {
            Self::Config(_) => None,
            Self::Fetch { batch, .. } | Self::Commit { batch, .. } => Some(*batch),
        }
    }
}

/// Result type alias for the backfill.
pub type Result<T> = std::result::Result<T, Error>;
