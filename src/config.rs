//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Documents fetched per page, and the upper bound on writes per batch.
pub const DEFAULT_BATCH_SIZE: usize = 400;

/// Largest number of writes the store accepts in one atomic batch.
pub const MAX_BATCH_SIZE: usize = 500;

/// Collection holding the user records.
pub const DEFAULT_COLLECTION: &str = "users";

/// Where the libSQL database lives unless `BACKFILL_DB_PATH` says otherwise.
pub const DEFAULT_DB_PATH: &str = "./data/users.db";

/// Backfill run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Collection to scan.
    pub collection: String,
    /// Page size and maximum writes per committed batch.
    pub batch_size: usize,
    /// Evaluate and count, but never commit.
    pub dry_run: bool,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

impl BackfillConfig {
    /// Build the configuration from `BACKFILL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("BACKFILL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let collection = lookup("BACKFILL_COLLECTION")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.collection);

        let batch_size = match lookup("BACKFILL_BATCH_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "BACKFILL_BATCH_SIZE".to_string(),
                    message: format!("{raw:?} is not a positive integer: {e}"),
                })?,
            None => defaults.batch_size,
        };

        let dry_run = lookup("BACKFILL_DRY_RUN")
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.dry_run);

        let config = Self {
            db_path,
            collection,
            batch_size,
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check bounds that the store and the scan loop rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "batch_size".to_string(),
                message: format!(
                    "must be between 1 and {MAX_BATCH_SIZE}, got {}",
                    self.batch_size
                ),
            });
        }
        if self.collection.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "collection".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
