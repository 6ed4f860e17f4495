//! Users backfill — fill in missing default fields on user documents.

pub mod config;
pub mod error;
pub mod migrator;
pub mod store;
pub mod users;
