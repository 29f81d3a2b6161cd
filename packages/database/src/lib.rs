#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case store boundary and its `DuckDB` implementation.
//!
//! The ingestion and aggregation layers depend only on the [`CaseStore`]
//! trait. [`case_db::DuckDbStore`] is the production implementation; it
//! also runs fully in memory for tests.

pub mod case_db;
pub mod db;
pub mod paths;

use vitalytics_database_models::{BucketCount, CaseFilter, GroupedCountQuery, YearCount};
use vitalytics_source_models::CaseRecord;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (e.g. creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Persistent store of canonical case records.
///
/// Writes are transactional: each call either fully applies or leaves the
/// store untouched. Reads see only committed data.
pub trait CaseStore: Send {
    /// Drops every stored case and restarts the identity sequence.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the reset cannot complete; prior state is
    /// kept in that case.
    fn reset(&mut self) -> Result<(), DbError>;

    /// Appends a batch of records tagged with `source_id` as one atomic
    /// unit. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any row fails; no row of the batch is kept.
    fn insert_batch(&mut self, source_id: &str, records: &[CaseRecord]) -> Result<u64, DbError>;

    /// Deletes every committed row of `source_id`. Returns the number of
    /// rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    fn discard_source(&mut self, source_id: &str) -> Result<u64, DbError>;

    /// Counts cases matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&self, filter: CaseFilter) -> Result<u64, DbError>;

    /// Counts cases per bucket, ascending by bucket key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn group_count(&self, query: &GroupedCountQuery) -> Result<Vec<BucketCount>, DbError>;

    /// Counts cases per notification year, ascending by year.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn year_count(&self) -> Result<Vec<YearCount>, DbError>;
}
