//! Database connection utilities.

use std::path::PathBuf;

use crate::DbError;
use crate::case_db::DuckDbStore;

/// Environment variable overriding the case store location.
pub const DB_PATH_ENV: &str = "VITALYTICS_DB_PATH";

/// Returns the store path from `VITALYTICS_DB_PATH`, falling back to
/// `data/vitalytics.duckdb` under the project root.
#[must_use]
pub fn db_path_from_env() -> PathBuf {
    std::env::var(DB_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(crate::paths::default_db_path, PathBuf::from)
}

/// Opens the case store at the configured path.
///
/// # Errors
///
/// Returns [`DbError`] if the data directory cannot be created or the
/// database cannot be opened.
pub fn open_from_env() -> Result<DuckDbStore, DbError> {
    let path = db_path_from_env();
    log::debug!("Opening case store at {}", path.display());
    DuckDbStore::open(&path)
}
