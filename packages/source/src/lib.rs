#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Surveillance dataset definitions, streaming reader, and normalization.
//!
//! Each yearly dataset is described by a [`source_def::SourceDefinition`]
//! loaded from an embedded TOML file. A [`transport::SourceTransport`] opens
//! the raw byte stream, [`csv_download`] splits it into bounded chunks of
//! [`vitalytics_source_models::RawRow`]s, and [`normalize`] maps each chunk
//! to canonical case records.

pub mod csv_download;
pub mod normalize;
pub mod parsing;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod source_def;
pub mod transport;

/// Errors that can occur while opening or reading a data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be opened (network, HTTP status, missing file).
    #[error("Source unavailable: {location}: {message}")]
    Unavailable {
        /// URL or path of the source.
        location: String,
        /// Description of what went wrong.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error while reading the source body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed mid-stream.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row is missing columns that are required to normalize
    /// records.
    #[error("Missing required columns: {}", columns.join(", "))]
    MissingColumns {
        /// Source column names that were not found.
        columns: Vec<String>,
    },

    /// The background reader task panicked or was cancelled.
    #[error("Reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
