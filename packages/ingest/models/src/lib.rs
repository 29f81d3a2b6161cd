#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion options and run report types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Default maximum number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Options for an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Maximum number of rows read, normalized and committed at once.
    pub chunk_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Why a source was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The source could not be opened or its header was unusable.
    SourceUnavailable,
    /// Reading failed after the stream had started.
    StreamInterrupted,
    /// The store rejected a batch.
    SinkFailure,
}

/// Final state of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    /// Every chunk was committed.
    Completed,
    /// The source was abandoned and its rows discarded.
    Failed {
        /// Failure category.
        kind: FailureKind,
        /// Description of what went wrong.
        message: String,
    },
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Source identifier.
    pub source_id: String,
    /// URL or path the source was read from.
    pub location: String,
    /// Final state.
    pub status: SourceStatus,
    /// Rows of this source left in the store after the run.
    pub rows_committed: u64,
    /// Rows excluded because no date format matched.
    pub rows_dropped: u64,
    /// Number of chunks received from the reader.
    pub chunks: u64,
    /// Wall-clock time spent on the source.
    pub duration: Duration,
}

impl SourceReport {
    /// Creates an empty, completed report for a source.
    #[must_use]
    pub fn new(source_id: &str, location: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            location: location.to_string(),
            status: SourceStatus::Completed,
            rows_committed: 0,
            rows_dropped: 0,
            chunks: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns `true` if the source completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, SourceStatus::Completed)
    }

    /// Returns the failure kind, if the source failed.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            SourceStatus::Completed => None,
            SourceStatus::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Outcome of a whole ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Per-source reports, in processing order.
    pub sources: Vec<SourceReport>,
    /// Rows committed by completed sources.
    pub grand_total: u64,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl IngestReport {
    /// Builds the report, deriving the grand total from completed sources.
    #[must_use]
    pub fn new(sources: Vec<SourceReport>, duration: Duration) -> Self {
        let grand_total = sources
            .iter()
            .filter(|s| s.is_completed())
            .map(|s| s.rows_committed)
            .sum();

        Self {
            sources,
            grand_total,
            duration,
        }
    }

    /// Number of completed sources.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_completed()).count()
    }

    /// Reports of failed sources.
    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.is_completed())
    }
}
