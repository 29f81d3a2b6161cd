#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting SRAG surveillance datasets into the case store.
//!
//! [`run_ingestion`] resets the store once and then loads each source in
//! order, one chunk at a time. A source that fails is abandoned and its
//! committed rows are discarded; the run always moves on to the next
//! source. Only a failed reset aborts the run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use vitalytics_database::{CaseStore, DbError};
use vitalytics_ingest_models::{
    FailureKind, IngestOptions, IngestReport, SourceReport, SourceStatus,
};
use vitalytics_source::SourceError;
use vitalytics_source::csv_download::fetch_chunks;
use vitalytics_source::progress::{ProgressCallback, null_progress};
use vitalytics_source::source_def::SourceDefinition;
use vitalytics_source::transport::SourceTransport;

/// Environment variable holding a comma-separated source id filter.
pub const SOURCES_ENV: &str = "VITALYTICS_SOURCES";

/// Errors that abort an ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The store could not be reset; no source was processed.
    #[error("Failed to reset case store: {0}")]
    Reset(#[source] DbError),
}

/// Progress reporters for a run.
#[derive(Clone)]
pub struct RunProgress {
    /// Advanced once per finished source.
    pub sources: Arc<dyn ProgressCallback>,
    /// Advanced per row read.
    pub rows: Arc<dyn ProgressCallback>,
}

impl RunProgress {
    /// Reporters that discard every update.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            sources: null_progress(),
            rows: null_progress(),
        }
    }
}

/// Returns all configured data sources from the TOML registry.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    vitalytics_source::registry::all_sources()
}

/// Returns the sources to ingest, filtered by the `--sources` CLI flag or
/// the `VITALYTICS_SOURCES` environment variable. If neither is set, all
/// sources are returned.
#[must_use]
pub fn enabled_sources(cli_filter: Option<String>) -> Vec<SourceDefinition> {
    let filter = cli_filter.or_else(|| std::env::var(SOURCES_ENV).ok());
    filter_sources(all_sources(), filter.as_deref())
}

fn filter_sources(all: Vec<SourceDefinition>, filter: Option<&str>) -> Vec<SourceDefinition> {
    let Some(filter_str) = filter.filter(|f| !f.trim().is_empty()) else {
        return all;
    };

    let ids: Vec<&str> = filter_str.split(',').map(str::trim).collect();
    let available = all
        .iter()
        .map(|s| s.id().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let filtered: Vec<SourceDefinition> =
        all.into_iter().filter(|s| ids.contains(&s.id())).collect();

    if filtered.is_empty() {
        log::warn!("No matching sources found for filter {ids:?}. Available: {available}");
    }

    filtered
}

/// Builds ad-hoc source definitions for explicit URLs or paths, keeping
/// their order. Colliding ids get a numeric suffix so every source can be
/// discarded independently.
#[must_use]
pub fn sources_from_urls(urls: &[String]) -> Vec<SourceDefinition> {
    let mut seen = BTreeSet::new();

    urls.iter()
        .map(|url| {
            let mut source = SourceDefinition::from_url(url);
            let base = source.id.clone();
            let mut n = 1;
            while !seen.insert(source.id.clone()) {
                n += 1;
                source.id = format!("{base}_{n}");
            }
            source
        })
        .collect()
}

/// Resets `store` and ingests `sources` in order.
///
/// Per-source failures are recorded in the returned report and never abort
/// the run.
///
/// # Errors
///
/// Returns [`IngestError::Reset`] if the store cannot be reset.
pub async fn run_ingestion(
    store: &mut dyn CaseStore,
    transport: &dyn SourceTransport,
    sources: &[SourceDefinition],
    options: &IngestOptions,
    progress: &RunProgress,
) -> Result<IngestReport, IngestError> {
    let start = Instant::now();

    store.reset().map_err(IngestError::Reset)?;

    progress.sources.set_total(sources.len() as u64);
    let mut reports = Vec::with_capacity(sources.len());

    for source in sources {
        progress
            .sources
            .set_message(format!("Ingesting {}", source.id()));

        let report =
            ingest_source(store, transport, source, options.chunk_size, &progress.rows).await;

        match &report.status {
            SourceStatus::Completed => log::info!(
                "{}: completed with {} rows ({} dropped, {} chunks) in {:.1}s",
                source.id(),
                report.rows_committed,
                report.rows_dropped,
                report.chunks,
                report.duration.as_secs_f64()
            ),
            SourceStatus::Failed { kind, message } => {
                log::error!("{}: skipped after {kind}: {message}", source.id());
            }
        }

        progress.sources.inc(1);
        reports.push(report);
    }

    let report = IngestReport::new(reports, start.elapsed());
    progress.sources.finish(format!(
        "{} of {} sources completed",
        report.completed_count(),
        report.sources.len()
    ));
    progress
        .rows
        .finish(format!("{} rows committed", report.grand_total));

    log::info!(
        "Ingestion finished: {} rows committed from {}/{} sources in {:.1}s",
        report.grand_total,
        report.completed_count(),
        report.sources.len(),
        report.duration.as_secs_f64()
    );

    Ok(report)
}

/// Streams one source into the store. Never fails: any error is folded
/// into the returned report after the source's rows have been discarded.
async fn ingest_source(
    store: &mut dyn CaseStore,
    transport: &dyn SourceTransport,
    source: &SourceDefinition,
    chunk_size: usize,
    rows_progress: &Arc<dyn ProgressCallback>,
) -> SourceReport {
    let start = Instant::now();
    let mut report = SourceReport::new(source.id(), source.location());

    log::info!("Ingesting source: {} ({})", source.name(), source.id());
    rows_progress.set_message(source.id().to_string());

    let body = match transport.open(source).await {
        Ok(body) => body,
        Err(e) => {
            report.status = SourceStatus::Failed {
                kind: FailureKind::SourceUnavailable,
                message: e.to_string(),
            };
            report.duration = start.elapsed();
            return report;
        }
    };

    let (mut rx, handle) = fetch_chunks(body, source, chunk_size, Arc::clone(rows_progress));
    let mut sink_error: Option<DbError> = None;

    while let Some(rows) = rx.recv().await {
        report.chunks += 1;
        let raw_count = rows.len();
        let batch = source.normalize_batch(&rows);
        report.rows_dropped += batch.dropped;

        match store.insert_batch(source.id(), &batch.records) {
            Ok(inserted) => {
                report.rows_committed += inserted;
                log::info!(
                    "{}: chunk {}: committed {inserted}/{raw_count} rows, {} total",
                    source.id(),
                    report.chunks,
                    report.rows_committed
                );
            }
            Err(e) => {
                sink_error = Some(e);
                break;
            }
        }
    }

    // Closing the channel stops the reader at its next batch.
    drop(rx);
    let read_result = handle.await;

    let failure = match (sink_error, read_result) {
        (Some(e), _) => Some((FailureKind::SinkFailure, e.to_string())),
        (None, Ok(Ok(_))) => None,
        (None, Ok(Err(e))) => Some((classify_read_error(&e), e.to_string())),
        (None, Err(e)) => Some((FailureKind::StreamInterrupted, e.to_string())),
    };

    if let Some((kind, mut message)) = failure {
        match store.discard_source(source.id()) {
            Ok(discarded) => {
                if discarded > 0 {
                    log::warn!("{}: discarded {discarded} committed rows", source.id());
                }
                report.rows_committed = 0;
            }
            Err(e) => {
                log::error!("{}: failed to discard committed rows: {e}", source.id());
                message = format!("{message}; discard failed: {e}");
            }
        }
        report.status = SourceStatus::Failed { kind, message };
    }

    report.duration = start.elapsed();
    report
}

const fn classify_read_error(e: &SourceError) -> FailureKind {
    match e {
        SourceError::Unavailable { .. }
        | SourceError::Http(_)
        | SourceError::MissingColumns { .. } => FailureKind::SourceUnavailable,
        SourceError::Io(_) | SourceError::Csv(_) | SourceError::Task(_) => {
            FailureKind::StreamInterrupted
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::{self, Cursor, Read};

    use async_trait::async_trait;
    use vitalytics_database::case_db::DuckDbStore;
    use vitalytics_database_models::{BucketCount, CaseFilter, GroupedCountQuery, YearCount};
    use vitalytics_source::transport::SourceBody;
    use vitalytics_source_models::CaseRecord;

    use super::*;

    const HEADER: &str = "DT_NOTIFIC;SG_UF_NOT;CS_SEXO;NU_IDADE_N;UTI;EVOLUCAO;VACINA_COV\n";

    fn csv(rows: usize, year: i32) -> Vec<u8> {
        let mut text = HEADER.to_string();
        for i in 0..rows {
            text.push_str(&format!("{:02}/01/{year};SP;F;40;1;2;2\n", i % 28 + 1));
        }
        text.into_bytes()
    }

    enum Body {
        Data(Vec<u8>),
        /// Fails every read once `limit` bytes have been returned.
        FailAfter(Vec<u8>, usize),
    }

    /// In-memory transport keyed by location. Unknown locations are
    /// unavailable.
    #[derive(Default)]
    struct MemoryTransport {
        bodies: BTreeMap<String, Body>,
    }

    impl MemoryTransport {
        fn with(mut self, location: &str, body: Body) -> Self {
            self.bodies.insert(location.to_string(), body);
            self
        }
    }

    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.limit.saturating_sub(self.inner.position());
            if remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            let n = buf.len().min(usize::try_from(remaining).unwrap());
            self.inner.read(&mut buf[..n])
        }
    }

    #[async_trait]
    impl SourceTransport for MemoryTransport {
        async fn open(&self, source: &SourceDefinition) -> Result<SourceBody, SourceError> {
            match self.bodies.get(source.location()) {
                Some(Body::Data(bytes)) => Ok(Box::new(Cursor::new(bytes.clone()))),
                Some(Body::FailAfter(bytes, limit)) => Ok(Box::new(FailingReader {
                    inner: Cursor::new(bytes.clone()),
                    limit: *limit as u64,
                })),
                None => Err(SourceError::Unavailable {
                    location: source.location().to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                }),
            }
        }
    }

    /// Wraps an in-memory store, recording write calls and injecting
    /// failures.
    struct RecordingStore {
        inner: DuckDbStore,
        calls: Vec<String>,
        fail_reset: bool,
        /// Fail the n-th (1-based) insert for this source.
        fail_insert: Option<(String, usize)>,
        inserts_seen: BTreeMap<String, usize>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: DuckDbStore::open_in_memory().unwrap(),
                calls: Vec::new(),
                fail_reset: false,
                fail_insert: None,
                inserts_seen: BTreeMap::new(),
            }
        }

        fn injected() -> DbError {
            DbError::Conversion {
                message: "injected failure".to_string(),
            }
        }
    }

    impl CaseStore for RecordingStore {
        fn reset(&mut self) -> Result<(), DbError> {
            self.calls.push("reset".to_string());
            if self.fail_reset {
                return Err(Self::injected());
            }
            self.inner.reset()
        }

        fn insert_batch(
            &mut self,
            source_id: &str,
            records: &[CaseRecord],
        ) -> Result<u64, DbError> {
            self.calls.push(format!("insert:{source_id}"));
            let seen = self.inserts_seen.entry(source_id.to_string()).or_default();
            *seen += 1;
            if let Some((id, n)) = &self.fail_insert
                && id == source_id
                && *n == *seen
            {
                return Err(Self::injected());
            }
            self.inner.insert_batch(source_id, records)
        }

        fn discard_source(&mut self, source_id: &str) -> Result<u64, DbError> {
            self.calls.push(format!("discard:{source_id}"));
            self.inner.discard_source(source_id)
        }

        fn count(&self, filter: CaseFilter) -> Result<u64, DbError> {
            self.inner.count(filter)
        }

        fn group_count(&self, query: &GroupedCountQuery) -> Result<Vec<BucketCount>, DbError> {
            self.inner.group_count(query)
        }

        fn year_count(&self) -> Result<Vec<YearCount>, DbError> {
            self.inner.year_count()
        }
    }

    fn sources(locations: &[&str]) -> Vec<SourceDefinition> {
        locations
            .iter()
            .map(|l| SourceDefinition::from_url(l))
            .collect()
    }

    fn options(chunk_size: usize) -> IngestOptions {
        IngestOptions { chunk_size }
    }

    #[tokio::test]
    async fn isolates_source_failing_mid_stream() {
        let broken = csv(10, 2021);
        // Each row is 25 bytes; cut inside the third row.
        let cut = HEADER.len() + 25 * 2 + 10;
        let transport = MemoryTransport::default()
            .with("mem://a.csv", Body::Data(csv(5, 2020)))
            .with("mem://b.csv", Body::FailAfter(broken, cut))
            .with("mem://c.csv", Body::Data(csv(7, 2022)));
        let mut store = RecordingStore::new();

        let report = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv", "mem://b.csv", "mem://c.csv"]),
            &options(1),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert_eq!(report.grand_total, 12);
        assert!(report.sources[0].is_completed());
        assert_eq!(
            report.sources[1].failure_kind(),
            Some(FailureKind::StreamInterrupted)
        );
        assert_eq!(report.sources[1].rows_committed, 0);
        assert!(report.sources[2].is_completed());
        assert_eq!(report.sources[2].rows_committed, 7);

        assert_eq!(store.count(CaseFilter::All).unwrap(), 12);
        assert_eq!(
            store.inner.source_counts().unwrap(),
            vec![("a".to_string(), 5), ("c".to_string(), 7)]
        );
        assert!(store.calls.contains(&"insert:b".to_string()));
        assert!(store.calls.contains(&"discard:b".to_string()));
    }

    #[tokio::test]
    async fn isolates_sink_failure() {
        let transport = MemoryTransport::default()
            .with("mem://a.csv", Body::Data(csv(4, 2020)))
            .with("mem://b.csv", Body::Data(csv(6, 2021)))
            .with("mem://c.csv", Body::Data(csv(3, 2022)));
        let mut store = RecordingStore::new();
        store.fail_insert = Some(("b".to_string(), 2));

        let report = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv", "mem://b.csv", "mem://c.csv"]),
            &options(2),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert_eq!(report.grand_total, 7);
        assert_eq!(
            report.sources[1].failure_kind(),
            Some(FailureKind::SinkFailure)
        );
        assert_eq!(store.count(CaseFilter::All).unwrap(), 7);

        let b_inserts = store.calls.iter().filter(|c| *c == "insert:b").count();
        assert_eq!(b_inserts, 2, "source b must stop after the failed chunk");
    }

    #[tokio::test]
    async fn skips_unavailable_source() {
        let transport =
            MemoryTransport::default().with("mem://b.csv", Body::Data(csv(3, 2021)));
        let mut store = RecordingStore::new();

        let report = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://missing.csv", "mem://b.csv"]),
            &options(50_000),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert_eq!(
            report.sources[0].failure_kind(),
            Some(FailureKind::SourceUnavailable)
        );
        assert_eq!(report.sources[0].chunks, 0);
        assert_eq!(report.grand_total, 3);
        assert!(!store.calls.iter().any(|c| c.ends_with(":missing")));
    }

    #[tokio::test]
    async fn header_without_date_column_is_unavailable() {
        let transport = MemoryTransport::default()
            .with("mem://a.csv", Body::Data(b"UTI;EVOLUCAO\n1;2\n".to_vec()));
        let mut store = RecordingStore::new();

        let report = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv"]),
            &options(10),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert_eq!(
            report.sources[0].failure_kind(),
            Some(FailureKind::SourceUnavailable)
        );
        assert_eq!(report.grand_total, 0);
    }

    #[tokio::test]
    async fn reruns_are_idempotent() {
        let transport = MemoryTransport::default()
            .with("mem://a.csv", Body::Data(csv(9, 2020)))
            .with("mem://b.csv", Body::Data(csv(4, 2021)));
        let list = sources(&["mem://a.csv", "mem://b.csv"]);
        let mut store = RecordingStore::new();

        for _ in 0..2 {
            let report = run_ingestion(
                &mut store,
                &transport,
                &list,
                &options(3),
                &RunProgress::silent(),
            )
            .await
            .unwrap();
            assert_eq!(report.grand_total, 13);
            assert_eq!(store.count(CaseFilter::All).unwrap(), 13);
        }
    }

    #[tokio::test]
    async fn resets_once_before_any_load() {
        let transport = MemoryTransport::default()
            .with("mem://a.csv", Body::Data(csv(2, 2020)))
            .with("mem://b.csv", Body::Data(csv(2, 2021)));
        let mut store = RecordingStore::new();

        run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv", "mem://b.csv"]),
            &options(1),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert_eq!(store.calls[0], "reset");
        assert_eq!(store.calls.iter().filter(|c| *c == "reset").count(), 1);
        assert_eq!(
            store.calls[1..],
            ["insert:a", "insert:a", "insert:b", "insert:b"]
        );
    }

    #[tokio::test]
    async fn failed_reset_aborts_run() {
        let transport =
            MemoryTransport::default().with("mem://a.csv", Body::Data(csv(2, 2020)));
        let mut store = RecordingStore::new();
        store.fail_reset = true;

        let result = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv"]),
            &options(10),
            &RunProgress::silent(),
        )
        .await;

        assert!(matches!(result, Err(IngestError::Reset(_))));
        assert_eq!(store.calls, vec!["reset"]);
    }

    #[tokio::test]
    async fn counts_dropped_rows() {
        let mut bytes = csv(3, 2021);
        bytes.extend_from_slice(b"not-a-date;SP;F;40;1;2;2\n;RJ;M;30;2;1;1\n");
        let transport = MemoryTransport::default().with("mem://a.csv", Body::Data(bytes));
        let mut store = RecordingStore::new();

        let report = run_ingestion(
            &mut store,
            &transport,
            &sources(&["mem://a.csv"]),
            &options(2),
            &RunProgress::silent(),
        )
        .await
        .unwrap();

        assert!(report.sources[0].is_completed());
        assert_eq!(report.sources[0].rows_committed, 3);
        assert_eq!(report.sources[0].rows_dropped, 2);
        assert_eq!(report.sources[0].chunks, 3);
    }

    #[test]
    fn filters_sources_by_id() {
        let filtered = filter_sources(all_sources(), Some("srag_2021, srag_2023"));
        let ids: Vec<&str> = filtered.iter().map(SourceDefinition::id).collect();
        assert_eq!(ids, vec!["srag_2021", "srag_2023"]);

        assert_eq!(filter_sources(all_sources(), None).len(), all_sources().len());
        assert!(filter_sources(all_sources(), Some("nope")).is_empty());
    }

    #[test]
    fn url_sources_get_unique_ids() {
        let list = sources_from_urls(&[
            "https://example.org/2021/INFLUD21.csv".to_string(),
            "/data/INFLUD21.csv".to_string(),
        ]);
        assert_eq!(list[0].id(), "influd21");
        assert_eq!(list[1].id(), "influd21_2");
        assert_eq!(list[1].location(), "/data/INFLUD21.csv");
    }
}
