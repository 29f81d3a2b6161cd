//! Chunked CSV reader.
//!
//! Streams a delimited file in bounded batches of [`RawRow`]s without ever
//! holding the whole file in memory. Only the whitelisted columns of the
//! source's [`crate::source_def::FieldMapping`] are materialized; everything
//! else is skipped at the byte-record level.
//!
//! [`fetch_chunks`] runs the reader on a blocking worker and hands batches
//! to the async consumer through a bounded [`tokio::sync::mpsc`] channel.

use std::io::Read;
use std::sync::Arc;

use tokio::sync::mpsc;
use vitalytics_source_models::RawRow;

use crate::SourceError;
use crate::parsing::decode_field;
use crate::progress::ProgressCallback;
use crate::source_def::{Compression, SourceDefinition, TextEncoding};

/// Channel buffer size. The reader stays at most two chunks ahead of the
/// consumer (normalizer/loader).
const CHUNK_CHANNEL_BUFFER: usize = 2;

/// Iterator over bounded batches of whitelisted rows.
///
/// The iterator consumes its underlying reader and cannot be restarted.
/// After the first error it yields nothing further; the rows accumulated
/// for the failed batch are dropped.
pub struct ChunkedCsvReader<R: Read> {
    reader: csv::Reader<R>,
    /// `(header index, column name)` for every whitelisted column found.
    columns: Vec<(usize, String)>,
    encoding: TextEncoding,
    chunk_size: usize,
    record: csv::ByteRecord,
    finished: bool,
}

impl<R: Read> ChunkedCsvReader<R> {
    /// Reads the header row and resolves the whitelisted columns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Csv`] if the header cannot be read and
    /// [`SourceError::MissingColumns`] if the notification date column is
    /// absent.
    pub fn new(
        inner: R,
        source: &SourceDefinition,
        chunk_size: usize,
    ) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(source.delimiter_byte())
            .flexible(true)
            .has_headers(true)
            .from_reader(inner);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| {
                decode_field(h, source.encoding)
                    .trim()
                    .trim_start_matches('\u{feff}')
                    .to_string()
            })
            .collect();

        let mut columns = Vec::new();
        let mut missing_required = Vec::new();

        for column in source.fields.whitelist() {
            match headers.iter().position(|h| h == column) {
                Some(index) => columns.push((index, column.to_string())),
                None if source.fields.is_required(column) => {
                    missing_required.push(column.to_string());
                }
                None => log::warn!(
                    "[{}] column {column} not found in header, treating as missing",
                    source.id()
                ),
            }
        }

        if !missing_required.is_empty() {
            return Err(SourceError::MissingColumns {
                columns: missing_required,
            });
        }

        log::debug!(
            "[{}] reading {}/{} columns in chunks of {chunk_size}",
            source.id(),
            columns.len(),
            headers.len()
        );

        Ok(Self {
            reader,
            columns,
            encoding: source.encoding,
            chunk_size: chunk_size.max(1),
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    fn current_row(&self) -> RawRow {
        self.columns
            .iter()
            .filter_map(|(index, name)| {
                self.record
                    .get(*index)
                    .map(|bytes| (name.clone(), decode_field(bytes, self.encoding)))
            })
            .collect()
    }
}

impl<R: Read> Iterator for ChunkedCsvReader<R> {
    type Item = Result<Vec<RawRow>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.chunk_size.min(8_192));

        while batch.len() < self.chunk_size {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => batch.push(self.current_row()),
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SourceError::Csv(e)));
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

/// Wraps a raw body in the decompressor declared by the source.
fn decompress(body: Box<dyn Read + Send>, source: &SourceDefinition) -> Box<dyn Read + Send> {
    match source.compressed {
        Some(Compression::Gzip) => Box::new(flate2::read::GzDecoder::new(body)),
        None => body,
    }
}

/// Starts reading `body` on a blocking worker and returns a receiver that
/// yields one batch of at most `chunk_size` rows at a time.
///
/// The total number of rows read (or the first read error) is returned via
/// the [`tokio::task::JoinHandle`]. Dropping the receiver stops the worker
/// at the next batch boundary.
#[must_use]
pub fn fetch_chunks(
    body: Box<dyn Read + Send>,
    source: &SourceDefinition,
    chunk_size: usize,
    progress: Arc<dyn ProgressCallback>,
) -> (
    mpsc::Receiver<Vec<RawRow>>,
    tokio::task::JoinHandle<Result<u64, SourceError>>,
) {
    let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_BUFFER);
    let source = source.clone();

    let handle = tokio::task::spawn_blocking(move || {
        let reader = ChunkedCsvReader::new(decompress(body, &source), &source, chunk_size)?;
        let mut total: u64 = 0;

        for batch in reader {
            let batch = batch?;
            let count = batch.len() as u64;

            if tx.blocking_send(batch).is_err() {
                log::debug!(
                    "[{}] consumer stopped, abandoning read after {total} rows",
                    source.id()
                );
                break;
            }

            total += count;
            progress.inc(count);
        }

        Ok(total)
    });

    (rx, handle)
}
