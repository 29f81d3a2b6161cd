//! Byte transports for opening a dataset.
//!
//! A [`SourceTransport`] turns a [`SourceDefinition`] into a blocking
//! [`Read`] over the raw (possibly compressed) file body. Opening is async
//! and fails with [`SourceError::Unavailable`] before any data is produced;
//! reading happens later on a blocking worker (see
//! [`crate::csv_download::fetch_chunks`]).

use std::io::{self, Read};

use async_trait::async_trait;

use crate::SourceError;
use crate::retry::{MAX_RETRIES, send_with_retry};
use crate::source_def::SourceDefinition;

/// Browser `User-Agent` sent with every download. The dataset host rejects
/// requests from unidentified clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";

/// A blocking byte stream over a source body.
pub type SourceBody = Box<dyn Read + Send>;

/// Opens the raw byte stream of a source.
#[async_trait]
pub trait SourceTransport: Send + Sync {
    /// Opens the source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if the source cannot be opened.
    async fn open(&self, source: &SourceDefinition) -> Result<SourceBody, SourceError>;
}

/// Downloads sources over HTTP(S) with a streaming body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpTransport {
    /// Creates a transport identifying as a standard browser client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(BROWSER_USER_AGENT)
    }

    /// Creates a transport with a custom `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be built.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Overrides the number of retries for the initial request.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl SourceTransport for HttpTransport {
    async fn open(&self, source: &SourceDefinition) -> Result<SourceBody, SourceError> {
        let location = source.location();
        let response = send_with_retry(
            location,
            || {
                let mut request = self.client.get(location);
                for (key, value) in &source.headers {
                    request = request.header(key, value);
                }
                request
            },
            self.max_retries,
        )
        .await
        .map_err(|e| match e {
            SourceError::Unavailable { .. } => e,
            other => SourceError::Unavailable {
                location: location.to_string(),
                message: other.to_string(),
            },
        })?;

        log::debug!(
            "Opened {location} (content-length: {:?})",
            response.content_length()
        );

        Ok(Box::new(HttpBodyReader::new(
            response,
            tokio::runtime::Handle::current(),
        )))
    }
}

/// Adapts a streaming [`reqwest::Response`] body to [`Read`].
///
/// Each `read` blocks on the next body chunk, so it must only be used from a
/// blocking worker thread (e.g. inside `spawn_blocking`), never directly on
/// an async task.
pub struct HttpBodyReader {
    response: reqwest::Response,
    runtime: tokio::runtime::Handle,
    buffer: Vec<u8>,
    position: usize,
}

impl HttpBodyReader {
    /// Wraps a response whose body has not been consumed yet.
    #[must_use]
    pub const fn new(response: reqwest::Response, runtime: tokio::runtime::Handle) -> Self {
        Self {
            response,
            runtime,
            buffer: Vec::new(),
            position: 0,
        }
    }
}

impl Read for HttpBodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.position >= self.buffer.len() {
            match self.runtime.block_on(self.response.chunk()) {
                Ok(Some(chunk)) => {
                    self.buffer.clear();
                    self.buffer.extend_from_slice(&chunk);
                    self.position = 0;
                }
                Ok(None) => return Ok(0),
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        let n = buf.len().min(self.buffer.len() - self.position);
        buf[..n].copy_from_slice(&self.buffer[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

/// Reads sources from the local filesystem. Accepts plain paths and
/// `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

#[async_trait]
impl SourceTransport for FileTransport {
    async fn open(&self, source: &SourceDefinition) -> Result<SourceBody, SourceError> {
        let location = source.location();
        let path = location.strip_prefix("file://").unwrap_or(location);
        let file = std::fs::File::open(path).map_err(|e| SourceError::Unavailable {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(file))
    }
}

/// Dispatches to [`HttpTransport`] for `http(s)://` locations and to
/// [`FileTransport`] for everything else.
#[derive(Debug, Clone)]
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    /// Creates the default transport pair.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            http: HttpTransport::new()?,
            file: FileTransport,
        })
    }
}

#[async_trait]
impl SourceTransport for DefaultTransport {
    async fn open(&self, source: &SourceDefinition) -> Result<SourceBody, SourceError> {
        if source.is_remote() {
            self.http.open(source).await
        } else {
            self.file.open(source).await
        }
    }
}
