//! PDF asset download.
//!
//! The body is streamed chunk by chunk into an [`AssetSink`]; the whole asset
//! is never held in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::HarvesterConfig;
use crate::error::{FetchCause, HarvesterError, Result};
use crate::http::{get_with_retry, RetryOutcome, Transport, TransportError};
use crate::identifier::PatentIdentifier;

/// Destination for downloaded bytes.
#[async_trait]
pub trait AssetSink: Send {
    /// Append a chunk.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Complete the asset and report where it was stored.
    async fn finish(&mut self) -> Result<String>;

    /// Discard whatever was written so far.
    async fn abort(&mut self);
}

/// Writes the asset to `{dir}/{id}.pdf`.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    #[must_use]
    pub fn new(dir: &Path, id: &PatentIdentifier) -> Self {
        Self {
            path: dir.join(format!("{id}.pdf")),
            file: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> HarvesterError {
        HarvesterError::AssetWrite {
            location: self.path.display().to_string(),
            source,
        }
    }

    async fn open(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
            let file = File::create(&self.path)
                .await
                .map_err(|e| self.write_error(e))?;
            self.file = Some(file);
        }
        let path = self.path.display().to_string();
        self.file.as_mut().ok_or_else(|| HarvesterError::AssetWrite {
            location: path,
            source: std::io::Error::other("file not open"),
        })
    }
}

#[async_trait]
impl AssetSink for FileSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let result = self.open().await?.write_all(chunk).await;
        result.map_err(|e| self.write_error(e))
    }

    async fn finish(&mut self) -> Result<String> {
        let result = self.open().await?.flush().await;
        result.map_err(|e| self.write_error(e))?;
        self.file = None;
        Ok(self.path.display().to_string())
    }

    async fn abort(&mut self) {
        if self.file.take().is_some() {
            if let Err(e) = fs::remove_file(&self.path).await {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove partial download");
            }
        }
    }
}

/// Fetches PDF assets with the same retry discipline as pages.
#[derive(Clone)]
pub struct AssetDownloader {
    transport: Arc<dyn Transport>,
    config: Arc<HarvesterConfig>,
}

impl AssetDownloader {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<HarvesterConfig>) -> Self {
        Self { transport, config }
    }

    /// Download the PDF from its deterministic URL.
    pub async fn download(
        &self,
        id: &PatentIdentifier,
        sink: &mut dyn AssetSink,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.config.pdf_url(id);
        self.download_from(id, &url, sink, timeout, cancel).await
    }

    /// Download the PDF from a URL the page advertised.
    ///
    /// The request is retried like a page fetch. Once a 2xx response arrives
    /// its body is streamed into `sink`; cancellation and the deadline are
    /// checked between chunks.
    ///
    /// # Arguments
    /// * `id` - Patent the asset belongs to, for errors and logs
    /// * `url` - Where to fetch the PDF
    /// * `sink` - Receives the bytes; aborted on any failure after the response arrives
    /// * `timeout` - Bounds the request, retries and streaming together
    /// * `cancel` - Stops the download with `FetchCause::Cancelled`
    ///
    /// # Returns
    /// The location reported by the sink, or `AssetNotFound` for 404/410
    pub async fn download_from(
        &self,
        id: &PatentIdentifier,
        url: &str,
        sink: &mut dyn AssetSink,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let deadline = Instant::now() + timeout;
        tracing::debug!(%id, url, "Downloading PDF");

        let outcome = get_with_retry(
            self.transport.as_ref(),
            url,
            &self.config.retry,
            deadline,
            cancel,
        )
        .await?;

        let (mut response, attempts) = match outcome {
            RetryOutcome::Found { response, attempts } => (response, attempts),
            RetryOutcome::NotFound { .. } => {
                return Err(HarvesterError::AssetNotFound {
                    identifier: id.to_string(),
                    url: url.to_string(),
                });
            }
        };

        let failed = |cause: FetchCause| HarvesterError::FetchFailed {
            url: url.to_string(),
            attempts,
            cause,
        };

        let mut written: u64 = 0;
        let streamed: Result<()> = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(failed(FetchCause::Cancelled)),
                next = timeout_at(deadline, response.body.chunk()) => next,
            };
            let chunk = match next {
                Err(_) | Ok(Err(TransportError::Timeout)) => {
                    break Err(failed(FetchCause::Timeout));
                }
                Ok(Err(TransportError::Connection(message) | TransportError::Other(message))) => {
                    break Err(failed(FetchCause::Body(message)));
                }
                Ok(Ok(None)) => break Ok(()),
                Ok(Ok(Some(chunk))) => chunk,
            };
            if let Err(e) = sink.write(&chunk).await {
                break Err(e);
            }
            written += chunk.len() as u64;
        };

        let finished = match streamed {
            Ok(()) => sink.finish().await,
            Err(e) => Err(e),
        };

        match finished {
            Ok(location) => {
                tracing::debug!(%id, bytes = written, location = %location, "PDF stored");
                Ok(location)
            }
            Err(e) => {
                tracing::warn!(%id, bytes = written, error = %e, "PDF download aborted");
                sink.abort().await;
                Err(e)
            }
        }
    }
}
