//! Patent page fetching.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::http::{bytes_to_string, get_body_with_retry, BodyOutcome, Transport};
use crate::identifier::PatentIdentifier;

/// A fetched page. Consumed by the extractor.
#[derive(Debug, Clone)]
pub struct RawPage {
    url: String,
    fetched_at: DateTime<Utc>,
    status: u16,
    html: String,
}

impl RawPage {
    /// Wrap markup obtained elsewhere, e.g. a stored fixture.
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetched_at: Utc::now(),
            status,
            html: html.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Fetches patent pages through a [`Transport`].
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    config: Arc<HarvesterConfig>,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<HarvesterConfig>) -> Self {
        Self { transport, config }
    }

    /// Fetch the page for `id`.
    ///
    /// Every attempt covers the request and the full body read, so a
    /// connection dropped halfway through the page is retried like one that
    /// never connected.
    ///
    /// # Arguments
    /// * `id` - Validated identifier; the URL comes from the configured base
    /// * `timeout` - Bounds the whole operation, retries and body included
    /// * `cancel` - Aborts the fetch with `FetchCause::Cancelled`
    ///
    /// # Returns
    /// The decoded page, or `DocumentNotFound` when the site answers 404/410
    pub async fn fetch(
        &self,
        id: &PatentIdentifier,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawPage> {
        let url = self.config.page_url(id);
        let deadline = Instant::now() + timeout;

        tracing::debug!(%id, url = %url, "Fetching patent page");

        let outcome = get_body_with_retry(
            self.transport.as_ref(),
            &url,
            &self.config.retry,
            self.config.max_page_bytes,
            deadline,
            cancel,
        )
        .await?;

        let (status, bytes, attempts) = match outcome {
            BodyOutcome::Found {
                status,
                body,
                attempts,
            } => (status, body, attempts),
            BodyOutcome::NotFound { .. } => {
                return Err(HarvesterError::DocumentNotFound {
                    identifier: id.to_string(),
                });
            }
        };

        tracing::debug!(%id, attempts, bytes = bytes.len(), "Fetched patent page");

        Ok(RawPage {
            html: bytes_to_string(&bytes, &format!("patent page for {id}")),
            url,
            fetched_at: Utc::now(),
            status,
        })
    }
}
