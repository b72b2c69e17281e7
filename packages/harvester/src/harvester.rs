//! Main harvester service that ties all components together.
//!
//! A [`Harvester`] runs one identifier through fetch, extraction,
//! normalization and (optionally) PDF download, and records where it is in
//! that pipeline as a [`HarvestState`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{HarvesterConfig, HTTP_TIMEOUT_SECS};
use crate::download::{AssetDownloader, AssetSink, FileSink};
use crate::error::{Disposition, HarvesterError};
use crate::extract::Extractor;
use crate::fetcher::PageFetcher;
use crate::http::{ReqwestTransport, Transport};
use crate::identifier::validate;
use crate::normalize::normalize;
use crate::types::PatentDocument;

/// What the caller wants from one harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Also download the PDF.
    pub download: bool,
    /// Bound for each network operation, retries included.
    pub timeout: Duration,
    /// Directory the default file sink writes into.
    pub output_path: PathBuf,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            download: false,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            output_path: PathBuf::from("."),
        }
    }
}

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Validating,
    Fetching,
    Extracting,
    Normalizing,
    Downloading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuring => "configuring",
            Self::Validating => "validating",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Normalizing => "normalizing",
            Self::Downloading => "downloading",
        })
    }
}

/// The first failure of a harvest, with the stage it happened in.
#[derive(Debug, Clone, Error)]
#[error("{stage} {identifier} failed: {error}")]
pub struct HarvestFailure {
    pub stage: Stage,
    /// Identifier as supplied by the caller.
    pub identifier: String,
    #[source]
    pub error: Arc<HarvesterError>,
}

impl HarvestFailure {
    fn new(stage: Stage, identifier: &str, error: HarvesterError) -> Self {
        Self {
            stage,
            identifier: identifier.to_string(),
            error: Arc::new(error),
        }
    }

    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.error.disposition()
    }
}

/// Lifecycle of a [`Harvester`].
///
/// `Created → Fetching → Extracting → Normalizing → (Downloading) → Ready`,
/// or `Failed` from any of them. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone)]
pub enum HarvestState {
    Created,
    Fetching,
    Extracting,
    Normalizing,
    Downloading,
    Ready,
    Failed(HarvestFailure),
}

impl HarvestState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Normalizing => "normalizing",
            Self::Downloading => "downloading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Single-shot facade over the harvest pipeline for one identifier.
pub struct Harvester {
    raw_id: String,
    options: HarvestOptions,
    config: Arc<HarvesterConfig>,
    fetcher: PageFetcher,
    downloader: AssetDownloader,
    extractor: Option<Extractor>,
    sink: Option<Box<dyn AssetSink>>,
    cancel: CancellationToken,
    state: HarvestState,
}

impl Harvester {
    /// Harvester using the reqwest transport and configuration from the environment.
    pub fn new(raw_id: impl Into<String>, options: HarvestOptions) -> Result<Self, HarvesterError> {
        let config = HarvesterConfig::from_env()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(
            raw_id,
            options,
            Arc::new(transport),
            Arc::new(config),
        ))
    }

    /// Harvester over an explicit transport and configuration.
    pub fn with_transport(
        raw_id: impl Into<String>,
        options: HarvestOptions,
        transport: Arc<dyn Transport>,
        config: Arc<HarvesterConfig>,
    ) -> Self {
        Self {
            raw_id: raw_id.into(),
            options,
            fetcher: PageFetcher::new(Arc::clone(&transport), Arc::clone(&config)),
            downloader: AssetDownloader::new(transport, Arc::clone(&config)),
            config,
            extractor: None,
            sink: None,
            cancel: CancellationToken::new(),
            state: HarvestState::Created,
        }
    }

    /// Use this extractor instead of the one the configuration selects.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Send the PDF to this sink instead of a file under `output_path`.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn AssetSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.raw_id
    }

    #[must_use]
    pub fn state(&self) -> &HarvestState {
        &self.state
    }

    /// Token that cancels the running harvest.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&mut self, state: HarvestState) {
        tracing::info!(identifier = %self.raw_id, from = self.state.name(), to = state.name(), "Harvest state changed");
        self.state = state;
    }

    fn fail(&mut self, stage: Stage, error: HarvesterError) -> HarvestFailure {
        let failure = HarvestFailure::new(stage, &self.raw_id, error);
        tracing::warn!(identifier = %self.raw_id, %stage, error = %failure.error, "Harvest failed");
        self.transition(HarvestState::Failed(failure.clone()));
        failure
    }

    /// Run the pipeline to completion.
    ///
    /// Walks fetch, extraction, normalization and the optional download in
    /// order, stopping at the first failure. A harvester runs once; calling
    /// `run` again fails with [`HarvesterError::AlreadyFinished`] without
    /// touching the network.
    ///
    /// # Returns
    /// The normalized record (with `pdf_path` set when a download was
    /// requested), or a [`HarvestFailure`] naming the stage that failed
    pub async fn run(&mut self) -> Result<PatentDocument, HarvestFailure> {
        if self.state.is_terminal() {
            return Err(HarvestFailure::new(
                Stage::Validating,
                &self.raw_id,
                HarvesterError::AlreadyFinished(self.raw_id.clone()),
            ));
        }

        let id = validate(&self.raw_id).map_err(|e| self.fail(Stage::Validating, e))?;
        let timeout = self.options.timeout;

        self.transition(HarvestState::Fetching);
        let page = match self.fetcher.fetch(&id, timeout, &self.cancel).await {
            Ok(page) => page,
            Err(e) => return Err(self.fail(Stage::Fetching, e)),
        };

        self.transition(HarvestState::Extracting);
        let extractor = match self.extractor.take() {
            Some(extractor) => Ok(extractor),
            None => Extractor::from_config(&self.config),
        };
        let fields = extractor
            .and_then(|extractor| extractor.extract(&page))
            .map_err(|e| self.fail(Stage::Extracting, e))?;
        drop(page);

        self.transition(HarvestState::Normalizing);
        let mut document =
            normalize(id.clone(), fields).map_err(|e| self.fail(Stage::Normalizing, e))?;

        if self.options.download {
            self.transition(HarvestState::Downloading);
            let url = document
                .pdf_url
                .clone()
                .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
                .unwrap_or_else(|| self.config.pdf_url(&id));
            let mut sink: Box<dyn AssetSink> = match self.sink.take() {
                Some(sink) => sink,
                None => Box::new(FileSink::new(&self.options.output_path, &id)),
            };

            let downloaded = self
                .downloader
                .download_from(&id, &url, sink.as_mut(), timeout, &self.cancel)
                .await;
            match downloaded {
                Ok(location) => document.pdf_path = Some(location),
                Err(e) => return Err(self.fail(Stage::Downloading, e)),
            }
        }

        self.transition(HarvestState::Ready);
        Ok(document)
    }
}

/// Harvest one identifier with the default transport and environment configuration.
pub async fn harvest(raw_id: &str, options: HarvestOptions) -> Result<PatentDocument, HarvestFailure> {
    let mut harvester = Harvester::new(raw_id, options)
        .map_err(|e| HarvestFailure::new(Stage::Configuring, raw_id, e))?;
    harvester.run().await
}
