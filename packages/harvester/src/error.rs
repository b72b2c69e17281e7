//! Error types for the harvester.
//!
//! `HarvesterError` is the taxonomy every stage fails with. The facade wraps
//! the first failure in a [`HarvestFailure`](crate::harvester::HarvestFailure)
//! that adds the stage and identifier.

use std::fmt;

use thiserror::Error;

/// Why a network operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// The caller's deadline expired, or the transport timed out on every attempt.
    Timeout,
    /// The connection could not be established or was reset.
    Connection(String),
    /// The request itself was unusable: invalid URL, redirect loop and the like.
    Request(String),
    /// The server answered with a status that is not success and not "not found".
    Status(u16),
    /// The response body could not be read to completion.
    Body(String),
    /// The caller cancelled the operation.
    Cancelled,
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Connection(msg) => write!(f, "connection error: {msg}"),
            Self::Request(msg) => write!(f, "request error: {msg}"),
            Self::Status(status) => write!(f, "HTTP status {status}"),
            Self::Body(msg) => write!(f, "failed reading body: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; the same request may succeed later.
    RetryLater,
    /// Permanent for this input.
    GiveUp,
    /// The page no longer looks like a patent page; the extraction grammar needs attention.
    Investigate,
}

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Identifier does not match the canonical pattern.
    #[error("Invalid patent identifier: '{0}'. Expected country code, number and kind code (e.g., US8400417B2)")]
    InvalidIdentifier(String),

    /// The page for a well-formed identifier does not exist.
    #[error("Patent document not found: {identifier}")]
    DocumentNotFound { identifier: String },

    /// The PDF asset for a well-formed identifier does not exist.
    #[error("PDF asset not found for {identifier} at {url}")]
    AssetNotFound { identifier: String, url: String },

    /// Network failure after retries, a non-retryable status, timeout or cancellation.
    #[error("Fetching {url} failed after {attempts} attempt(s): {cause}")]
    FetchFailed {
        url: String,
        attempts: u32,
        cause: FetchCause,
    },

    /// The fetched page does not have the structure of a patent page.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// A date field held a non-empty value that is not a date.
    #[error("Malformed date in field '{field}': '{value}'")]
    DateParse { field: String, value: String },

    /// The extraction grammar could not be loaded or compiled.
    #[error("Invalid extraction grammar: {0}")]
    Grammar(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The facade already reached a terminal state.
    #[error("Harvest for {0} already finished; create a new harvester to fetch again")]
    AlreadyFinished(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing the PDF asset failed.
    #[error("Failed to write asset to {location}: {source}")]
    AssetWrite {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvesterError {
    /// Classify the failure for the caller.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::FetchFailed { cause, .. } => match cause {
                FetchCause::Status(status) if (400..500).contains(status) => Disposition::GiveUp,
                FetchCause::Request(_) => Disposition::GiveUp,
                _ => Disposition::RetryLater,
            },
            Self::ExtractionFailed(_) | Self::Grammar(_) => Disposition::Investigate,
            _ => Disposition::GiveUp,
        }
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
