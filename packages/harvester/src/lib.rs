//! Patent Harvester - Fetch patent pages and turn them into structured records.
//!
//! Given a publication identifier such as `US8400417B2`, the harvester fetches
//! the patent's public page, extracts bibliographic and legal data with a
//! declarative selector grammar, normalizes it into a [`PatentDocument`], and
//! optionally downloads the PDF.
//!
//! # Example
//!
//! ```
//! use patent_harvester::identifier::validate;
//!
//! let id = validate(" us 8400417 b2 ").unwrap();
//! assert_eq!(id.to_string(), "US8400417B2");
//! assert!(validate("8400417").is_err());
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`identifier`]: Identifier validation and canonical form
//! - [`config`]: Configuration constants, environment settings, URL builders
//! - [`error`]: Error types and Result alias
//! - [`http`]: Transport abstraction and retry with backoff
//! - [`fetcher`]: Patent page fetching
//! - [`extract`]: Selector grammar and field extraction
//! - [`text`]: Whitespace and Unicode cleanup
//! - [`normalize`]: Typed record construction
//! - [`types`]: Core data types (PatentDocument, Citation, LegalEvent, etc.)
//! - [`download`]: PDF download into an asset sink
//! - [`harvester`]: Facade running the whole pipeline
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod harvester;
pub mod http;
pub mod identifier;
pub mod normalize;
pub mod text;
pub mod types;

// Re-export main entry points
pub use harvester::{harvest, HarvestFailure, HarvestOptions, HarvestState, Harvester, Stage};

// Re-export commonly used items
pub use download::{AssetDownloader, AssetSink, FileSink};
pub use error::{Disposition, FetchCause, HarvesterError, Result};
pub use extract::Extractor;
pub use fetcher::{PageFetcher, RawPage};
pub use http::{ReqwestTransport, Transport};
pub use identifier::{validate, PatentIdentifier};
pub use normalize::normalize;
pub use types::{
    Citation, CitationRelation, ClaimDetail, Classification, LegalEvent, PatentDocument,
    PriorityApplication, SimilarDocument, TimelineEvent,
};
