//! Configuration constants and settings for the harvester.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarvesterError, Result};
use crate::http::RetryPolicy;
use crate::identifier::PatentIdentifier;

/// Base URL of the patent-search website.
pub const PATENT_SITE_URL: &str = "https://patents.google.com";

/// URL template for the PDF asset.
///
/// `{id}` expands to the full canonical identifier, `{number}` to country code
/// plus number without the kind code.
pub const PDF_URL_TEMPLATE: &str = "https://patentimages.storage.googleapis.com/pdfs/{number}.pdf";

/// Language segment of the page URL.
pub const DEFAULT_LANGUAGE: &str = "en";

/// HTTP timeout in seconds, per request and default per operation.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Backoff multiplier between attempts.
pub const RETRY_MULTIPLIER: u32 = 2;

/// Default maximum page size in bytes (20 MB).
///
/// Patent pages with long descriptions run to a few MB; anything larger is
/// not a patent page.
pub const DEFAULT_MAX_PAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Runtime settings for fetching and extraction.
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Base URL pages are fetched from.
    pub page_base_url: String,
    /// PDF URL template, see [`PDF_URL_TEMPLATE`].
    pub pdf_url_template: String,
    /// Language segment of the page URL.
    pub language: String,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
    /// Retry policy shared by page and asset fetches.
    pub retry: RetryPolicy,
    /// Upper bound for a page body.
    pub max_page_bytes: u64,
    /// Optional YAML grammar replacing the built-in one.
    pub grammar_path: Option<PathBuf>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            page_base_url: PATENT_SITE_URL.to_string(),
            pdf_url_template: PDF_URL_TEMPLATE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            request_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            grammar_path: None,
        }
    }
}

impl HarvesterConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let page_base_url =
            std::env::var("PATENT_HARVESTER_BASE_URL").unwrap_or(defaults.page_base_url);

        let pdf_url_template =
            std::env::var("PATENT_HARVESTER_PDF_URL").unwrap_or(defaults.pdf_url_template);
        if !pdf_url_template.contains("{id}") && !pdf_url_template.contains("{number}") {
            return Err(HarvesterError::Config(format!(
                "PATENT_HARVESTER_PDF_URL must contain {{id}} or {{number}}: {pdf_url_template}"
            )));
        }

        let language = std::env::var("PATENT_HARVESTER_LANGUAGE").unwrap_or(defaults.language);

        let timeout_secs = env_number("PATENT_HARVESTER_TIMEOUT_SECS")?.unwrap_or(HTTP_TIMEOUT_SECS);

        let max_attempts = env_number("PATENT_HARVESTER_MAX_ATTEMPTS")?
            .map(|v: u64| v.clamp(1, 10) as u32)
            .unwrap_or(MAX_ATTEMPTS);

        let base_delay_ms =
            env_number("PATENT_HARVESTER_RETRY_DELAY_MS")?.unwrap_or(RETRY_BASE_DELAY_MS);

        let max_page_bytes =
            env_number("PATENT_HARVESTER_MAX_PAGE_BYTES")?.unwrap_or(DEFAULT_MAX_PAGE_BYTES);

        let grammar_path = std::env::var("PATENT_HARVESTER_GRAMMAR").ok().map(PathBuf::from);

        Ok(Self {
            page_base_url,
            pdf_url_template,
            language,
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(base_delay_ms),
                multiplier: RETRY_MULTIPLIER,
            },
            max_page_bytes,
            grammar_path,
        })
    }

    /// Start a builder from the defaults.
    pub fn builder() -> HarvesterConfigBuilder {
        HarvesterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build the page URL for an identifier.
    ///
    /// # Examples
    /// ```
    /// use patent_harvester::config::HarvesterConfig;
    /// use patent_harvester::identifier::validate;
    ///
    /// let id = validate("US8400417B2").unwrap();
    /// assert_eq!(
    ///     HarvesterConfig::default().page_url(&id),
    ///     "https://patents.google.com/patent/US8400417B2/en"
    /// );
    /// ```
    #[must_use]
    pub fn page_url(&self, id: &PatentIdentifier) -> String {
        format!(
            "{}/patent/{id}/{}",
            self.page_base_url.trim_end_matches('/'),
            self.language
        )
    }

    /// Build the deterministic PDF URL for an identifier.
    #[must_use]
    pub fn pdf_url(&self, id: &PatentIdentifier) -> String {
        self.pdf_url_template
            .replace("{id}", &id.to_string())
            .replace("{number}", &format!("{}{}", id.country(), id.number()))
    }
}

/// Parse an optional numeric environment variable.
fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarvesterError::Config(format!("{name} must be a number, got '{value}'"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing `HarvesterConfig`, mainly in tests.
pub struct HarvesterConfigBuilder {
    config: HarvesterConfig,
}

impl HarvesterConfigBuilder {
    pub fn page_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.page_base_url = url.into();
        self
    }

    pub fn pdf_url_template(mut self, template: impl Into<String>) -> Self {
        self.config.pdf_url_template = template.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn max_page_bytes(mut self, max: u64) -> Self {
        self.config.max_page_bytes = max;
        self
    }

    pub fn grammar_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.grammar_path = Some(path.into());
        self
    }

    pub fn build(self) -> HarvesterConfig {
        self.config
    }
}
