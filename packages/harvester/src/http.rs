//! HTTP transport and the retry discipline shared by page and asset fetches.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{HarvesterConfig, MAX_ATTEMPTS, RETRY_BASE_DELAY_MS, RETRY_MULTIPLIER};
use crate::error::{FetchCause, HarvesterError, Result};

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("patent-harvester/", env!("CARGO_PKG_VERSION"));

/// Failure reported by a [`Transport`] for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request timed out.
    Timeout,
    /// Connecting failed or the connection was reset, before or during the body.
    Connection(String),
    /// Anything else (invalid URL, redirect loop, decoding).
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            Self::Connection(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// A response body read chunk by chunk.
#[async_trait]
pub trait ResponseBody: Send {
    /// Next chunk, or `None` at the end of the body.
    async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, TransportError>;
}

/// Status and streaming body of a response.
pub struct HttpResponse {
    pub status: u16,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues GET requests. Implemented over reqwest, and by fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the configured request timeout and user agent.
    pub fn new(config: &HarvesterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

struct ReqwestBody(reqwest::Response);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, TransportError> {
        self.0.chunk().await.map_err(TransportError::from)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: Box::new(ReqwestBody(response)),
        })
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay for every further attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            multiplier: RETRY_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based attempt: 0, base, base*m, base*m^2, ...
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }
}

/// Result of a request that did not fail.
#[derive(Debug)]
pub enum RetryOutcome {
    /// A 2xx response; body not yet read.
    Found {
        response: HttpResponse,
        attempts: u32,
    },
    /// 404 or 410. Never retried.
    NotFound { attempts: u32 },
}

/// Result of a request whose body was read in full.
#[derive(Debug)]
pub enum BodyOutcome {
    /// A 2xx response and its complete body.
    Found {
        status: u16,
        body: Vec<u8>,
        attempts: u32,
    },
    /// 404 or 410. Never retried.
    NotFound { attempts: u32 },
}

/// How a single attempt ended.
enum Attempt<T> {
    Done(T),
    Transient(FetchCause),
    Permanent(FetchCause),
}

/// A response worth handing to the caller.
enum Sent {
    Found(HttpResponse),
    NotFound,
}

/// Statuses worth another attempt.
fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

fn failed(url: &str, attempts: u32, cause: FetchCause) -> HarvesterError {
    HarvesterError::FetchFailed {
        url: url.to_string(),
        attempts,
        cause,
    }
}

async fn send_once(transport: &dyn Transport, url: &str) -> Attempt<Sent> {
    match transport.get(url).await {
        Ok(response) => match response.status {
            200..=299 => Attempt::Done(Sent::Found(response)),
            404 | 410 => Attempt::Done(Sent::NotFound),
            status if is_retryable_status(status) => {
                Attempt::Transient(FetchCause::Status(status))
            }
            status => Attempt::Permanent(FetchCause::Status(status)),
        },
        Err(TransportError::Timeout) => Attempt::Transient(FetchCause::Timeout),
        Err(TransportError::Connection(message)) => {
            Attempt::Transient(FetchCause::Connection(message))
        }
        // Invalid URL and the like won't get better with retries
        Err(TransportError::Other(message)) => Attempt::Permanent(FetchCause::Request(message)),
    }
}

async fn send_and_read(
    transport: &dyn Transport,
    url: &str,
    limit: u64,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Attempt<Option<(u16, Vec<u8>)>> {
    let mut response = match send_once(transport, url).await {
        Attempt::Done(Sent::Found(response)) => response,
        Attempt::Done(Sent::NotFound) => return Attempt::Done(None),
        Attempt::Transient(cause) => return Attempt::Transient(cause),
        Attempt::Permanent(cause) => return Attempt::Permanent(cause),
    };
    match read_body(response.body.as_mut(), limit, deadline, cancel).await {
        Ok(body) => Attempt::Done(Some((response.status, body))),
        // A reset mid-body is as transient as one before the headers
        Err(cause @ (FetchCause::Timeout | FetchCause::Connection(_))) => Attempt::Transient(cause),
        Err(cause) => Attempt::Permanent(cause),
    }
}

/// Run `attempt_once` until it succeeds, fails permanently, or the attempt
/// ceiling, deadline or cancellation stops the loop.
async fn retry<T, F, Fut>(
    url: &str,
    policy: &RetryPolicy,
    deadline: Instant,
    cancel: &CancellationToken,
    mut attempt_once: F,
) -> Result<(T, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_cause = FetchCause::Timeout;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after delay");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(failed(url, attempt - 1, FetchCause::Cancelled)),
                _ = sleep_until(deadline) => return Err(failed(url, attempt - 1, FetchCause::Timeout)),
                _ = sleep(delay) => {}
            }
        }

        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(failed(url, attempt - 1, FetchCause::Cancelled)),
            step = timeout_at(deadline, attempt_once()) => step,
        };

        match step {
            Err(_elapsed) => return Err(failed(url, attempt, FetchCause::Timeout)),
            Ok(Attempt::Done(value)) => {
                tracing::debug!(url, attempt, "Request succeeded");
                return Ok((value, attempt));
            }
            Ok(Attempt::Transient(cause)) => {
                tracing::warn!(url, attempt, max_attempts, cause = %cause, "Transient failure, will retry");
                last_cause = cause;
            }
            Ok(Attempt::Permanent(cause)) => return Err(failed(url, attempt, cause)),
        }
    }

    Err(failed(url, max_attempts, last_cause))
}

/// GET `url`, retrying transient failures per `policy`.
///
/// Retries timeouts, connection errors, 408, 429 and 5xx responses with
/// exponential backoff. The body is left unread, so a failure while reading
/// it is the caller's to handle.
///
/// # Arguments
/// * `transport` - Transport to issue requests through
/// * `url` - URL to request
/// * `policy` - Attempt ceiling and backoff
/// * `deadline` - Bound on the whole loop; passing it fails with `FetchCause::Timeout`
/// * `cancel` - Checked before every attempt and during backoff; fails with `FetchCause::Cancelled`
///
/// # Returns
/// The first 2xx response, or `NotFound` for 404/410
pub async fn get_with_retry(
    transport: &dyn Transport,
    url: &str,
    policy: &RetryPolicy,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<RetryOutcome> {
    let (sent, attempts) = retry(url, policy, deadline, cancel, move || {
        send_once(transport, url)
    })
    .await?;

    Ok(match sent {
        Sent::Found(response) => RetryOutcome::Found { response, attempts },
        Sent::NotFound => RetryOutcome::NotFound { attempts },
    })
}

/// GET `url` and read the whole body, retrying transient failures per `policy`.
///
/// Unlike [`get_with_retry`] the body read is part of every attempt: a
/// connection reset or timeout halfway through the body starts the next one.
/// A body over `limit` bytes fails at once.
pub async fn get_body_with_retry(
    transport: &dyn Transport,
    url: &str,
    policy: &RetryPolicy,
    limit: u64,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<BodyOutcome> {
    let (fetched, attempts) = retry(url, policy, deadline, cancel, move || {
        send_and_read(transport, url, limit, deadline, cancel)
    })
    .await?;

    Ok(match fetched {
        Some((status, body)) => BodyOutcome::Found {
            status,
            body,
            attempts,
        },
        None => BodyOutcome::NotFound { attempts },
    })
}

/// Read a whole body into memory, refusing bodies larger than `limit` bytes.
pub async fn read_body(
    body: &mut dyn ResponseBody,
    limit: u64,
    deadline: Instant,
    cancel: &CancellationToken,
) -> std::result::Result<Vec<u8>, FetchCause> {
    let mut buffer = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchCause::Cancelled),
            next = timeout_at(deadline, body.chunk()) => next,
        };
        match next {
            Err(_elapsed) => return Err(FetchCause::Timeout),
            Ok(Err(TransportError::Timeout)) => return Err(FetchCause::Timeout),
            Ok(Err(TransportError::Connection(message))) => {
                return Err(FetchCause::Connection(message));
            }
            Ok(Err(TransportError::Other(message))) => return Err(FetchCause::Body(message)),
            Ok(Ok(None)) => return Ok(buffer),
            Ok(Ok(Some(chunk))) => {
                if (buffer.len() + chunk.len()) as u64 > limit {
                    return Err(FetchCause::Body(format!("response exceeds {limit} bytes")));
                }
                buffer.extend_from_slice(&chunk);
            }
        }
    }
}

/// Decode response bytes as UTF-8, replacing invalid sequences.
pub fn bytes_to_string(bytes: &[u8], context: &str) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => {
            tracing::warn!(context, "Response is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
