//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use patent_harvester::config::HarvesterConfig;
use patent_harvester::download::AssetSink;
use patent_harvester::http::{HttpResponse, ResponseBody, RetryPolicy, Transport, TransportError};
use patent_harvester::Result;

pub const BASE_URL: &str = "http://fake";
pub const PDF_TEMPLATE: &str = "http://fake/pdfs/{number}.pdf";

/// Load fixture file content.
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

/// Config pointing at the fake site, with millisecond backoff.
pub fn test_config(max_attempts: u32) -> Arc<HarvesterConfig> {
    Arc::new(
        HarvesterConfig::builder()
            .page_base_url(BASE_URL)
            .pdf_url_template(PDF_TEMPLATE)
            .retry(RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
                multiplier: 2,
            })
            .build(),
    )
}

pub fn page_url(id: &str) -> String {
    format!("{BASE_URL}/patent/{id}/en")
}

/// Body served in small chunks.
struct FakeBody(VecDeque<Bytes>);

#[async_trait]
impl ResponseBody for FakeBody {
    async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, TransportError> {
        Ok(self.0.pop_front())
    }
}

type Reply = std::result::Result<(u16, Bytes), TransportError>;

/// Transport answering per URL from a script; the last reply repeats.
/// Unknown URLs get a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn page(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.script(url, vec![Ok((200, body.into()))])
    }

    /// Serve these replies at `url`, in order.
    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                Some(replies) if replies.len() > 1 => replies.pop_front(),
                Some(replies) => replies.front().cloned(),
                None => None,
            }
        };

        let (status, body) = match reply {
            Some(reply) => reply?,
            None => (404, Bytes::new()),
        };
        let chunks = body
            .chunks(1024)
            .map(Bytes::copy_from_slice)
            .collect::<VecDeque<_>>();
        Ok(HttpResponse {
            status,
            body: Box::new(FakeBody(chunks)),
        })
    }
}

/// Sink keeping bytes in memory; clones share the buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub bytes: Arc<Mutex<Vec<u8>>>,
    pub aborted: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn was_aborted(&self) -> bool {
        *self.aborted.lock().unwrap()
    }
}

#[async_trait]
impl AssetSink for MemorySink {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.bytes.lock().unwrap().extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<String> {
        Ok("memory://pdf".to_string())
    }

    async fn abort(&mut self) {
        *self.aborted.lock().unwrap() = true;
    }
}
