//! Tests for the reqwest transport against a local mock server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{load_fixture, MemorySink};
use patent_harvester::config::HarvesterConfig;
use patent_harvester::http::RetryPolicy;
use patent_harvester::{
    validate, AssetDownloader, FetchCause, HarvesterError, PageFetcher, ReqwestTransport,
};

fn config(server: &MockServer) -> Arc<HarvesterConfig> {
    Arc::new(
        HarvesterConfig::builder()
            .page_base_url(server.uri())
            .pdf_url_template(format!("{}/pdfs/{{number}}.pdf", server.uri()))
            .request_timeout(Duration::from_secs(5))
            .retry(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
                multiplier: 2,
            })
            .build(),
    )
}

fn fetcher(config: Arc<HarvesterConfig>) -> PageFetcher {
    let transport = ReqwestTransport::new(&config).unwrap();
    PageFetcher::new(Arc::new(transport), config)
}

#[tokio::test]
async fn test_fetch_page_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patent/US8400417B2/en"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(load_fixture("US8400417B2.html"), "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fetcher(config(&mock_server))
        .fetch(
            &validate("US8400417B2").unwrap(),
            Duration::from_secs(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.status(), 200);
    assert!(page.html().contains("Soft keyboard display"));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patent/US1A/en"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patent/US1A/en"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<article itemscope></article>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fetcher(config(&mock_server))
        .fetch(
            &validate("US1A").unwrap(),
            Duration::from_secs(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.html(), "<article itemscope></article>");
}

#[tokio::test]
async fn test_not_found_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = fetcher(config(&mock_server))
        .fetch(
            &validate("US1A").unwrap(),
            Duration::from_secs(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarvesterError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn test_overall_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let err = fetcher(config(&mock_server))
        .fetch(
            &validate("US1A").unwrap(),
            Duration::from_millis(200),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarvesterError::FetchFailed {
            cause: FetchCause::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn test_download_pdf_over_http() {
    let mock_server = MockServer::start().await;
    let pdf: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/pdfs/US8400417.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config(&mock_server);
    let transport = Arc::new(ReqwestTransport::new(&config).unwrap());
    let downloader = AssetDownloader::new(transport, config);
    let mut sink = MemorySink::default();

    let location = downloader
        .download(
            &validate("US8400417B2").unwrap(),
            &mut sink,
            Duration::from_secs(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "memory://pdf");
    assert_eq!(sink.contents(), pdf);
}
