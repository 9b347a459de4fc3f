//! Engine and client behaviour against a local HTTP server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio::sync::Semaphore;

use oalc_creator::config::Config;
use oalc_creator::engine::{Engine, RetryConfig};
use oalc_creator::models::{DocumentType, Request};
use oalc_creator::ocr::{OcrConfig, OcrPipeline};
use oalc_creator::scrapers::{
    ConfigurableScraper, DocumentConfig, HttpClient, IndexConfig, ScraperConfig,
};
use oalc_creator::storage::CorpusWriter;

const MATTERS: usize = 6;

#[derive(Default)]
struct Traffic {
    active: AtomicUsize,
    peak: AtomicUsize,
    hits: AtomicUsize,
    /// Requests answered with 503 before the server recovers.
    unavailable: AtomicUsize,
}

async fn index() -> Html<String> {
    let links: String = (1..=MATTERS)
        .map(|n| format!(r#"<li><a class="doc" href="/doc/{n}">Matter {n}</a></li>"#))
        .collect();
    Html(format!("<html><body><ul>{}</ul></body></html>", links))
}

async fn judgment(State(traffic): State<Arc<Traffic>>, Path(id): Path<u32>) -> impl IntoResponse {
    traffic.hits.fetch_add(1, Ordering::SeqCst);
    let active = traffic.active.fetch_add(1, Ordering::SeqCst) + 1;
    traffic.peak.fetch_max(active, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    traffic.active.fetch_sub(1, Ordering::SeqCst);

    let down = traffic
        .unavailable
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if down {
        return (StatusCode::SERVICE_UNAVAILABLE, Html("Try again later".to_string()));
    }
    (
        StatusCode::OK,
        Html(format!(
            r#"<html><body><main id="judgment"><p>Reasons for judgment in matter {}.</p></main></body></html>"#,
            id
        )),
    )
}

async fn serve(traffic: Arc<Traffic>) -> SocketAddr {
    let app = Router::new()
        .route("/index", get(index))
        .route("/doc/:id", get(judgment))
        .with_state(traffic);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn scraper_config(addr: SocketAddr) -> ScraperConfig {
    ScraperConfig {
        name: Some("Local Court".to_string()),
        doc_type: DocumentType::Decision,
        jurisdiction: "commonwealth".to_string(),
        index: IndexConfig {
            urls: vec![format!("http://{}/index", addr)],
            pages: None,
            render: false,
            entry_selector: "a.doc".to_string(),
            id_pattern: Some(r"/doc/(\d+)$".to_string()),
        },
        document: DocumentConfig {
            text_selector: "#judgment".to_string(),
            ..DocumentConfig::default()
        },
    }
}

#[tokio::test]
async fn test_in_flight_requests_never_exceed_limit() {
    let traffic = Arc::new(Traffic::default());
    let addr = serve(Arc::clone(&traffic)).await;
    let state = tempfile::tempdir().unwrap();

    let config = Config {
        data_dir: Some(state.path().to_string_lossy().into_owned()),
        max_concurrent_requests: 2,
        ..Config::default()
    };
    let engine = Engine::new(&config).unwrap().with_progress(false);
    let scraper =
        ConfigurableScraper::new("local_court", scraper_config(addr), engine.context().clone())
            .unwrap();
    let mut corpus = CorpusWriter::open(state.path().join("corpus")).unwrap();

    let report = engine.run(&scraper, &mut corpus).await.unwrap();

    assert_eq!(report.scraped, MATTERS);
    assert_eq!(traffic.hits.load(Ordering::SeqCst), MATTERS);
    assert_eq!(traffic.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_engine_retries_unavailable_document() {
    let traffic = Arc::new(Traffic {
        unavailable: AtomicUsize::new(1),
        ..Traffic::default()
    });
    let addr = serve(Arc::clone(&traffic)).await;
    let state = tempfile::tempdir().unwrap();

    let mut config = scraper_config(addr);
    config.index.id_pattern = Some(r"/doc/(1)$".to_string());
    let engine = Engine::new(&Config {
        data_dir: Some(state.path().to_string_lossy().into_owned()),
        retry: RetryConfig {
            max_elapsed_secs: 5,
            max_wait_secs: 0.05,
            base: 1.25,
        },
        ..Config::default()
    })
    .unwrap()
    .with_progress(false);
    let scraper =
        ConfigurableScraper::new("local_court", config, engine.context().clone()).unwrap();
    let mut corpus = CorpusWriter::open(state.path().join("corpus")).unwrap();

    let report = engine.run(&scraper, &mut corpus).await.unwrap();

    assert_eq!(report.entries, 1);
    assert_eq!(report.scraped, 1);
    assert_eq!(report.failed, 0);
    assert!(corpus.contains("local_court:1"));
    // One 503, then the document itself; the failure was not served from cache.
    assert_eq!(traffic.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ocr_backlog_does_not_hold_network_permits() {
    let traffic = Arc::new(Traffic::default());
    let addr = serve(Arc::clone(&traffic)).await;

    let ocr_permits = Arc::new(Semaphore::new(1));
    let ocr = OcrPipeline::with_semaphore(OcrConfig::default(), Arc::clone(&ocr_permits));
    let client = HttpClient::new(Duration::from_secs(5), 1).unwrap();

    let busy = ocr_permits.acquire().await.unwrap();
    let backlog = tokio::spawn({
        let ocr = ocr.clone();
        async move { ocr.pdf_to_text(b"%PDF-1.4\n%%EOF\n").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        client.fetch(&Request::get(format!("http://{}/doc/3", addr))),
    )
    .await
    .expect("network fetch waited on OCR")
    .unwrap();

    assert_eq!(response.status(), 200);
    assert!(!backlog.is_finished());
    assert_eq!(client.semaphore().available_permits(), 1);

    backlog.abort();
    drop(busy);
}
