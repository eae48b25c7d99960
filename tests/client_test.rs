//! Analytics client tests against a throwaway local HTTP server.
//!
//! The server speaks just enough HTTP/1.1 to answer one request per
//! connection, holds each request for a moment, and records how many it
//! was serving at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dispatchq::client::AnalyticsClient;
use dispatchq::dispatch::Dispatcher;
use dispatchq::error::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Backend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    paths: Mutex<Vec<String>>,
}

impl Backend {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

fn analysis(ticker: &str) -> serde_json::Value {
    if ticker == "BAD" {
        serde_json::json!({ "symbol": "BAD", "error": "Stock data not found for BAD" })
    } else {
        serde_json::json!({ "symbol": ticker, "price": 101.5 })
    }
}

fn route(path: &str, body: &[u8]) -> (&'static str, String) {
    let ticker = path.rsplit('/').next().unwrap_or_default();
    if path == "/api/analyze-batch" {
        let request: serde_json::Value = serde_json::from_slice(body).unwrap();
        let results: Vec<_> = request["tickers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| analysis(t.as_str().unwrap()))
            .collect();
        ("200 OK", serde_json::Value::from(results).to_string())
    } else if path.starts_with("/api/analyze/") {
        if ticker == "BAD" {
            (
                "404 Not Found",
                r#"{"detail":"Stock data not found for BAD"}"#.to_string(),
            )
        } else {
            ("200 OK", format!(r#"{{"symbol":"{ticker}","price":101.5}}"#))
        }
    } else if path.starts_with("/api/history/") {
        ("200 OK", r#"{"symbol":"NVDA","history":[]}"#.to_string())
    } else {
        ("404 Not Found", r#"{"detail":"Not Found"}"#.to_string())
    }
}

async fn handle(mut socket: TcpStream, backend: Arc<Backend>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break i + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = buf[header_end..].to_vec();

    let now = backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    backend.peak.fetch_max(now, Ordering::SeqCst);
    backend.paths.lock().unwrap().push(path.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    backend.in_flight.fetch_sub(1, Ordering::SeqCst);

    let (status, body) = route(path.split('?').next().unwrap_or_default(), &body);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    let _ = socket.shutdown().await;
}

async fn start_backend() -> (String, Arc<Backend>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let backend = Arc::new(Backend::default());

    let shared = Arc::clone(&backend);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle(socket, Arc::clone(&shared)));
        }
    });

    (format!("http://{addr}"), backend)
}

fn client(base_url: &str, max_concurrency: usize) -> AnalyticsClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    AnalyticsClient::with_http(base_url, http, Dispatcher::new(max_concurrency).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn analyze_normalizes_ticker_and_returns_json() {
    let (url, backend) = start_backend().await;
    let client = client(&url, 2);

    let data = client.analyze(" aapl ").await.unwrap();
    assert_eq!(data["symbol"], "AAPL");
    assert_eq!(backend.paths(), ["/api/analyze/AAPL"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_success_status_is_an_error() {
    let (url, _backend) = start_backend().await;
    let client = client(&url, 2);

    match client.analyze("bad").await {
        Err(Error::Status { status, body }) => {
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
            assert!(body.contains("Stock data not found for BAD"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn history_sends_period_query() {
    let (url, backend) = start_backend().await;
    let client = client(&url, 1);

    client.history("nvda", Some("1y")).await.unwrap();
    client.history("nvda", None).await.unwrap();

    assert_eq!(
        backend.paths(),
        ["/api/history/NVDA?period=1y", "/api/history/NVDA?period=3y"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn analyze_all_throttles_and_keeps_failures_inline() {
    let (url, backend) = start_backend().await;
    let client = client(&url, 2);
    let tickers = ["tsll", "NVDA", "bad", "SMCI", "pltr", "SOFI"];

    let reports = client.analyze_all(&tickers[..]).await;

    let symbols: Vec<&str> = reports.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, ["TSLL", "NVDA", "BAD", "SMCI", "PLTR", "SOFI"]);
    assert_eq!(reports.iter().filter(|r| r.is_ok()).count(), 5);

    let bad = &reports[2];
    assert!(bad.data.is_none());
    assert!(bad.error.as_deref().unwrap().contains("404"));
    let json = serde_json::to_value(bad).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["symbol"], "BAD");

    assert_eq!(reports[3].data.as_ref().unwrap()["symbol"], "SMCI");
    assert!(backend.peak() <= 2, "backend saw {} at once", backend.peak());
    assert_eq!(backend.paths().len(), 6);
    assert_eq!(client.dispatcher().stats().settled, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn analyze_batch_sends_one_request_and_splits_errors() {
    let (url, backend) = start_backend().await;
    let client = client(&url, 2);

    let reports = client
        .analyze_batch(&["aapl", " bad ", "nvda"][..])
        .await
        .unwrap();

    assert_eq!(backend.paths(), ["/api/analyze-batch"]);
    let symbols: Vec<&str> = reports.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, ["AAPL", "BAD", "NVDA"]);
    assert_eq!(reports[0].data.as_ref().unwrap()["price"], 101.5);
    assert_eq!(
        reports[1].error.as_deref(),
        Some("Stock data not found for BAD")
    );
    assert!(reports[2].is_ok());
    assert_eq!(client.dispatcher().stats().settled, 1);
}

#[tokio::test]
#[ignore] // requires the analytics backend on BACKEND_URL
async fn live_backend_batch() {
    let config = dispatchq::config::Config::from_env().expect("config");
    let client = AnalyticsClient::new(&config.backend_url, Dispatcher::new(4).unwrap());
    let reports = client.analyze_all(&["AAPL", "NVDA", "TSLA", "MSFT", "GOOGL"][..]).await;
    assert_eq!(reports.len(), 5);
    assert!(reports.iter().any(|r| r.is_ok()));
}
