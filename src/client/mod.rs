//! HTTP client for the analytics backend.
//!
//! Every request is wrapped as one work item and goes through a
//! [`Dispatcher`], so a dashboard-sized fan-out never puts more than the
//! pool's ceiling of requests in flight. Payloads are returned as opaque
//! JSON; nothing here interprets indicator or sentiment fields.

use reqwest::RequestBuilder;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::dispatch::{Dispatcher, fan_out};
use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Default history window, matching the backend's default.
pub const DEFAULT_HISTORY_PERIOD: &str = "3y";

/// One ticker's entry in a batch: either data or an error, never both.
#[derive(Debug, Clone, Serialize)]
pub struct TickerReport {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TickerReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The batch endpoint returns either the analysis object or
    /// `{"symbol", "error"}` for each ticker.
    fn from_batch_entry(requested: &str, entry: Value) -> Self {
        let symbol = entry
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or(requested)
            .to_string();
        let error = entry.get("error").and_then(Value::as_str).map(str::to_string);
        match error {
            Some(error) => Self {
                symbol,
                data: None,
                error: Some(error),
            },
            None => Self {
                symbol,
                data: Some(entry),
                error: None,
            },
        }
    }
}

/// Throttled client for the analytics backend.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    base_url: String,
    dispatcher: Dispatcher,
}

impl AnalyticsClient {
    pub fn new(base_url: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self::with_http(base_url, reqwest::Client::new(), dispatcher)
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, headers).
    pub fn with_http(
        base_url: impl Into<String>,
        http: reqwest::Client,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an arbitrary JSON endpoint, e.g. `/api/volatility/NVDA`.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let request = self.http.get(self.url(path));
        self.throttled(endpoint_label(path), request).await
    }

    /// Indicators, sentiment and summary for one ticker.
    pub async fn analyze(&self, ticker: &str) -> Result<Value> {
        let request = self.http.get(self.url(&analyze_path(ticker)));
        self.throttled("analyze", request).await
    }

    /// Daily OHLCV history for one ticker. `None` uses the backend default.
    pub async fn history(&self, ticker: &str, period: Option<&str>) -> Result<Value> {
        let path = format!("/api/history/{}", normalize_ticker(ticker));
        let request = self
            .http
            .get(self.url(&path))
            .query(&[("period", period.unwrap_or(DEFAULT_HISTORY_PERIOD))]);
        self.throttled("history", request).await
    }

    /// Analyze many tickers through the dispatcher.
    ///
    /// Reports come back in input order. A ticker that fails yields an
    /// error entry instead of failing the batch.
    pub async fn analyze_all<S: AsRef<str>>(&self, tickers: &[S]) -> Vec<TickerReport> {
        let symbols: Vec<String> = tickers.iter().map(|t| normalize_ticker(t.as_ref())).collect();
        debug!(count = symbols.len(), pool = %self.dispatcher.pool(), "analyze fan-out");

        let settled = fan_out(&self.dispatcher, symbols, |symbol| {
            let request = self.http.get(self.url(&analyze_path(symbol)));
            send_json("analyze", request)
        })
        .await;

        settled
            .into_iter()
            .map(|s| {
                let outcome = s.result.and_then(|inner| inner);
                match outcome {
                    Ok(data) => TickerReport {
                        symbol: s.key,
                        data: Some(data),
                        error: None,
                    },
                    Err(e) => TickerReport {
                        symbol: s.key,
                        data: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect()
    }

    /// Analyze many tickers with a single `POST /api/analyze-batch`.
    ///
    /// The whole batch is one work item and holds one slot. Per-ticker
    /// failures come back inline; only a transport or status failure fails
    /// the call.
    pub async fn analyze_batch<S: AsRef<str>>(&self, tickers: &[S]) -> Result<Vec<TickerReport>> {
        let symbols: Vec<String> = tickers.iter().map(|t| normalize_ticker(t.as_ref())).collect();
        let request = self
            .http
            .post(self.url("/api/analyze-batch"))
            .json(&json!({ "tickers": symbols }));
        let body = self.throttled("analyze_batch", request).await?;
        let entries: Vec<Value> = serde_json::from_value(body)?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let requested = symbols.get(i).map(String::as_str).unwrap_or_default();
                TickerReport::from_batch_entry(requested, entry)
            })
            .collect())
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn throttled(&self, endpoint: &'static str, request: RequestBuilder) -> Result<Value> {
        self.dispatcher
            .submit(move || send_json(endpoint, request))
            .await?
    }
}

async fn send_json(endpoint: &'static str, request: RequestBuilder) -> Result<Value> {
    let result = async {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(response.json::<Value>().await?)
    }
    .await;

    let label = if result.is_ok() { "ok" } else { "error" };
    metrics::backend_requests().add(
        1,
        &[
            opentelemetry::KeyValue::new("endpoint", endpoint),
            opentelemetry::KeyValue::new("result", label),
        ],
    );
    result
}

/// Upper-case and trim, as the backend does before lookup.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

fn analyze_path(ticker: &str) -> String {
    format!("/api/analyze/{}", normalize_ticker(ticker))
}

fn endpoint_label(path: &str) -> &'static str {
    // Low-cardinality metric label; only the known endpoints get names.
    let path = path.trim_start_matches('/');
    if path.starts_with("api/analyze-batch") {
        "analyze_batch"
    } else if path.starts_with("api/analyze") {
        "analyze"
    } else if path.starts_with("api/history") {
        "history"
    } else {
        "other"
    }
}
