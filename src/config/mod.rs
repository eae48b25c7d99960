//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Everything has
//! a default so a bare local run talks to a backend on localhost:8000.

pub mod pools;

use std::path::PathBuf;

use crate::error::{Error, Result};

pub use pools::{PoolConfig, PoolRegistry};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub max_concurrency: usize,
    pub pools_file: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_concurrency = match lookup("DISPATCH_MAX_CONCURRENCY") {
            Some(raw) => parse_concurrency(&raw)?,
            None => DEFAULT_MAX_CONCURRENCY,
        };

        Ok(Self {
            backend_url: lookup("BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            max_concurrency,
            pools_file: lookup("DISPATCH_POOLS_FILE").map(PathBuf::from),
            otel_endpoint: lookup("OTEL_ENDPOINT"),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_concurrency(raw: &str) -> Result<usize> {
    let n: usize = raw.trim().parse().map_err(|_| {
        Error::Config(format!("DISPATCH_MAX_CONCURRENCY must be a positive integer, got {raw:?}"))
    })?;
    if n == 0 {
        return Err(Error::Config(
            "DISPATCH_MAX_CONCURRENCY must be at least 1".to_string(),
        ));
    }
    Ok(n)
}
