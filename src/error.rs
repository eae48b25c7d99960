//! Error types for dispatchq.
//!
//! The dispatcher never wraps the errors produced by work items; those flow
//! back to the submitter inside the work's own output. The variants here
//! cover construction, configuration, and the HTTP collaborator.

use thiserror::Error;

use crate::model::WorkId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("max_concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("work item {id} aborted before settling")]
    Aborted { id: WorkId },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
