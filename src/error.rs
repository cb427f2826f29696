//! Error types for each stage of the rewrite pipeline.
//!
//! Every stage gets its own enum so callers can decide what is recoverable.
//! Discovery and extraction misses are expected outcomes that the slot
//! processor turns into "try another URL"; provider errors end a slot;
//! delivery errors are only ever logged.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to produce a candidate article URL.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Every backend was tried for every keyword variant.
    #[error("no candidate article found for '{keyword}'")]
    NotFound { keyword: String },
    /// A single backend failed; the cascade logs this and moves on.
    #[error("search backend {backend} failed: {message}")]
    Backend { backend: String, message: String },
}

impl DiscoveryError {
    pub fn backend(backend: &str, message: impl fmt::Display) -> Self {
        Self::Backend {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        Self::backend("http", e)
    }
}

/// Failure to download page markup.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Which part of an extraction fell short of the quality bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortfall {
    MissingTitle,
    MissingContent,
    ContentTooShort { len: usize, min: usize },
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "title is missing"),
            Self::MissingContent => write!(f, "content is missing"),
            Self::ContentTooShort { len, min } => {
                write!(f, "content length {len} is below the minimum of {min}")
            }
        }
    }
}

/// The whole strategy cascade missed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("insufficient content: {0}")]
    InsufficientContent(Shortfall),
}

/// Failure reported by the rewrite provider.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("provider timed out after {0}s")]
    Timeout(u64),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned an error: {0}")]
    Sentinel(String),
    #[error("provider response could not be parsed: {0}")]
    Malformed(String),
}

impl RewriteError {
    /// Errors worth retrying with the same extracted content.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure to deliver the callback.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("callback request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("callback to {url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced synchronously by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("task {0} not found")]
    TaskNotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
