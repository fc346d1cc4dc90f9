mod http;

pub use http::HttpLoader;

use async_trait::async_trait;
use thiserror::Error;

use crate::fetcher::Failure;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error {status} fetching {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        is_last_retry: bool,
    },
    #[error("Network error fetching {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        is_last_retry: bool,
    },
    #[error("Timeout fetching {url}")]
    Timeout { url: String, is_last_retry: bool },
}

impl LoadError {
    pub fn is_last_retry(&self) -> bool {
        match self {
            Self::Http { is_last_retry, .. } => *is_last_retry,
            Self::Network { is_last_retry, .. } => *is_last_retry,
            Self::Timeout { is_last_retry, .. } => *is_last_retry,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<LoadError> for Failure {
    fn from(err: LoadError) -> Self {
        let message = err.to_string();
        match err {
            LoadError::Http { status: 404 | 410, .. } => Failure::not_found(message),
            LoadError::Http {
                status: 401 | 403 | 429 | 451,
                ..
            } => Failure::unavailable(message),
            LoadError::Http { .. } | LoadError::Network { .. } | LoadError::Timeout { .. } => {
                Failure::transient(message)
            }
        }
    }
}

/// Fetches raw documents (watch pages, player JSON, caption files) by URI.
///
/// Implementations own retries and timeouts. The trait is object-safe and
/// Send + Sync so strategies can share one loader.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn get(&self, uri: &str) -> Result<String, LoadError>;

    async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Result<String, LoadError>;
}
