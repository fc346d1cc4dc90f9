use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Content does not exist for this id.
    NotFound,
    /// Content exists but cannot be reached right now (rate limit, geo block, login wall).
    Unavailable,
    /// Raw data was retrieved but the payload could not be extracted from it.
    ParseError,
    /// I/O failure or deadline expiry. A higher layer may retry.
    TransientNetwork,
    /// The fetcher itself is misconfigured.
    Configuration,
    /// The caller cancelled the fetch between attempts.
    Cancelled,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetwork | Self::Unavailable)
    }

    /// Stable label used in metrics and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::ParseError => "parse_error",
            Self::TransientNetwork => "transient_network",
            Self::Configuration => "configuration",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::ParseError => write!(f, "parse error"),
            Self::TransientNetwork => write!(f, "transient network error"),
            Self::Configuration => write!(f, "configuration error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An expected failure reported by a strategy. Never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ParseError, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TransientNetwork, message)
    }
}

/// One entry of the attempt log: which strategy ran and how it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: String,
    pub failure: Failure,
}

impl Attempt {
    pub fn new(strategy: impl Into<String>, failure: Failure) -> Self {
        Self {
            strategy: strategy.into(),
            failure,
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.strategy, self.failure.kind, self.failure.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_includes_kind_and_message() {
        let f = Failure::not_found("no caption tracks");
        assert_eq!(f.to_string(), "not found: no caption tracks");
    }

    #[test]
    fn retryable_kinds() {
        assert!(FailureKind::TransientNetwork.is_retryable());
        assert!(FailureKind::Unavailable.is_retryable());
        assert!(!FailureKind::NotFound.is_retryable());
        assert!(!FailureKind::ParseError.is_retryable());
        assert!(!FailureKind::Configuration.is_retryable());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::TransientNetwork).unwrap();
        assert_eq!(json, "\"transient_network\"");
        assert_eq!(FailureKind::ParseError.as_str(), "parse_error");
    }

    #[test]
    fn attempt_display() {
        let a = Attempt::new("scrape", Failure::parse("captionTracks marker missing"));
        assert_eq!(
            a.to_string(),
            "scrape: parse error (captionTracks marker missing)"
        );
    }
}
