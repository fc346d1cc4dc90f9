use serde::Serialize;

use super::failure::Attempt;

/// Final result of one fetch call. Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<P> {
    /// The first strategy that produced a payload. Earlier failures are not kept.
    Success { payload: P, source: String },
    /// Every configured strategy failed. `attempts` is in the order tried and never empty.
    Exhausted { attempts: Vec<Attempt> },
}

impl<P> Outcome<P> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn into_payload(self) -> Option<P> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Exhausted { .. } => None,
        }
    }

    /// Name of the strategy that produced the payload.
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Success { source, .. } => Some(source),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Success { .. } => &[],
            Self::Exhausted { attempts } => attempts,
        }
    }

    /// Human-readable rendering of every failed attempt, in order.
    pub fn failure_chain(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Exhausted { attempts } => Some(
                attempts
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::failure::Failure;

    #[test]
    fn success_accessors() {
        let outcome = Outcome::Success {
            payload: "text".to_string(),
            source: "index".to_string(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.payload().map(String::as_str), Some("text"));
        assert_eq!(outcome.source(), Some("index"));
        assert!(outcome.attempts().is_empty());
        assert!(outcome.failure_chain().is_none());
    }

    #[test]
    fn failure_chain_lists_every_attempt() {
        let outcome: Outcome<String> = Outcome::Exhausted {
            attempts: vec![
                Attempt::new("index", Failure::not_found("no entry")),
                Attempt::new("scrape", Failure::parse("marker missing")),
                Attempt::new("full_fetch", Failure::not_found("no subtitles found")),
            ],
        };
        assert_eq!(
            outcome.failure_chain().unwrap(),
            "index: not found (no entry); scrape: parse error (marker missing); \
             full_fetch: not found (no subtitles found)"
        );
        assert!(outcome.into_payload().is_none());
    }

    #[test]
    fn serializes_with_status_tag() {
        let outcome: Outcome<String> = Outcome::Exhausted {
            attempts: vec![Attempt::new("index", Failure::unavailable("429"))],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "exhausted");
        assert_eq!(json["attempts"][0]["strategy"], "index");
        assert_eq!(json["attempts"][0]["failure"]["kind"], "unavailable");
    }
}
