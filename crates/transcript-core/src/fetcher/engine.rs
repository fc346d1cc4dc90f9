use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::failure::{Attempt, FailureKind};
use super::outcome::Outcome;
use super::strategy::Strategy;
use crate::resource::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Fetcher misconfigured: {0}")]
    Configuration(String),
    #[error("Fetch cancelled after {} attempt(s)", .attempts.len())]
    Cancelled { attempts: Vec<Attempt> },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Ordered, first-success-wins driver over a fixed list of strategies.
///
/// The strategy list is the only state and is never mutated after
/// construction, so one fetcher can serve concurrent calls for different ids.
/// Each call keeps its own attempt log.
pub struct Fetcher<P> {
    strategies: Vec<(String, Arc<dyn Strategy<P>>)>,
}

impl<P> Fetcher<P> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy under its own [`Strategy::name`].
    pub fn with_strategy(self, strategy: Arc<dyn Strategy<P>>) -> Self {
        let name = strategy.name().to_string();
        self.with_named_strategy(name, strategy)
    }

    pub fn with_named_strategy(
        mut self,
        name: impl Into<String>,
        strategy: Arc<dyn Strategy<P>>,
    ) -> Self {
        self.strategies.push((name.into(), strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Check the strategy list without invoking anything.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.strategies.is_empty() {
            return Err(FetchError::Configuration(
                "no strategies configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for (name, _) in &self.strategies {
            if !seen.insert(name.as_str()) {
                return Err(FetchError::Configuration(format!(
                    "duplicate strategy name: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    pub async fn fetch(&self, id: &ResourceId) -> Result<Outcome<P>, FetchError> {
        self.run(id, None).await
    }

    /// Like [`fetch`](Self::fetch), checking `cancel` before each attempt.
    /// A running attempt is never interrupted.
    pub async fn fetch_with_cancel(
        &self,
        id: &ResourceId,
        cancel: &CancellationToken,
    ) -> Result<Outcome<P>, FetchError> {
        self.run(id, Some(cancel)).await
    }

    async fn run(
        &self,
        id: &ResourceId,
        cancel: Option<&CancellationToken>,
    ) -> Result<Outcome<P>, FetchError> {
        self.validate()?;

        let mut attempts: Vec<Attempt> = Vec::with_capacity(self.strategies.len());

        for (position, (name, strategy)) in self.strategies.iter().enumerate() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                debug!(video_id = %id, tried = attempts.len(), "Fetch cancelled");
                return Err(FetchError::Cancelled { attempts });
            }

            debug!(video_id = %id, strategy = %name, position, "Attempting strategy");

            match strategy.attempt(id).await {
                Ok(payload) => {
                    info!(
                        video_id = %id,
                        strategy = %name,
                        failed_before = attempts.len(),
                        "Strategy succeeded"
                    );
                    return Ok(Outcome::Success {
                        payload,
                        source: name.clone(),
                    });
                }
                Err(failure) => {
                    warn!(
                        video_id = %id,
                        strategy = %name,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Strategy failed"
                    );
                    attempts.push(Attempt::new(name.clone(), failure));
                }
            }
        }

        Ok(Outcome::Exhausted { attempts })
    }
}

impl<P> Default for Fetcher<P> {
    fn default() -> Self {
        Self::new()
    }
}
