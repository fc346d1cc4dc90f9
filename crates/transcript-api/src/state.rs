use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use transcript_core::{
    build_fetcher, Attempt, FetchError, Fetcher, FetcherConfig, Outcome, ResourceId, Transcript,
};

pub const DEFAULT_RECORD_LIMIT: usize = 100;

/// One completed fetch, kept in memory for later inspection.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub id: Uuid,
    pub video_id: ResourceId,
    pub created_at: DateTime<Utc>,
    pub outcome: Outcome<Transcript>,
}

impl FetchRecord {
    pub fn new(video_id: ResourceId, outcome: Outcome<Transcript>) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            created_at: Utc::now(),
            outcome,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.outcome.is_success() {
            "success"
        } else {
            "exhausted"
        }
    }
}

/// Per-label counters rendered by the metrics endpoint.
#[derive(Default)]
pub struct FetchStats {
    results: DashMap<&'static str, u64>,
    strategy_success: DashMap<String, u64>,
    strategy_failures: DashMap<(String, &'static str), u64>,
}

impl FetchStats {
    pub fn record_outcome(&self, outcome: &Outcome<Transcript>) {
        match outcome {
            Outcome::Success { source, .. } => {
                *self.results.entry("success").or_default() += 1;
                *self.strategy_success.entry(source.clone()).or_default() += 1;
            }
            Outcome::Exhausted { attempts } => {
                *self.results.entry("exhausted").or_default() += 1;
                self.record_attempts(attempts);
            }
        }
    }

    pub fn record_error(&self, err: &FetchError) {
        match err {
            FetchError::Configuration(_) => {
                *self.results.entry("configuration").or_default() += 1;
            }
            FetchError::Cancelled { attempts } => {
                *self.results.entry("cancelled").or_default() += 1;
                self.record_attempts(attempts);
            }
        }
    }

    fn record_attempts(&self, attempts: &[Attempt]) {
        for a in attempts {
            *self
                .strategy_failures
                .entry((a.strategy.clone(), a.failure.kind.as_str()))
                .or_default() += 1;
        }
    }

    pub fn results(&self) -> Vec<(&'static str, u64)> {
        sorted(self.results.iter().map(|e| (*e.key(), *e.value())))
    }

    pub fn strategy_success(&self) -> Vec<(String, u64)> {
        sorted(self.strategy_success.iter().map(|e| (e.key().clone(), *e.value())))
    }

    pub fn strategy_failures(&self) -> Vec<((String, &'static str), u64)> {
        sorted(self.strategy_failures.iter().map(|e| (e.key().clone(), *e.value())))
    }
}

fn sorted<K: Ord, V>(items: impl Iterator<Item = (K, V)>) -> Vec<(K, V)> {
    let mut v: Vec<_> = items.collect();
    v.sort_by(|a, b| a.0.cmp(&b.0));
    v
}

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher<Transcript>>,
    pub records: Arc<DashMap<Uuid, FetchRecord>>,
    pub stats: Arc<FetchStats>,
    pub record_limit: usize,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_fetcher(build_fetcher(&FetcherConfig::default()))
    }

    pub fn with_fetcher(fetcher: Fetcher<Transcript>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            records: Arc::new(DashMap::new()),
            stats: Arc::new(FetchStats::default()),
            record_limit: DEFAULT_RECORD_LIMIT,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit.max(1);
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Store a record, evicting the oldest ones beyond `record_limit`.
    pub fn insert_record(&self, record: FetchRecord) {
        self.records.insert(record.id, record);
        while self.records.len() > self.record_limit {
            let oldest = self
                .records
                .iter()
                .min_by_key(|e| e.value().created_at)
                .map(|e| *e.key());
            match oldest {
                Some(id) => {
                    self.records.remove(&id);
                }
                None => break,
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of a record: `{id, video_id, created_at, status, ...}`.
#[derive(Serialize)]
pub struct RecordView<'a> {
    pub id: Uuid,
    pub video_id: &'a ResourceId,
    pub created_at: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<&'a Transcript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<&'a [Attempt]>,
}

impl<'a> From<&'a FetchRecord> for RecordView<'a> {
    fn from(r: &'a FetchRecord) -> Self {
        let attempts = match &r.outcome {
            Outcome::Exhausted { attempts } => Some(attempts.as_slice()),
            Outcome::Success { .. } => None,
        };
        Self {
            id: r.id,
            video_id: &r.video_id,
            created_at: r.created_at.to_rfc3339(),
            status: r.status(),
            source: r.outcome.source(),
            transcript: r.outcome.payload(),
            attempts,
        }
    }
}
