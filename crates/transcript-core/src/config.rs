use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The built-in acquisition strategies, in their default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Structured caption index (player API).
    Index,
    /// Heuristic watch-page scrape.
    Scrape,
    /// External extractor binary. Slowest; keep last.
    FullFetch,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Index, Self::Scrape, Self::FullFetch];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Scrape => "scrape",
            Self::FullFetch => "full_fetch",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index" => Ok(Self::Index),
            "scrape" => Ok(Self::Scrape),
            "full_fetch" | "full-fetch" => Ok(Self::FullFetch),
            other => Err(format!(
                "Unknown strategy '{}': expected one of index, scrape, full_fetch",
                other
            )),
        }
    }
}

/// Configuration for the transcript fetcher and its built-in strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Origin of the video site (default: https://www.youtube.com).
    pub base_url: String,
    /// Preferred caption languages, most preferred first.
    pub languages: Vec<String>,
    /// Strategies to run, in priority order.
    pub strategies: Vec<StrategyKind>,
    /// HTTP request timeout for each document fetch.
    pub request_timeout: Duration,
    /// Maximum number of retries for failed document fetches.
    pub max_retries: u32,
    /// Base backoff duration for retries (doubled each attempt).
    pub retry_backoff: Duration,
    /// Deadline for one whole strategy attempt, retries included.
    pub strategy_timeout: Duration,
    pub ytdlp_path: String,
    pub ytdlp_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".into(),
            languages: vec!["en".into(), "en-US".into(), "en-GB".into()],
            strategies: StrategyKind::ALL.to_vec(),
            request_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
            strategy_timeout: Duration::from_secs(30),
            ytdlp_path: "yt-dlp".into(),
            ytdlp_timeout: Duration::from_secs(120),
        }
    }
}

impl FetcherConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        if !languages.is_empty() {
            self.languages = languages;
        }
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, ms: u64) -> Self {
        self.retry_backoff = Duration::from_millis(ms);
        self
    }

    pub fn with_strategy_timeout(mut self, ms: u64) -> Self {
        self.strategy_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_ytdlp_timeout(mut self, ms: u64) -> Self {
        self.ytdlp_timeout = Duration::from_millis(ms);
        self
    }
}

/// Settings for the hosted chat-completion model used by the summarizer.
/// The API key is passed separately and never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.3,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl SummarizerConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }
}
