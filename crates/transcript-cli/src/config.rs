//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//! record_limit = 200
//!
//! [fetcher]
//! strategies = ["index", "scrape", "full_fetch"]
//! languages = ["en", "en-US"]
//! request_timeout_ms = 10000
//! ytdlp_path = "/usr/local/bin/yt-dlp"
//!
//! [summarizer]
//! model = "llama-3.1-8b-instant"
//! temperature = 0.3
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use transcript_core::{FetcherConfig, StrategyKind, SummarizerConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub fetcher: FetcherSection,

    #[serde(default)]
    pub summarizer: SummarizerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_record_limit")]
    pub record_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
            record_limit: default_record_limit(),
        }
    }
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_record_limit() -> usize {
    transcript_api::state::DEFAULT_RECORD_LIMIT
}

/// `[fetcher]`: every key optional, unset keys keep the library defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetcherSection {
    pub base_url: Option<String>,
    pub strategies: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub strategy_timeout_ms: Option<u64>,
    pub ytdlp_path: Option<String>,
    pub ytdlp_timeout_ms: Option<u64>,
}

impl FetcherSection {
    /// Configured strategy order, parsed and checked for duplicates.
    pub fn strategy_kinds(&self) -> Result<Vec<StrategyKind>, String> {
        let Some(names) = &self.strategies else {
            return Ok(StrategyKind::ALL.to_vec());
        };
        if names.is_empty() {
            return Err("fetcher.strategies must not be empty".into());
        }
        let mut seen = HashSet::new();
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: StrategyKind = name.parse()?;
            if !seen.insert(kind) {
                return Err(format!("Duplicate strategy in fetcher.strategies: {}", name));
            }
            kinds.push(kind);
        }
        Ok(kinds)
    }

    pub fn to_fetcher_config(&self) -> Result<FetcherConfig, String> {
        let mut c = FetcherConfig::default().with_strategies(self.strategy_kinds()?);
        if let Some(ref url) = self.base_url {
            c = c.with_base_url(url.as_str());
        }
        if let Some(ref langs) = self.languages {
            c = c.with_languages(langs.clone());
        }
        if let Some(v) = self.request_timeout_ms {
            c = c.with_request_timeout(v);
        }
        if let Some(v) = self.max_retries {
            c = c.with_max_retries(v);
        }
        if let Some(v) = self.retry_backoff_ms {
            c = c.with_retry_backoff(v);
        }
        if let Some(v) = self.strategy_timeout_ms {
            c = c.with_strategy_timeout(v);
        }
        if let Some(ref path) = self.ytdlp_path {
            c = c.with_ytdlp_path(path.as_str());
        }
        if let Some(v) = self.ytdlp_timeout_ms {
            c = c.with_ytdlp_timeout(v);
        }
        Ok(c)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizerSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl SummarizerSection {
    pub fn to_summarizer_config(&self) -> SummarizerConfig {
        let mut c = SummarizerConfig::default();
        if let Some(ref url) = self.base_url {
            c = c.with_base_url(url.as_str());
        }
        if let Some(ref model) = self.model {
            c = c.with_model(model.as_str());
        }
        if let Some(t) = self.temperature {
            c = c.with_temperature(t);
        }
        if let Some(n) = self.max_tokens {
            c = c.with_max_tokens(n);
        }
        c
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value)
        .map_err(|e| format!("Invalid {}: {} ({})", field, value, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("{} must use http or https: {}", field, value));
    }
    Ok(())
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        if self.server.record_limit == 0 {
            return Err("server.record_limit must be at least 1".into());
        }

        self.fetcher.strategy_kinds()?;

        if let Some(ref langs) = self.fetcher.languages {
            if langs.iter().any(|l| l.trim().is_empty()) {
                return Err("fetcher.languages must not contain blank entries".into());
            }
        }
        if let Some(ref url) = self.fetcher.base_url {
            check_http_url("fetcher.base_url", url)?;
        }
        if let Some(ref url) = self.summarizer.base_url {
            check_http_url("summarizer.base_url", url)?;
        }
        if let Some(t) = self.summarizer.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("summarizer.temperature must be within 0..=2, got {}", t));
            }
        }

        Ok(())
    }
}
