use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::with_deadline;
use crate::captions::{vtt_to_text, Transcript};
use crate::config::FetcherConfig;
use crate::fetcher::{Failure, Strategy};
use crate::loader::DocumentLoader;
use crate::resource::{watch_url, ResourceId};

/// Heavy metadata extraction for one video page, returning the extractor's
/// JSON info document.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract_info(&self, url: &str) -> Result<Value, Failure>;
}

/// Runs the `yt-dlp` binary in metadata-only mode. yt-dlp does its own
/// retrying with backoff; `retries` is passed through.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    path: String,
    timeout: Duration,
    retries: u32,
}

impl YtDlpExtractor {
    pub fn new(path: impl Into<String>, timeout: Duration, retries: u32) -> Self {
        Self {
            path: path.into(),
            timeout,
            retries,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.ytdlp_timeout,
            config.max_retries,
        )
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--retries".into(),
            self.retries.to_string(),
            url.into(),
        ]
    }
}

/// Map yt-dlp's stderr onto the failure taxonomy.
fn classify_stderr(stderr: &str) -> Failure {
    let lower = stderr.to_lowercase();
    let summary = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .unwrap_or_else(|| stderr.trim())
        .to_string();

    if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("does not exist")
        || lower.contains("has been removed")
    {
        Failure::not_found(summary)
    } else if lower.contains("http error 429")
        || lower.contains("http error 403")
        || lower.contains("sign in to confirm")
        || lower.contains("not available in your country")
    {
        Failure::unavailable(summary)
    } else {
        Failure::transient(summary)
    }
}

#[async_trait]
impl MetadataExtractor for YtDlpExtractor {
    async fn extract_info(&self, url: &str) -> Result<Value, Failure> {
        let mut cmd = Command::new(&self.path);
        cmd.args(self.build_args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(Failure::transient(format!(
                    "{} timed out after {}s",
                    self.path,
                    self.timeout.as_secs()
                )))
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Failure::unavailable(format!(
                    "extractor binary not found: {}",
                    self.path
                )))
            }
            Ok(Err(e)) => {
                return Err(Failure::unavailable(format!(
                    "failed to run {}: {}",
                    self.path, e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Failure::parse(format!("extractor output is not valid JSON: {}", e)))
    }
}

struct SubtitleRef {
    url: String,
    language: String,
    generated: bool,
}

/// Uploaded subtitles before automatic captions, preferred languages in order,
/// WebVTT entries before other formats.
fn pick_subtitle(info: &Value, languages: &[String]) -> Option<SubtitleRef> {
    for (key, generated) in [("subtitles", false), ("automatic_captions", true)] {
        let Some(by_language) = info.get(key).and_then(Value::as_object) else {
            continue;
        };
        for lang in languages {
            let Some(entries) = by_language.get(lang).and_then(Value::as_array) else {
                continue;
            };
            let entry = entries
                .iter()
                .find(|e| e.get("ext").and_then(Value::as_str) == Some("vtt"))
                .or_else(|| entries.first());
            if let Some(url) = entry.and_then(|e| e.get("url")).and_then(Value::as_str) {
                return Some(SubtitleRef {
                    url: url.to_string(),
                    language: lang.clone(),
                    generated,
                });
            }
        }
    }
    None
}

/// Last resort: run the external extractor and download the subtitle file it
/// reports. Slowest and most expensive, so it belongs at the end of the list.
pub struct FullFetchStrategy {
    extractor: Arc<dyn MetadataExtractor>,
    loader: Arc<dyn DocumentLoader>,
    base_url: String,
    languages: Vec<String>,
    timeout: Duration,
}

impl FullFetchStrategy {
    pub fn new(
        extractor: Arc<dyn MetadataExtractor>,
        loader: Arc<dyn DocumentLoader>,
        base_url: impl Into<String>,
        languages: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            loader,
            base_url: base_url.into(),
            languages,
            timeout,
        }
    }

    /// The deadline covers the extractor run plus the subtitle download.
    pub fn from_config(
        config: &FetcherConfig,
        extractor: Arc<dyn MetadataExtractor>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self::new(
            extractor,
            loader,
            config.base_url.clone(),
            config.languages.clone(),
            config.ytdlp_timeout + config.strategy_timeout,
        )
    }

    async fn run(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        let page_url = watch_url(&self.base_url, id)?;
        let info = self.extractor.extract_info(&page_url).await?;

        let subtitle = pick_subtitle(&info, &self.languages)
            .ok_or_else(|| Failure::not_found("no subtitles found"))?;
        debug!(
            video_id = %id,
            language = %subtitle.language,
            generated = subtitle.generated,
            "Extractor reported subtitle track"
        );

        let raw = self.loader.get(&subtitle.url).await?;
        let text = vtt_to_text(&raw);
        if text.is_empty() {
            return Err(Failure::parse("subtitle file contained no text"));
        }

        Ok(Transcript {
            text,
            language: Some(subtitle.language),
            generated: subtitle.generated,
        })
    }
}

#[async_trait]
impl Strategy<Transcript> for FullFetchStrategy {
    fn name(&self) -> &str {
        "full_fetch"
    }

    async fn attempt(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        with_deadline(self.name(), self.timeout, self.run(id)).await
    }
}
