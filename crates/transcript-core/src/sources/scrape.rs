use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::with_deadline;
use crate::captions::{download_transcript, extract_caption_tracks, Transcript};
use crate::config::FetcherConfig;
use crate::fetcher::{Failure, Strategy};
use crate::loader::DocumentLoader;
use crate::resource::{watch_url, ResourceId};

/// Heuristic fallback: fetch the watch page and dig the caption track list
/// out of the embedded player JSON. Breaks whenever the page layout changes,
/// so it must run after the index strategy.
pub struct ScrapeStrategy {
    loader: Arc<dyn DocumentLoader>,
    base_url: String,
    languages: Vec<String>,
    timeout: Duration,
}

impl ScrapeStrategy {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        base_url: impl Into<String>,
        languages: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            loader,
            base_url: base_url.into(),
            languages,
            timeout,
        }
    }

    pub fn from_config(config: &FetcherConfig, loader: Arc<dyn DocumentLoader>) -> Self {
        Self::new(
            loader,
            config.base_url.clone(),
            config.languages.clone(),
            config.strategy_timeout,
        )
    }

    async fn scrape(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        let page_url = watch_url(&self.base_url, id)?;
        let html = self.loader.get(&page_url).await?;

        let tracks = extract_caption_tracks(&html)?;
        if tracks.is_empty() {
            return Err(Failure::not_found(format!("watch page for {} lists no captions", id)));
        }
        debug!(video_id = %id, tracks = tracks.len(), "Scraped caption tracks from watch page");

        download_transcript(self.loader.as_ref(), &self.base_url, &tracks, &self.languages).await
    }
}

#[async_trait]
impl Strategy<Transcript> for ScrapeStrategy {
    fn name(&self) -> &str {
        "scrape"
    }

    async fn attempt(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        with_deadline(self.name(), self.timeout, self.scrape(id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::fetcher::FailureKind;
    use crate::loader::LoadError;

    /// Serves canned documents by exact URL; anything else is a 404.
    struct PageLoader {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl DocumentLoader for PageLoader {
        async fn get(&self, uri: &str) -> Result<String, LoadError> {
            self.pages.get(uri).cloned().ok_or_else(|| LoadError::Http {
                url: uri.to_string(),
                status: 404,
                message: "Not Found".into(),
                is_last_retry: true,
            })
        }

        async fn post_json(&self, uri: &str, _body: &serde_json::Value) -> Result<String, LoadError> {
            panic!("PageLoader: unexpected POST to {}", uri)
        }
    }

    fn strategy(pages: Vec<(&str, &str)>) -> ScrapeStrategy {
        let loader = PageLoader {
            pages: pages
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        ScrapeStrategy::new(
            Arc::new(loader),
            "https://yt.test",
            vec!["en".into()],
            Duration::from_secs(5),
        )
    }

    fn id() -> ResourceId {
        ResourceId::new("abc123").unwrap()
    }

    const PAGE: &str = r#"<html><script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"/api/timedtext?v=abc123&lang=en","languageCode":"en","kind":"asr"}]}}};</script></html>"#;

    #[tokio::test]
    async fn scrapes_tracks_and_downloads_captions() {
        let s = strategy(vec![
            ("https://yt.test/watch?v=abc123", PAGE),
            (
                "https://yt.test/api/timedtext?v=abc123&lang=en&fmt=vtt",
                "WEBVTT\n\n00:00.000 --> 00:01.000\nscraped text\n",
            ),
        ]);

        let transcript = s.attempt(&id()).await.unwrap();
        assert_eq!(transcript.text, "scraped text");
        assert!(transcript.generated);
    }

    #[tokio::test]
    async fn id_with_query_characters_stays_one_parameter() {
        let s = strategy(vec![(
            "https://yt.test/watch?v=aaaaaaaaaaa%26v%3Dbbbbbbbbbbb",
            r#"{"captionTracks":[]}"#,
        )]);
        let id = ResourceId::new("aaaaaaaaaaa&v=bbbbbbbbbbb").unwrap();
        let failure = s.attempt(&id).await.unwrap_err();
        // Reaching the encoded page yields an empty track list, not a 404.
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.contains("lists no captions"), "{}", failure.message);
    }

    #[tokio::test]
    async fn page_without_marker_is_parse_error() {
        let s = strategy(vec![("https://yt.test/watch?v=abc123", "<html>consent wall</html>")]);
        let failure = s.attempt(&id()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::ParseError);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let s = strategy(vec![]);
        let failure = s.attempt(&id()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn empty_track_list_is_not_found() {
        let s = strategy(vec![(
            "https://yt.test/watch?v=abc123",
            r#"{"captionTracks":[]}"#,
        )]);
        let failure = s.attempt(&id()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }
}
