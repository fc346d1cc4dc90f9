use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use super::{DocumentLoader, LoadError};
use crate::config::FetcherConfig;

const USER_AGENT: &str = concat!("transcript-fetcher/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP document loader with connection pooling, retries, and jittered backoff.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpLoader {
    pub fn new(timeout: Duration, max_retries: u32, base_backoff: Duration) -> Self {
        Self::with_client(Self::build_client(timeout), max_retries, base_backoff)
    }

    pub fn with_client(client: Client, max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            client,
            max_retries,
            base_backoff,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(config.request_timeout, config.max_retries, config.retry_backoff)
    }

    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(20)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .expect("Failed to build HTTP client")
    }

    /// Exponential in `attempt`, capped at `MAX_BACKOFF` plus up to 25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self
            .base_backoff
            .checked_mul(factor)
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF));
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4);
        base + Duration::from_millis(jitter_ms)
    }

    async fn send_with_retry<F>(&self, uri: &str, build: F) -> Result<String, LoadError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let is_last = attempt == self.max_retries;

            if attempt > 0 {
                let backoff = self.backoff(attempt);
                debug!(uri, attempt, backoff_ms = backoff.as_millis(), "Retrying document fetch");
                tokio::time::sleep(backoff).await;
            }

            let err = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => LoadError::Network {
                                url: uri.to_string(),
                                reason: e.to_string(),
                                is_last_retry: is_last,
                            },
                        }
                    } else {
                        let code = status.as_u16();
                        let message = status.canonical_reason().unwrap_or("Unknown").to_string();
                        warn!(uri, status = code, attempt, "Document fetch returned error status");
                        let err = LoadError::Http {
                            url: uri.to_string(),
                            status: code,
                            message,
                            is_last_retry: is_last,
                        };
                        if status.is_client_error() && code != 429 {
                            return Err(err);
                        }
                        err
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!(uri, attempt, "Document fetch timed out");
                    LoadError::Timeout {
                        url: uri.to_string(),
                        is_last_retry: is_last,
                    }
                }
                Err(e) => {
                    warn!(uri, attempt, error = %e, "Document fetch network error");
                    LoadError::Network {
                        url: uri.to_string(),
                        reason: e.to_string(),
                        is_last_retry: is_last,
                    }
                }
            };

            if is_last {
                return Err(err);
            }
            attempt += 1;
        }
    }
}

impl Default for HttpLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), 2, Duration::from_millis(200))
    }
}

#[async_trait]
impl DocumentLoader for HttpLoader {
    async fn get(&self, uri: &str) -> Result<String, LoadError> {
        self.send_with_retry(uri, || {
            self.client
                .get(uri)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        })
        .await
    }

    async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Result<String, LoadError> {
        self.send_with_retry(uri, || self.client.post(uri).json(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn loader(max_retries: u32) -> HttpLoader {
        HttpLoader::new(Duration::from_secs(5), max_retries, Duration::from_millis(10))
    }

    #[test]
    fn backoff_is_capped_for_huge_settings() {
        let huge = HttpLoader::new(Duration::from_secs(5), 40, Duration::from_millis(u64::MAX / 2));
        for attempt in [1, 2, 33, 40] {
            let wait = huge.backoff(attempt);
            assert!(wait >= MAX_BACKOFF, "attempt {attempt}: {wait:?}");
            assert!(wait <= MAX_BACKOFF + MAX_BACKOFF / 4, "attempt {attempt}: {wait:?}");
        }

        let small = loader(3);
        assert!(small.backoff(1) < Duration::from_millis(13));
        assert!(small.backoff(3) >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn get_returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let result = loader(0).get(&format!("{}/watch", server.uri())).await;
        assert!(result.unwrap().contains("ok"));
    }

    #[tokio::test]
    async fn get_does_not_retry_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = loader(2)
            .get(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn get_retries_on_500_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT"))
            .mount(&server)
            .await;

        let result = loader(3).get(&format!("{}/flaky", server.uri())).await;
        assert_eq!(result.unwrap(), "WEBVTT");
    }

    #[tokio::test]
    async fn get_retries_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = loader(2)
            .get(&format!("{}/limited", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(429));
        assert!(err.is_last_retry());
    }

    #[tokio::test]
    async fn post_json_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .and(body_partial_json(serde_json::json!({ "videoId": "abc" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let body = serde_json::json!({ "videoId": "abc" });
        let result = loader(0)
            .post_json(&format!("{}/youtubei/v1/player", server.uri()), &body)
            .await;
        assert_eq!(result.unwrap(), "{}");
    }
}
