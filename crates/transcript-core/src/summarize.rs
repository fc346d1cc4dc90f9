//! Transcript summarization through a hosted chat-completion model.
//!
//! The model is reached through the [`CompletionModel`] trait so callers and
//! tests can substitute their own. [`ChatCompletionsModel`] speaks the
//! OpenAI-compatible `/chat/completions` protocol served by Groq and others.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::captions::Transcript;
use crate::config::SummarizerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Rate limits, server errors, timeouts. Worth retrying later.
    #[error("Transient completion error: {0}")]
    Transient(String),
    /// Bad key, bad request, malformed response. Retrying will not help.
    #[error("Completion failed: {0}")]
    Permanent(String),
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Prompt text in, completion text out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client. The API key is supplied by the
/// caller; nothing is read from the environment here.
pub struct ChatCompletionsModel {
    client: Client,
    config: SummarizerConfig,
    api_key: String,
}

impl ChatCompletionsModel {
    pub fn new(config: SummarizerConfig, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self::with_client(client, config, api_key)
    }

    pub fn with_client(client: Client, config: SummarizerConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            config,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for ChatCompletionsModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(model = %self.config.model, messages = messages.len(), "Requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion request rejected");
            let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    CompletionError::Transient(message)
                } else {
                    CompletionError::Permanent(message)
                },
            );
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Permanent(format!("malformed completion response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CompletionError::Permanent("completion contained no text".into()))
    }
}

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are an expert at summarizing YouTube video content.
Create a clear, well-structured summary that captures the key points and main ideas.
Format your summary with:
- A brief overview (2-3 sentences)
- Key points (bullet points)
- Main takeaways or conclusion";

/// System and user messages asking for a structured summary of `transcript`.
pub fn summary_prompt(transcript: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Summarize the following YouTube video transcript:\n\n{}",
            transcript
        )),
    ]
}

pub struct Summarizer {
    model: Arc<dyn CompletionModel>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn summarize(&self, transcript: &Transcript) -> Result<String, CompletionError> {
        if transcript.text.trim().is_empty() {
            return Err(CompletionError::Permanent("transcript is empty".into()));
        }
        self.model.complete(&summary_prompt(&transcript.text)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transcript(text: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            language: Some("en".into()),
            generated: false,
        }
    }

    fn model(server: &MockServer) -> ChatCompletionsModel {
        let config = SummarizerConfig::default().with_base_url(server.uri());
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        ChatCompletionsModel::with_client(client, config, "test-key")
    }

    #[test]
    fn prompt_embeds_transcript() {
        let messages = summary_prompt("the video said things");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Key points"));
        assert!(messages[1].content.ends_with("the video said things"));
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({ "model": "llama-3.1-8b-instant", "max_tokens": 1024 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [ { "message": { "role": "assistant", "content": "A short summary." } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = model(&server)
            .complete(&summary_prompt("words"))
            .await
            .unwrap();
        assert_eq!(text, "A short summary.");
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = model(&server).complete(&summary_prompt("x")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn bad_key_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = model(&server).complete(&summary_prompt("x")).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_choices_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = model(&server).complete(&summary_prompt("x")).await.unwrap_err();
        assert_eq!(err, CompletionError::Permanent("completion contained no text".into()));
    }

    struct Recording {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl CompletionModel for Recording {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok("summary".into())
        }
    }

    #[tokio::test]
    async fn summarizer_sends_transcript_text() {
        let model = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = Summarizer::new(model.clone());

        let out = summarizer.summarize(&transcript("hello there")).await.unwrap();
        assert_eq!(out, "summary");
        let seen = model.seen.lock().unwrap();
        assert!(seen[1].content.contains("hello there"));
    }

    #[tokio::test]
    async fn summarizer_rejects_empty_transcript() {
        let model = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let err = Summarizer::new(model.clone())
            .summarize(&transcript("   "))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
