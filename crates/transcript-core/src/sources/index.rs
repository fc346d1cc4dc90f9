use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::with_deadline;
use crate::captions::{download_transcript, CaptionTrack, Transcript};
use crate::config::FetcherConfig;
use crate::fetcher::{Failure, Strategy};
use crate::loader::DocumentLoader;
use crate::resource::ResourceId;

const PLAYER_PATH: &str = "/youtubei/v1/player";
const CLIENT_NAME: &str = "WEB";
const CLIENT_VERSION: &str = "2.20240726.00.00";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

fn check_playability(status: &PlayabilityStatus) -> Result<(), Failure> {
    let reason = status.reason.as_deref().unwrap_or("no reason given");
    match status.status.as_str() {
        "OK" => Ok(()),
        "ERROR" => Err(Failure::not_found(format!("video not playable: {}", reason))),
        "LOGIN_REQUIRED" | "UNPLAYABLE" | "AGE_CHECK_REQUIRED" | "CONTENT_CHECK_REQUIRED" => Err(
            Failure::unavailable(format!("{}: {}", status.status.to_lowercase(), reason)),
        ),
        other => Err(Failure::unavailable(format!(
            "unexpected playability status {}: {}",
            other, reason
        ))),
    }
}

/// Structured lookup through the player API. Fastest and most accurate when
/// the video lists caption tracks.
pub struct IndexStrategy {
    loader: Arc<dyn DocumentLoader>,
    base_url: String,
    languages: Vec<String>,
    timeout: Duration,
}

impl IndexStrategy {
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

    fn request_body(&self, id: &ResourceId) -> serde_json::Value {
        let hl = self.languages.first().map(String::as_str).unwrap_or("en");
        json!({
            "videoId": id.as_str(),
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION,
                    "hl": hl,
                }
            }
        })
    }

    async fn lookup(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        let uri = format!("{}{}", self.base_url, PLAYER_PATH);
        let raw = self.loader.post_json(&uri, &self.request_body(id)).await?;

        let player: PlayerResponse = serde_json::from_str(&raw)
            .map_err(|e| Failure::parse(format!("player response is not valid JSON: {}", e)))?;

        if let Some(status) = &player.playability_status {
            check_playability(status)?;
        }

        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .map(|r| r.caption_tracks)
            .unwrap_or_default();
        if tracks.is_empty() {
            return Err(Failure::not_found(format!(
                "no caption tracks indexed for {}",
                id
            )));
        }
        debug!(video_id = %id, tracks = tracks.len(), "Caption index returned tracks");

        download_transcript(self.loader.as_ref(), &self.base_url, &tracks, &self.languages).await
    }
}

#[async_trait]
impl Strategy<Transcript> for IndexStrategy {
    fn name(&self) -> &str {
        "index"
    }

    async fn attempt(&self, id: &ResourceId) -> Result<Transcript, Failure> {
        with_deadline(self.name(), self.timeout, self.lookup(id)).await
    }
}
