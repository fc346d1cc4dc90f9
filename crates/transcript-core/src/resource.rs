use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetcher::{Failure, FailureKind};

/// Opaque identifier of the content to retrieve, e.g. a video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Returns `None` for an empty or whitespace-only id.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const VIDEO_ID_LEN: usize = 11;

/// Watch-page URL for `id` under `base_url`. The id is query-encoded, so
/// `&`, `=` or `#` inside it cannot add parameters.
pub fn watch_url(base_url: &str, id: &ResourceId) -> Result<String, Failure> {
    let page = format!("{}/watch", base_url.trim_end_matches('/'));
    Url::parse_with_params(&page, &[("v", id.as_str())])
        .map(String::from)
        .map_err(|e| {
            Failure::new(
                FailureKind::Configuration,
                format!("invalid base URL {}: {}", base_url, e),
            )
        })
}

fn looks_like_video_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a video id from a watch/short/embed URL or accept a bare id.
pub fn video_id_from_url(input: &str) -> Option<ResourceId> {
    let input = input.trim();
    if looks_like_video_id(input) {
        return ResourceId::new(input);
    }

    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(&host);

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") | Some("shorts") | Some("live") | Some("v") => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }
        }
        _ => None,
    }?;

    if candidate.is_empty() {
        return None;
    }
    ResourceId::new(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_rejects_blank() {
        assert!(ResourceId::new("").is_none());
        assert!(ResourceId::new("   ").is_none());
        assert_eq!(ResourceId::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn watch_url_encodes_id() {
        let id = video_id_from_url("https://www.youtube.com/watch?v=aaaaaaaaaaa%26v%3Dbbbbbbbbbbb")
            .unwrap();
        assert_eq!(id.as_str(), "aaaaaaaaaaa&v=bbbbbbbbbbb");

        let built = watch_url("https://yt.test/", &id).unwrap();
        assert_eq!(built, "https://yt.test/watch?v=aaaaaaaaaaa%26v%3Dbbbbbbbbbbb");
        let v: Vec<String> = Url::parse(&built)
            .unwrap()
            .query_pairs()
            .filter(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(v, vec!["aaaaaaaaaaa&v=bbbbbbbbbbb"]);
    }

    #[test]
    fn watch_url_rejects_bad_base() {
        let failure = watch_url("not a base", &ResourceId::new("abc").unwrap()).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Configuration);
    }

    #[test]
    fn parses_watch_url() {
        let id = video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_watch_url_with_v_not_first() {
        let id = video_id_from_url("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_short_links_and_embeds() {
        for input in [
            "https://youtu.be/dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            let id = video_id_from_url(input).unwrap_or_else(|| panic!("no id in {input}"));
            assert_eq!(id.as_str(), "dQw4w9WgXcQ", "{input}");
        }
    }

    #[test]
    fn accepts_bare_id() {
        assert_eq!(video_id_from_url("dQw4w9WgXcQ").unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_other_hosts_and_garbage() {
        assert!(video_id_from_url("https://vimeo.com/123456").is_none());
        assert!(video_id_from_url("https://www.youtube.com/channel/UC123").is_none());
        assert!(video_id_from_url("https://www.youtube.com/watch").is_none());
        assert!(video_id_from_url("not a url at all").is_none());
    }
}
