//! Caption track selection and WebVTT cleanup shared by the strategies.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetcher::Failure;
use crate::loader::DocumentLoader;

/// Plain-text transcript of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    /// True when the captions were produced by speech recognition.
    pub generated: bool,
}

impl Transcript {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// One caption track as listed by the player response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Manual track in a preferred language, then a generated one, then whatever
/// is listed first.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    let in_language = |generated: bool| {
        languages.iter().find_map(|lang| {
            tracks
                .iter()
                .find(|t| t.is_generated() == generated && t.language_code.eq_ignore_ascii_case(lang))
        })
    };

    in_language(false)
        .or_else(|| in_language(true))
        .or_else(|| tracks.first())
}

const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";

/// Pull the `captionTracks` array out of a raw watch page.
pub fn extract_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, Failure> {
    let start = html
        .find(CAPTION_TRACKS_MARKER)
        .ok_or_else(|| Failure::parse("captionTracks marker not found in page"))?;
    let rest = &html[start + CAPTION_TRACKS_MARKER.len()..];
    let array = balanced_json_array(rest)
        .ok_or_else(|| Failure::parse("captionTracks array is not terminated"))?;

    serde_json::from_str(array)
        .map_err(|e| Failure::parse(format!("captionTracks array is malformed: {}", e)))
}

/// Slice of `s` covering the first `[...]`, honouring JSON string escapes.
fn balanced_json_array(s: &str) -> Option<&str> {
    let open = s.find(|c: char| !c.is_whitespace())?;
    if !s[open..].starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[open..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Collapse a WebVTT (or SRT) document into plain text.
pub fn vtt_to_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        let text = strip_tags(line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        // Rolling auto-captions repeat the previous line.
        if lines.last().is_some_and(|prev| prev == text) {
            continue;
        }
        lines.push(text.to_string());
    }

    lines.join(" ")
}

/// Drop `<...>` cue tags. A `<` with no closing `>` after it is kept as text.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out.replace("&amp;", "&")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&nbsp;", " ")
}

/// Absolute URL for a track in WebVTT format. Relative track URLs are
/// resolved against `origin`.
pub fn track_vtt_url(origin: &str, track: &CaptionTrack) -> Result<String, Failure> {
    let base = Url::parse(origin)
        .map_err(|e| Failure::parse(format!("invalid origin {}: {}", origin, e)))?;
    let mut url = base
        .join(&track.base_url)
        .map_err(|e| Failure::parse(format!("invalid caption URL {}: {}", track.base_url, e)))?;

    let other: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(other)
        .append_pair("fmt", "vtt");

    Ok(url.into())
}

/// Download the best track for `languages` and turn it into a transcript.
pub async fn download_transcript(
    loader: &dyn DocumentLoader,
    origin: &str,
    tracks: &[CaptionTrack],
    languages: &[String],
) -> Result<Transcript, Failure> {
    let track = select_track(tracks, languages)
        .ok_or_else(|| Failure::not_found("no caption tracks listed"))?;
    let url = track_vtt_url(origin, track)?;
    let raw = loader.get(&url).await?;

    let text = vtt_to_text(&raw);
    if text.is_empty() {
        return Err(Failure::parse(format!(
            "caption track {} contained no text",
            track.language_code
        )));
    }

    Ok(Transcript {
        text,
        language: Some(track.language_code.clone()),
        generated: track.is_generated(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, asr: bool) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://www.youtube.com/api/timedtext?v=abc&lang={}", lang),
            language_code: lang.to_string(),
            kind: asr.then(|| "asr".to_string()),
        }
    }

    fn langs() -> Vec<String> {
        vec!["en".into(), "en-US".into(), "en-GB".into()]
    }

    #[test]
    fn prefers_manual_in_preferred_language() {
        let tracks = vec![track("en", true), track("de", false), track("en-GB", false)];
        let chosen = select_track(&tracks, &langs()).unwrap();
        assert_eq!(chosen.language_code, "en-GB");
        assert!(!chosen.is_generated());
    }

    #[test]
    fn falls_back_to_generated_then_first() {
        let tracks = vec![track("de", false), track("en", true)];
        assert_eq!(select_track(&tracks, &langs()).unwrap().language_code, "en");

        let tracks = vec![track("fr", true), track("de", false)];
        assert_eq!(select_track(&tracks, &langs()).unwrap().language_code, "fr");

        assert!(select_track(&[], &langs()).is_none());
    }

    #[test]
    fn vtt_cleanup_drops_headers_timings_and_repeats() {
        let raw = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:00.000 --> 00:00:02.000\n\
                   hello <c>world</c>\n\n2\n00:00:02.000 --> 00:00:04.000\nhello world\n\
                   this &amp; that\n";
        assert_eq!(vtt_to_text(raw), "hello world this & that");
    }

    #[test]
    fn vtt_cleanup_keeps_bare_less_than() {
        let raw = "WEBVTT\n\n00:00.000 --> 00:01.000\nif x < y then\n\n00:01.000 --> 00:02.000\n<c.colorE5E5E5>swap</c> when a &lt; b < c\n";
        assert_eq!(vtt_to_text(raw), "if x < y then swap when a < b < c");
    }

    #[test]
    fn vtt_cleanup_of_empty_document() {
        assert_eq!(vtt_to_text("WEBVTT\n\n"), "");
    }

    #[test]
    fn extracts_tracks_from_watch_page() {
        let html = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English [x]"},"languageCode":"en","kind":"asr"}],"audioTracks":[]}}};</script>"#;
        let tracks = extract_caption_tracks(html).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_code, "en");
        assert!(tracks[0].is_generated());
        assert!(tracks[0].base_url.contains("&lang=en"));
    }

    #[test]
    fn missing_marker_is_parse_error() {
        let err = extract_caption_tracks("<html>no captions here</html>").unwrap_err();
        assert_eq!(err.kind, crate::fetcher::FailureKind::ParseError);
    }

    #[test]
    fn unterminated_array_is_parse_error() {
        let err = extract_caption_tracks(r#""captionTracks":[{"baseUrl":"x]"#).unwrap_err();
        assert!(err.message.contains("not terminated"));
    }

    #[test]
    fn vtt_url_replaces_existing_format() {
        let mut t = track("en", false);
        t.base_url = "/api/timedtext?v=abc&fmt=srv3&lang=en".into();
        let url = track_vtt_url("https://www.youtube.com", &t).unwrap();
        assert_eq!(url, "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=vtt");
    }
}
