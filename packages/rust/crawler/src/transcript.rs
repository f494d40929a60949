//! Video transcript client.
//!
//! Captions are located through the watch page: its embedded player data
//! lists the available caption tracks, each with a URL serving timed text
//! as XML.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, instrument};

use duediligence_shared::text::collapse_whitespace;
use duediligence_shared::{DueDiligenceError, Result, TranscriptConfig, TranscriptFragment};

/// User-Agent string for transcript requests.
const USER_AGENT: &str = concat!("DueDiligence/", env!("CARGO_PKG_VERSION"));

/// Marker preceding the caption track array in a watch page.
const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";

static TEXT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("text").expect("caption text selector"));

/// Fetches the ordered caption fragments of a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fragments of `video_id` in playback order. A video without captions is a fault.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptFragment>>;
}

/// Video id of a watch URL: the text after the last `v=`, up to the next `&`.
///
/// A URL without `v=` yields the whole URL, which the transcript service then
/// rejects.
pub fn video_id_from_url(url: &str) -> &str {
    let tail = url.rsplit("v=").next().unwrap_or(url);
    tail.split('&').next().unwrap_or(tail)
}

/// Join fragment texts with single spaces.
pub fn join_fragments(fragments: &[TranscriptFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Caption-track implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    /// `"asr"` for auto-generated tracks.
    #[serde(default)]
    kind: Option<String>,
}

/// Transcript client reading caption tracks from watch pages.
pub struct YouTubeTranscripts {
    client: Client,
    base_url: String,
    languages: Vec<String>,
}

impl YouTubeTranscripts {
    pub fn new(config: &TranscriptConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DueDiligenceError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            languages: config.languages.clone(),
        })
    }

    async fn get_text(&self, url: &str, video_id: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            DueDiligenceError::Transcript(format!("{video_id}: request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DueDiligenceError::Transcript(format!(
                "{video_id}: HTTP {status}"
            )));
        }

        response.text().await.map_err(|e| {
            DueDiligenceError::Transcript(format!("{video_id}: body read failed: {e}"))
        })
    }

    /// Preferred-language track, manual captions before auto-generated ones,
    /// falling back to the first listed track.
    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        for lang in &self.languages {
            let mut matching = tracks.iter().filter(|t| &t.language_code == lang);
            let manual = matching
                .clone()
                .find(|t| t.kind.as_deref() != Some("asr"));
            if let Some(track) = manual.or_else(|| matching.next()) {
                return Some(track);
            }
        }
        tracks.first()
    }
}

#[async_trait]
impl TranscriptSource for YouTubeTranscripts {
    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptFragment>> {
        if video_id.is_empty() || video_id.contains('/') {
            return Err(DueDiligenceError::Transcript(format!(
                "invalid video id '{video_id}'"
            )));
        }

        let watch_url = format!("{}/watch?v={video_id}", self.base_url);
        let page = self.get_text(&watch_url, video_id).await?;

        let tracks = caption_tracks(&page)?;
        let track = self.pick_track(&tracks).ok_or_else(|| {
            DueDiligenceError::Transcript(format!("{video_id}: transcripts are disabled"))
        })?;
        debug!(language = %track.language_code, tracks = tracks.len(), "caption track selected");

        let xml = self.get_text(&track.base_url, video_id).await?;
        let fragments = parse_timed_text(&xml);
        debug!(fragments = fragments.len(), "transcript fetched");

        Ok(fragments)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Caption tracks embedded in a watch page. A page without the track list
/// yields an empty list.
fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>> {
    let Some(pos) = page.find(CAPTION_TRACKS_KEY) else {
        return Ok(Vec::new());
    };
    let rest = &page[pos + CAPTION_TRACKS_KEY.len()..];

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Vec<CaptionTrack>>();
    match stream.next() {
        Some(Ok(tracks)) => Ok(tracks),
        Some(Err(e)) => Err(DueDiligenceError::parse(format!(
            "malformed caption track list: {e}"
        ))),
        None => Ok(Vec::new()),
    }
}

/// Caption fragments of a timed-text document, in document order.
///
/// Each `<text>` element carries `start` and `dur` attributes in any order.
/// Caption bodies are escaped once more than the XML needs, so after the
/// parser's own decoding one more pass yields the spoken text. Markup that
/// survives as literal text is kept. Empty fragments are skipped.
fn parse_timed_text(xml: &str) -> Vec<TranscriptFragment> {
    let doc = Html::parse_fragment(xml);

    doc.select(&TEXT_SELECTOR)
        .filter_map(|el| {
            let start = seconds_attr(el.value().attr("start"));
            let duration = seconds_attr(el.value().attr("dur"));

            let raw = el.text().collect::<Vec<_>>().join(" ");
            let text = collapse_whitespace(&html_escape::decode_html_entities(&raw));

            (!text.is_empty()).then_some(TranscriptFragment {
                text,
                start,
                duration,
            })
        })
        .collect()
}

fn seconds_attr(value: Option<&str>) -> f64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CAPTIONS_XML: &str = r##"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0.5" dur="2.1">Welcome to Acme</text>
<text start="2.6" dur="3">we build &amp;amp; ship anvils</text>
<text start="5.6" dur="1"> </text>
<text start="6.6" dur="2.4">It&amp;#39;s <font color="#E5E5E5">manufacturing</font> excellence</text>
</transcript>"##;

    fn watch_page(server: &MockServer, tracks: &[(&str, &str, Option<&str>)]) -> String {
        let tracks: Vec<serde_json::Value> = tracks
            .iter()
            .map(|(lang, file, kind)| {
                let mut track = serde_json::json!({
                    "baseUrl": format!("{}/api/timedtext/{file}", server.uri()),
                    "name": {"simpleText": lang},
                    "languageCode": lang,
                });
                if let Some(kind) = kind {
                    track["kind"] = serde_json::json!(kind);
                }
                track
            })
            .collect();
        format!(
            r#"<html><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{},"audioTracks":[]}}}}}};</script></html>"#,
            serde_json::Value::Array(tracks)
        )
    }

    fn client_for(server: &MockServer) -> YouTubeTranscripts {
        YouTubeTranscripts::new(&TranscriptConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..TranscriptConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn video_id_is_taken_after_last_v_param() {
        assert_eq!(video_id_from_url("https://www.youtube.com/watch?v=abc123"), "abc123");
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=abc123&t=42s"),
            "abc123"
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?list=x&v=zz9&index=2"),
            "zz9"
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/@acme"),
            "https://www.youtube.com/@acme"
        );
    }

    #[test]
    fn timed_text_is_decoded_and_cleaned() {
        let fragments = parse_timed_text(CAPTIONS_XML);
        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Welcome to Acme",
                "we build & ship anvils",
                "It's manufacturing excellence",
            ]
        );
        assert_eq!(fragments[0].start, 0.5);
        assert_eq!(fragments[1].duration, 3.0);
    }

    #[test]
    fn join_uses_single_spaces() {
        let fragments = parse_timed_text(CAPTIONS_XML);
        assert_eq!(
            join_fragments(&fragments),
            "Welcome to Acme we build & ship anvils It's manufacturing excellence"
        );
        assert_eq!(join_fragments(&[]), "");
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let fragments = parse_timed_text(
            r#"<transcript><text dur="2.0" start="0.0">Hello factory</text><text start="2.0" dur="1">world</text></transcript>"#,
        );
        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello factory", "world"]);
        assert_eq!(fragments[0].duration, 2.0);
        assert_eq!(fragments[1].start, 2.0);
    }

    #[test]
    fn escaped_markup_is_kept_as_text() {
        let fragments = parse_timed_text(
            r#"<transcript><text start="1" dur="1">AT&amp;amp;T uses &amp;lt;b&amp;gt; tags</text></transcript>"#,
        );
        assert_eq!(fragments[0].text, "AT&T uses <b> tags");
    }

    #[test]
    fn missing_timing_defaults_to_zero() {
        let fragments =
            parse_timed_text(r#"<transcript><text>No timing &amp;#x41;</text></transcript>"#);
        assert_eq!(fragments[0].text, "No timing A");
        assert_eq!(fragments[0].start, 0.0);
        assert_eq!(fragments[0].duration, 0.0);
    }

    #[tokio::test]
    async fn fetches_preferred_language_track() {
        let server = MockServer::start().await;
        let page = watch_page(
            &server,
            &[("de", "de.xml", None), ("en", "en-asr.xml", Some("asr")), ("en", "en.xml", None)],
        );

        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext/en.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CAPTIONS_XML))
            .mount(&server)
            .await;

        let fragments = client_for(&server).fetch_transcript("abc123").await.unwrap();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].text, "Welcome to Acme");
    }

    #[tokio::test]
    async fn falls_back_to_first_track() {
        let server = MockServer::start().await;
        let page = watch_page(&server, &[("hi", "hi.xml", None)]);

        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext/hi.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CAPTIONS_XML))
            .mount(&server)
            .await;

        let fragments = client_for(&server).fetch_transcript("abc123").await.unwrap();
        assert_eq!(fragments.len(), 3);
    }

    #[tokio::test]
    async fn video_without_captions_is_fault() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>no player</body></html>"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_transcript("nocaps").await.unwrap_err();
        assert!(matches!(err, DueDiligenceError::Transcript(_)));
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn http_failure_is_fault() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_transcript("abc123").await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn rejects_non_id_input() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .fetch_transcript("https://www.youtube.com/@acme")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid video id"));
    }
}
