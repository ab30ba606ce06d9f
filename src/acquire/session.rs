//! Session polling strategy (cookie session)
//!
//! The session endpoint is asked to start a generation and then polled with
//! the returned session id. A poll can finish in two ways: with a sharing
//! URL (handled like the direct strategy) or with a structured outline of
//! key points.

use super::{
    fetch_sharing_text, report_http_failure, Acquired, Outline, Section, StrategyFailure,
    OUTLINE_SOURCE,
};
use crate::config::AcquisitionConfig;
use crate::notify::{excerpt, Notifier};
use crate::parse::ExtractionRules;
use regex::Regex;
use reqwest::Client;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

const YOUTUBE_ID_PATTERN: &str = r"(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=|shorts/)?([^&=%\?]{11})";

static YOUTUBE_ID: OnceLock<Option<Regex>> = OnceLock::new();
static CSYR: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Extract an 11-character YouTube id from a URL
pub fn extract_youtube_id(url: &str) -> Option<String> {
    compiled(&YOUTUBE_ID, YOUTUBE_ID_PATTERN)?
        .captures(url)
        .and_then(|caps| caps.get(6))
        .map(|m| m.as_str().to_string())
}

/// Value of the `yandex_csyr` cookie for a session.
///
/// The digits between the first `:` and the next `.` of the session value,
/// or the current Unix time when the session has no such part.
pub fn csyr_value(session: &str) -> String {
    compiled(&CSYR, r":(\d+)\.")
        .and_then(|re| re.captures(session))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| chrono::Utc::now().timestamp().to_string())
}

/// How a session poll finished
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    SharingUrl(String),
    Outline(Outline),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ContentKind {
    Video,
    Article,
}

#[derive(Debug, Serialize)]
struct StartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    article_url: Option<String>,
    #[serde(rename = "type")]
    kind: ContentKind,
}

impl StartRequest {
    fn for_url(url: &str) -> Self {
        match extract_youtube_id(url) {
            Some(id) => Self {
                video_url: Some(format!("https://www.youtube.com/watch?v={}", id)),
                article_url: None,
                kind: ContentKind::Video,
            },
            None => Self {
                video_url: None,
                article_url: Some(url.to_string()),
                kind: ContentKind::Article,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PollRequest<'a> {
    session_id: &'a str,
    #[serde(rename = "type")]
    kind: ContentKind,
}

/// Start response. A missing `session_id` fails the strategy; a missing
/// `poll_interval_ms` falls back to the configured interval; a missing
/// `status_code` counts as 0.
#[derive(Debug, Default, Deserialize)]
struct StartResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    status_code: i64,
}

/// Poll response. Every field is optional; `keypoints` absent or empty means
/// no outline yet, and a missing `poll_interval_ms` keeps the current one.
#[derive(Debug, Default, Deserialize)]
struct PollResponse {
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    sharing_url: Option<String>,
    #[serde(default)]
    keypoints: Vec<WireKeypoint>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireKeypoint {
    #[serde(default, alias = "title")]
    content: Option<String>,
    #[serde(default, alias = "start", deserialize_with = "lenient_seconds")]
    start_time: u64,
    #[serde(default)]
    theses: Vec<WireThesis>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireThesis {
    Text(String),
    Object {
        #[serde(default)]
        content: Option<String>,
    },
    Other(serde_json::Value),
}

impl WireThesis {
    fn into_text(self) -> Option<String> {
        match self {
            WireThesis::Text(text) => Some(text),
            WireThesis::Object { content } => content,
            WireThesis::Other(_) => None,
        }
    }
}

/// Seconds as a number, a numeric string, or `MM:SS` / `HH:MM:SS`
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u64).unwrap_or(0),
        serde_json::Value::String(s) => parse_clock(&s).unwrap_or(0),
        _ => 0,
    })
}

fn parse_clock(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<f64>() {
        return Some(secs.max(0.0) as u64);
    }
    text.split(':').try_fold(0u64, |acc, part| {
        part.trim().parse::<u64>().ok().map(|n| acc * 60 + n)
    })
}

fn error_code_set(code: &Option<serde_json::Value>) -> bool {
    match code {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

impl PollResponse {
    fn outline(self) -> Outline {
        Outline {
            sections: self
                .keypoints
                .into_iter()
                .map(|kp| Section {
                    title: kp.content.unwrap_or_default().trim().to_string(),
                    start_secs: kp.start_time,
                    theses: kp
                        .theses
                        .into_iter()
                        .filter_map(WireThesis::into_text)
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Cookie-authenticated generation session that is polled for a result
pub struct SessionStrategy {
    client: Client,
    endpoint: String,
    cookie: String,
    max_poll_attempts: u32,
    default_poll_interval_ms: u64,
    min_outline_theses: usize,
    rules: ExtractionRules,
    notifier: Arc<dyn Notifier>,
}

impl SessionStrategy {
    pub fn new(
        client: Client,
        config: &AcquisitionConfig,
        session: String,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cookie = format!("yandex_csyr={}; Session_id={}", csyr_value(&session), session);
        Self {
            client,
            endpoint: config.session_url.clone(),
            cookie,
            max_poll_attempts: config.max_poll_attempts,
            default_poll_interval_ms: config.default_poll_interval_ms,
            min_outline_theses: config.min_outline_theses,
            rules: ExtractionRules::from(config),
            notifier,
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        body: &B,
    ) -> Result<R, StrategyFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Cookie", &self.cookie)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            report_http_failure(self.notifier.as_ref(), "session API", status.as_u16(), &body);
            return Err(StrategyFailure::Http {
                status: status.as_u16(),
                body: excerpt(&body, 200),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| StrategyFailure::Malformed(e.to_string()))
    }

    /// Start a session and poll it until it finishes
    pub async fn poll(&self, url: &str) -> Result<SessionOutcome, StrategyFailure> {
        let start_request = StartRequest::for_url(url);
        let kind = start_request.kind;
        debug!(url, ?kind, "Starting generation session");

        let start: StartResponse = self.post(&start_request).await?;
        let session_id = match start.session_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(StrategyFailure::Rejected(
                    "no session_id in start response".to_string(),
                ))
            }
        };
        if start.status_code > 1 {
            return Err(StrategyFailure::Rejected(format!(
                "start status_code {}",
                start.status_code
            )));
        }

        let mut interval_ms = start
            .poll_interval_ms
            .unwrap_or(self.default_poll_interval_ms);
        let poll_request = PollRequest {
            session_id: &session_id,
            kind,
        };

        for attempt in 1..=self.max_poll_attempts {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }

            let poll: PollResponse = self.post(&poll_request).await?;

            if error_code_set(&poll.error_code) || poll.status_code > 1 {
                return Err(StrategyFailure::Rejected(format!(
                    "poll error_code {:?}, status_code {}",
                    poll.error_code, poll.status_code
                )));
            }

            if let Some(sharing_url) = poll.sharing_url.as_deref().map(str::trim) {
                if !sharing_url.is_empty() {
                    debug!(attempt, sharing_url, "Session produced sharing URL");
                    return Ok(SessionOutcome::SharingUrl(sharing_url.to_string()));
                }
            }

            if let Some(ms) = poll.poll_interval_ms {
                interval_ms = ms;
            }

            let outline = poll.outline();
            let theses = outline.thesis_count();
            if theses > 0 && theses >= self.min_outline_theses {
                debug!(attempt, theses, "Session produced outline");
                return Ok(SessionOutcome::Outline(outline));
            }

            debug!(attempt, theses, interval_ms, "Session not ready");
        }

        Err(StrategyFailure::Exhausted(self.max_poll_attempts))
    }

    /// Text for `url` from whichever outcome the session produced
    pub async fn acquire(&self, url: &str) -> Result<Acquired, StrategyFailure> {
        match self.poll(url).await? {
            SessionOutcome::SharingUrl(sharing_url) => {
                let text = fetch_sharing_text(&self.client, &sharing_url, &self.rules).await?;
                Ok(Acquired {
                    text,
                    source: Some(sharing_url),
                    reused: false,
                })
            }
            SessionOutcome::Outline(outline) => Ok(Acquired {
                text: outline.render(),
                source: Some(OUTLINE_SOURCE.to_string()),
                reused: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::build_client;
    use crate::notify::testing::RecordingNotifier;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(server: &MockServer, max_polls: u32) -> SessionStrategy {
        let config = AcquisitionConfig {
            session_url: format!("{}/api/generation", server.uri()),
            max_poll_attempts: max_polls,
            default_poll_interval_ms: 5,
            timeout_secs: 5,
            ..AcquisitionConfig::default()
        };
        let client = build_client(&config).unwrap();
        SessionStrategy::new(
            client,
            &config,
            "3:1712345678.5.0.abc".to_string(),
            Arc::new(RecordingNotifier::default()),
        )
    }

    async fn mount_start(server: &MockServer) {
        mount_start_with_interval(server, 5).await;
    }

    async fn mount_start_with_interval(server: &MockServer, poll_interval_ms: u64) {
        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({
                "video_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "type": "video"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "s-1",
                "poll_interval_ms": poll_interval_ms,
                "status_code": 1
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_extract_youtube_id() {
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=5").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert!(extract_youtube_id("https://example.com/article").is_none());
    }

    #[test]
    fn test_csyr_value() {
        assert_eq!(csyr_value("3:1712345678.5.0.abc"), "1712345678");
        let fallback: i64 = csyr_value("plain").parse().unwrap();
        assert!(fallback > 1_600_000_000);
    }

    #[test]
    fn test_patterns_compiled_once() {
        let first = compiled(&YOUTUBE_ID, YOUTUBE_ID_PATTERN).unwrap();
        let second = compiled(&YOUTUBE_ID, YOUTUBE_ID_PATTERN).unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(csyr_value("3:42.x"), csyr_value("3:42.y"));
    }

    #[test]
    fn test_start_payload_shapes() {
        let video = serde_json::to_value(StartRequest::for_url("https://youtu.be/dQw4w9WgXcQ"))
            .unwrap();
        assert_eq!(
            video,
            serde_json::json!({"video_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "type": "video"})
        );

        let article =
            serde_json::to_value(StartRequest::for_url("https://example.com/post")).unwrap();
        assert_eq!(
            article,
            serde_json::json!({"article_url": "https://example.com/post", "type": "article"})
        );
    }

    #[test]
    fn test_lenient_keypoints() {
        let poll: PollResponse = serde_json::from_value(serde_json::json!({
            "status_code": 1,
            "keypoints": [
                {"content": "Intro", "start_time": "65", "theses": [{"content": "a"}, "b"]},
                {"title": "End", "start_time": 125.4, "theses": [{"content": " c "}, 7]},
                {"content": "Clock", "start_time": "01:02:03"}
            ]
        }))
        .unwrap();

        let outline = poll.outline();
        assert_eq!(outline.thesis_count(), 3);
        assert_eq!(outline.sections[0], Section::new("Intro", 65, &["a", "b"]));
        assert_eq!(outline.sections[1], Section::new("End", 125, &["c"]));
        assert_eq!(outline.sections[2].start_secs, 3723);
    }

    #[tokio::test]
    async fn test_outline_accepted_after_threshold() {
        let server = MockServer::start().await;
        mount_start(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(header("Cookie", "yandex_csyr=1712345678; Session_id=3:1712345678.5.0.abc"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1", "type": "video"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1,
                "keypoints": [{"content": "Intro", "start_time": 0, "theses": [{"content": "only"}]}]
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1,
                "keypoints": [
                    {"content": "Intro", "start_time": 65, "theses": [{"content": "a"}, {"content": "b"}]},
                    {"content": "End", "start_time": 125, "theses": [{"content": "c"}]}
                ]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let session = strategy(&server, 5);
        let acquired = session
            .acquire("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(acquired.source.as_deref(), Some(OUTLINE_SOURCE));
        assert!(acquired.text.starts_with("# Key points"));
        assert!(acquired.text.contains("## Intro (01:05)\n- a\n- b"));
        assert!(acquired.text.contains("## End (02:05)\n- c"));
    }

    #[tokio::test]
    async fn test_poll_error_code_aborts() {
        let server = MockServer::start().await;
        mount_start(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1,
                "error_code": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = strategy(&server, 5);
        let err = session
            .poll("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyFailure::Rejected(_)));
    }

    #[tokio::test]
    async fn test_exhausts_poll_ceiling() {
        let server = MockServer::start().await;
        mount_start(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1,
                "poll_interval_ms": 1
            })))
            .expect(3)
            .mount(&server)
            .await;

        let session = strategy(&server, 3);
        let err = session
            .poll("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert_eq!(err, StrategyFailure::Exhausted(3));
    }

    #[tokio::test]
    async fn test_poll_interval_follows_server() {
        let server = MockServer::start().await;
        mount_start_with_interval(&server, 5000).await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1,
                "poll_interval_ms": 1
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        // Later polls omit the interval, so the last one stays in force.
        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"session_id": "s-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 1
            })))
            .with_priority(2)
            .expect(2)
            .mount(&server)
            .await;

        let session = strategy(&server, 3);
        let started = std::time::Instant::now();
        let err = session
            .poll("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();

        assert_eq!(err, StrategyFailure::Exhausted(3));
        assert!(started.elapsed() < Duration::from_millis(2000));
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_session_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = strategy(&server, 3);
        let err = session.poll("https://example.com/post").await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Rejected(_)));
    }
}
