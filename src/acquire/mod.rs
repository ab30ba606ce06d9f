//! Content acquisition
//!
//! Turns a video URL into extracted text through the sharing service:
//! - Direct strategy: one OAuth call that returns a sharing page
//! - Session strategy: a cookie session that is polled until it yields a
//!   sharing page or a structured outline
//!
//! Strategy failures are soft. The acquirer tries the direct strategy, then
//! the session strategy, and only reports [`NoContentAvailable`] when both
//! are exhausted.

mod direct;
mod outline;
mod session;

pub use direct::*;
pub use outline::*;
pub use session::*;

use crate::config::AcquisitionConfig;
use crate::error::{Error, Result};
use crate::meta::Analysis;
use crate::notify::{classify_http_failure, excerpt, Notifier};
use crate::parse::{extract_sharing_text, ExtractionRules};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a single strategy did not produce text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyFailure {
    #[error("no credential configured")]
    Unavailable,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend refused: {0}")]
    Rejected(String),

    #[error("sharing page has no extractable text")]
    NoText,

    #[error("no result after {0} polls")]
    Exhausted(u32),
}

impl From<reqwest::Error> for StrategyFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StrategyFailure::Timeout
        } else if err.is_decode() {
            StrategyFailure::Malformed(err.to_string())
        } else {
            StrategyFailure::Transport(err.to_string())
        }
    }
}

/// Both strategies failed
#[derive(Debug, Clone, PartialEq)]
pub struct NoContentAvailable {
    pub direct: StrategyFailure,
    pub session: StrategyFailure,
}

impl fmt::Display for NoContentAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No content available (direct: {}; session: {})",
            self.direct, self.session
        )
    }
}

impl std::error::Error for NoContentAvailable {}

/// Text obtained for a video
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    pub text: String,
    /// Sharing URL, or [`OUTLINE_SOURCE`] for outline text
    pub source: Option<String>,
    /// Taken from an earlier checkpoint instead of the network
    pub reused: bool,
}

/// Build the HTTP client used by both strategies
pub fn build_client(config: &AcquisitionConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Fetch a sharing page and extract its text
pub(crate) async fn fetch_sharing_text(
    client: &Client,
    sharing_url: &str,
    rules: &ExtractionRules,
) -> std::result::Result<String, StrategyFailure> {
    debug!(sharing_url, "Fetching sharing page");
    let response = client.get(sharing_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StrategyFailure::Http {
            status: status.as_u16(),
            body: excerpt(&body, 200),
        });
    }

    let html = response.text().await?;
    extract_sharing_text(&html, rules).ok_or(StrategyFailure::NoText)
}

/// Report an HTTP failure from a backend call to the notifier
pub(crate) fn report_http_failure(notifier: &dyn Notifier, backend: &str, status: u16, body: &str) {
    let kind = classify_http_failure(status, body);
    notifier.notify(kind, &format!("{} returned HTTP {}: {}", backend, status, excerpt(body, 200)));
}

/// Runs the acquisition strategies in order
pub struct Acquirer {
    direct: Option<DirectStrategy>,
    session: Option<SessionStrategy>,
}

impl Acquirer {
    /// Build from config, reading credentials from the environment
    pub fn new(config: &AcquisitionConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::with_credentials(config, config.oauth_token(), config.session_cookie(), notifier)
    }

    /// Build with explicit credentials. At least one must be present.
    pub fn with_credentials(
        config: &AcquisitionConfig,
        oauth_token: Option<String>,
        session_cookie: Option<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        if oauth_token.is_none() && session_cookie.is_none() {
            return Err(Error::Config(format!(
                "No acquisition credentials: set {} or {}",
                config.token_env, config.session_env
            )));
        }

        let client = build_client(config)?;
        let direct = oauth_token.map(|token| {
            DirectStrategy::new(client.clone(), config, token, notifier.clone())
        });
        let session = session_cookie
            .map(|cookie| SessionStrategy::new(client.clone(), config, cookie, notifier.clone()));

        info!(
            direct = direct.is_some(),
            session = session.is_some(),
            "Acquisition strategies ready"
        );
        Ok(Self { direct, session })
    }

    /// Obtain text for `url`, reusing a checkpointed artifact when it has text
    pub async fn acquire(
        &self,
        url: &str,
        existing: Option<&Analysis>,
    ) -> std::result::Result<Acquired, NoContentAvailable> {
        if let Some(artifact) = existing {
            if let Some(text) = artifact
                .extracted_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
            {
                debug!(url, "Reusing previously extracted text");
                return Ok(Acquired {
                    text: text.to_string(),
                    source: artifact.sharing_url.clone(),
                    reused: true,
                });
            }
        }

        let direct = match &self.direct {
            Some(strategy) => match strategy.acquire(url).await {
                Ok((text, sharing_url)) => {
                    info!(url, "Direct strategy produced text");
                    return Ok(Acquired {
                        text,
                        source: Some(sharing_url),
                        reused: false,
                    });
                }
                Err(failure) => {
                    warn!(url, error = %failure, "Direct strategy failed");
                    failure
                }
            },
            None => StrategyFailure::Unavailable,
        };

        let session = match &self.session {
            Some(strategy) => match strategy.acquire(url).await {
                Ok(acquired) => {
                    info!(url, source = ?acquired.source, "Session strategy produced text");
                    return Ok(acquired);
                }
                Err(failure) => {
                    warn!(url, error = %failure, "Session strategy failed");
                    failure
                }
            },
            None => StrategyFailure::Unavailable,
        };

        Err(NoContentAvailable { direct, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::NoticeKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AcquisitionConfig {
        AcquisitionConfig {
            direct_url: format!("{}/api/sharing-url", server.uri()),
            session_url: format!("{}/api/generation", server.uri()),
            default_poll_interval_ms: 10,
            max_poll_attempts: 3,
            timeout_secs: 5,
            ..AcquisitionConfig::default()
        }
    }

    fn artifact(text: Option<&str>) -> Analysis {
        Analysis {
            id: "a".to_string(),
            video_id: "v".to_string(),
            sharing_url: Some("https://share.example/old".to_string()),
            extracted_text: text.map(str::to_string),
            analysis_result: None,
            analysis_summary: None,
            error_message: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_no_credentials_is_config_error() {
        let result = Acquirer::with_credentials(
            &AcquisitionConfig::default(),
            None,
            None,
            Arc::new(RecordingNotifier::default()),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_reuses_existing_text_without_network() {
        let server = MockServer::start().await;
        let acquirer = Acquirer::with_credentials(
            &config_for(&server),
            Some("token".to_string()),
            None,
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();

        let acquired = acquirer
            .acquire("https://youtu.be/abcdefghijk", Some(&artifact(Some("kept"))))
            .await
            .unwrap();
        assert_eq!(acquired.text, "kept");
        assert!(acquired.reused);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_failure_falls_back_to_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .and(body_partial_json(serde_json::json!({"type": "video"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "s1",
                "poll_interval_ms": 5,
                "status_code": 1,
                "sharing_url": format!("{}/share/v_1", server.uri()),
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/share/v_1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<div class="summary-scroll">from session</div>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let acquirer = Acquirer::with_credentials(
            &config_for(&server),
            Some("token".to_string()),
            Some("3:1700000000.5.0|abc".to_string()),
            notifier.clone(),
        )
        .unwrap();

        let acquired = acquirer
            .acquire("https://www.youtube.com/watch?v=abcdefghijk", Some(&artifact(None)))
            .await
            .unwrap();
        assert_eq!(acquired.text, "from session");
        assert!(!acquired.reused);
        assert_eq!(notifier.kinds(), vec![NoticeKind::BackendHttpError]);
    }

    #[tokio::test]
    async fn test_both_fail_reports_no_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .and(header("Authorization", "OAuth token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/generation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": 3
            })))
            .mount(&server)
            .await;

        let acquirer = Acquirer::with_credentials(
            &config_for(&server),
            Some("token".to_string()),
            Some("session".to_string()),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();

        let err = acquirer
            .acquire("https://example.com/article", None)
            .await
            .unwrap_err();
        assert!(matches!(err.direct, StrategyFailure::Rejected(_)));
        assert!(matches!(err.session, StrategyFailure::Rejected(_)));
        assert!(err.to_string().starts_with("No content available"));
    }

    #[tokio::test]
    async fn test_missing_strategy_reported_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let acquirer = Acquirer::with_credentials(
            &config_for(&server),
            Some("token".to_string()),
            None,
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();

        let err = acquirer
            .acquire("https://youtu.be/abcdefghijk", None)
            .await
            .unwrap_err();
        assert!(matches!(err.direct, StrategyFailure::Http { status: 404, .. }));
        assert_eq!(err.session, StrategyFailure::Unavailable);
    }
}
