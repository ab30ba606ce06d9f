//! Direct sharing strategy (OAuth token)

use super::{fetch_sharing_text, report_http_failure, StrategyFailure};
use crate::config::AcquisitionConfig;
use crate::notify::{excerpt, Notifier};
use crate::parse::ExtractionRules;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SharingRequest<'a> {
    article_url: &'a str,
}

/// Response of the direct endpoint. Missing fields deserialize as `None`,
/// which the strategy treats as a refusal.
#[derive(Debug, Default, Deserialize)]
struct SharingResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    sharing_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One OAuth-authenticated request that returns a sharing page URL
pub struct DirectStrategy {
    client: Client,
    endpoint: String,
    token: String,
    rules: ExtractionRules,
    notifier: Arc<dyn Notifier>,
}

impl DirectStrategy {
    pub fn new(
        client: Client,
        config: &AcquisitionConfig,
        token: String,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            endpoint: config.direct_url.clone(),
            token,
            rules: ExtractionRules::from(config),
            notifier,
        }
    }

    /// Ask the service for a sharing URL
    pub async fn request_sharing_url(&self, url: &str) -> Result<String, StrategyFailure> {
        debug!(url, endpoint = %self.endpoint, "Requesting sharing URL");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("OAuth {}", self.token))
            .json(&SharingRequest { article_url: url })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            report_http_failure(self.notifier.as_ref(), "sharing API", status.as_u16(), &body);
            return Err(StrategyFailure::Http {
                status: status.as_u16(),
                body: excerpt(&body, 200),
            });
        }

        let body = response.text().await?;
        let parsed: SharingResponse = serde_json::from_str(&body)
            .map_err(|e| StrategyFailure::Malformed(e.to_string()))?;

        match (parsed.status.as_deref(), parsed.sharing_url) {
            (Some("success"), Some(sharing_url)) if !sharing_url.trim().is_empty() => {
                Ok(sharing_url.trim().to_string())
            }
            (Some("success"), _) => Err(StrategyFailure::Malformed(
                "success without sharing_url".to_string(),
            )),
            (status, _) => Err(StrategyFailure::Rejected(
                parsed
                    .message
                    .unwrap_or_else(|| format!("status {}", status.unwrap_or("missing"))),
            )),
        }
    }

    /// Sharing URL plus the text extracted from its page
    pub async fn acquire(&self, url: &str) -> Result<(String, String), StrategyFailure> {
        let sharing_url = self.request_sharing_url(url).await?;
        let text = fetch_sharing_text(&self.client, &sharing_url, &self.rules).await?;
        Ok((text, sharing_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::build_client;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::NoticeKind;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(server: &MockServer, notifier: Arc<RecordingNotifier>) -> DirectStrategy {
        let config = AcquisitionConfig {
            direct_url: format!("{}/api/sharing-url", server.uri()),
            timeout_secs: 5,
            ..AcquisitionConfig::default()
        };
        let client = build_client(&config).unwrap();
        DirectStrategy::new(client, &config, "secret".to_string(), notifier)
    }

    #[tokio::test]
    async fn test_success_fetches_and_extracts() {
        let server = MockServer::start().await;
        let sharing_url = format!("{}/v_abc", server.uri());

        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .and(header("Authorization", "OAuth secret"))
            .and(body_json(serde_json::json!({"article_url": "https://youtu.be/x"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "sharing_url": sharing_url,
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<p class="thesis-text">Point one</p>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let direct = strategy(&server, Arc::new(RecordingNotifier::default()));
        let (text, url) = direct.acquire("https://youtu.be/x").await.unwrap();
        assert_eq!(text, "Point one");
        assert_eq!(url, sharing_url);
    }

    #[tokio::test]
    async fn test_expired_token_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .respond_with(ResponseTemplate::new(401).set_body_string("OAuth token expired"))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let direct = strategy(&server, notifier.clone());
        let err = direct.request_sharing_url("https://youtu.be/x").await.unwrap_err();

        assert!(matches!(err, StrategyFailure::Http { status: 401, .. }));
        assert_eq!(notifier.kinds(), vec![NoticeKind::CredentialExpired]);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let direct = strategy(&server, Arc::new(RecordingNotifier::default()));
        let err = direct.request_sharing_url("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_sharing_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sharing-url"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "sharing_url": format!("{}/v_empty", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v_empty"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let direct = strategy(&server, Arc::new(RecordingNotifier::default()));
        let err = direct.acquire("https://youtu.be/x").await.unwrap_err();
        assert_eq!(err, StrategyFailure::NoText);
    }
}
