//! HTTP provider adapter.
//!
//! Posts rendered payloads to the configured per-provider endpoint. The
//! idempotency key travels as a request header so a gateway can deduplicate
//! replays after a partial failure.

use async_trait::async_trait;
use tracing::{debug, warn};
use wacast_common::config::ProvidersConfig;
use wacast_common::types::{Provider, TenantId};
use wacast_common::Error;

use super::{ProviderAdapter, SendOutcome};
use crate::payload::MessagePayload;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub struct HttpProviderAdapter {
    client: reqwest::Client,
    config: ProvidersConfig,
}

impl HttpProviderAdapter {
    pub fn new(config: ProvidersConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn extract_message_id(body: &serde_json::Value) -> Option<String> {
        // Meta returns messages[0].id, Pinnacle a flat message_id
        body.pointer("/messages/0/id")
            .or_else(|| body.get("message_id"))
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn send(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        sender_id: &str,
        payload: &MessagePayload,
    ) -> SendOutcome {
        let Some(endpoint) = self.config.endpoint(provider) else {
            return SendOutcome::failed(
                format!("No endpoint configured for provider {}", provider),
                None,
            );
        };

        let body = serde_json::json!({
            "sender_id": sender_id,
            "tenant_id": tenant_id,
            "message": payload.to_provider_json(provider),
        });

        debug!(
            %provider,
            to = %payload.to,
            template = %payload.template_name,
            "Sending template message"
        );

        let response = match self
            .client
            .post(endpoint)
            .header(IDEMPOTENCY_HEADER, &payload.idempotency_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(%provider, error = %e, "Provider request failed");
                return SendOutcome::failed(format!("Request failed: {}", e), None);
            }
        };

        let status = response.status();
        let raw: Option<serde_json::Value> = response.json().await.ok();

        if status.is_success() {
            let message_id = raw.as_ref().and_then(Self::extract_message_id);
            SendOutcome::sent(message_id, raw)
        } else {
            let detail = raw
                .as_ref()
                .and_then(|v| v.pointer("/error/message").or_else(|| v.get("error")))
                .and_then(|v| v.as_str())
                .unwrap_or("no detail");
            SendOutcome::failed(format!("Provider returned {}: {}", status, detail), raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> MessagePayload {
        MessagePayload {
            to: "+491705550100".to_string(),
            template_name: "order_update".to_string(),
            language: "en".to_string(),
            header: None,
            body_parameters: vec!["Ada".to_string()],
            buttons: Vec::new(),
            idempotency_key: "abc123".to_string(),
        }
    }

    fn adapter_for(server: &MockServer) -> HttpProviderAdapter {
        let mut config = ProvidersConfig::default();
        config.endpoints.insert(
            Provider::MetaCloud.to_string(),
            format!("{}/messages", server.uri()),
        );
        HttpProviderAdapter::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_successful_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header_exists("Idempotency-Key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.HBgL"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let outcome = adapter
            .send(Uuid::new_v4(), Provider::MetaCloud, "1234567890", &payload())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.provider_message_id.as_deref(), Some("wamid.HBgL"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "template is paused"}
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let outcome = adapter
            .send(Uuid::new_v4(), Provider::MetaCloud, "1234567890", &payload())
            .await;

        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("400"));
        assert!(error.contains("template is paused"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let adapter = HttpProviderAdapter::new(ProvidersConfig::default()).unwrap();
        let outcome = adapter
            .send(Uuid::new_v4(), Provider::Pinnacle, "42", &payload())
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("No endpoint configured"));
    }
}
