//! Template schema resolution.
//!
//! A campaign references a provider-approved message template by name. The
//! schema of that template (placeholder count, header type, buttons) comes
//! either from a snapshot frozen onto the campaign or from the upstream
//! template store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wacast_common::types::{Provider, TenantId};
use wacast_common::Error;
use wacast_storage::models::Campaign;

/// Header block shape of a message template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderType {
    #[default]
    None,
    Text,
    Image,
    Video,
    Document,
}

impl HeaderType {
    pub fn is_media(&self) -> bool {
        matches!(self, HeaderType::Image | HeaderType::Video | HeaderType::Document)
    }
}

/// Button kind within a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Url,
    QuickReply,
    Call,
}

/// One button declared on a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonMeta {
    /// 1-based position within the template (WhatsApp allows up to 3)
    pub position: usize,
    pub kind: ButtonKind,
    #[serde(default)]
    pub text: String,
    /// URL template as registered with the provider, may carry a `{{n}}`
    /// placeholder for dynamic buttons
    #[serde(default)]
    pub url: Option<String>,
}

/// Resolved template schema used by materialization and payload building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMeta {
    pub name: String,
    pub language: String,
    /// Number of ordered `{{n}}` body placeholders
    pub placeholder_count: usize,
    #[serde(default)]
    pub header_type: HeaderType,
    /// Registered header text for [`HeaderType::Text`] templates, may carry
    /// `{{n}}` placeholders of its own
    #[serde(default)]
    pub header_text: Option<String>,
    #[serde(default)]
    pub buttons: Vec<ButtonMeta>,
}

impl TemplateMeta {
    /// Parse a frozen campaign snapshot back into a schema
    pub fn from_snapshot(snapshot: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(snapshot.clone()).ok()
    }
}

/// Source of template schemas
#[async_trait]
pub trait TemplateResolver: Send + Sync {
    async fn resolve(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        name: &str,
        language: &str,
    ) -> Result<TemplateMeta, Error>;
}

/// Resolve the schema for a campaign.
///
/// A campaign snapshot short-circuits the resolver entirely, so dispatch
/// stays stable even when the upstream template changes mid-flight.
pub async fn resolve_for_campaign(
    resolver: &dyn TemplateResolver,
    campaign: &Campaign,
) -> Result<TemplateMeta, Error> {
    if let Some(snapshot) = &campaign.template_snapshot {
        if let Some(meta) = TemplateMeta::from_snapshot(snapshot) {
            return Ok(meta);
        }
        return Err(Error::Template(format!(
            "Campaign {} carries an unreadable template snapshot",
            campaign.id
        )));
    }

    let provider = campaign.provider_enum().ok_or_else(|| {
        Error::Validation(format!("Unknown provider: {}", campaign.provider))
    })?;

    resolver
        .resolve(
            campaign.tenant_id,
            provider,
            &campaign.template_name,
            &campaign.template_language,
        )
        .await
}

/// Template resolver backed by the upstream template store over HTTP
pub struct HttpTemplateResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTemplateResolver {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TemplateResolver for HttpTemplateResolver {
    async fn resolve(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        name: &str,
        language: &str,
    ) -> Result<TemplateMeta, Error> {
        let url = format!(
            "{}/tenants/{}/templates/{}?provider={}&language={}",
            self.base_url, tenant_id, name, provider, language
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Template(format!("Template store unreachable: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Template(format!(
                "Template '{}' ({}) not found for provider {}",
                name, language, provider
            )));
        }

        if !response.status().is_success() {
            return Err(Error::Template(format!(
                "Template store returned {} for '{}'",
                response.status(),
                name
            )));
        }

        response
            .json::<TemplateMeta>()
            .await
            .map_err(|e| Error::Template(format!("Invalid template schema for '{}': {}", name, e)))
    }
}

/// Resolver used when no template store is configured: campaigns must carry
/// a snapshot, anything else is a hard template error.
pub struct SnapshotOnlyResolver;

#[async_trait]
impl TemplateResolver for SnapshotOnlyResolver {
    async fn resolve(
        &self,
        _tenant_id: TenantId,
        _provider: Provider,
        name: &str,
        _language: &str,
    ) -> Result<TemplateMeta, Error> {
        Err(Error::Template(format!(
            "No template store configured and campaign has no snapshot for '{}'",
            name
        )))
    }
}

/// In-memory resolver for tests
#[derive(Default)]
pub struct InMemoryTemplateResolver {
    templates: HashMap<String, TemplateMeta>,
}

impl InMemoryTemplateResolver {
    pub fn with(mut self, meta: TemplateMeta) -> Self {
        self.templates.insert(meta.name.clone(), meta);
        self
    }
}

#[async_trait]
impl TemplateResolver for InMemoryTemplateResolver {
    async fn resolve(
        &self,
        _tenant_id: TenantId,
        _provider: Provider,
        name: &str,
        _language: &str,
    ) -> Result<TemplateMeta, Error> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Template(format!("Template '{}' not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_meta() -> TemplateMeta {
        TemplateMeta {
            name: "order_update".to_string(),
            language: "en".to_string(),
            placeholder_count: 2,
            header_type: HeaderType::Image,
            header_text: None,
            buttons: vec![ButtonMeta {
                position: 1,
                kind: ButtonKind::Url,
                text: "Track order".to_string(),
                url: Some("https://shop.example/track/{{1}}".to_string()),
            }],
        }
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let meta = sample_meta();
        let snapshot = serde_json::to_value(&meta).unwrap();
        let parsed = TemplateMeta::from_snapshot(&snapshot).unwrap();
        assert_eq!(parsed.placeholder_count, 2);
        assert_eq!(parsed.header_type, HeaderType::Image);
        assert_eq!(parsed.buttons.len(), 1);
    }

    #[test]
    fn test_snapshot_defaults() {
        // Minimal snapshots from older campaigns omit header/buttons
        let snapshot = serde_json::json!({
            "name": "plain",
            "language": "en",
            "placeholder_count": 1
        });
        let parsed = TemplateMeta::from_snapshot(&snapshot).unwrap();
        assert_eq!(parsed.header_type, HeaderType::None);
        assert!(parsed.buttons.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_resolver() {
        let resolver = InMemoryTemplateResolver::default().with(sample_meta());
        let tenant = uuid::Uuid::new_v4();

        let meta = resolver
            .resolve(tenant, Provider::MetaCloud, "order_update", "en")
            .await
            .unwrap();
        assert_eq!(meta.name, "order_update");

        let missing = resolver
            .resolve(tenant, Provider::MetaCloud, "nope", "en")
            .await;
        assert!(matches!(missing, Err(Error::Template(_))));
    }
}
