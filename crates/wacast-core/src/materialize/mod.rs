//! Campaign materialization.
//!
//! Materialization turns a campaign's variable mappings plus a recipient's
//! audience attributes into the concrete ordered body parameters and
//! header/button variables for that recipient. The same row function backs
//! both preview (read-only) and the send pipeline (which freezes the result),
//! so what an operator previews is what gets sent.

pub mod buttons;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wacast_common::types::{button_vars, CampaignId, CampaignKind, RecipientId};
use wacast_common::Error;
use wacast_storage::models::{Campaign, CampaignRecipient};
use wacast_storage::repository::{CampaignRepository, RecipientRepository};

use crate::template::{self, HeaderType, TemplateMeta, TemplateResolver};

/// Where a body parameter's value comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VariableSource {
    /// Fixed value shared by every recipient
    Static { value: String },
    /// Expression mappings resolve to their declared default; there is no
    /// expression evaluator in the dispatch path
    Expression {
        #[serde(default)]
        default: String,
    },
    /// Value looked up in the recipient's audience attributes
    AudienceColumn { column: String },
}

/// Mapping of one `{{index}}` body placeholder to a value source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableMapping {
    /// 1-based placeholder index
    pub index: usize,
    #[serde(flatten)]
    pub source: VariableSource,
}

/// Parse the campaign's stored variable mappings
pub fn parse_mappings(value: &serde_json::Value) -> Result<Vec<VariableMapping>, Error> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Validation(format!("Invalid variable mappings: {}", e)))
}

/// Everything needed to materialize rows for one campaign
#[derive(Clone)]
pub struct CampaignContext {
    pub campaign_id: CampaignId,
    pub kind: CampaignKind,
    pub header_media_url: Option<String>,
    pub tracking_base: String,
    pub template: TemplateMeta,
    pub mappings: Vec<VariableMapping>,
}

impl CampaignContext {
    pub fn build(
        campaign: &Campaign,
        template: TemplateMeta,
        tracking_base: &str,
    ) -> Result<Self, Error> {
        let kind = campaign
            .kind_enum()
            .ok_or_else(|| Error::Validation(format!("Unknown campaign kind: {}", campaign.kind)))?;
        let mappings = parse_mappings(&campaign.variable_mappings)?;

        Ok(Self {
            campaign_id: campaign.id,
            kind,
            header_media_url: campaign.header_media_url.clone(),
            tracking_base: tracking_base.to_string(),
            template,
            mappings,
        })
    }
}

/// Materialized content for one recipient
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedRow {
    pub recipient_id: RecipientId,
    pub phone: Option<String>,
    /// Ordered body parameters; always exactly `placeholder_count` entries
    pub parameters: Vec<String>,
    /// Header/button variables under their canonical keys
    pub button_vars: BTreeMap<String, String>,
    /// Content errors that make this row unsendable
    pub errors: Vec<String>,
    /// Advisory notes (unmapped placeholders, missing columns)
    pub warnings: Vec<String>,
}

impl MaterializedRow {
    pub fn is_sendable(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Preview output for a whole campaign
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedCampaign {
    pub campaign_id: CampaignId,
    pub template: TemplateMeta,
    pub rows: Vec<MaterializedRow>,
}

/// Resolve the ordered body parameters for one recipient.
///
/// The result always has exactly `placeholder_count` entries; unmapped or
/// unresolvable placeholders become empty strings with a warning, mappings
/// beyond the placeholder count are ignored.
pub fn resolve_parameters(
    mappings: &[VariableMapping],
    placeholder_count: usize,
    attributes: &serde_json::Value,
) -> (Vec<String>, Vec<String>) {
    let mut parameters = Vec::with_capacity(placeholder_count);
    let mut warnings = Vec::new();

    for index in 1..=placeholder_count {
        let (value, problem) = resolve_index(mappings, index, attributes);
        if let Some(problem) = problem {
            warnings.push(format!("Parameter {}: {}", index, problem));
        }
        parameters.push(value);
    }

    (parameters, warnings)
}

/// Resolve one mapped placeholder index to a value, with an optional problem
/// description when the value had to fall back to empty.
fn resolve_index(
    mappings: &[VariableMapping],
    index: usize,
    attributes: &serde_json::Value,
) -> (String, Option<String>) {
    let mapping = mappings.iter().find(|m| m.index == index);
    match mapping.map(|m| &m.source) {
        Some(VariableSource::Static { value }) => (value.clone(), None),
        Some(VariableSource::Expression { default }) => (default.clone(), None),
        Some(VariableSource::AudienceColumn { column }) => match attributes.get(column) {
            Some(serde_json::Value::String(s)) => (s.clone(), None),
            Some(serde_json::Value::Null) | None => (
                String::new(),
                Some(format!("audience column '{}' missing", column)),
            ),
            Some(other) => (other.to_string(), None),
        },
        None => (String::new(), Some("not mapped".to_string())),
    }
}

/// Materialize one recipient row. Pure; shared by preview and the send
/// pipeline.
pub fn materialize_row(ctx: &CampaignContext, recipient: &CampaignRecipient) -> MaterializedRow {
    let (parameters, mut warnings) = resolve_parameters(
        &ctx.mappings,
        ctx.template.placeholder_count,
        &recipient.attributes,
    );
    let mut errors = Vec::new();
    let mut vars = BTreeMap::new();

    if ctx.kind != CampaignKind::Text {
        match &ctx.header_media_url {
            Some(url) => {
                vars.insert(button_vars::HEADER_MEDIA.to_string(), url.clone());
            }
            None => {
                errors.push(format!("{} campaign has no header media URL", ctx.kind));
            }
        }
    } else if ctx.template.header_type == HeaderType::Text {
        // Text header placeholders resolve through the same mapping table
        // as body placeholders, keyed by their own index
        if let Some(text) = &ctx.template.header_text {
            for index in buttons::placeholder_indexes(text) {
                let (value, problem) = resolve_index(&ctx.mappings, index, &recipient.attributes);
                if let Some(problem) = problem {
                    warnings.push(format!("Header parameter {}: {}", index, problem));
                }
                vars.insert(button_vars::header_text(index), value);
            }
        }
    }

    match recipient.phone.as_deref() {
        Some(phone) if !phone.trim().is_empty() => {
            let (resolved, issues) = buttons::resolve_buttons(
                ctx.campaign_id,
                &ctx.tracking_base,
                phone,
                &parameters,
                &ctx.template.buttons,
            );
            for button in resolved {
                vars.insert(
                    button_vars::button_url_param(button.position),
                    button.param.as_str().to_string(),
                );
            }
            for issue in issues {
                errors.push(format!("Button {}: {}", issue.position, issue.message));
            }
        }
        _ => {
            errors.push("Recipient has no phone number".to_string());
        }
    }

    // Advisory here; the payload builder rejects blank parameters outright
    for (i, value) in parameters.iter().enumerate() {
        if value.trim().is_empty() {
            warnings.push(format!("Parameter {} resolved to an empty value", i + 1));
        }
    }

    MaterializedRow {
        recipient_id: recipient.id,
        phone: recipient.phone.clone(),
        parameters,
        button_vars: vars,
        errors,
        warnings,
    }
}

/// Materialization engine: loads campaign state and produces previews.
///
/// All writes (freezing) happen in the send pipeline, never here.
pub struct MaterializationEngine {
    campaigns: CampaignRepository,
    recipients: RecipientRepository,
    resolver: Arc<dyn TemplateResolver>,
    tracking_base: String,
}

impl MaterializationEngine {
    pub fn new(
        campaigns: CampaignRepository,
        recipients: RecipientRepository,
        resolver: Arc<dyn TemplateResolver>,
        tracking_base: String,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            resolver,
            tracking_base,
        }
    }

    pub async fn load_campaign(
        &self,
        tenant_id: uuid::Uuid,
        campaign_id: CampaignId,
    ) -> Result<Campaign, Error> {
        self.campaigns
            .get_by_tenant(tenant_id, campaign_id)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))
    }

    /// Build the materialization context for a campaign, resolving its
    /// template schema (snapshot first, then the template store).
    pub async fn context_for(&self, campaign: &Campaign) -> Result<CampaignContext, Error> {
        let template = template::resolve_for_campaign(self.resolver.as_ref(), campaign).await?;
        CampaignContext::build(campaign, template, &self.tracking_base)
    }

    /// Read-only preview of materialized rows. Nothing is frozen.
    pub async fn preview(
        &self,
        tenant_id: uuid::Uuid,
        campaign_id: CampaignId,
        limit: i64,
        offset: i64,
    ) -> Result<MaterializedCampaign, Error> {
        let campaign = self.load_campaign(tenant_id, campaign_id).await?;
        let ctx = self.context_for(&campaign).await?;

        let recipients = self
            .recipients
            .list_by_campaign(campaign_id, limit, offset)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = recipients
            .iter()
            .map(|r| materialize_row(&ctx, r))
            .collect();

        Ok(MaterializedCampaign {
            campaign_id,
            template: ctx.template,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ButtonKind, ButtonMeta, HeaderType};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn recipient(phone: Option<&str>, attributes: serde_json::Value) -> CampaignRecipient {
        let now = Utc::now();
        CampaignRecipient {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            contact_id: None,
            audience_member_id: None,
            phone: phone.map(String::from),
            attributes,
            resolved_parameters: None,
            resolved_button_vars: None,
            materialized_at: None,
            idempotency_key: None,
            delivery_status: "pending".to_string(),
            last_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx(kind: CampaignKind, header_media_url: Option<&str>) -> CampaignContext {
        CampaignContext {
            campaign_id: Uuid::new_v4(),
            kind,
            header_media_url: header_media_url.map(String::from),
            tracking_base: "https://links.wacast.local/r".to_string(),
            template: TemplateMeta {
                name: "order_update".to_string(),
                language: "en".to_string(),
                placeholder_count: 2,
                header_type: HeaderType::None,
                header_text: None,
                buttons: vec![ButtonMeta {
                    position: 1,
                    kind: ButtonKind::Url,
                    text: "Track".to_string(),
                    url: Some("https://shop.example/t/{{1}}".to_string()),
                }],
            },
            mappings: vec![
                VariableMapping {
                    index: 1,
                    source: VariableSource::AudienceColumn {
                        column: "first_name".to_string(),
                    },
                },
                VariableMapping {
                    index: 2,
                    source: VariableSource::Static {
                        value: "Spring sale".to_string(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_parse_mappings() {
        let value = serde_json::json!([
            {"index": 1, "source": "static", "value": "hi"},
            {"index": 2, "source": "expression", "default": "friend"},
            {"index": 3, "source": "audience_column", "column": "city"}
        ]);
        let mappings = parse_mappings(&value).unwrap();
        assert_eq!(mappings.len(), 3);
        assert!(matches!(mappings[1].source, VariableSource::Expression { .. }));

        assert!(parse_mappings(&serde_json::Value::Null).unwrap().is_empty());
        assert!(parse_mappings(&serde_json::json!([{"index": 1}])).is_err());
    }

    #[test]
    fn test_resolve_parameters_sources() {
        let mappings = vec![
            VariableMapping {
                index: 1,
                source: VariableSource::AudienceColumn {
                    column: "first_name".to_string(),
                },
            },
            VariableMapping {
                index: 2,
                source: VariableSource::Expression {
                    default: "there".to_string(),
                },
            },
        ];
        let attrs = serde_json::json!({"first_name": "Ada"});

        let (params, warnings) = resolve_parameters(&mappings, 3, &attrs);
        assert_eq!(params, vec!["Ada", "there", ""]);
        // Placeholder 3 has no mapping
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_resolve_parameters_missing_column() {
        let mappings = vec![VariableMapping {
            index: 1,
            source: VariableSource::AudienceColumn {
                column: "city".to_string(),
            },
        }];
        let (params, warnings) = resolve_parameters(&mappings, 1, &serde_json::json!({}));
        assert_eq!(params, vec![""]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_materialize_row_deterministic() {
        let ctx = ctx(CampaignKind::Text, None);
        let r = recipient(Some("+491705550100"), serde_json::json!({"first_name": "Ada"}));

        let a = materialize_row(&ctx, &r);
        let b = materialize_row(&ctx, &r);
        assert_eq!(a.parameters, b.parameters);
        assert_eq!(a.button_vars, b.button_vars);
        assert!(a.is_sendable());
        assert_eq!(a.parameters, vec!["Ada", "Spring sale"]);
        assert!(a.button_vars.contains_key("button1.url_param"));
    }

    #[test]
    fn test_materialize_row_missing_phone() {
        let ctx = ctx(CampaignKind::Text, None);
        let r = recipient(None, serde_json::json!({"first_name": "Ada"}));

        let row = materialize_row(&ctx, &r);
        assert!(!row.is_sendable());
        assert!(row.errors[0].contains("phone"));
        // Parameters still resolve so previews show something useful
        assert_eq!(row.parameters.len(), 2);
    }

    #[test]
    fn test_materialize_row_text_header() {
        let mut ctx = ctx(CampaignKind::Text, None);
        ctx.template.header_type = HeaderType::Text;
        ctx.template.header_text = Some("Hello {{1}}".to_string());
        let r = recipient(Some("+491705550100"), serde_json::json!({"first_name": "Ada"}));

        let row = materialize_row(&ctx, &r);
        assert!(row.is_sendable());
        assert_eq!(
            row.button_vars.get("header.text.1").map(String::as_str),
            Some("Ada")
        );
    }

    #[test]
    fn test_materialize_row_media_header() {
        let with_url = ctx(CampaignKind::Image, Some("https://cdn.example/a.jpg"));
        let r = recipient(Some("+491705550100"), serde_json::json!({"first_name": "Ada"}));
        let row = materialize_row(&with_url, &r);
        assert_eq!(
            row.button_vars.get("header.image_url").map(String::as_str),
            Some("https://cdn.example/a.jpg")
        );

        let without_url = ctx(CampaignKind::Image, None);
        let row = materialize_row(&without_url, &r);
        assert!(!row.is_sendable());
    }
}
