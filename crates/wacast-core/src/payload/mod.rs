//! Send payload construction.
//!
//! One builder produces the canonical message payload from frozen recipient
//! content; provider-specific wire differences live in a small format
//! strategy ([`format`]). Content errors are rejected here, before any
//! network call.

pub mod format;

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use thiserror::Error;
use wacast_common::types::{button_vars, CampaignKind, Provider};
use wacast_storage::models::{Campaign, CampaignRecipient};

use crate::template::TemplateMeta;

/// Content errors that make a recipient unsendable. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Recipient has no phone number")]
    MissingPhone,

    #[error("Recipient content was never materialized")]
    NotMaterialized,

    #[error("Body parameter {index} is missing or blank")]
    MissingBodyParameter { index: usize },

    #[error("Template expects {expected} body parameters, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },

    #[error("{0} campaign is missing its header media variable")]
    MissingHeaderMedia(CampaignKind),

    #[error("Invalid campaign: {0}")]
    InvalidCampaign(String),
}

/// Media or text header block of a template message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderComponent {
    Media { kind: CampaignKind, link: String },
    Text { parameters: Vec<String> },
}

/// One dynamic URL button parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonComponent {
    /// 1-based button position
    pub position: usize,
    pub parameter: String,
}

/// Canonical provider-independent message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    pub to: String,
    pub template_name: String,
    pub language: String,
    pub header: Option<HeaderComponent>,
    /// Ordered body parameters, exactly `placeholder_count` of them
    pub body_parameters: Vec<String>,
    pub buttons: Vec<ButtonComponent>,
    pub idempotency_key: String,
}

impl MessagePayload {
    /// Serialize for a specific provider's wire format
    pub fn to_provider_json(&self, provider: Provider) -> serde_json::Value {
        format::for_provider(provider).render(self)
    }
}

/// Deterministic idempotency key over everything that defines a send.
///
/// Any change to campaign, destination, template or frozen content yields a
/// different key; re-sends of identical content share one.
pub fn idempotency_key(
    campaign_id: uuid::Uuid,
    phone: &str,
    template_name: &str,
    body_parameters: &[String],
    vars: &BTreeMap<String, String>,
) -> String {
    let params = serde_json::to_string(body_parameters).unwrap_or_default();
    // BTreeMap keeps key order stable across runs
    let vars_json = serde_json::to_string(vars).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(campaign_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(phone.as_bytes());
    hasher.update(b"|");
    hasher.update(template_name.as_bytes());
    hasher.update(b"|");
    hasher.update(params.as_bytes());
    hasher.update(b"|");
    hasher.update(vars_json.as_bytes());
    hex::encode(hasher.finalize())
}

/// Read the frozen button variables back as a sorted map
pub fn frozen_vars(recipient: &CampaignRecipient) -> BTreeMap<String, String> {
    recipient
        .resolved_button_vars
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Build the canonical payload for one frozen recipient.
///
/// Rejects content problems (missing phone, parameter count drift, blank
/// parameters, missing header media) before anything touches the network.
pub fn build_payload(
    campaign: &Campaign,
    template: &TemplateMeta,
    recipient: &CampaignRecipient,
) -> Result<MessagePayload, PayloadError> {
    let phone = recipient
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(PayloadError::MissingPhone)?;

    if recipient.resolved_parameters.is_none() {
        return Err(PayloadError::NotMaterialized);
    }

    let kind = campaign
        .kind_enum()
        .ok_or_else(|| PayloadError::InvalidCampaign(format!("unknown kind '{}'", campaign.kind)))?;

    let parameters = recipient.frozen_parameters();
    if parameters.len() != template.placeholder_count {
        return Err(PayloadError::ParameterCountMismatch {
            expected: template.placeholder_count,
            actual: parameters.len(),
        });
    }
    for (i, value) in parameters.iter().enumerate() {
        if value.trim().is_empty() {
            return Err(PayloadError::MissingBodyParameter { index: i + 1 });
        }
    }

    let vars = frozen_vars(recipient);

    let header = if kind == CampaignKind::Text {
        let mut parameters = Vec::new();
        for n in 1..=9 {
            if let Some(value) = vars.get(&button_vars::header_text(n)) {
                parameters.push(value.clone());
            }
        }
        if parameters.is_empty() {
            None
        } else {
            Some(HeaderComponent::Text { parameters })
        }
    } else {
        let link = vars
            .get(button_vars::HEADER_MEDIA)
            .cloned()
            .ok_or(PayloadError::MissingHeaderMedia(kind))?;
        Some(HeaderComponent::Media { kind, link })
    };

    let mut buttons = Vec::new();
    for position in 1..=3 {
        if let Some(parameter) = vars.get(&button_vars::button_url_param(position)) {
            buttons.push(ButtonComponent {
                position,
                parameter: parameter.clone(),
            });
        }
    }

    let key = recipient.idempotency_key.clone().unwrap_or_else(|| {
        idempotency_key(campaign.id, phone, &campaign.template_name, &parameters, &vars)
    });

    Ok(MessagePayload {
        to: phone.to_string(),
        template_name: campaign.template_name.clone(),
        language: campaign.template_language.clone(),
        header,
        body_parameters: parameters,
        buttons,
        idempotency_key: key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::HeaderType;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn campaign(kind: &str) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "August promo".to_string(),
            kind: kind.to_string(),
            provider: "meta_cloud".to_string(),
            sender_id: None,
            template_name: "order_update".to_string(),
            template_language: "en".to_string(),
            template_snapshot: None,
            header_media_url: None,
            variable_mappings: serde_json::Value::Null,
            plan_tier: "basic".to_string(),
            status: "sending".to_string(),
            sent_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn frozen_recipient(
        params: serde_json::Value,
        vars: serde_json::Value,
    ) -> CampaignRecipient {
        let now = Utc::now();
        CampaignRecipient {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            contact_id: None,
            audience_member_id: None,
            phone: Some("+491705550100".to_string()),
            attributes: serde_json::json!({}),
            resolved_parameters: Some(params),
            resolved_button_vars: Some(vars),
            materialized_at: Some(now),
            idempotency_key: None,
            delivery_status: "ready".to_string(),
            last_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn template(placeholders: usize) -> TemplateMeta {
        TemplateMeta {
            name: "order_update".to_string(),
            language: "en".to_string(),
            placeholder_count: placeholders,
            header_type: HeaderType::None,
            header_text: None,
            buttons: Vec::new(),
        }
    }

    #[test]
    fn test_build_text_payload() {
        let r = frozen_recipient(
            serde_json::json!(["Ada", "Spring sale"]),
            serde_json::json!({"button1.url_param": "https://links.local/r/abc"}),
        );
        let payload = build_payload(&campaign("text"), &template(2), &r).unwrap();

        assert_eq!(payload.to, "+491705550100");
        assert!(payload.header.is_none());
        assert_eq!(payload.body_parameters, vec!["Ada", "Spring sale"]);
        assert_eq!(payload.buttons.len(), 1);
        assert_eq!(payload.buttons[0].position, 1);
        assert_eq!(payload.idempotency_key.len(), 64);
    }

    #[test]
    fn test_header_required_for_media_kinds() {
        let r = frozen_recipient(serde_json::json!(["x"]), serde_json::json!({}));
        let err = build_payload(&campaign("image"), &template(1), &r).unwrap_err();
        assert_eq!(err, PayloadError::MissingHeaderMedia(CampaignKind::Image));

        let r = frozen_recipient(
            serde_json::json!(["x"]),
            serde_json::json!({"header.image_url": "https://cdn.example/a.jpg"}),
        );
        let payload = build_payload(&campaign("image"), &template(1), &r).unwrap();
        assert_eq!(
            payload.header,
            Some(HeaderComponent::Media {
                kind: CampaignKind::Image,
                link: "https://cdn.example/a.jpg".to_string()
            })
        );
    }

    #[test]
    fn test_text_header_from_frozen_vars() {
        let r = frozen_recipient(
            serde_json::json!(["Ada"]),
            serde_json::json!({"header.text.1": "Spring sale"}),
        );
        let payload = build_payload(&campaign("text"), &template(1), &r).unwrap();
        assert_eq!(
            payload.header,
            Some(HeaderComponent::Text {
                parameters: vec!["Spring sale".to_string()]
            })
        );
    }

    #[test]
    fn test_parameter_count_mismatch_rejected() {
        let r = frozen_recipient(serde_json::json!(["only one"]), serde_json::json!({}));
        let err = build_payload(&campaign("text"), &template(2), &r).unwrap_err();
        assert_eq!(
            err,
            PayloadError::ParameterCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_blank_parameter_rejected() {
        let r = frozen_recipient(serde_json::json!(["Ada", "  "]), serde_json::json!({}));
        let err = build_payload(&campaign("text"), &template(2), &r).unwrap_err();
        assert_eq!(err, PayloadError::MissingBodyParameter { index: 2 });
    }

    #[test]
    fn test_unmaterialized_rejected() {
        let mut r = frozen_recipient(serde_json::json!([]), serde_json::json!({}));
        r.resolved_parameters = None;
        let err = build_payload(&campaign("text"), &template(0), &r).unwrap_err();
        assert_eq!(err, PayloadError::NotMaterialized);
    }

    #[test]
    fn test_idempotency_key_stability() {
        let campaign_id = Uuid::new_v4();
        let params = vec!["Ada".to_string()];
        let mut vars = BTreeMap::new();
        vars.insert("button1.url_param".to_string(), "tok".to_string());

        let a = idempotency_key(campaign_id, "+4917055", "t", &params, &vars);
        let b = idempotency_key(campaign_id, "+4917055", "t", &params, &vars);
        assert_eq!(a, b);

        // Any input change yields a new key
        let c = idempotency_key(campaign_id, "+4917056", "t", &params, &vars);
        assert_ne!(a, c);
        let d = idempotency_key(campaign_id, "+4917055", "t", &["Eve".to_string()], &vars);
        assert_ne!(a, d);
        let e = idempotency_key(campaign_id, "+4917055", "t", &params, &BTreeMap::new());
        assert_ne!(a, e);
    }
}
