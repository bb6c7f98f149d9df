//! Provider wire formats.
//!
//! Both supported providers speak a WhatsApp template-message dialect; the
//! differences are minor shape details (button index serialization, header
//! link field). Each provider implements the small [`ProviderFormat`]
//! strategy and everything else is shared.

use serde_json::{json, Value};
use wacast_common::types::{CampaignKind, Provider};

use super::{HeaderComponent, MessagePayload};

/// The few per-provider differences in the wire shape
pub trait ProviderFormat {
    /// How a button component's index is serialized
    fn button_index(&self, position: usize) -> Value;

    /// Field name carrying the media link inside a header parameter
    fn media_link_field(&self) -> &'static str;

    /// Top-level envelope fields, if any
    fn envelope(&self) -> Vec<(&'static str, Value)>;

    fn render(&self, payload: &MessagePayload) -> Value {
        let mut components = Vec::new();

        match &payload.header {
            Some(HeaderComponent::Media { kind, link }) => {
                let media_type = match kind {
                    CampaignKind::Image => "image",
                    CampaignKind::Video => "video",
                    CampaignKind::Document => "document",
                    CampaignKind::Text => "text",
                };
                let link_field = self.media_link_field();
                components.push(json!({
                    "type": "header",
                    "parameters": [{
                        "type": media_type,
                        media_type: { link_field: link }
                    }]
                }));
            }
            Some(HeaderComponent::Text { parameters }) => {
                let params: Vec<Value> = parameters
                    .iter()
                    .map(|p| json!({"type": "text", "text": p}))
                    .collect();
                components.push(json!({
                    "type": "header",
                    "parameters": params
                }));
            }
            None => {}
        }

        let body_params: Vec<Value> = payload
            .body_parameters
            .iter()
            .map(|p| json!({"type": "text", "text": p}))
            .collect();
        components.push(json!({
            "type": "body",
            "parameters": body_params
        }));

        for button in &payload.buttons {
            components.push(json!({
                "type": "button",
                "sub_type": "url",
                "index": self.button_index(button.position),
                "parameters": [{"type": "text", "text": button.parameter}]
            }));
        }

        let mut message = json!({
            "to": payload.to,
            "type": "template",
            "template": {
                "name": payload.template_name,
                "language": {"code": payload.language},
                "components": components
            }
        });
        for (key, value) in self.envelope() {
            message[key] = value;
        }
        message
    }
}

/// Meta WhatsApp Cloud API: 0-based string button indexes
pub struct MetaCloudFormat;

impl ProviderFormat for MetaCloudFormat {
    fn button_index(&self, position: usize) -> Value {
        Value::String((position - 1).to_string())
    }

    fn media_link_field(&self) -> &'static str {
        "link"
    }

    fn envelope(&self) -> Vec<(&'static str, Value)> {
        vec![("messaging_product", Value::String("whatsapp".to_string()))]
    }
}

/// Pinnacle gateway: 1-based numeric button indexes
pub struct PinnacleFormat;

impl ProviderFormat for PinnacleFormat {
    fn button_index(&self, position: usize) -> Value {
        Value::Number(position.into())
    }

    fn media_link_field(&self) -> &'static str {
        "url"
    }

    fn envelope(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

pub fn for_provider(provider: Provider) -> &'static dyn ProviderFormat {
    match provider {
        Provider::MetaCloud => &MetaCloudFormat,
        Provider::Pinnacle => &PinnacleFormat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ButtonComponent, HeaderComponent};
    use pretty_assertions::assert_eq;

    fn payload() -> MessagePayload {
        MessagePayload {
            to: "+491705550100".to_string(),
            template_name: "order_update".to_string(),
            language: "en".to_string(),
            header: Some(HeaderComponent::Media {
                kind: CampaignKind::Image,
                link: "https://cdn.example/a.jpg".to_string(),
            }),
            body_parameters: vec!["Ada".to_string()],
            buttons: vec![ButtonComponent {
                position: 1,
                parameter: "tok123".to_string(),
            }],
            idempotency_key: "k".to_string(),
        }
    }

    #[test]
    fn test_meta_cloud_shape() {
        let rendered = payload().to_provider_json(Provider::MetaCloud);

        assert_eq!(rendered["messaging_product"], "whatsapp");
        assert_eq!(rendered["template"]["name"], "order_update");

        let components = rendered["template"]["components"].as_array().unwrap();
        assert_eq!(components.len(), 3);
        assert_eq!(components[0]["parameters"][0]["image"]["link"], "https://cdn.example/a.jpg");
        assert_eq!(components[2]["index"], "0");
    }

    #[test]
    fn test_pinnacle_shape() {
        let rendered = payload().to_provider_json(Provider::Pinnacle);

        assert!(rendered.get("messaging_product").is_none());
        let components = rendered["template"]["components"].as_array().unwrap();
        assert_eq!(components[0]["parameters"][0]["image"]["url"], "https://cdn.example/a.jpg");
        assert_eq!(components[2]["index"], 1);
    }

    #[test]
    fn test_text_header_parameters() {
        let mut p = payload();
        p.header = Some(HeaderComponent::Text {
            parameters: vec!["Spring sale".to_string()],
        });
        let rendered = p.to_provider_json(Provider::MetaCloud);
        let components = rendered["template"]["components"].as_array().unwrap();
        assert_eq!(components[0]["type"], "header");
        assert_eq!(components[0]["parameters"][0]["type"], "text");
        assert_eq!(components[0]["parameters"][0]["text"], "Spring sale");
    }

    #[test]
    fn test_text_template_has_no_header() {
        let mut p = payload();
        p.header = None;
        p.buttons.clear();
        let rendered = p.to_provider_json(Provider::MetaCloud);
        let components = rendered["template"]["components"].as_array().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0]["type"], "body");
    }
}
