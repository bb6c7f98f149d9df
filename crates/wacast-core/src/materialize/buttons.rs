//! Dynamic URL button resolution.
//!
//! A URL button registered with the provider may carry a `{{n}}` placeholder.
//! During materialization the placeholder is substituted, the resulting
//! destination is validated, and the value actually sent to the provider is
//! derived: either a fully tracked redirect URL, or a short opaque token when
//! the provider-side button template already embeds an absolute base URL.

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;
use wacast_common::types::CampaignId;

use crate::template::{ButtonKind, ButtonMeta};

/// How the button parameter should be transmitted to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonParam {
    /// Full tracked redirect URL; the provider-side template is just `{{1}}`
    TrackedUrl(String),
    /// Short token appended by the provider to its own absolute base URL
    Token(String),
}

impl ButtonParam {
    pub fn as_str(&self) -> &str {
        match self {
            ButtonParam::TrackedUrl(s) => s,
            ButtonParam::Token(s) => s,
        }
    }
}

/// A successfully resolved dynamic button
#[derive(Debug, Clone)]
pub struct ResolvedButton {
    /// 1-based button position
    pub position: usize,
    /// Final destination after substitution (what a click should reach)
    pub destination: String,
    /// Parameter value transmitted to the provider
    pub param: ButtonParam,
}

/// A button that could not be resolved for this recipient
#[derive(Debug, Clone)]
pub struct ButtonIssue {
    pub position: usize,
    pub message: String,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\d+)\}\}").expect("valid placeholder regex"))
}

/// Whether a button URL template contains any `{{n}}` placeholder
pub fn is_dynamic(url_template: &str) -> bool {
    placeholder_re().is_match(url_template)
}

/// Ordered distinct `{{n}}` placeholder indices appearing in a template text
pub fn placeholder_indexes(text: &str) -> Vec<usize> {
    let mut indexes: Vec<usize> = placeholder_re()
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .filter(|&n| n > 0)
        .collect();
    indexes.sort_unstable();
    indexes.dedup();
    indexes
}

/// Probe whether the provider-side template already embeds an absolute base
/// URL. Placeholders are replaced with a dummy character and the result is
/// parsed; a well-formed http(s) URL means the provider will append our
/// parameter to its own base.
///
/// This is a heuristic: a template like `{{1}}` fails the parse and gets the
/// full tracked URL, while `https://shop.example/t/{{1}}` passes and gets a
/// short token.
pub fn has_absolute_base(url_template: &str) -> bool {
    let probed = placeholder_re().replace_all(url_template, "x");
    match Url::parse(&probed) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Substitute `{{n}}` placeholders in a button URL template.
///
/// `{{1}}` is the recipient's URL-escaped phone number; higher indices map to
/// body parameters (`{{2}}` -> parameter 1, and so on). Unknown indices are
/// left in place so validation catches them.
pub fn substitute(url_template: &str, phone: &str, body_params: &[String]) -> String {
    placeholder_re()
        .replace_all(url_template, |caps: &regex::Captures| {
            let n: usize = caps[1].parse().unwrap_or(0);
            match n {
                0 => caps[0].to_string(),
                1 => urlencoding::encode(phone).into_owned(),
                _ => match body_params.get(n - 2) {
                    Some(value) => urlencoding::encode(value).into_owned(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Validate a substituted button destination.
///
/// Accepted: absolute http(s) URLs, and the messaging deep-link forms
/// `tel:`, `wa:` and `wa.me` links.
pub fn validate_destination(destination: &str) -> Result<(), String> {
    if destination.contains("{{") {
        return Err(format!("Unresolved placeholder in '{}'", destination));
    }

    if destination.starts_with("tel:") || destination.starts_with("wa:") {
        return Ok(());
    }
    if destination.starts_with("wa.me/") {
        return Ok(());
    }

    match Url::parse(destination) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(format!("Unsupported URL scheme '{}'", url.scheme())),
        Err(e) => Err(format!("Invalid button URL '{}': {}", destination, e)),
    }
}

/// Deterministic short token for a (campaign, recipient, button) triple
pub fn short_token(campaign_id: CampaignId, recipient_key: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(campaign_id.as_bytes());
    hasher.update(b"|");
    hasher.update(recipient_key.as_bytes());
    hasher.update(b"|");
    hasher.update(position.to_string().as_bytes());
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(&digest[..9])
}

/// Resolve every dynamic URL button of a template for one recipient.
///
/// Static buttons (quick replies, calls, fixed URLs) need no parameter and
/// are skipped. Failures are reported per button and never abort the row.
pub fn resolve_buttons(
    campaign_id: CampaignId,
    tracking_base: &str,
    phone: &str,
    body_params: &[String],
    buttons: &[ButtonMeta],
) -> (Vec<ResolvedButton>, Vec<ButtonIssue>) {
    let mut resolved = Vec::new();
    let mut issues = Vec::new();

    for button in buttons.iter().take(3) {
        if button.kind != ButtonKind::Url {
            continue;
        }
        let Some(template) = button.url.as_deref() else {
            continue;
        };
        if !is_dynamic(template) {
            continue;
        }

        let destination = substitute(template, phone, body_params);
        if let Err(message) = validate_destination(&destination) {
            issues.push(ButtonIssue {
                position: button.position,
                message,
            });
            continue;
        }

        let token = short_token(campaign_id, phone, button.position);
        let param = if has_absolute_base(template) {
            ButtonParam::Token(token)
        } else {
            ButtonParam::TrackedUrl(format!(
                "{}/{}",
                tracking_base.trim_end_matches('/'),
                token
            ))
        };

        resolved.push(ResolvedButton {
            position: button.position,
            destination,
            param,
        });
    }

    (resolved, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url_button(position: usize, url: &str) -> ButtonMeta {
        ButtonMeta {
            position,
            kind: ButtonKind::Url,
            text: "Open".to_string(),
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_is_dynamic() {
        assert!(is_dynamic("https://shop.example/{{1}}"));
        assert!(!is_dynamic("https://shop.example/sale"));
    }

    #[test]
    fn test_placeholder_indexes() {
        assert_eq!(placeholder_indexes("Hi {{2}}, order {{1}} and {{2}}"), vec![1, 2]);
        assert!(placeholder_indexes("no placeholders").is_empty());
        assert!(placeholder_indexes("{{0}}").is_empty());
    }

    #[test]
    fn test_absolute_base_probe() {
        assert!(has_absolute_base("https://shop.example/t/{{1}}"));
        assert!(!has_absolute_base("{{1}}"));
        assert!(!has_absolute_base("/path/{{1}}"));
    }

    #[test]
    fn test_substitute_phone_and_params() {
        let params = vec!["ORDER-42".to_string()];
        let out = substitute("https://shop.example/{{2}}?p={{1}}", "+49 170 555", &params);
        assert_eq!(out, "https://shop.example/ORDER-42?p=%2B49%20170%20555");
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination("https://shop.example/x").is_ok());
        assert!(validate_destination("tel:+491705550100").is_ok());
        assert!(validate_destination("wa.me/491705550100").is_ok());
        assert!(validate_destination("ftp://shop.example/x").is_err());
        assert!(validate_destination("not a url").is_err());
        assert!(validate_destination("https://x.example/{{3}}").is_err());
    }

    #[test]
    fn test_short_token_deterministic() {
        let campaign = uuid::Uuid::new_v4();
        let a = short_token(campaign, "+491705550100", 1);
        let b = short_token(campaign, "+491705550100", 1);
        let c = short_token(campaign, "+491705550100", 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn test_resolve_token_vs_tracked() {
        let campaign = uuid::Uuid::new_v4();
        let buttons = vec![
            url_button(1, "https://shop.example/t/{{1}}"),
            url_button(2, "{{1}}"),
        ];
        let (resolved, issues) = resolve_buttons(
            campaign,
            "https://links.wacast.local/r",
            "+491705550100",
            &[],
            &buttons,
        );

        assert!(issues.is_empty());
        assert_eq!(resolved.len(), 2);
        assert!(matches!(resolved[0].param, ButtonParam::Token(_)));
        match &resolved[1].param {
            ButtonParam::TrackedUrl(url) => {
                assert!(url.starts_with("https://links.wacast.local/r/"))
            }
            other => panic!("expected tracked URL, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_skips_static_buttons() {
        let campaign = uuid::Uuid::new_v4();
        let buttons = vec![
            url_button(1, "https://shop.example/static"),
            ButtonMeta {
                position: 2,
                kind: ButtonKind::QuickReply,
                text: "Stop".to_string(),
                url: None,
            },
        ];
        let (resolved, issues) =
            resolve_buttons(campaign, "https://t.local", "+491705550100", &[], &buttons);
        assert!(resolved.is_empty());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_resolve_reports_bad_destination() {
        let campaign = uuid::Uuid::new_v4();
        // {{3}} points past the single body parameter, stays unresolved
        let buttons = vec![url_button(1, "https://shop.example/{{3}}")];
        let (resolved, issues) = resolve_buttons(
            campaign,
            "https://t.local",
            "+491705550100",
            &["one".to_string()],
            &buttons,
        );
        assert!(resolved.is_empty());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].position, 1);
    }
}
