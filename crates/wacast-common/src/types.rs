//! Common types for Wacast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tenants (businesses)
pub type TenantId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign recipients
pub type RecipientId = Uuid;

/// Unique identifier for outbound campaign jobs
pub type JobId = Uuid;

/// Unique identifier for send logs
pub type SendLogId = Uuid;

/// Unique identifier for a single dispatch pass of a job
pub type RunId = Uuid;

/// Upstream messaging provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    MetaCloud,
    Pinnacle,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::MetaCloud => write!(f, "meta_cloud"),
            Provider::Pinnacle => write!(f, "pinnacle"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta_cloud" => Ok(Provider::MetaCloud),
            "pinnacle" => Ok(Provider::Pinnacle),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

/// Throttle plan tier controlling batch size and per-minute send cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Basic,
    Smart,
    Advanced,
}

impl PlanTier {
    /// Returns `(max_batch_size, max_per_minute)` for this tier
    pub fn limits(&self) -> (usize, usize) {
        match self {
            PlanTier::Basic => (25, 120),
            PlanTier::Smart => (50, 300),
            PlanTier::Advanced => (100, 600),
        }
    }
}

impl Default for PlanTier {
    fn default() -> Self {
        PlanTier::Basic
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Basic => write!(f, "basic"),
            PlanTier::Smart => write!(f, "smart"),
            PlanTier::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(PlanTier::Basic),
            "smart" => Ok(PlanTier::Smart),
            "advanced" => Ok(PlanTier::Advanced),
            _ => Err(format!("Invalid plan tier: {}", s)),
        }
    }
}

/// Campaign kind (drives the header block shape)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    Text,
    Image,
    Video,
    Document,
}

impl std::fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignKind::Text => write!(f, "text"),
            CampaignKind::Image => write!(f, "image"),
            CampaignKind::Video => write!(f, "video"),
            CampaignKind::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for CampaignKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(CampaignKind::Text),
            "image" => Ok(CampaignKind::Image),
            "video" => Ok(CampaignKind::Video),
            "document" => Ok(CampaignKind::Document),
            _ => Err(format!("Invalid campaign kind: {}", s)),
        }
    }
}

/// Canonical keys for the frozen `resolved_button_vars` object.
///
/// These exact names are the interchange format between the materialization
/// engine and the payload builder; frozen rows written by older deployments
/// are read back under the same keys.
pub mod button_vars {
    /// Header media link (used for image, video and document headers)
    pub const HEADER_MEDIA: &str = "header.image_url";

    /// Key for the nth header text variable (1-based)
    pub fn header_text(n: usize) -> String {
        format!("header.text.{}", n)
    }

    /// Key for a dynamic URL button's parameter (1-based button position)
    pub fn button_url_param(n: usize) -> String {
        format!("button{}.url_param", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_roundtrip() {
        assert_eq!("meta_cloud".parse::<Provider>().unwrap(), Provider::MetaCloud);
        assert_eq!(Provider::Pinnacle.to_string(), "pinnacle");
        assert!("smtp".parse::<Provider>().is_err());
    }

    #[test]
    fn test_plan_tier_limits() {
        assert_eq!(PlanTier::Basic.limits(), (25, 120));
        assert_eq!(PlanTier::Smart.limits(), (50, 300));
        assert_eq!(PlanTier::Advanced.limits(), (100, 600));
        assert_eq!(PlanTier::default(), PlanTier::Basic);
    }

    #[test]
    fn test_button_var_keys() {
        assert_eq!(button_vars::button_url_param(1), "button1.url_param");
        assert_eq!(button_vars::header_text(2), "header.text.2");
    }
}
