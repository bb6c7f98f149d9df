//! Provider adapter seam and sender resolution.

pub mod http;
pub mod settings;

use async_trait::async_trait;
use wacast_common::types::{Provider, TenantId};
use wacast_common::Error;
use wacast_storage::models::SenderIdentity;
use wacast_storage::repository::SenderRepository;

use crate::payload::MessagePayload;
use settings::SettingsCache;

/// Outcome of one provider send attempt.
///
/// Transport and provider-side failures are folded into a failed outcome
/// rather than an `Err`; the caller decides what that means for the job.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub raw_response: Option<serde_json::Value>,
}

impl SendOutcome {
    pub fn sent(message_id: Option<String>, raw: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            provider_message_id: message_id,
            error: None,
            raw_response: raw,
        }
    }

    pub fn failed(error: impl Into<String>, raw: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
            raw_response: raw,
        }
    }
}

/// The seam between the dispatch pipeline and provider wire protocols
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn send(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        sender_id: &str,
        payload: &MessagePayload,
    ) -> SendOutcome;
}

/// Resolves which sender identity a campaign dispatches from.
///
/// An explicit campaign sender must exist in the tenant's configured
/// identities. Without one, a single configured identity or a marked default
/// wins; several identities with no default is a hard configuration error,
/// never a silent pick.
pub struct SenderResolver {
    senders: SenderRepository,
    cache: SettingsCache,
}

impl SenderResolver {
    pub fn new(senders: SenderRepository, cache: SettingsCache) -> Self {
        Self { senders, cache }
    }

    async fn identities(
        &self,
        tenant_id: TenantId,
        provider: Provider,
    ) -> Result<Vec<SenderIdentity>, Error> {
        if let Some(cached) = self.cache.get(tenant_id, provider).await {
            return Ok(cached);
        }

        let identities = self
            .senders
            .list_by_provider(tenant_id, provider)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        self.cache.put(tenant_id, provider, identities.clone()).await;
        Ok(identities)
    }

    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        requested: Option<&str>,
    ) -> Result<String, Error> {
        let identities = self.identities(tenant_id, provider).await?;

        if let Some(requested) = requested {
            return identities
                .iter()
                .find(|i| i.sender_id == requested)
                .map(|i| i.sender_id.clone())
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "Sender '{}' is not configured for provider {}",
                        requested, provider
                    ))
                });
        }

        match identities.len() {
            0 => Err(Error::Validation(format!(
                "No sender identity configured for provider {}",
                provider
            ))),
            1 => Ok(identities[0].sender_id.clone()),
            _ => {
                let defaults: Vec<_> = identities.iter().filter(|i| i.is_default).collect();
                match defaults.as_slice() {
                    [only] => Ok(only.sender_id.clone()),
                    [] => Err(Error::AmbiguousSender(format!(
                        "{} identities configured for provider {} and none is default",
                        identities.len(),
                        provider
                    ))),
                    _ => Err(Error::AmbiguousSender(format!(
                        "Multiple default identities configured for provider {}",
                        provider
                    ))),
                }
            }
        }
    }

    pub async fn invalidate(&self, tenant_id: TenantId) {
        self.cache.invalidate(tenant_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let ok = SendOutcome::sent(Some("wamid.x".to_string()), None);
        assert!(ok.success);
        assert!(ok.error.is_none());

        let bad = SendOutcome::failed("timeout", None);
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("timeout"));
    }
}
