//! TTL cache for tenant provider settings.
//!
//! Sender identities change rarely but are read on every dispatch, so they
//! are cached per (tenant, provider) with an explicit TTL. The clock is
//! injected so expiry is testable without sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use wacast_common::types::{Provider, TenantId};
use wacast_storage::models::SenderIdentity;

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    expires_at: DateTime<Utc>,
    identities: Vec<SenderIdentity>,
}

/// Per-tenant provider settings cache with a fixed TTL
pub struct SettingsCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<(TenantId, Provider), CacheEntry>>,
}

impl SettingsCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached identities for a tenant/provider, if fresh
    pub async fn get(&self, tenant_id: TenantId, provider: Provider) -> Option<Vec<SenderIdentity>> {
        let entries = self.entries.read().await;
        let entry = entries.get(&(tenant_id, provider))?;
        if entry.expires_at <= self.clock.now() {
            return None;
        }
        Some(entry.identities.clone())
    }

    pub async fn put(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        identities: Vec<SenderIdentity>,
    ) {
        let expires_at = self.clock.now()
            + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        let mut entries = self.entries.write().await;
        entries.insert(
            (tenant_id, provider),
            CacheEntry {
                expires_at,
                identities,
            },
        );
    }

    /// Drop all cached entries for a tenant (settings changed)
    pub async fn invalidate(&self, tenant_id: TenantId) {
        let mut entries = self.entries.write().await;
        entries.retain(|(t, _), _| *t != tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Manually advanced clock
    struct TestClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn identity(tenant_id: TenantId) -> SenderIdentity {
        SenderIdentity {
            id: Uuid::new_v4(),
            tenant_id,
            provider: "meta_cloud".to_string(),
            sender_id: "1234567890".to_string(),
            display_name: None,
            is_default: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let clock = TestClock::new();
        let cache = SettingsCache::new(Duration::from_secs(300), clock.clone());
        let tenant = Uuid::new_v4();

        cache
            .put(tenant, Provider::MetaCloud, vec![identity(tenant)])
            .await;
        assert!(cache.get(tenant, Provider::MetaCloud).await.is_some());

        clock.advance(299);
        assert!(cache.get(tenant, Provider::MetaCloud).await.is_some());

        clock.advance(2);
        assert!(cache.get(tenant, Provider::MetaCloud).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_tenant() {
        let clock = TestClock::new();
        let cache = SettingsCache::new(Duration::from_secs(300), clock);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        cache.put(a, Provider::MetaCloud, vec![identity(a)]).await;
        cache.put(b, Provider::Pinnacle, vec![identity(b)]).await;

        cache.invalidate(a).await;
        assert!(cache.get(a, Provider::MetaCloud).await.is_none());
        assert!(cache.get(b, Provider::Pinnacle).await.is_some());
    }

    #[tokio::test]
    async fn test_miss_on_other_provider() {
        let clock = TestClock::new();
        let cache = SettingsCache::new(Duration::from_secs(300), clock);
        let tenant = Uuid::new_v4();

        cache
            .put(tenant, Provider::MetaCloud, vec![identity(tenant)])
            .await;
        assert!(cache.get(tenant, Provider::Pinnacle).await.is_none());
    }
}
