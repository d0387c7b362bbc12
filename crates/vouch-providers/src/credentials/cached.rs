//! Result-cache wrapper for credential providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::trace;

use vouch_core::cache::{CacheKey, ResultCache, ResultCacheExt};
use vouch_core::{Credential, CredentialProvider, Result};

use super::normalize_host;

/// Serves credentials from the result cache, per provider and host.
///
/// Entries live for `ttl`, or until the credential expires if that is sooner.
/// Already-expired credentials are returned but never cached.
pub struct CachedCredentialProvider {
    inner: Arc<dyn CredentialProvider>,
    cache: Arc<dyn ResultCache>,
    ttl: Duration,
}

impl CachedCredentialProvider {
    pub fn new(inner: Arc<dyn CredentialProvider>, cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(&self, host: &str) -> String {
        let host = normalize_host(host);
        CacheKey::Credential.key_of(&[self.inner.name(), host.as_str()])
    }
}

#[async_trait]
impl CredentialProvider for CachedCredentialProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_credential(&self, host: &str) -> Result<Credential> {
        let key = self.key(host);
        let now = Utc::now();

        if let Some(cred) = self.cache.get_json::<Credential>(&key) {
            if !cred.is_expired(now) {
                trace!(provider = self.name(), host, "credential cache hit");
                return Ok(cred);
            }
            self.cache.delete(&key);
        }

        let cred = self.inner.get_credential(host).await?;
        let ttl = match cred.remaining(now) {
            Some(left) => left.min(self.ttl),
            None => self.ttl,
        };
        if !ttl.is_zero() {
            self.cache.set_json(&key, &cred, Some(ttl));
        }
        Ok(cred)
    }
}
