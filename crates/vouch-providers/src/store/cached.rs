//! Result-cache decorator for graph stores.
//!
//! Subject descriptors and referrer pages are memoised in the shared result
//! cache. Blobs and manifests are content-addressed and usually large, so
//! those calls always reach the inner store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use vouch_core::cache::{CacheKey, ResultCache, ResultCacheExt};
use vouch_core::store::{
    BlobContent, Descriptor, ListReferrersPage, ReferenceManifest, ReferrerStore,
    StoreConfiguration,
};
use vouch_core::Result;

pub struct CachingReferrerStore {
    inner: Arc<dyn ReferrerStore>,
    cache: Arc<dyn ResultCache>,
    ttl: Duration,
}

impl CachingReferrerStore {
    pub fn new(inner: Arc<dyn ReferrerStore>, cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn inner(&self) -> &Arc<dyn ReferrerStore> {
        &self.inner
    }

    fn config_key(config: &StoreConfiguration) -> String {
        serde_json::to_string(config.as_map()).unwrap_or_default()
    }

    fn subject_key(&self, path: &str, config: &StoreConfiguration) -> String {
        let config = Self::config_key(config);
        CacheKey::SubjectDescriptor.key_of(&[self.inner.name(), path, config.as_str()])
    }

    fn page_key(
        &self,
        subject: &Descriptor,
        artifact_types: &[String],
        config: &StoreConfiguration,
    ) -> String {
        let types = serde_json::to_string(artifact_types).unwrap_or_default();
        let config = Self::config_key(config);
        CacheKey::ListReferrers.key_of(&[
            self.inner.name(),
            subject.digest.as_str(),
            types.as_str(),
            config.as_str(),
        ])
    }
}

#[async_trait]
impl ReferrerStore for CachingReferrerStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_referrers(
        &self,
        subject: &Descriptor,
        artifact_types: &[String],
        config: &StoreConfiguration,
    ) -> Result<ListReferrersPage> {
        let key = self.page_key(subject, artifact_types, config);
        if let Some(page) = self.cache.get_json::<ListReferrersPage>(&key) {
            trace!(store = self.name(), key = %key, "referrer page cache hit");
            return Ok(page);
        }
        let page = self
            .inner
            .list_referrers(subject, artifact_types, config)
            .await?;
        self.cache.set_json(&key, &page, Some(self.ttl));
        Ok(page)
    }

    async fn get_blob_content(
        &self,
        artifact: &Descriptor,
        config: &StoreConfiguration,
    ) -> Result<BlobContent> {
        self.inner.get_blob_content(artifact, config).await
    }

    async fn get_subject_descriptor(
        &self,
        path: &str,
        config: &StoreConfiguration,
    ) -> Result<Descriptor> {
        let key = self.subject_key(path, config);
        if let Some(descriptor) = self.cache.get_json::<Descriptor>(&key) {
            trace!(store = self.name(), key = %key, "subject descriptor cache hit");
            return Ok(descriptor);
        }
        let descriptor = self.inner.get_subject_descriptor(path, config).await?;
        self.cache.set_json(&key, &descriptor, Some(self.ttl));
        Ok(descriptor)
    }

    async fn get_reference_manifest(
        &self,
        subject_path: &str,
        referrer: &Descriptor,
        config: &StoreConfiguration,
    ) -> Result<ReferenceManifest> {
        self.inner
            .get_reference_manifest(subject_path, referrer, config)
            .await
    }
}
