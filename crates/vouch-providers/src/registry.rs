//! The provider host: one registry per family, built once and shared.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use vouch_core::cache::{CacheConfig, ResultCache};
use vouch_core::policy::{PolicyEngine, PolicyEngineConfig};
use vouch_core::{ComponentType, CertificateProvider, CredentialProvider, ReferrerStore, Registry, Result};

use crate::cache::{memory as memory_cache, CacheRegistry, MemoryCache};
use crate::certs::key_vault::{self, KeyVaultConnector, KeyVaultProvider};
use crate::certs::{filesystem, inline, CertProviderOptions, FilesystemProvider, InlineProvider};
use crate::credentials::{
    docker_config, static_provider, CachedCredentialProvider, CredentialOptions,
    CredentialRegistry, DockerConfigProvider, StaticCredentialProvider,
};
use crate::policy::{
    engine, json_schema, JsonSchemaQuery, PolicyEngineRegistry, PolicyQueryRegistry,
    StandardPolicyEngine,
};
use crate::store::{memory as memory_store, CachingReferrerStore, MemoryStore, StoreOptions, StoreRegistry};

/// Certificate provider name → provider built from its options.
pub type CertProviderRegistry = Registry<CertProviderOptions, Arc<dyn CertificateProvider>>;

/// Registries for every provider family.
///
/// Construct once at startup, register everything, then hand it by reference
/// to whatever needs to resolve providers. Families are separate namespaces,
/// so `memory` can name both a cache and a store.
pub struct Providers {
    caches: CacheRegistry,
    certs: CertProviderRegistry,
    queries: Arc<PolicyQueryRegistry>,
    engines: PolicyEngineRegistry,
    stores: StoreRegistry,
    credentials: CredentialRegistry,
}

impl Providers {
    /// Empty registries.
    pub fn new() -> Self {
        Self {
            caches: CacheRegistry::new("result cache", ComponentType::Cache),
            certs: CertProviderRegistry::new("certificate provider", ComponentType::CertProvider),
            queries: Arc::new(PolicyQueryRegistry::new("policy query", ComponentType::PolicyProvider)),
            engines: PolicyEngineRegistry::new("policy engine", ComponentType::PolicyProvider),
            stores: StoreRegistry::new("referrer store", ComponentType::ReferrerStore),
            credentials: CredentialRegistry::new("credential provider", ComponentType::AuthProvider),
        }
    }

    /// Registries holding every built-in provider.
    ///
    /// The key-vault provider needs a connector and is added separately with
    /// [`Providers::register_key_vault`].
    pub fn with_builtins() -> Self {
        let providers = Self::new();
        providers.caches.register(memory_cache::NAME, MemoryCache::create);

        providers.certs.register(filesystem::NAME, FilesystemProvider::create);
        providers.certs.register(inline::NAME, InlineProvider::create);

        providers.queries.register(json_schema::LANGUAGE, JsonSchemaQuery::create);
        providers
            .engines
            .register(engine::NAME, StandardPolicyEngine::factory(providers.queries.clone()));

        providers.stores.register(memory_store::NAME, MemoryStore::create);

        providers
            .credentials
            .register(static_provider::NAME, StaticCredentialProvider::create);
        providers
            .credentials
            .register(docker_config::NAME, DockerConfigProvider::create);

        info!(
            caches = ?providers.caches.registry().names(),
            certs = ?providers.certs.names(),
            engines = ?providers.engines.names(),
            stores = ?providers.stores.names(),
            credentials = ?providers.credentials.names(),
            "registered built-in providers"
        );
        providers
    }

    /// Add the `keyVault` certificate provider backed by `connector`.
    pub fn register_key_vault(&self, connector: Arc<dyn KeyVaultConnector>) {
        self.certs
            .register(key_vault::NAME, KeyVaultProvider::factory(connector));
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    pub fn certs(&self) -> &CertProviderRegistry {
        &self.certs
    }

    pub fn queries(&self) -> &PolicyQueryRegistry {
        &self.queries
    }

    pub fn engines(&self) -> &PolicyEngineRegistry {
        &self.engines
    }

    pub fn stores(&self) -> &StoreRegistry {
        &self.stores
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.credentials
    }

    /// Create the cache named by `config.provider` and make it current.
    pub fn create_cache(&self, config: CacheConfig) -> Result<Arc<dyn ResultCache>> {
        let name = config.provider.clone();
        self.caches.create(&name, config)
    }

    /// The cache from the last [`Providers::create_cache`], or `CACHE_NOT_SET`.
    pub fn current_cache(&self) -> Result<Arc<dyn ResultCache>> {
        self.caches.current()
    }

    /// Create the certificate provider the options are tagged for.
    pub fn create_cert_provider(&self, options: CertProviderOptions) -> Result<Arc<dyn CertificateProvider>> {
        self.certs.create(options.provider_name(), options)
    }

    pub fn create_policy_engine(&self, config: PolicyEngineConfig) -> Result<Arc<dyn PolicyEngine>> {
        let name = config.name.clone();
        self.engines.create(&name, config)
    }

    /// Create a graph store.
    ///
    /// When a result cache is current and `cache_ttl_secs` is non-zero the
    /// store is wrapped in a [`CachingReferrerStore`].
    pub fn create_store(&self, options: StoreOptions) -> Result<Arc<dyn ReferrerStore>> {
        let ttl = Duration::from_secs(options.cache_ttl_secs);
        let name = options.name.clone();
        let store = self.stores.create(&name, options)?;

        if ttl.is_zero() {
            return Ok(store);
        }
        match self.caches.current() {
            Ok(cache) => {
                debug!(store = %name, ttl_secs = ttl.as_secs(), "wrapping store in result cache");
                Ok(Arc::new(CachingReferrerStore::new(store, cache, ttl)))
            }
            Err(_) => Ok(store),
        }
    }

    /// Create a credential provider, cached for `cache_ttl` when a result
    /// cache is current.
    pub fn create_credential_provider(
        &self,
        options: CredentialOptions,
        cache_ttl: Option<Duration>,
    ) -> Result<Arc<dyn CredentialProvider>> {
        let provider = self.credentials.create(options.provider_name(), options)?;
        match (cache_ttl, self.caches.current()) {
            (Some(ttl), Ok(cache)) if !ttl.is_zero() => {
                Ok(Arc::new(CachedCredentialProvider::new(provider, cache, ttl)))
            }
            _ => Ok(provider),
        }
    }
}

impl Default for Providers {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("caches", &self.caches)
            .field("certs", &self.certs)
            .field("queries", &self.queries)
            .field("engines", &self.engines)
            .field("stores", &self.stores)
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::errors::code::{CACHE_NOT_SET, PROVIDER_NOT_FOUND};

    #[test]
    fn test_builtins_registered() {
        let providers = Providers::with_builtins();
        assert!(providers.caches().registry().contains("memory"));
        assert!(providers.certs().contains("filesystem"));
        assert!(providers.certs().contains("inline"));
        assert!(!providers.certs().contains("keyVault"));
        assert!(providers.queries().contains("jsonschema"));
        assert!(providers.engines().contains("standard"));
        assert!(providers.stores().contains("memory"));
        assert!(providers.credentials().contains("static"));
        assert!(providers.credentials().contains("dockerConfig"));
    }

    #[test]
    fn test_current_cache_follows_create() {
        let providers = Providers::with_builtins();
        let err = providers.current_cache().err().unwrap();
        assert_eq!(err.code(), CACHE_NOT_SET);

        let cache = providers.create_cache(CacheConfig::default()).unwrap();
        assert!(cache.set("k", serde_json::json!(1)));
        assert!(providers.current_cache().unwrap().get("k").is_some());
    }

    #[test]
    fn test_unknown_cache_provider() {
        let providers = Providers::with_builtins();
        let config = CacheConfig {
            provider: "redis".into(),
            ..CacheConfig::default()
        };
        let err = providers.create_cache(config).err().unwrap();
        assert_eq!(err.code(), PROVIDER_NOT_FOUND);
        assert_eq!(err.component_type(), Some(ComponentType::Cache));
    }

    #[test]
    fn test_store_wrapped_only_with_cache() {
        let providers = Providers::with_builtins();
        let plain = providers.create_store(StoreOptions::new("memory")).unwrap();
        assert_eq!(plain.name(), "memory");

        providers.create_cache(CacheConfig::default()).unwrap();
        let cached = providers.create_store(StoreOptions::new("memory")).unwrap();
        assert_eq!(cached.name(), "memory");
    }
}
