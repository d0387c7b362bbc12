//! Built-in providers for the Vouch verification engine.
//!
//! Implements the contracts from `vouch-core`:
//!
//! - Bounded in-memory result cache (`moka`)
//! - Filesystem, inline and key-vault certificate providers
//! - JSON-Schema policy query and the standard policy engine
//! - In-memory graph store and a result-caching store decorator
//! - Static and Docker-config credential providers
//!
//! Everything is reached through [`Providers`], which owns one registry per
//! provider family.
//!
//! # Quick Start
//!
//! ```no_run
//! use vouch_core::CacheConfig;
//! use vouch_providers::certs::CertProviderOptions;
//! use vouch_providers::Providers;
//!
//! # async fn example() -> vouch_core::Result<()> {
//! let providers = Providers::with_builtins();
//! providers.create_cache(CacheConfig::from_env())?;
//!
//! let certs = providers.create_cert_provider(CertProviderOptions::Filesystem {
//!     paths: vec!["/etc/vouch/certs".into()],
//! })?;
//! for certificate in certs.get_certificates().await? {
//!     println!("{}", certificate.tbs_certificate.subject);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `VOUCH_CACHE_PROVIDER` | Result cache implementation (default: `memory`) |
//! | `VOUCH_CACHE_MAX_ENTRIES` | Entry bound (default: 10000) |
//! | `VOUCH_CACHE_TTL_SECS` | Default TTL, `0` for none (default: 10) |
//! | `DOCKER_CONFIG` | Directory holding `config.json` for `dockerConfig` credentials |

pub mod cache;
pub mod certs;
pub mod credentials;
pub mod policy;
pub mod registry;
pub mod store;

// Re-export main types
pub use cache::{CacheRegistry, MemoryCache};
pub use certs::{
    CertProviderOptions, FilesystemProvider, InlineProvider, KeyVaultConnector, KeyVaultProvider,
};
pub use credentials::{
    CachedCredentialProvider, CredentialOptions, CredentialRegistry, DockerConfigProvider,
    StaticCredentialProvider,
};
pub use policy::{JsonSchemaQuery, PolicyEngineRegistry, PolicyQueryRegistry, StandardPolicyEngine};
pub use registry::{CertProviderRegistry, Providers};
pub use store::{CachingReferrerStore, MemoryStore, StoreOptions, StoreRegistry};
