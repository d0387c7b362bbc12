//! Registry credential providers.
//!
//! | Name | Source |
//! |------|--------|
//! | `static` | Host → credential map from configuration |
//! | `dockerConfig` | `auths` section of a Docker client `config.json` |
//!
//! Any provider can be wrapped in [`CachedCredentialProvider`] so repeated
//! lookups for a host are served from the result cache until the credential
//! expires.

pub mod cached;
pub mod docker_config;
pub mod static_provider;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vouch_core::errors::code::{CONFIG_INVALID, NO_MATCHING_CREDENTIAL};
use vouch_core::{ComponentType, Credential, CredentialProvider, Error, Registry};

pub use cached::CachedCredentialProvider;
pub use docker_config::DockerConfigProvider;
pub use static_provider::StaticCredentialProvider;

/// Provider name → credential provider built from its options.
pub type CredentialRegistry = Registry<CredentialOptions, Arc<dyn CredentialProvider>>;

/// Options for every credential provider, tagged by provider name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CredentialOptions {
    Static {
        credentials: BTreeMap<String, Credential>,
    },
    DockerConfig {
        /// Explicit `config.json`; defaults to `$DOCKER_CONFIG/config.json`
        /// then `~/.docker/config.json`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl CredentialOptions {
    pub fn provider_name(&self) -> &'static str {
        match self {
            CredentialOptions::Static { .. } => static_provider::NAME,
            CredentialOptions::DockerConfig { .. } => docker_config::NAME,
        }
    }
}

/// Reduce `https://host:port/v1/` style keys to `host:port`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.split('/').next().unwrap_or(host).to_ascii_lowercase()
}

pub(crate) fn no_match(provider: &str, host: &str) -> Error {
    NO_MATCHING_CREDENTIAL
        .with_detail(format!("no credential configured for host '{}'", host))
        .with_component_type(ComponentType::AuthProvider)
        .with_plugin_name(provider)
}

pub(crate) fn wrong_options(expected: &str, options: &CredentialOptions) -> Error {
    CONFIG_INVALID
        .with_detail(format!(
            "provider '{}' cannot use options of type '{}'",
            expected,
            options.provider_name()
        ))
        .with_component_type(ComponentType::AuthProvider)
        .with_plugin_name(expected)
}
