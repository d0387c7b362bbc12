//! Trust-material (certificate) providers.
//!
//! | Name | Options | Source |
//! |------|---------|--------|
//! | `filesystem` | `paths` | Files and directories, walked recursively |
//! | `inline` | `value` | One string of concatenated PEM blocks |
//! | `keyVault` | vault, tenant, client, objects | External secret store via [`KeyVaultClient`] |

pub mod filesystem;
pub mod inline;
pub mod key_vault;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use vouch_core::errors::code::CONFIG_INVALID;
use vouch_core::trust::{decode_certificates, parse_der};
use vouch_core::{Certificate, ComponentType, Error, Result};

pub use filesystem::FilesystemProvider;
pub use inline::InlineProvider;
pub use key_vault::{
    KeyVaultClient, KeyVaultConnector, KeyVaultObject, KeyVaultObjectVersion, KeyVaultOptions,
    KeyVaultProvider,
};

/// Options for every certificate provider, tagged by provider name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CertProviderOptions {
    Filesystem { paths: Vec<PathBuf> },
    Inline { value: String },
    KeyVault(KeyVaultOptions),
}

impl CertProviderOptions {
    /// Name of the provider these options are for.
    pub fn provider_name(&self) -> &'static str {
        match self {
            CertProviderOptions::Filesystem { .. } => filesystem::NAME,
            CertProviderOptions::Inline { .. } => inline::NAME,
            CertProviderOptions::KeyVault(_) => key_vault::NAME,
        }
    }
}

/// Error for a factory handed another provider's options.
pub(crate) fn wrong_options(expected: &str, options: &CertProviderOptions) -> Error {
    CONFIG_INVALID
        .with_detail(format!(
            "provider '{}' cannot use options of type '{}'",
            expected,
            options.provider_name()
        ))
        .with_component_type(ComponentType::CertProvider)
        .with_plugin_name(expected)
}

/// Parse PEM (any number of blocks) or a single DER certificate.
pub(crate) fn parse_certificate_bytes(bytes: &[u8]) -> Result<Vec<Certificate>> {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.contains("-----BEGIN") => decode_certificates(text),
        _ => parse_der(bytes).map(|certificate| vec![certificate]),
    }
}
