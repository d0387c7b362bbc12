//! Certificates stored in an external key vault.
//!
//! The vault itself is reached through a [`KeyVaultClient`], produced by a
//! [`KeyVaultConnector`] the host registers with
//! [`Providers::register_key_vault`](crate::Providers::register_key_vault).
//! Configuration is validated before the connector is asked for a client, so
//! a misconfigured provider never reaches the network.

pub mod select;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vouch_core::errors::code::{CONFIG_INVALID, KEY_VAULT_OPERATION_FAILURE};
use vouch_core::trust::{encode_pem, CertificateEntry, CertificateMetadata, CertificateProvider};
use vouch_core::{Certificate, ComponentType, Error, Result};

use super::{parse_certificate_bytes, wrong_options, CertProviderOptions};
pub use select::{select_versions, SelectedVersion, LATEST};

/// Registered name of this provider.
pub const NAME: &str = "keyVault";

/// Key-vault provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultOptions {
    #[serde(default)]
    pub vault_uri: String,

    #[serde(default)]
    pub tenant_id: String,

    /// Identity the provider authenticates as.
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub objects: Vec<KeyVaultObject>,
}

/// One certificate object to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultObject {
    pub object_name: String,

    /// Base name for aliases. Defaults to `object_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_alias: Option<String>,

    /// Pinned version; empty or `latest` means newest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_version: Option<String>,

    /// Number of versions to fetch, newest first from the start version.
    #[serde(default)]
    pub object_version_history: u32,
}

impl KeyVaultObject {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.object_version = Some(version.into());
        self
    }

    pub fn with_history(mut self, depth: u32) -> Self {
        self.object_version_history = depth;
        self
    }

    fn base_name(&self) -> &str {
        self.object_alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.object_name)
    }
}

/// Version metadata as reported by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultObjectVersion {
    pub version: String,
    pub created: DateTime<Utc>,
    pub enabled: bool,
}

/// Access to one vault.
#[async_trait]
pub trait KeyVaultClient: Send + Sync {
    /// Every version of `object_name`, enabled or not.
    async fn list_versions(&self, object_name: &str) -> Result<Vec<KeyVaultObjectVersion>>;

    /// Certificate content of one version, PEM or DER.
    async fn get_certificate(&self, object_name: &str, version: &str) -> Result<Vec<u8>>;
}

/// Builds a client from validated options.
pub trait KeyVaultConnector: Send + Sync {
    fn connect(&self, options: &KeyVaultOptions) -> Result<Arc<dyn KeyVaultClient>>;
}

impl KeyVaultOptions {
    /// Reject options missing the vault name, tenant or client identity.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("vaultUri", &self.vault_uri),
            ("tenantId", &self.tenant_id),
            ("clientId", &self.client_id),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        if let Some((field, _)) = missing {
            return Err(config_error(format!("'{}' is required", field)));
        }
        if self.objects.is_empty() {
            return Err(config_error("at least one object is required".to_string()));
        }
        if let Some(index) = self.objects.iter().position(|o| o.object_name.trim().is_empty()) {
            return Err(config_error(format!("object {} has no 'objectName'", index)));
        }
        Ok(())
    }
}

fn config_error(detail: String) -> Error {
    CONFIG_INVALID
        .with_detail(detail)
        .with_component_type(ComponentType::KeyManagementProvider)
        .with_plugin_name(NAME)
        .with_remediation("set vaultUri, tenantId, clientId and objects in the keyVault options")
}

fn vault_error(detail: String, cause: Error) -> Error {
    KEY_VAULT_OPERATION_FAILURE
        .with_detail(detail)
        .with_error(cause)
        .with_component_type(ComponentType::KeyManagementProvider)
        .with_plugin_name(NAME)
}

pub struct KeyVaultProvider {
    options: KeyVaultOptions,
    client: Arc<dyn KeyVaultClient>,
}

impl KeyVaultProvider {
    /// Validate `options`, then connect.
    pub fn new(options: KeyVaultOptions, connector: &dyn KeyVaultConnector) -> Result<Self> {
        options.validate()?;
        let client = connector.connect(&options)?;
        Ok(Self { options, client })
    }

    /// Factory registered under [`NAME`], bound to `connector`.
    pub fn factory(
        connector: Arc<dyn KeyVaultConnector>,
    ) -> impl Fn(CertProviderOptions) -> Result<Arc<dyn CertificateProvider>> + Send + Sync + 'static
    {
        move |options: CertProviderOptions| -> Result<Arc<dyn CertificateProvider>> {
            match options {
                CertProviderOptions::KeyVault(options) => {
                    Ok(Arc::new(Self::new(options, connector.as_ref())?))
                }
                other => Err(wrong_options(NAME, &other)),
            }
        }
    }

    async fn resolve_object(&self, object: &KeyVaultObject) -> Result<Vec<CertificateEntry>> {
        let name = &object.object_name;
        let versions = self
            .client
            .list_versions(name)
            .await
            .map_err(|e| vault_error(format!("failed to list versions of '{}'", name), e))?;

        let selected = select_versions(
            object.base_name(),
            versions,
            object.object_version.as_deref(),
            object.object_version_history,
        )
        .map_err(|e| e.with_plugin_name(NAME))?;
        debug!(
            object = %name,
            versions = ?selected.iter().map(|s| s.version.as_str()).collect::<Vec<_>>(),
            "selected key vault versions"
        );

        let mut entries = Vec::with_capacity(selected.len());
        for SelectedVersion { alias, version } in selected {
            let content = self.client.get_certificate(name, &version).await.map_err(|e| {
                vault_error(
                    format!("failed to fetch version '{}' of '{}'", version, name),
                    e,
                )
            })?;
            let certificates = parse_certificate_bytes(&content).map_err(|e| {
                e.with_detail(format!("version '{}' of '{}'", version, name))
                    .with_plugin_name(NAME)
            })?;
            for certificate in certificates {
                entries.push(CertificateEntry {
                    certificate,
                    metadata: CertificateMetadata {
                        alias: Some(alias.clone()),
                        version: Some(version.clone()),
                        source: Some(name.clone()),
                    },
                });
            }
        }
        Ok(entries)
    }

    /// PEM content per alias. Aliases holding a chain get the blocks concatenated.
    pub async fn get_pem_objects(&self) -> Result<BTreeMap<String, String>> {
        let mut objects: BTreeMap<String, String> = BTreeMap::new();
        for entry in self.get_certificate_entries().await? {
            let pem = encode_pem(&entry.certificate)?;
            let alias = entry.metadata.alias.unwrap_or_default();
            objects.entry(alias).or_default().push_str(&pem);
        }
        Ok(objects)
    }
}

#[async_trait]
impl CertificateProvider for KeyVaultProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self
            .get_certificate_entries()
            .await?
            .into_iter()
            .map(|entry| entry.certificate)
            .collect())
    }

    async fn get_certificate_entries(&self) -> Result<Vec<CertificateEntry>> {
        let mut entries = Vec::new();
        for object in &self.options.objects {
            entries.extend(self.resolve_object(object).await?);
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for KeyVaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultProvider")
            .field("vault_uri", &self.options.vault_uri)
            .field("objects", &self.options.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vouch_core::errors::code::{CERT_INVALID, REFERRER_STORE_FAILURE};

    const SIGNER: &[u8] = include_bytes!("../../../tests/fixtures/signer.pem");
    const ROOT_PEM: &[u8] = include_bytes!("../../../tests/fixtures/root.pem");
    const SIGNER_DER: &[u8] = include_bytes!("../../../tests/fixtures/signer.der");

    /// Versions v1 (oldest, root cert), v2 (signer PEM), v3 (signer DER, newest).
    /// Object `corrupt` holds garbage in every version.
    struct FakeVault;

    #[async_trait]
    impl KeyVaultClient for FakeVault {
        async fn list_versions(&self, object_name: &str) -> Result<Vec<KeyVaultObjectVersion>> {
            if object_name == "broken" {
                return Err(REFERRER_STORE_FAILURE.with_detail("vault unavailable"));
            }
            Ok((1..=3)
                .map(|i| KeyVaultObjectVersion {
                    version: format!("v{}", i),
                    created: Utc.with_ymd_and_hms(2025, 3, i, 12, 0, 0).unwrap(),
                    enabled: true,
                })
                .collect())
        }

        async fn get_certificate(&self, object_name: &str, version: &str) -> Result<Vec<u8>> {
            if object_name == "corrupt" {
                return Ok(b"garbage".to_vec());
            }
            Ok(match version {
                "v1" => ROOT_PEM.to_vec(),
                "v2" => SIGNER.to_vec(),
                "v3" => SIGNER_DER.to_vec(),
                _ => b"garbage".to_vec(),
            })
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl KeyVaultConnector for CountingConnector {
        fn connect(&self, _options: &KeyVaultOptions) -> Result<Arc<dyn KeyVaultClient>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeVault))
        }
    }

    fn options(objects: Vec<KeyVaultObject>) -> KeyVaultOptions {
        KeyVaultOptions {
            vault_uri: "https://vault.example.net/".into(),
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            objects,
        }
    }

    #[tokio::test]
    async fn test_history_aliases_and_versions() {
        let connector = CountingConnector::default();
        let provider = KeyVaultProvider::new(
            options(vec![KeyVaultObject::new("signing").with_history(2)]),
            &connector,
        )
        .unwrap();

        let entries = provider.get_certificate_entries().await.unwrap();
        let meta: Vec<_> = entries
            .iter()
            .map(|e| {
                (
                    e.metadata.alias.as_deref().unwrap(),
                    e.metadata.version.as_deref().unwrap(),
                )
            })
            .collect();
        assert_eq!(meta, vec![("signing/0", "v3"), ("signing/1", "v2")]);
        assert_eq!(entries[0].certificate, entries[1].certificate);
    }

    #[tokio::test]
    async fn test_pinned_single_version_pem() {
        let connector = CountingConnector::default();
        let mut object = KeyVaultObject::new("signing").with_version("v1");
        object.object_alias = Some("root".into());
        let provider = KeyVaultProvider::new(options(vec![object]), &connector).unwrap();

        let pems = provider.get_pem_objects().await.unwrap();
        assert_eq!(pems.len(), 1);
        let pem = &pems["root"];
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(
            vouch_core::trust::decode_certificates(pem).unwrap(),
            vouch_core::trust::decode_certificates(std::str::from_utf8(ROOT_PEM).unwrap())
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_client_failure_is_wrapped() {
        let connector = CountingConnector::default();
        let provider =
            KeyVaultProvider::new(options(vec![KeyVaultObject::new("broken")]), &connector)
                .unwrap();
        let err = provider.get_certificates().await.unwrap_err();
        assert_eq!(err.code(), KEY_VAULT_OPERATION_FAILURE);
        assert!(err.has_code(REFERRER_STORE_FAILURE));
        assert_eq!(err.get_error_reason(), "vault unavailable");
    }

    #[tokio::test]
    async fn test_unparsable_version_fails() {
        let connector = CountingConnector::default();
        let provider =
            KeyVaultProvider::new(options(vec![KeyVaultObject::new("corrupt")]), &connector)
                .unwrap();
        let err = provider.get_certificates().await.unwrap_err();
        assert!(err.has_code(CERT_INVALID));
        assert_eq!(err.plugin_name(), Some(NAME));
    }

    #[test]
    fn test_missing_identity_fails_before_connect() {
        let connector = CountingConnector::default();
        for field in ["vault", "tenant", "client"] {
            let mut opts = options(vec![KeyVaultObject::new("signing")]);
            match field {
                "vault" => opts.vault_uri.clear(),
                "tenant" => opts.tenant_id = "  ".into(),
                _ => opts.client_id.clear(),
            }
            let err = KeyVaultProvider::new(opts, &connector).unwrap_err();
            assert_eq!(err.code(), CONFIG_INVALID);
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_checks_options_type() {
        let factory = KeyVaultProvider::factory(Arc::new(CountingConnector::default()));
        let err = factory(CertProviderOptions::Inline {
            value: String::new(),
        })
        .err()
        .unwrap();
        assert_eq!(err.code(), CONFIG_INVALID);
    }
}
