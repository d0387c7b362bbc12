//! Credentials from a Docker client `config.json`.
//!
//! Reads the `auths` map:
//!
//! ```json
//! { "auths": { "ghcr.io": { "auth": "<base64 user:password>" } } }
//! ```
//!
//! An `identitytoken` entry wins over `auth`. The file is read on every call,
//! so `docker login` changes are picked up without a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use vouch_core::errors::code::{CONFIG_INVALID, DATA_DECODING_FAILURE};
use vouch_core::{ComponentType, Credential, CredentialProvider, Result};

use super::{no_match, normalize_host, wrong_options, CredentialOptions};

pub const NAME: &str = "dockerConfig";

/// Directory override honoured by the Docker CLI.
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

#[derive(Debug, thiserror::Error)]
enum AuthEntryError {
    #[error("auth for '{host}' is not valid base64")]
    Base64 {
        host: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("auth for '{host}' is not in user:password form")]
    Shape { host: String },
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,

    #[serde(default)]
    username: Option<String>,

    #[serde(default)]
    password: Option<String>,

    #[serde(default, rename = "identitytoken")]
    identity_token: Option<String>,
}

impl AuthEntry {
    fn into_credential(self, host: &str) -> std::result::Result<Option<Credential>, AuthEntryError> {
        if let Some(token) = self.identity_token.filter(|t| !t.is_empty()) {
            let mut cred = Credential::identity_token(token);
            cred.username = self.username.unwrap_or_default();
            return Ok(Some(cred));
        }

        if let Some(auth) = self.auth.filter(|a| !a.is_empty()) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(auth.trim())
                .map_err(|source| AuthEntryError::Base64 {
                    host: host.to_string(),
                    source,
                })?;
            let text = String::from_utf8_lossy(&decoded);
            let (user, pass) = text.split_once(':').ok_or_else(|| AuthEntryError::Shape {
                host: host.to_string(),
            })?;
            return Ok(Some(Credential::basic(user, pass)));
        }

        match (self.username, self.password) {
            (Some(user), Some(pass)) => Ok(Some(Credential::basic(user, pass))),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DockerConfigProvider {
    path: PathBuf,
}

impl DockerConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DOCKER_CONFIG_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir).join("config.json"));
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".docker").join("config.json"))
            .ok_or_else(|| {
                CONFIG_INVALID
                    .with_detail("cannot locate the Docker config: no home directory")
                    .with_component_type(ComponentType::AuthProvider)
                    .with_plugin_name(NAME)
                    .with_remediation("set DOCKER_CONFIG or pass an explicit path")
            })
    }

    pub fn create(options: CredentialOptions) -> Result<Arc<dyn CredentialProvider>> {
        match options {
            CredentialOptions::DockerConfig { path } => {
                let path = match path {
                    Some(path) => path,
                    None => Self::default_path()?,
                };
                Ok(Arc::new(Self::new(path)))
            }
            other => Err(wrong_options(NAME, &other)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Option<ConfigFile>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "docker config not present");
                return Ok(None);
            }
            Err(e) => {
                return Err(CONFIG_INVALID
                    .with_detail(format!("failed to read {}", self.path.display()))
                    .with_error(e)
                    .with_component_type(ComponentType::AuthProvider)
                    .with_plugin_name(NAME))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            DATA_DECODING_FAILURE
                .with_detail(format!("{} is not a valid Docker config", self.path.display()))
                .with_error(e)
                .with_component_type(ComponentType::AuthProvider)
                .with_plugin_name(NAME)
        })
    }
}

#[async_trait]
impl CredentialProvider for DockerConfigProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_credential(&self, host: &str) -> Result<Credential> {
        let Some(config) = self.load().await? else {
            return Err(no_match(NAME, host));
        };

        let wanted = normalize_host(host);
        let mut auths = config.auths;
        // An exact key wins; otherwise the first normalised match in key order.
        let key = if auths.contains_key(host) {
            Some(host.to_string())
        } else {
            auths.keys().find(|key| normalize_host(key) == wanted).cloned()
        };
        let entry = key.and_then(|key| auths.remove_entry(&key));

        let Some((key, entry)) = entry else {
            return Err(no_match(NAME, host));
        };

        let credential = entry.into_credential(&key).map_err(|e| {
            DATA_DECODING_FAILURE
                .with_error(e)
                .with_component_type(ComponentType::AuthProvider)
                .with_plugin_name(NAME)
        })?;

        match credential {
            Some(credential) => {
                debug!(host = %wanted, path = %self.path.display(), "resolved docker credential");
                Ok(credential)
            }
            None => Err(no_match(NAME, host)),
        }
    }
}
