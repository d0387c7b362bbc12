//! Credentials fixed in configuration, keyed by registry host.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use vouch_core::{Credential, CredentialProvider, Result};

use super::{no_match, normalize_host, wrong_options, CredentialOptions};

pub const NAME: &str = "static";

/// Credentials fixed at configuration time.
#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, Credential>,
}

impl StaticCredentialProvider {
    pub fn new<I, K>(credentials: I) -> Self
    where
        I: IntoIterator<Item = (K, Credential)>,
        K: AsRef<str>,
    {
        Self {
            credentials: credentials
                .into_iter()
                .map(|(host, cred)| (normalize_host(host.as_ref()), cred))
                .collect(),
        }
    }

    pub fn create(options: CredentialOptions) -> Result<Arc<dyn CredentialProvider>> {
        match options {
            CredentialOptions::Static { credentials } => Ok(Arc::new(Self::new(credentials))),
            other => Err(wrong_options(NAME, &other)),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_credential(&self, host: &str) -> Result<Credential> {
        self.credentials
            .get(&normalize_host(host))
            .cloned()
            .ok_or_else(|| no_match(NAME, host))
    }
}
