//! Registry credential providers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Credential for one registry host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Bearer/refresh token used instead of a password, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            identity_token: None,
            expires_at: None,
        }
    }

    pub fn identity_token(token: impl Into<String>) -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            identity_token: Some(token.into()),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Time left before expiry. `None` if the credential never expires.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) == Some(Duration::ZERO)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field(
                "identity_token",
                &self.identity_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Registered name of this provider.
    fn name(&self) -> &str;

    /// Credential for `host`, or `NO_MATCHING_CREDENTIAL`.
    async fn get_credential(&self, host: &str) -> Result<Credential>;
}
