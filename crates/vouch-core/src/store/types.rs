//! Content-addressed data model shared by graph stores and their callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration key carrying the paging token between calls.
pub const NEXT_TOKEN_KEY: &str = "nextToken";

/// Configuration key carrying the requested page size.
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// Content-addressed reference to a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,

    /// Digest in `algorithm:hex` form.
    pub digest: String,

    pub size: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// A descriptor attached to a subject, classified by artifact type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referrer {
    #[serde(flatten)]
    pub descriptor: Descriptor,

    /// What kind of artifact this is (signature, attestation, SBOM, ...).
    pub artifact_type: String,
}

impl Referrer {
    pub fn new(descriptor: Descriptor, artifact_type: impl Into<String>) -> Self {
        Self {
            descriptor,
            artifact_type: artifact_type.into(),
        }
    }

    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }
}

/// Fully resolved structure of one referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceManifest {
    /// The manifest's own descriptor.
    pub descriptor: Descriptor,

    pub artifact_type: String,

    /// Blobs (layers) the manifest references.
    #[serde(default)]
    pub blobs: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Raw blob contents for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    pub artifact: Descriptor,
    pub contents: Vec<Vec<u8>>,
}

/// One page of referrers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReferrersPage {
    pub subject: Descriptor,

    #[serde(default)]
    pub referrers: Vec<Referrer>,

    /// Present when more pages exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl ListReferrersPage {
    /// Token for the next page, ignoring empty strings.
    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Opaque, store-specific options passed with every call.
///
/// Stores keep any paging state in here rather than server-side, so every
/// call can be retried on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreConfiguration(Map<String, Value>);

impl StoreConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn next_token(&self) -> Option<&str> {
        self.0
            .get(NEXT_TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn with_next_token(self, token: impl Into<String>) -> Self {
        self.with(NEXT_TOKEN_KEY, Value::String(token.into()))
    }

    /// Copy of this configuration without a paging token.
    pub fn without_next_token(&self) -> Self {
        let mut map = self.0.clone();
        map.remove(NEXT_TOKEN_KEY);
        Self(map)
    }

    pub fn page_size(&self) -> Option<usize> {
        self.0
            .get(PAGE_SIZE_KEY)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for StoreConfiguration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
