//! In-process graph store.
//!
//! Holds blobs, manifests and tags in memory. Every blob is addressed by the
//! sha256 of its bytes and checked on insert. Paging tokens are plain offsets
//! into the filtered referrer list, so no state is kept between calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use vouch_core::errors::code::{
    DATA_ENCODING_FAILURE, GET_BLOB_CONTENT_FAILURE, GET_REFERENCE_MANIFEST_FAILURE,
    GET_SUBJECT_DESCRIPTOR_FAILURE, LIST_REFERRERS_FAILURE, REFERENCE_INVALID,
};
use vouch_core::store::{
    BlobContent, Descriptor, ListReferrersPage, ReferenceManifest, Referrer, ReferrerStore,
    StoreConfiguration, SubjectReference,
};
use vouch_core::{ComponentType, Error, Result};

use super::StoreOptions;

/// Registered name of this store.
pub const NAME: &str = "memory";

/// Page size used when neither the options nor the call set one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Media type of manifests created by [`MemoryStore::attach`].
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Tag used when a reference carries neither tag nor digest.
const DEFAULT_TAG: &str = "latest";

#[derive(Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    manifests: HashMap<String, ReferenceManifest>,
    /// `repository:tag` → digest.
    tags: HashMap<String, String>,
    /// digest → subject descriptor.
    subjects: HashMap<String, Descriptor>,
    /// subject digest → referrers, in attach order.
    referrers: HashMap<String, Vec<Referrer>>,
}

pub struct MemoryStore {
    name: String,
    page_size: usize,
    state: RwLock<State>,
}

/// Manifest body hashed to produce a referrer's digest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestBody<'a> {
    schema_version: u32,
    media_type: &'a str,
    artifact_type: &'a str,
    layers: &'a [Descriptor],
    subject: &'a Descriptor,
    annotations: &'a BTreeMap<String, String>,
}

pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

impl MemoryStore {
    pub fn new(options: &StoreOptions) -> Self {
        Self {
            name: options.name.clone(),
            page_size: options.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE),
            state: RwLock::new(State::default()),
        }
    }

    /// Factory registered under [`NAME`].
    pub fn create(options: StoreOptions) -> Result<Arc<dyn ReferrerStore>> {
        Ok(Arc::new(Self::new(&options)))
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `bytes` and return their descriptor.
    pub fn push_blob(&self, media_type: &str, bytes: Vec<u8>) -> Descriptor {
        let descriptor = Descriptor::new(media_type, sha256_digest(&bytes), bytes.len() as u64);
        self.write().blobs.insert(descriptor.digest.clone(), bytes);
        descriptor
    }

    /// Store `bytes` under a digest the caller already knows; rejects mismatches.
    pub fn push_verified_blob(&self, descriptor: &Descriptor, bytes: Vec<u8>) -> Result<()> {
        let actual = sha256_digest(&bytes);
        if actual != descriptor.digest || bytes.len() as u64 != descriptor.size {
            return Err(REFERENCE_INVALID
                .with_detail(format!(
                    "content does not match descriptor {} (computed {}, {} bytes)",
                    descriptor.digest,
                    actual,
                    bytes.len()
                ))
                .with_component_type(ComponentType::ReferrerStore)
                .with_plugin_name(self.name.clone()));
        }
        self.write().blobs.insert(actual, bytes);
        Ok(())
    }

    /// Store a subject artifact and point `repository:tag` at it.
    pub fn push_subject(&self, repository: &str, tag: &str, media_type: &str, bytes: Vec<u8>) -> Descriptor {
        let descriptor = self.push_blob(media_type, bytes);
        let mut state = self.write();
        state
            .tags
            .insert(format!("{}:{}", repository, tag), descriptor.digest.clone());
        state
            .subjects
            .insert(descriptor.digest.clone(), descriptor.clone());
        descriptor
    }

    /// Attach an artifact to `subject`: stores the blobs and a manifest for them.
    pub fn attach(
        &self,
        subject: &Descriptor,
        artifact_type: &str,
        blobs: Vec<(String, Vec<u8>)>,
        annotations: BTreeMap<String, String>,
    ) -> Result<Referrer> {
        let layers: Vec<Descriptor> = blobs
            .into_iter()
            .map(|(media_type, bytes)| self.push_blob(&media_type, bytes))
            .collect();

        let body = serde_json::to_vec(&ManifestBody {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE,
            artifact_type,
            layers: &layers,
            subject,
            annotations: &annotations,
        })
        .map_err(|e| {
            DATA_ENCODING_FAILURE
                .with_error(e)
                .with_component_type(ComponentType::ReferrerStore)
                .with_plugin_name(self.name.clone())
        })?;

        let mut descriptor = self.push_blob(MANIFEST_MEDIA_TYPE, body);
        descriptor.annotations = annotations.clone();

        let manifest = ReferenceManifest {
            descriptor: descriptor.clone(),
            artifact_type: artifact_type.to_string(),
            blobs: layers,
            subject: Some(subject.clone()),
            annotations,
        };
        let referrer = Referrer::new(descriptor, artifact_type);

        let mut state = self.write();
        state
            .manifests
            .insert(referrer.digest().to_string(), manifest);
        state
            .referrers
            .entry(subject.digest.clone())
            .or_default()
            .push(referrer.clone());

        debug!(
            store = %self.name,
            subject = %subject.digest,
            referrer = %referrer.digest(),
            artifact_type,
            "attached referrer"
        );
        Ok(referrer)
    }

    fn failure(&self, code: vouch_core::ErrorCode, detail: String) -> Error {
        code.with_detail(detail)
            .with_component_type(ComponentType::ReferrerStore)
            .with_plugin_name(self.name.clone())
    }
}

#[async_trait]
impl ReferrerStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_referrers(
        &self,
        subject: &Descriptor,
        artifact_types: &[String],
        config: &StoreConfiguration,
    ) -> Result<ListReferrersPage> {
        let offset = match config.next_token() {
            Some(token) => token.parse::<usize>().map_err(|_| {
                self.failure(
                    LIST_REFERRERS_FAILURE,
                    format!("paging token '{}' is not valid for this store", token),
                )
            })?,
            None => 0,
        };
        let page_size = config.page_size().unwrap_or(self.page_size);

        let state = self.read();
        let matching: Vec<&Referrer> = state
            .referrers
            .get(&subject.digest)
            .map(|all| {
                all.iter()
                    .filter(|r| artifact_types.is_empty() || artifact_types.contains(&r.artifact_type))
                    .collect()
            })
            .unwrap_or_default();

        if offset > matching.len() {
            return Err(self.failure(
                LIST_REFERRERS_FAILURE,
                format!("paging token '{}' is past the end of the referrer list", offset),
            ));
        }

        let end = offset.saturating_add(page_size).min(matching.len());
        let referrers = matching[offset..end].iter().map(|r| (*r).clone()).collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(ListReferrersPage {
            subject: subject.clone(),
            referrers,
            next_token,
        })
    }

    async fn get_blob_content(
        &self,
        artifact: &Descriptor,
        _config: &StoreConfiguration,
    ) -> Result<BlobContent> {
        let contents = self.read().blobs.get(&artifact.digest).cloned();
        match contents {
            Some(bytes) => Ok(BlobContent {
                artifact: artifact.clone(),
                contents: vec![bytes],
            }),
            None => Err(self.failure(
                GET_BLOB_CONTENT_FAILURE,
                format!("blob {} not found", artifact.digest),
            )),
        }
    }

    async fn get_subject_descriptor(
        &self,
        path: &str,
        _config: &StoreConfiguration,
    ) -> Result<Descriptor> {
        let reference = SubjectReference::parse(path).map_err(|e| e.with_plugin_name(self.name.clone()))?;
        let state = self.read();

        let digest = match &reference.digest {
            Some(digest) => Some(digest.clone()),
            None => {
                let tag = reference.tag.as_deref().unwrap_or(DEFAULT_TAG);
                state
                    .tags
                    .get(&format!("{}:{}", reference.repository, tag))
                    .cloned()
            }
        };

        digest
            .and_then(|d| state.subjects.get(&d).cloned())
            .ok_or_else(|| {
                self.failure(
                    GET_SUBJECT_DESCRIPTOR_FAILURE,
                    format!("subject {} not found", reference),
                )
            })
    }

    async fn get_reference_manifest(
        &self,
        subject_path: &str,
        referrer: &Descriptor,
        _config: &StoreConfiguration,
    ) -> Result<ReferenceManifest> {
        SubjectReference::parse(subject_path).map_err(|e| e.with_plugin_name(self.name.clone()))?;
        self.read()
            .manifests
            .get(&referrer.digest)
            .cloned()
            .ok_or_else(|| {
                self.failure(
                    GET_REFERENCE_MANIFEST_FAILURE,
                    format!("manifest {} not found", referrer.digest),
                )
            })
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .field("blobs", &state.blobs.len())
            .field("subjects", &state.subjects.len())
            .finish()
    }
}
