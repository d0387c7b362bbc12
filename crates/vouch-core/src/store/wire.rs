//! Wire schema for out-of-process graph stores.
//!
//! Requests and responses are JSON objects tagged by `method`. Blob bytes are
//! standard base64. Any transport (stdio, HTTP, a socket) can host a store by
//! decoding a [`StoreRequest`], passing it to [`dispatch`] and encoding the
//! [`StoreResponse`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::types::{BlobContent, Descriptor, ListReferrersPage, ReferenceManifest, StoreConfiguration};
use super::ReferrerStore;
use crate::errors::code::{catalog, DATA_DECODING_FAILURE, DATA_ENCODING_FAILURE, UNKNOWN};
use crate::errors::{ComponentType, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreRequest {
    ListReferrers {
        subject: Descriptor,
        #[serde(default)]
        artifact_types: Vec<String>,
        #[serde(default)]
        configuration: StoreConfiguration,
    },
    GetBlobContent {
        artifact: Descriptor,
        #[serde(default)]
        configuration: StoreConfiguration,
    },
    GetSubjectDescriptor {
        path: String,
        #[serde(default)]
        configuration: StoreConfiguration,
    },
    GetReferenceManifest {
        subject_path: String,
        referrer: Descriptor,
        #[serde(default)]
        configuration: StoreConfiguration,
    },
}

impl StoreRequest {
    pub fn method(&self) -> &'static str {
        match self {
            StoreRequest::ListReferrers { .. } => "listReferrers",
            StoreRequest::GetBlobContent { .. } => "getBlobContent",
            StoreRequest::GetSubjectDescriptor { .. } => "getSubjectDescriptor",
            StoreRequest::GetReferenceManifest { .. } => "getReferenceManifest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreResponse {
    ListReferrers(ListReferrersPage),
    GetBlobContent {
        artifact: Descriptor,
        #[serde(with = "base64_blobs")]
        contents: Vec<Vec<u8>>,
    },
    GetSubjectDescriptor {
        descriptor: Descriptor,
    },
    GetReferenceManifest {
        manifest: ReferenceManifest,
    },
    Error(WireError),
}

/// Structured error carried across the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    /// Stable UPPER_SNAKE error value.
    pub code: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
}

impl From<&Error> for WireError {
    fn from(err: &Error) -> Self {
        let (root, _) = err.root();
        Self {
            code: root.code().value(),
            reason: err.get_error_reason(),
            remediation: root.remediation().map(str::to_string),
            plugin_name: err.plugin_name().map(str::to_string),
        }
    }
}

impl From<WireError> for Error {
    /// Codes unknown to this process map to UNKNOWN.
    fn from(wire: WireError) -> Self {
        let code = catalog().lookup(&wire.code).unwrap_or(UNKNOWN);
        let mut err = Error::new(code)
            .with_detail(wire.reason)
            .with_component_type(ComponentType::ReferrerStore);
        if let Some(remediation) = wire.remediation {
            err = err.with_remediation(remediation);
        }
        if let Some(plugin) = wire.plugin_name {
            err = err.with_plugin_name(plugin);
        }
        err
    }
}

impl StoreResponse {
    /// The error carried by this response, if any.
    pub fn into_error(self) -> Option<Error> {
        match self {
            StoreResponse::Error(wire) => Some(wire.into()),
            _ => None,
        }
    }
}

/// Run one request against `store`. Failures become [`StoreResponse::Error`].
pub async fn dispatch(store: &dyn ReferrerStore, request: StoreRequest) -> StoreResponse {
    let result = match request {
        StoreRequest::ListReferrers {
            subject,
            artifact_types,
            configuration,
        } => store
            .list_referrers(&subject, &artifact_types, &configuration)
            .await
            .map(StoreResponse::ListReferrers),
        StoreRequest::GetBlobContent {
            artifact,
            configuration,
        } => store
            .get_blob_content(&artifact, &configuration)
            .await
            .map(|BlobContent { artifact, contents }| StoreResponse::GetBlobContent {
                artifact,
                contents,
            }),
        StoreRequest::GetSubjectDescriptor {
            path,
            configuration,
        } => store
            .get_subject_descriptor(&path, &configuration)
            .await
            .map(|descriptor| StoreResponse::GetSubjectDescriptor { descriptor }),
        StoreRequest::GetReferenceManifest {
            subject_path,
            referrer,
            configuration,
        } => store
            .get_reference_manifest(&subject_path, &referrer, &configuration)
            .await
            .map(|manifest| StoreResponse::GetReferenceManifest { manifest }),
    };

    result.unwrap_or_else(|err| StoreResponse::Error(WireError::from(&err)))
}

/// Decode a JSON request, dispatch it and encode the JSON response.
pub async fn dispatch_json(store: &dyn ReferrerStore, body: &[u8]) -> Result<Vec<u8>> {
    let request: StoreRequest = serde_json::from_slice(body).map_err(|e| {
        DATA_DECODING_FAILURE
            .with_error(e)
            .with_component_type(ComponentType::ReferrerStore)
            .with_plugin_name(store.name())
    })?;
    let response = dispatch(store, request).await;
    serde_json::to_vec(&response).map_err(|e| {
        DATA_ENCODING_FAILURE
            .with_error(e)
            .with_component_type(ComponentType::ReferrerStore)
            .with_plugin_name(store.name())
    })
}

mod base64_blobs {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(blobs: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(blobs.iter().map(|blob| STANDARD.encode(blob)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .collect()
    }
}
