//! Process-wide catalog of error codes.
//!
//! Every failure reported by Vouch carries an [`ErrorCode`]. Built-in codes live
//! in a reserved range below [`FIRST_DYNAMIC_CODE`]; components that need their
//! own identifiers register them at startup with [`register`] and receive the
//! next free code.
//!
//! Numeric codes are only meaningful inside one running process. The
//! `UPPER_SNAKE` value string is the stable identifier.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use serde::Serialize;

use super::{ComponentType, Error};
use crate::registry::StartupError;

/// First code handed out by [`register`]. Everything below is reserved.
pub const FIRST_DYNAMIC_CODE: u32 = 1000;

/// Group name used for the built-in descriptors.
pub const BUILTIN_GROUP: &str = "vouch";

/// Opaque, process-assigned error identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(u32);

/// Immutable description of a registered code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    pub code: ErrorCode,
    /// Unique `UPPER_SNAKE` identifier.
    pub value: String,
    /// Short human-readable message.
    pub message: String,
    /// Longer explanation used for documentation.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
}

impl ErrorDescriptor {
    /// Start a descriptor for registration. The code is assigned by the catalog.
    pub fn new(
        value: impl Into<String>,
        message: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode(0),
            value: value.into(),
            message: message.into(),
            description: description.into(),
            component_type: None,
            plugin_name: None,
        }
    }

    pub fn with_component_type(mut self, component: ComponentType) -> Self {
        self.component_type = Some(component);
        self
    }

    pub fn with_plugin_name(mut self, plugin: impl Into<String>) -> Self {
        self.plugin_name = Some(plugin.into());
        self
    }
}

impl ErrorCode {
    /// Raw numeric value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Descriptor for this code. Unknown codes resolve to the `UNKNOWN` descriptor.
    pub fn descriptor(self) -> Arc<ErrorDescriptor> {
        catalog().descriptor(self)
    }

    /// The `UPPER_SNAKE` identifier.
    pub fn value(self) -> String {
        self.descriptor().value.clone()
    }

    pub fn message(self) -> String {
        self.descriptor().message.clone()
    }

    pub fn description(self) -> String {
        self.descriptor().description.clone()
    }

    /// Create a structured error carrying this code.
    pub fn error(self) -> Error {
        Error::new(self)
    }

    pub fn with_detail(self, detail: impl fmt::Display) -> Error {
        self.error().with_detail(detail)
    }

    pub fn with_error<E>(self, err: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.error().with_error(err)
    }

    pub fn with_component_type(self, component: ComponentType) -> Error {
        self.error().with_component_type(component)
    }

    pub fn with_remediation(self, remediation: impl Into<String>) -> Error {
        self.error().with_remediation(remediation)
    }

    pub fn with_plugin_name(self, plugin: impl Into<String>) -> Error {
        self.error().with_plugin_name(plugin)
    }
}

impl fmt::Display for ErrorCode {
    /// Lower-cased value with underscores replaced by spaces (`cache not set`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value().to_lowercase().replace('_', " ");
        f.write_str(&value)
    }
}

// ==================== Catalog ====================

/// Registry of error descriptors, keyed by code and by value string.
#[derive(Debug)]
pub struct ErrorCatalog {
    inner: Mutex<CatalogInner>,
    unknown: Arc<ErrorDescriptor>,
}

#[derive(Debug)]
struct CatalogInner {
    next_code: u32,
    by_code: HashMap<ErrorCode, Arc<ErrorDescriptor>>,
    by_value: HashMap<String, ErrorCode>,
    groups: BTreeMap<String, Vec<ErrorCode>>,
}

static CATALOG: Lazy<ErrorCatalog> = Lazy::new(ErrorCatalog::with_builtins);

/// The process-wide catalog.
pub fn catalog() -> &'static ErrorCatalog {
    &CATALOG
}

/// Register a new code in the process-wide catalog, aborting on collision.
///
/// Collisions mean two components picked the same identifier at build time;
/// the process cannot continue safely.
pub fn register(group: &str, descriptor: ErrorDescriptor) -> ErrorCode {
    catalog()
        .try_register(group, descriptor)
        .unwrap_or_else(|e| e.abort())
}

impl ErrorCatalog {
    fn empty() -> Self {
        let unknown = builtin_descriptor(&BUILTINS[0]);
        Self {
            inner: Mutex::new(CatalogInner {
                next_code: FIRST_DYNAMIC_CODE,
                by_code: HashMap::new(),
                by_value: HashMap::new(),
                groups: BTreeMap::new(),
            }),
            unknown: Arc::new(unknown),
        }
    }

    /// A catalog seeded with the built-in codes.
    pub fn with_builtins() -> Self {
        let catalog = Self::empty();
        {
            let mut inner = catalog.lock();
            for builtin in BUILTINS {
                let descriptor = builtin_descriptor(builtin);
                inner.insert(BUILTIN_GROUP, descriptor);
            }
        }
        catalog
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next free code to `descriptor` and store it under `group`.
    pub fn try_register(
        &self,
        group: &str,
        mut descriptor: ErrorDescriptor,
    ) -> Result<ErrorCode, StartupError> {
        let mut inner = self.lock();

        if inner.by_value.contains_key(&descriptor.value) {
            return Err(StartupError::DuplicateErrorValue {
                value: descriptor.value,
            });
        }
        let code = ErrorCode(inner.next_code);
        if inner.by_code.contains_key(&code) {
            return Err(StartupError::DuplicateErrorCode { code: code.0 });
        }

        descriptor.code = code;
        inner.next_code += 1;
        tracing::debug!(group, value = %descriptor.value, code = code.0, "registered error code");
        inner.insert(group, descriptor);
        Ok(code)
    }

    /// Descriptor for `code`, or the `UNKNOWN` descriptor.
    pub fn descriptor(&self, code: ErrorCode) -> Arc<ErrorDescriptor> {
        self.lock()
            .by_code
            .get(&code)
            .cloned()
            .unwrap_or_else(|| self.unknown.clone())
    }

    /// Look a code up by its value string.
    pub fn lookup(&self, value: &str) -> Option<ErrorCode> {
        self.lock().by_value.get(value).copied()
    }

    /// Descriptors registered under `group`, in registration order.
    pub fn group(&self, group: &str) -> Vec<Arc<ErrorDescriptor>> {
        let inner = self.lock();
        inner
            .groups
            .get(group)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| inner.by_code.get(code).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All descriptors, sorted by code.
    pub fn descriptors(&self) -> Vec<Arc<ErrorDescriptor>> {
        let inner = self.lock();
        let mut all: Vec<_> = inner.by_code.values().cloned().collect();
        all.sort_by_key(|d| d.code);
        all
    }
}

impl CatalogInner {
    fn insert(&mut self, group: &str, descriptor: ErrorDescriptor) {
        let code = descriptor.code;
        self.by_value.insert(descriptor.value.clone(), code);
        self.by_code.insert(code, Arc::new(descriptor));
        self.groups.entry(group.to_string()).or_default().push(code);
    }
}

// ==================== Built-in codes ====================

struct Builtin {
    code: ErrorCode,
    value: &'static str,
    message: &'static str,
    description: &'static str,
    component: Option<ComponentType>,
}

fn builtin_descriptor(builtin: &Builtin) -> ErrorDescriptor {
    ErrorDescriptor {
        code: builtin.code,
        value: builtin.value.to_string(),
        message: builtin.message.to_string(),
        description: builtin.description.to_string(),
        component_type: builtin.component,
        plugin_name: None,
    }
}

macro_rules! builtin_codes {
    ($( $(#[$doc:meta])* $name:ident = $code:literal, $value:literal, $component:expr, $message:literal, $description:literal; )*) => {
        $(
            $(#[$doc])*
            pub const $name: ErrorCode = ErrorCode($code);
        )*

        const BUILTINS: &[Builtin] = &[
            $(
                Builtin {
                    code: $name,
                    value: $value,
                    message: $message,
                    description: $description,
                    component: $component,
                },
            )*
        ];
    };
}

builtin_codes! {
    /// Catch-all; also the descriptor returned for unregistered codes.
    UNKNOWN = 0, "UNKNOWN", None,
        "unknown error",
        "Generic error returned when the failure has no more specific classification.";
    EXECUTOR_FAILURE = 1, "EXECUTOR_FAILURE", Some(ComponentType::Executor),
        "executor failure",
        "The verification orchestrator could not complete the request.";
    CONFIG_INVALID = 2, "CONFIG_INVALID", None,
        "configuration is invalid",
        "A required setting is missing or has an invalid value.";
    ENV_NOT_SET = 3, "ENV_NOT_SET", None,
        "required environment variable not set",
        "An environment variable required by a component is not set.";
    PROVIDER_NOT_FOUND = 10, "PROVIDER_NOT_FOUND", None,
        "provider not found",
        "No provider is registered under the requested name for this provider family.";
    PLUGIN_INIT_FAILURE = 11, "PLUGIN_INIT_FAILURE", None,
        "plugin initialization failed",
        "A registered provider failed to construct an instance from its options.";
    PLUGIN_NOT_FOUND = 12, "PLUGIN_NOT_FOUND", None,
        "plugin not found",
        "The named plugin is not available to the engine.";
    VERIFY_PLUGIN_FAILURE = 13, "VERIFY_PLUGIN_FAILURE", Some(ComponentType::Verifier),
        "verify plugin failure",
        "A verifier failed while evaluating an artifact.";
    REFERRER_STORE_FAILURE = 20, "REFERRER_STORE_FAILURE", Some(ComponentType::ReferrerStore),
        "referrer store failure",
        "The artifact-graph store reported a failure.";
    LIST_REFERRERS_FAILURE = 21, "LIST_REFERRERS_FAILURE", Some(ComponentType::ReferrerStore),
        "failed to list referrers",
        "Referrers attached to the subject could not be enumerated.";
    GET_BLOB_CONTENT_FAILURE = 22, "GET_BLOB_CONTENT_FAILURE", Some(ComponentType::ReferrerStore),
        "failed to get blob content",
        "Raw content for the requested descriptor could not be fetched.";
    GET_SUBJECT_DESCRIPTOR_FAILURE = 23, "GET_SUBJECT_DESCRIPTOR_FAILURE", Some(ComponentType::ReferrerStore),
        "failed to resolve subject descriptor",
        "The subject reference could not be resolved to a content-addressed descriptor.";
    GET_REFERENCE_MANIFEST_FAILURE = 24, "GET_REFERENCE_MANIFEST_FAILURE", Some(ComponentType::ReferrerStore),
        "failed to get reference manifest",
        "The manifest for a referrer could not be resolved.";
    REFERRERS_NOT_FOUND = 25, "REFERRERS_NOT_FOUND", Some(ComponentType::ReferrerStore),
        "no referrers found",
        "The subject has no referrers matching the requested artifact types.";
    MANIFEST_INVALID = 26, "MANIFEST_INVALID", Some(ComponentType::ReferrerStore),
        "manifest is invalid",
        "A manifest could not be decoded or failed validation.";
    REFERENCE_INVALID = 27, "REFERENCE_INVALID", None,
        "reference is invalid",
        "The artifact reference or digest is malformed.";
    CACHE_NOT_SET = 30, "CACHE_NOT_SET", Some(ComponentType::Cache),
        "cache not set",
        "No result cache has been created yet.";
    CACHE_FAILURE = 31, "CACHE_FAILURE", Some(ComponentType::Cache),
        "cache operation failed",
        "The result cache could not store or decode a value.";
    AUTH_DENIED = 40, "AUTH_DENIED", Some(ComponentType::AuthProvider),
        "authentication denied",
        "The credential provider refused or failed to produce credentials.";
    NO_MATCHING_CREDENTIAL = 41, "NO_MATCHING_CREDENTIAL", Some(ComponentType::AuthProvider),
        "no matching credential",
        "No credential is configured for the requested host.";
    DATA_ENCODING_FAILURE = 50, "DATA_ENCODING_FAILURE", None,
        "data encoding failure",
        "A value could not be encoded.";
    DATA_DECODING_FAILURE = 51, "DATA_DECODING_FAILURE", None,
        "data decoding failure",
        "A value could not be decoded.";
    CERT_INVALID = 60, "CERT_INVALID", Some(ComponentType::CertProvider),
        "certificate is invalid",
        "Trust material could not be decoded or parsed as an X.509 certificate.";
    CERT_NOT_FOUND = 61, "CERT_NOT_FOUND", Some(ComponentType::CertProvider),
        "no certificates found",
        "The trust-material source did not contain any certificate.";
    KEY_VAULT_OPERATION_FAILURE = 62, "KEY_VAULT_OPERATION_FAILURE", Some(ComponentType::KeyManagementProvider),
        "key vault operation failed",
        "The backing secret store failed to list or fetch certificate versions.";
    POLICY_INVALID = 70, "POLICY_INVALID", Some(ComponentType::PolicyProvider),
        "policy is invalid",
        "The policy document is empty or cannot be parsed in its declared language.";
    POLICY_EVALUATION_FAILURE = 71, "POLICY_EVALUATION_FAILURE", Some(ComponentType::Policy),
        "policy evaluation failed",
        "The policy could not be evaluated against the verification report.";
    OPERATION_CANCELLED = 80, "OPERATION_CANCELLED", None,
        "operation cancelled",
        "The operation was cancelled or exceeded its deadline.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_descriptor_lookup() {
        let catalog = ErrorCatalog::with_builtins();
        let descriptor = catalog.descriptor(CACHE_NOT_SET);
        assert_eq!(descriptor.value, "CACHE_NOT_SET");
        assert_eq!(descriptor.component_type, Some(ComponentType::Cache));
        assert_eq!(catalog.lookup("REFERENCE_INVALID"), Some(REFERENCE_INVALID));
    }

    #[test]
    fn test_register_returns_submitted_fields() {
        let catalog = ErrorCatalog::with_builtins();
        let code = catalog
            .try_register(
                "notation",
                ErrorDescriptor::new("SIGNATURE_EXPIRED", "signature expired", "The signature is past its validity window.")
                    .with_component_type(ComponentType::Verifier)
                    .with_plugin_name("notation"),
            )
            .unwrap();

        assert!(code.as_u32() >= FIRST_DYNAMIC_CODE);
        let descriptor = catalog.descriptor(code);
        assert_eq!(descriptor.code, code);
        assert_eq!(descriptor.value, "SIGNATURE_EXPIRED");
        assert_eq!(descriptor.message, "signature expired");
        assert_eq!(descriptor.description, "The signature is past its validity window.");
        assert_eq!(descriptor.component_type, Some(ComponentType::Verifier));
        assert_eq!(descriptor.plugin_name.as_deref(), Some("notation"));
    }

    #[test]
    fn test_codes_are_monotonic() {
        let catalog = ErrorCatalog::with_builtins();
        let first = catalog
            .try_register("g", ErrorDescriptor::new("FIRST_ONE", "a", "a"))
            .unwrap();
        let second = catalog
            .try_register("g", ErrorDescriptor::new("SECOND_ONE", "b", "b"))
            .unwrap();
        assert_eq!(second.as_u32(), first.as_u32() + 1);
        assert_eq!(catalog.group("g").len(), 2);
    }

    #[test]
    fn test_duplicate_value_rejected() {
        let catalog = ErrorCatalog::with_builtins();
        catalog
            .try_register("g", ErrorDescriptor::new("DUPLICATED", "a", "a"))
            .unwrap();
        let err = catalog
            .try_register("other", ErrorDescriptor::new("DUPLICATED", "b", "b"))
            .unwrap_err();
        assert!(matches!(err, StartupError::DuplicateErrorValue { .. }));

        let err = catalog
            .try_register("g", ErrorDescriptor::new("CACHE_NOT_SET", "c", "c"))
            .unwrap_err();
        assert!(matches!(err, StartupError::DuplicateErrorValue { .. }));
    }

    #[test]
    fn test_unknown_code_resolves_to_unknown_descriptor() {
        let catalog = ErrorCatalog::with_builtins();
        let descriptor = catalog.descriptor(ErrorCode(999_999));
        assert_eq!(descriptor.value, "UNKNOWN");
    }

    #[test]
    fn test_code_display_is_lowercase_words() {
        assert_eq!(CACHE_NOT_SET.to_string(), "cache not set");
        assert_eq!(VERIFY_PLUGIN_FAILURE.value(), "VERIFY_PLUGIN_FAILURE");
    }

    #[test]
    fn test_builtin_group_sorted_listing() {
        let catalog = ErrorCatalog::with_builtins();
        let builtins = catalog.group(BUILTIN_GROUP);
        assert_eq!(builtins.len(), BUILTINS.len());
        let all = catalog.descriptors();
        assert!(all.windows(2).all(|w| w[0].code < w[1].code));
    }
}
