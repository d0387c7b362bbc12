//! Structured error taxonomy.
//!
//! An [`Error`] is an immutable value: a code from the catalog plus optional
//! detail, remediation, component tag, plugin name and at most one wrapped
//! cause. Every `with_*` call consumes the receiver and returns a new value.
//!
//! # Rendering
//!
//! | Form | Shape |
//! |------|-------|
//! | [`Display`](std::fmt::Display) | `VALUE: detail: ...: remediation: cause` |
//! | [`Error::get_concise_error`] | `VALUE: reason`, truncated with `...` |
//! | [`Error::get_error_reason`] | root detail, cause message or code message |
//!
//! `VALUE` is always taken from the root cause: the innermost structured error
//! in the chain.

pub mod code;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use code::{
    catalog, register, ErrorCatalog, ErrorCode, ErrorDescriptor, BUILTIN_GROUP, FIRST_DYNAMIC_CODE,
};

/// Upper bound on chain depth walked by the rendering helpers.
const MAX_CHAIN_DEPTH: usize = 64;

/// Result type for Vouch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Subsystem an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    Verifier,
    ReferrerStore,
    Policy,
    Executor,
    Cache,
    AuthProvider,
    PolicyProvider,
    CertProvider,
    KeyManagementProvider,
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verifier => "verifier",
            Self::ReferrerStore => "referrerStore",
            Self::Policy => "policy",
            Self::Executor => "executor",
            Self::Cache => "cache",
            Self::AuthProvider => "authProvider",
            Self::PolicyProvider => "policyProvider",
            Self::CertProvider => "certProvider",
            Self::KeyManagementProvider => "keyManagementProvider",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single wrapped cause of an [`Error`].
#[derive(Debug, Clone)]
pub enum Cause {
    /// Another structured error; the chain continues through it.
    Structured(Box<Error>),
    /// Any other error; the chain stops here.
    Foreign(Arc<dyn std::error::Error + Send + Sync>),
}

/// Structured error value.
#[derive(Debug, Clone)]
pub struct Error {
    code: ErrorCode,
    message: String,
    detail: Option<String>,
    cause: Option<Cause>,
    component_type: Option<ComponentType>,
    remediation: Option<String>,
    plugin_name: Option<String>,
    stack: Option<Arc<str>>,
    is_root_error: bool,
}

impl Error {
    /// New error for `code`, message taken from its descriptor.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.message(),
            detail: None,
            cause: None,
            component_type: None,
            remediation: None,
            plugin_name: None,
            stack: None,
            is_root_error: true,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn component_type(&self) -> Option<ComponentType> {
        self.component_type
    }

    pub fn remediation(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin_name.as_deref()
    }

    /// Captured backtrace, if [`Error::with_stack_trace`] was called.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// True when there is no wrapped cause or the cause is not a structured error.
    pub fn is_root_error(&self) -> bool {
        self.is_root_error
    }

    // ==================== Builders ====================

    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// Wrap `err` as the cause. A structured [`Error`] continues the chain;
    /// anything else terminates it.
    pub fn with_error<E>(self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        match boxed.downcast::<Error>() {
            Ok(structured) => self.with_cause(Cause::Structured(structured)),
            Err(foreign) => self.with_cause(Cause::Foreign(Arc::from(foreign))),
        }
    }

    /// Wrap an explicit cause.
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.is_root_error = !matches!(cause, Cause::Structured(_));
        self.cause = Some(cause);
        self
    }

    pub fn with_component_type(mut self, component: ComponentType) -> Self {
        self.component_type = Some(component);
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn with_plugin_name(mut self, plugin: impl Into<String>) -> Self {
        self.plugin_name = Some(plugin.into());
        self
    }

    /// Override the descriptor message.
    pub fn with_description(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Capture the current backtrace. Never included in rendering.
    pub fn with_stack_trace(mut self) -> Self {
        let trace = std::backtrace::Backtrace::force_capture().to_string();
        self.stack = Some(Arc::from(trace));
        self
    }

    // ==================== Chain ====================

    /// Walk to the root cause, collecting the details of every wrapping error.
    ///
    /// Returns the deepest structured error and the details in outer-to-inner
    /// order, including the root's own detail.
    pub fn root(&self) -> (&Error, Vec<&str>) {
        let mut current = self;
        let mut details = Vec::new();
        let mut depth = 0;

        while !current.is_root_error && depth < MAX_CHAIN_DEPTH {
            if let Some(detail) = current.detail.as_deref() {
                details.push(detail);
            }
            match &current.cause {
                Some(Cause::Structured(inner)) => current = inner.as_ref(),
                _ => break,
            }
            depth += 1;
        }

        if let Some(detail) = current.detail.as_deref() {
            details.push(detail);
        }
        (current, details)
    }

    /// Message of the non-structured error that terminates the chain, if any.
    fn foreign_cause(&self) -> Option<String> {
        match &self.cause {
            Some(Cause::Foreign(err)) => Some(err.to_string()),
            _ => None,
        }
    }

    /// Human-readable reason taken from the root cause.
    pub fn get_error_reason(&self) -> String {
        let (root, _) = self.root();
        if let Some(detail) = root.detail.as_deref().filter(|d| !d.is_empty()) {
            return detail.to_string();
        }
        root.foreign_cause().unwrap_or_else(|| root.message.clone())
    }

    /// `VALUE: reason`, truncated to `max_length` characters with a `...` suffix.
    ///
    /// Returns `None` when `max_length < 3`.
    pub fn get_concise_error(&self, max_length: usize) -> Option<String> {
        if max_length < 3 {
            return None;
        }
        let (root, _) = self.root();
        let rendered = format!("{}: {}", root.code.value(), self.get_error_reason());
        if rendered.chars().count() <= max_length {
            return Some(rendered);
        }
        let mut truncated: String = rendered.chars().take(max_length - 3).collect();
        truncated.push_str("...");
        Some(truncated)
    }

    /// Identity comparison: two structured errors match when their codes match.
    pub fn is(&self, target: &Error) -> bool {
        self.code == target.code
    }

    /// True if any structured error in the chain carries `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        let mut current = Some(self);
        let mut depth = 0;
        while let Some(err) = current {
            if err.code == code {
                return true;
            }
            if depth >= MAX_CHAIN_DEPTH {
                break;
            }
            current = match &err.cause {
                Some(Cause::Structured(inner)) => Some(inner.as_ref()),
                _ => None,
            };
            depth += 1;
        }
        false
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (root, details) = self.root();

        let mut segments: Vec<String> = vec![root.code.value()];
        let joined = details
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        if !joined.is_empty() {
            segments.push(joined);
        }
        if let Some(remediation) = root.remediation.as_deref().filter(|r| !r.is_empty()) {
            segments.push(remediation.to_string());
        }
        if let Some(cause) = root.foreign_cause().filter(|c| !c.is_empty()) {
            segments.push(cause);
        }

        f.write_str(&segments.join(": "))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(Cause::Structured(inner)) => Some(inner.as_ref()),
            Some(Cause::Foreign(err)) => Some(err.as_ref()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::code::*;
    use super::*;

    #[derive(Debug)]
    struct DiskFull;

    impl fmt::Display for DiskFull {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk full")
        }
    }

    impl std::error::Error for DiskFull {}

    #[test]
    fn test_plain_error_rendering() {
        let err = CACHE_NOT_SET.error();
        assert_eq!(err.to_string(), "CACHE_NOT_SET");
        assert_eq!(err.get_error_reason(), "cache not set");
        assert!(err.is_root_error());
    }

    #[test]
    fn test_full_rendering_with_foreign_cause() {
        let err = CERT_INVALID
            .with_detail("failed to parse ca.crt")
            .with_remediation("replace the certificate file")
            .with_error(DiskFull);

        assert!(err.is_root_error());
        assert_eq!(
            err.to_string(),
            "CERT_INVALID: failed to parse ca.crt: replace the certificate file: disk full"
        );
    }

    #[test]
    fn test_root_cause_walk_through_wrappers() {
        let root = CERT_INVALID.with_detail("bad pem block");
        let wrapped = VERIFY_PLUGIN_FAILURE
            .with_detail("notation verifier")
            .with_error(root)
            .with_component_type(ComponentType::Verifier)
            .with_plugin_name("notation");

        assert!(!wrapped.is_root_error());
        let (root, details) = wrapped.root();
        assert_eq!(root.code(), CERT_INVALID);
        assert_eq!(details, vec!["notation verifier", "bad pem block"]);
        assert_eq!(
            wrapped.to_string(),
            "CERT_INVALID: notation verifier: bad pem block"
        );
    }

    #[test]
    fn test_reason_ignores_intermediate_decoration() {
        let e1 = CERT_NOT_FOUND.with_detail("no certificates in inline value");
        let e2 = EXECUTOR_FAILURE.with_error(e1.clone());
        let decorated = e2
            .clone()
            .with_detail("layer one")
            .with_remediation("retry")
            .with_plugin_name("inline")
            .with_component_type(ComponentType::Executor);

        assert_eq!(e2.get_error_reason(), e1.get_error_reason());
        assert_eq!(decorated.get_error_reason(), "no certificates in inline value");
    }

    #[test]
    fn test_reason_falls_back_to_foreign_cause_then_message() {
        let err = DATA_DECODING_FAILURE.with_error(DiskFull);
        assert_eq!(err.get_error_reason(), "disk full");

        let err = DATA_DECODING_FAILURE.error();
        assert_eq!(err.get_error_reason(), "data decoding failure");
    }

    #[test]
    fn test_concise_error_truncation() {
        let err = REFERENCE_INVALID.with_detail("x".repeat(100));
        let concise = err.get_concise_error(40).unwrap();
        assert_eq!(concise.chars().count(), 40);
        assert!(concise.ends_with("..."));
        assert!(concise.starts_with("REFERENCE_INVALID: xxx"));

        let short = REFERENCE_INVALID.with_detail("bad tag");
        assert_eq!(
            short.get_concise_error(100).unwrap(),
            "REFERENCE_INVALID: bad tag"
        );
        let exact = short.get_concise_error("REFERENCE_INVALID: bad tag".len()).unwrap();
        assert_eq!(exact, "REFERENCE_INVALID: bad tag");
    }

    #[test]
    fn test_concise_error_rejects_tiny_limit() {
        let err = REFERENCE_INVALID.error();
        assert!(err.get_concise_error(2).is_none());
        assert_eq!(err.get_concise_error(3).unwrap(), "...");
    }

    #[test]
    fn test_is_compares_codes_only() {
        let a = POLICY_INVALID.with_detail("a").with_remediation("x");
        let b = POLICY_INVALID.with_detail("b");
        let c = CACHE_NOT_SET.with_detail("a");
        assert!(a.is(&b));
        assert!(!a.is(&c));
    }

    #[test]
    fn test_has_code_walks_chain() {
        let err = EXECUTOR_FAILURE.with_error(LIST_REFERRERS_FAILURE.with_error(DiskFull));
        assert!(err.has_code(LIST_REFERRERS_FAILURE));
        assert!(err.has_code(EXECUTOR_FAILURE));
        assert!(!err.has_code(CACHE_NOT_SET));
    }

    #[test]
    fn test_with_calls_do_not_mutate_original() {
        let base = CONFIG_INVALID.error();
        let decorated = base.clone().with_detail("missing tenant");
        assert!(base.detail().is_none());
        assert_eq!(decorated.detail(), Some("missing tenant"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let err = EXECUTOR_FAILURE.with_error(CERT_INVALID.with_error(DiskFull));
        let first = err.source().unwrap();
        assert!(first.to_string().starts_with("CERT_INVALID"));
        assert_eq!(first.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn test_stack_not_rendered() {
        let err = UNKNOWN.with_detail("boom").with_stack_trace();
        assert!(err.stack().is_some());
        assert_eq!(err.to_string(), "UNKNOWN: boom");
    }
}
