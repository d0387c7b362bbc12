//! Core contracts for the Vouch artifact verification engine.
//!
//! This crate defines what a pluggable component must look like and how every
//! operation fails, without depending on any one implementation:
//!
//! - Structured error taxonomy with a process-wide code catalog
//! - Name → factory registries, one per provider family
//! - Result cache contract and key namespace
//! - Trust-material, policy and credential provider contracts
//! - Artifact-graph store protocol, data model and wire schema
//!
//! Implementations live in `vouch-providers`.
//!
//! # Quick Start
//!
//! ```
//! use vouch_core::errors::code::REFERENCE_INVALID;
//! use vouch_core::store::SubjectReference;
//!
//! let err = SubjectReference::parse("app@sha256:nope").unwrap_err();
//! assert_eq!(err.code(), REFERENCE_INVALID);
//! assert!(err.get_concise_error(24).unwrap().ends_with("..."));
//! ```
//!
//! # Errors
//!
//! Every public operation returns [`Result`]. Render the full chain with
//! `to_string()` for logs, or [`Error::get_concise_error`] where space is
//! limited. The `UPPER_SNAKE` value of a code is its only stable identifier;
//! numeric codes are assigned per process.

pub mod cache;
pub mod credentials;
pub mod deadline;
pub mod errors;
pub mod policy;
pub mod registry;
pub mod store;
pub mod trust;

// Re-export main types
pub use cache::{CacheConfig, CacheKey, ResultCache, ResultCacheExt};
pub use credentials::{Credential, CredentialProvider};
pub use deadline::with_deadline;
pub use errors::{ComponentType, Error, ErrorCode, ErrorDescriptor, Result};
pub use policy::{PolicyEngine, PolicyEngineConfig, PolicyInput, PolicyQuery};
pub use registry::{CurrentRegistry, Factory, Registry, StartupError};
pub use store::{
    list_all_referrers, referrer_pages, BlobContent, Descriptor, ListReferrersPage,
    ReferenceManifest, Referrer, ReferrerStore, StoreConfiguration, SubjectReference,
};
pub use trust::{CertificateEntry, CertificateMetadata, CertificateProvider};

/// X.509 certificate type handed out by trust-material providers.
pub use x509_cert::Certificate;
