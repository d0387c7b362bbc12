//! Cache key namespaces.

use std::fmt;

/// Kinds of results kept in the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SubjectDescriptor,
    ListReferrers,
    VerifyHandler,
    Credential,
}

impl CacheKey {
    pub fn prefix(self) -> &'static str {
        match self {
            CacheKey::SubjectDescriptor => "cache_vouch_subject_descriptor_",
            CacheKey::ListReferrers => "cache_vouch_list_referrers_",
            CacheKey::VerifyHandler => "cache_vouch_verify_handler_",
            CacheKey::Credential => "cache_vouch_credential_",
        }
    }

    /// Full key for `id` in this namespace.
    pub fn key(self, id: &str) -> String {
        format!("{}{}", self.prefix(), id)
    }

    /// Key made of several parts joined by `/`.
    pub fn key_of(self, parts: &[&str]) -> String {
        self.key(&parts.join("/"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('_'))
    }
}
