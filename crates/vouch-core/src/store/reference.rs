//! Subject reference parsing.
//!
//! Supports:
//! - `registry.example.com/app` → repository only
//! - `registry.example.com:5000/app:v1` → repository with tag
//! - `app@sha256:<64 hex>` → repository with pinned digest
//! - `app:v1@sha256:<64 hex>` → both; the digest wins for resolution

use std::fmt;

use crate::errors::code::REFERENCE_INVALID;
use crate::errors::{ComponentType, Result};

/// A parsed subject reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectReference {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl SubjectReference {
    /// Parse a subject reference string.
    ///
    /// # Examples
    ///
    /// ```
    /// use vouch_core::store::SubjectReference;
    ///
    /// let tagged = SubjectReference::parse("registry.local:5000/app:v1").unwrap();
    /// assert_eq!(tagged.repository, "registry.local:5000/app");
    /// assert_eq!(tagged.tag.as_deref(), Some("v1"));
    ///
    /// assert!(SubjectReference::parse("app@sha256:short").is_err());
    /// ```
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(invalid(reference, "empty reference"));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(invalid(reference, "reference contains whitespace"));
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest).map_err(|reason| invalid(reference, reason))?;
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones are ports.
        let last_slash = name.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match name[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name[split + 1..];
                validate_tag(tag).map_err(|reason| invalid(reference, reason))?;
                (&name[..split], Some(tag.to_string()))
            }
            None => (name, None),
        };

        if repository.is_empty() || repository.ends_with('/') || repository.starts_with('/') {
            return Err(invalid(reference, "repository name is required"));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// Whether the reference pins a digest.
    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }
}

impl fmt::Display for SubjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Validate an `algorithm:hex` digest.
pub fn validate_digest(digest: &str) -> std::result::Result<(), &'static str> {
    let (algorithm, hex) = digest
        .split_once(':')
        .ok_or("digest must be in 'algorithm:hex' form")?;
    let expected_len = match algorithm {
        "sha256" => 64,
        "sha512" => 128,
        _ => return Err("digest algorithm must be sha256 or sha512"),
    };
    if hex.len() != expected_len {
        return Err("digest has the wrong length for its algorithm");
    }
    if !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return Err("digest must be lowercase hex");
    }
    Ok(())
}

fn validate_tag(tag: &str) -> std::result::Result<(), &'static str> {
    if tag.is_empty() || tag.len() > 128 {
        return Err("tag must be 1 to 128 characters");
    }
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err("tag contains invalid characters");
    }
    Ok(())
}

fn invalid(reference: &str, reason: &str) -> crate::errors::Error {
    REFERENCE_INVALID
        .with_detail(format!("{}: {}", reason, reference))
        .with_component_type(ComponentType::ReferrerStore)
        .with_remediation("use 'repository:tag' or 'repository@sha256:<digest>'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:4c2f8f5a0b1e3d7c9a6b8e2f1d0c3b5a7e9f2d4c6b8a0e1f3d5c7b9a2e4f6d8c";

    #[test]
    fn test_parse_tag() {
        let r = SubjectReference::parse("app:v1.2").unwrap();
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag.as_deref(), Some("v1.2"));
        assert!(!r.is_pinned());
    }

    #[test]
    fn test_parse_port_is_not_tag() {
        let r = SubjectReference::parse("localhost:5000/team/app").unwrap();
        assert_eq!(r.repository, "localhost:5000/team/app");
        assert_eq!(r.tag, None);
    }

    #[test]
    fn test_parse_digest() {
        let r = SubjectReference::parse(&format!("app@{}", DIGEST)).unwrap();
        assert_eq!(r.repository, "app");
        assert_eq!(r.digest.as_deref(), Some(DIGEST));
        assert!(r.is_pinned());
    }

    #[test]
    fn test_parse_tag_and_digest_round_trips() {
        let input = format!("localhost:5000/app:v1@{}", DIGEST);
        let r = SubjectReference::parse(&input).unwrap();
        assert_eq!(r.tag.as_deref(), Some("v1"));
        assert_eq!(r.to_string(), input);
    }

    #[test]
    fn test_invalid_references() {
        let uppercase = format!("app@{}", DIGEST.to_uppercase());
        for bad in [
            "",
            "   ",
            "app@sha256:abc",
            "app@md5:0000",
            "app:",
            "app:-bad",
            ":v1",
            "a b:v1",
            uppercase.as_str(),
        ] {
            let err = SubjectReference::parse(bad).unwrap_err();
            assert_eq!(err.code(), REFERENCE_INVALID, "input: {:?}", bad);
        }
    }
}
