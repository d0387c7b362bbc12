//! Version selection for key-vault objects.

use vouch_core::errors::code::KEY_VAULT_OPERATION_FAILURE;
use vouch_core::{ComponentType, Result};

use super::KeyVaultObjectVersion;

/// Version pin meaning "newest enabled version".
pub const LATEST: &str = "latest";

/// One version chosen for retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedVersion {
    /// `base` for a single version, `base/<index>` when history is requested.
    pub alias: String,
    pub version: String,
}

/// Choose which versions of an object to fetch.
///
/// Disabled versions are dropped, the rest sorted newest first. Collection
/// starts at the newest version, or at `pinned` when one is given (other than
/// `latest`), and takes up to `depth` versions from there. With `depth <= 1`
/// only the starting version is returned, aliased as `base` itself.
pub fn select_versions(
    base: &str,
    mut versions: Vec<KeyVaultObjectVersion>,
    pinned: Option<&str>,
    depth: u32,
) -> Result<Vec<SelectedVersion>> {
    versions.retain(|v| v.enabled);
    versions.sort_by(|a, b| b.created.cmp(&a.created));

    if versions.is_empty() {
        return Err(KEY_VAULT_OPERATION_FAILURE
            .with_detail(format!("object '{}' has no enabled versions", base))
            .with_component_type(ComponentType::KeyManagementProvider));
    }

    let pinned = pinned
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(LATEST));

    let start = match pinned {
        None => 0,
        Some(pin) => versions
            .iter()
            .position(|v| v.version == pin)
            .ok_or_else(|| {
                KEY_VAULT_OPERATION_FAILURE
                    .with_detail(format!(
                        "version '{}' of object '{}' is missing or disabled",
                        pin, base
                    ))
                    .with_component_type(ComponentType::KeyManagementProvider)
            })?,
    };

    if depth <= 1 {
        return Ok(vec![SelectedVersion {
            alias: base.to_string(),
            version: versions[start].version.clone(),
        }]);
    }

    Ok(versions[start..]
        .iter()
        .take(depth as usize)
        .enumerate()
        .map(|(index, v)| SelectedVersion {
            alias: format!("{}/{}", base, index),
            version: v.version.clone(),
        })
        .collect())
}
