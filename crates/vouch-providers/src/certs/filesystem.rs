//! Certificates read from files and directories.
//!
//! Mounted secrets (Kubernetes style) expose every logical file twice: a
//! symlink at the top and the real file under a timestamped directory. Paths
//! are resolved to their real target and de-duplicated, so each certificate is
//! read once. Symlinks to directories (`..data`) are skipped.
//!
//! A path that cannot be stat'ed or resolved is logged and skipped. A file
//! that resolves fine but does not hold a certificate fails the whole call.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use vouch_core::errors::code::{CERT_INVALID, CONFIG_INVALID};
use vouch_core::trust::{CertificateEntry, CertificateMetadata, CertificateProvider};
use vouch_core::{Certificate, ComponentType, Result};

use super::{parse_certificate_bytes, wrong_options, CertProviderOptions};

/// Registered name of this provider.
pub const NAME: &str = "filesystem";

#[derive(Debug, Clone)]
pub struct FilesystemProvider {
    paths: Vec<PathBuf>,
}

impl FilesystemProvider {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(CONFIG_INVALID
                .with_detail("filesystem certificate provider needs at least one path")
                .with_component_type(ComponentType::CertProvider)
                .with_plugin_name(NAME));
        }
        Ok(Self { paths })
    }

    /// Factory registered under [`NAME`].
    pub fn create(options: CertProviderOptions) -> Result<Arc<dyn CertificateProvider>> {
        match options {
            CertProviderOptions::Filesystem { paths } => Ok(Arc::new(Self::new(paths)?)),
            other => Err(wrong_options(NAME, &other)),
        }
    }

    /// Real paths of every certificate file, in walk order, without duplicates.
    pub async fn resolve_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut pending: Vec<PathBuf> = self.paths.iter().rev().cloned().collect();

        while let Some(path) = pending.pop() {
            let meta = match fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable certificate path");
                    continue;
                }
            };

            if meta.is_dir() {
                match read_dir_sorted(&path).await {
                    Ok(children) => pending.extend(children.into_iter().rev()),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable certificate directory");
                    }
                }
                continue;
            }

            let real = match fs::canonicalize(&path).await {
                Ok(real) => real,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unresolvable certificate path");
                    continue;
                }
            };

            if meta.file_type().is_symlink() {
                match fs::metadata(&real).await {
                    Ok(target) if target.is_dir() => {
                        debug!(path = %path.display(), "skipping symlink to directory");
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping dangling symlink");
                        continue;
                    }
                }
            }

            if seen.insert(real.clone()) {
                files.push(real);
            }
        }

        files
    }
}

async fn read_dir_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

async fn read_certificates(path: &Path) -> Result<Vec<Certificate>> {
    let bytes = fs::read(path).await.map_err(|e| {
        CERT_INVALID
            .with_detail(format!("failed to read {}", path.display()))
            .with_error(e)
            .with_component_type(ComponentType::CertProvider)
            .with_plugin_name(NAME)
    })?;

    parse_certificate_bytes(&bytes).map_err(|e| {
        // Remediation is rendered from the root error.
        CERT_INVALID
            .with_detail(format!("{} does not contain a valid certificate", path.display()))
            .with_error(e.with_remediation(
                "remove non-certificate files from the configured certificate paths",
            ))
            .with_component_type(ComponentType::CertProvider)
            .with_plugin_name(NAME)
    })
}

#[async_trait]
impl CertificateProvider for FilesystemProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self
            .get_certificate_entries()
            .await?
            .into_iter()
            .map(|entry| entry.certificate)
            .collect())
    }

    async fn get_certificate_entries(&self) -> Result<Vec<CertificateEntry>> {
        let files = self.resolve_files().await;
        let mut entries = Vec::new();

        for file in &files {
            let source = file.display().to_string();
            for certificate in read_certificates(file).await? {
                entries.push(CertificateEntry {
                    certificate,
                    metadata: CertificateMetadata {
                        source: Some(source.clone()),
                        ..Default::default()
                    },
                });
            }
        }

        info!(
            files = files.len(),
            certificates = entries.len(),
            "loaded certificates from filesystem"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIGNER: &str = include_str!("../../tests/fixtures/signer.pem");
    const CHAIN: &str = include_str!("../../tests/fixtures/chain.pem");

    fn provider(paths: &[&Path]) -> FilesystemProvider {
        FilesystemProvider::new(paths.iter().map(|p| p.to_path_buf()).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_reads_nested_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/signer.pem"), SIGNER).unwrap();
        std::fs::write(dir.path().join("a/b/chain.pem"), CHAIN).unwrap();

        let certs = provider(&[dir.path()]).get_certificates().await.unwrap();
        assert_eq!(certs.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mounted_secret_layout_is_deduplicated() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let real_dir = dir.path().join("..2024_01_01_00_00_00.000000000");
        std::fs::create_dir(&real_dir).unwrap();
        std::fs::write(real_dir.join("tls.crt"), SIGNER).unwrap();
        symlink(&real_dir, dir.path().join("..data")).unwrap();
        symlink(dir.path().join("..data/tls.crt"), dir.path().join("tls.crt")).unwrap();

        let provider = provider(&[dir.path()]);
        let files = provider.resolve_files().await;
        assert_eq!(files.len(), 1);

        let certs = provider.get_certificates().await.unwrap();
        assert_eq!(certs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_path_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("signer.pem"), SIGNER).unwrap();
        let missing = dir.path().join("does-not-exist");

        let certs = provider(&[&missing, dir.path()])
            .get_certificates()
            .await
            .unwrap();
        assert_eq!(certs.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_file_fails_call() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("signer.pem"), SIGNER).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a certificate").unwrap();

        let err = provider(&[dir.path()]).get_certificates().await.unwrap_err();
        assert!(err.has_code(CERT_INVALID));
        assert!(err.to_string().contains("notes.txt"));
        assert!(err
            .to_string()
            .contains("remove non-certificate files from the configured certificate paths"));
    }

    #[tokio::test]
    async fn test_entries_carry_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("signer.pem");
        std::fs::write(&file, SIGNER).unwrap();

        let entries = provider(&[&file]).get_certificate_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0]
            .metadata
            .source
            .as_deref()
            .unwrap()
            .ends_with("signer.pem"));
    }

    #[test]
    fn test_empty_paths_rejected() {
        let err = FilesystemProvider::new(Vec::new()).unwrap_err();
        assert_eq!(err.code(), CONFIG_INVALID);
    }

    #[test]
    fn test_wrong_options_rejected() {
        let err = FilesystemProvider::create(CertProviderOptions::Inline {
            value: String::new(),
        })
        .err()
        .unwrap();
        assert_eq!(err.code(), CONFIG_INVALID);
    }
}
