//! Certificates given inline as one PEM string.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vouch_core::trust::{decode_certificates, CertificateProvider};
use vouch_core::{Certificate, Result};

use super::{wrong_options, CertProviderOptions};

/// Registered name of this provider.
pub const NAME: &str = "inline";

/// Holds certificates decoded once, at construction.
#[derive(Debug, Clone)]
pub struct InlineProvider {
    certificates: Vec<Certificate>,
}

impl InlineProvider {
    /// Decode `value`. Fails on any bad block and on an input without certificates.
    pub fn new(value: &str) -> Result<Self> {
        let certificates = decode_certificates(value).map_err(|e| e.with_plugin_name(NAME))?;
        debug!(certificates = certificates.len(), "decoded inline certificates");
        Ok(Self { certificates })
    }

    /// Factory registered under [`NAME`].
    pub fn create(options: CertProviderOptions) -> Result<Arc<dyn CertificateProvider>> {
        match options {
            CertProviderOptions::Inline { value } => Ok(Arc::new(Self::new(&value)?)),
            other => Err(wrong_options(NAME, &other)),
        }
    }
}

#[async_trait]
impl CertificateProvider for InlineProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self.certificates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::errors::code::{CERT_INVALID, CERT_NOT_FOUND};
    use vouch_core::trust::parse_der;

    const SIGNER: &str = include_str!("../../tests/fixtures/signer.pem");
    const CHAIN: &str = include_str!("../../tests/fixtures/chain.pem");
    const KEY_AND_CERT: &str = include_str!("../../tests/fixtures/key_and_cert.pem");

    #[tokio::test]
    async fn test_single_certificate() {
        let provider = InlineProvider::new(SIGNER).unwrap();
        let certs = provider.get_certificates().await.unwrap();
        assert_eq!(certs.len(), 1);

        let expected = parse_der(include_bytes!("../../tests/fixtures/signer.der")).unwrap();
        assert_eq!(certs[0], expected);
    }

    /// Re-wrap the base64 body of a single PEM block; `None` puts it on one line.
    fn rewrap(pem: &str, width: Option<usize>) -> String {
        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let lines: Vec<String> = match width {
            Some(width) => body
                .as_bytes()
                .chunks(width)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect(),
            None => vec![body],
        };
        format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            lines.join("\n")
        )
    }

    #[tokio::test]
    async fn test_any_wrap_width_accepted() {
        let expected = parse_der(include_bytes!("../../tests/fixtures/signer.der")).unwrap();
        for pem in [
            rewrap(SIGNER, Some(76)),
            rewrap(SIGNER, None),
            rewrap(SIGNER, Some(64)).replace('\n', "\r\n"),
        ] {
            let certs = InlineProvider::new(&pem).unwrap().get_certificates().await.unwrap();
            assert_eq!(certs, vec![expected.clone()]);
        }
    }

    #[test]
    fn test_trailing_text_rejected() {
        let pem = format!("{}-----BEGIN CERTIFICATE-----\nMIIB", SIGNER);
        let err = InlineProvider::new(&pem).unwrap_err();
        assert_eq!(err.code(), CERT_INVALID);

        let pem = format!("{}garbage\n", SIGNER);
        let err = InlineProvider::new(&pem).unwrap_err();
        assert_eq!(err.code(), CERT_INVALID);
    }

    #[tokio::test]
    async fn test_chain_keeps_order() {
        let certs = InlineProvider::new(CHAIN)
            .unwrap()
            .get_certificates()
            .await
            .unwrap();
        assert_eq!(certs.len(), 2);
        assert_ne!(certs[0], certs[1]);
    }

    #[test]
    fn test_non_certificate_blocks_skipped() {
        let provider = InlineProvider::new(KEY_AND_CERT).unwrap();
        assert_eq!(provider.certificates.len(), 1);
    }

    #[test]
    fn test_empty_value_is_not_found() {
        let err = InlineProvider::new("").unwrap_err();
        assert_eq!(err.code(), CERT_NOT_FOUND);
        assert_eq!(err.plugin_name(), Some(NAME));
    }

    #[test]
    fn test_corrupt_block_is_invalid() {
        let corrupt = SIGNER.replacen('M', "*", 1);
        let err = InlineProvider::new(&corrupt).unwrap_err();
        assert_eq!(err.code(), CERT_INVALID);
    }
}
