// src/feed/retriever.rs
//! Feed retrieval over mutually authenticated TLS.
//!
//! PLACSP rejects anonymous clients, so the retriever is built from a client
//! certificate + private key pair. Both files are checked before any network
//! call so a misplaced certificate surfaces as a configuration error, not as
//! an opaque connection failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Source of raw feed bytes. Production uses [`FeedRetriever`]; tests
/// substitute fixture-backed implementations.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Certificate path for failure diagnostics, when the implementation
    /// authenticates with one.
    fn credentials_hint(&self) -> Option<&Path> {
        None
    }
}

#[derive(Debug)]
pub struct FeedRetriever {
    client: reqwest::Client,
    cert_path: PathBuf,
}

impl FeedRetriever {
    /// Fails fast when either PEM file is absent, keeping "certificate
    /// missing" distinguishable from "key missing".
    pub fn new(cert_path: &Path, key_path: &Path) -> Result<Self, TransportError> {
        if !cert_path.exists() {
            return Err(TransportError::CertificateMissing(cert_path.to_path_buf()));
        }
        if !key_path.exists() {
            return Err(TransportError::KeyMissing(key_path.to_path_buf()));
        }

        let mut pem = fs::read(cert_path).map_err(|source| TransportError::Io {
            path: cert_path.to_path_buf(),
            source,
        })?;
        let key = fs::read(key_path).map_err(|source| TransportError::Io {
            path: key_path.to_path_buf(),
            source,
        })?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);

        let identity =
            reqwest::Identity::from_pem(&pem).map_err(|source| TransportError::Identity {
                path: cert_path.to_path_buf(),
                source,
            })?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .user_agent("placsp-opportunity-analyzer/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|source| TransportError::Identity {
                path: cert_path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            client,
            cert_path: cert_path.to_path_buf(),
        })
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }
}

#[async_trait]
impl FeedFetcher for FeedRetriever {
    /// One GET, no retry; the caller decides whether to run another cycle.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.bytes().await.map_err(|source| TransportError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(body.to_vec())
    }

    fn credentials_hint(&self) -> Option<&Path> {
        Some(&self.cert_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_certificate_is_distinguished_from_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");

        // Neither file exists: certificate reported first.
        let err = FeedRetriever::new(&cert, &key).unwrap_err();
        assert!(matches!(err, TransportError::CertificateMissing(_)));
        assert!(err.is_certificate_issue());

        // Certificate present, key absent.
        std::fs::write(&cert, "not really a cert").unwrap();
        let err = FeedRetriever::new(&cert, &key).unwrap_err();
        assert!(matches!(err, TransportError::KeyMissing(_)));
        assert!(err.is_certificate_issue());
    }
}
