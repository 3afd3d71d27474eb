//! Error taxonomy for the ingestion pipeline.
//!
//! Transport problems must stay distinguishable from feed-format problems:
//! a missing client certificate is an operator mistake, an unreachable host
//! is not, and the cycle summary reports them differently.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while retrieving the raw feed over mutual TLS.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("client certificate not found at {0}")]
    CertificateMissing(PathBuf),

    #[error("client private key not found at {0}")]
    KeyMissing(PathBuf),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("building TLS identity from {path}: {source}")]
    Identity {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

impl TransportError {
    /// True when the failure is a certificate/key configuration problem
    /// rather than a network one.
    pub fn is_certificate_issue(&self) -> bool {
        matches!(
            self,
            TransportError::CertificateMissing(_)
                | TransportError::KeyMissing(_)
                | TransportError::Io { .. }
                | TransportError::Identity { .. }
        )
    }
}

/// Failure of one feed cycle before any entry could be scored.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed feed document: {0}")]
    Parse(String),
}
