//! Dedup and integrity checks.
//!
//! Before fetching an artifact the local copy is checked. With
//! [`DedupMode::Verified`] the file is hashed and compared against metadata;
//! with [`DedupMode::ExistenceOnly`] mere presence counts as downloaded.
//! A mismatch is not an error: the artifact is simply fetched again.

use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::DedupMode;
use crate::error::{IntegrityError, PersistenceError};
use crate::persistence::Persistence;

/// Supported content digests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1, used by version metadata
    Sha1,
    /// SHA-256
    Sha256,
}

impl HashAlgorithm {
    /// Lowercase hex digest of `data`
    pub fn digest_hex(self, data: &[u8]) -> String {
        let mut hasher = Hasher::new(self);
        hasher.update(data);
        hasher.finalize_hex()
    }
}

/// Incremental hasher over one of the supported algorithms
pub(crate) enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    pub(crate) fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// A digest published in metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedHash {
    /// Digest algorithm
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub hex: String,
}

impl ExpectedHash {
    /// SHA-1 digest as carried by version metadata
    pub fn sha1(hex: impl Into<String>) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha1,
            hex: hex.into().to_ascii_lowercase(),
        }
    }

    /// Check `data` against this digest
    pub fn verify(&self, name: &str, data: &[u8]) -> Result<(), IntegrityError> {
        let actual = self.algorithm.digest_hex(data);
        if actual == self.hex {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch {
                name: name.to_string(),
                expected: self.hex.clone(),
                actual,
            })
        }
    }
}

/// Result of checking a local file before fetching
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalState {
    /// Usable local copy; skip the fetch
    Present,
    /// Nothing on disk
    Missing,
    /// File exists but hashes differently; fetch again
    Mismatch {
        /// Digest of the local file
        actual: String,
    },
}

impl LocalState {
    /// True if the artifact must be fetched
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, LocalState::Present)
    }
}

/// Decide whether the file at `path` already satisfies `expected`.
///
/// Without an expected hash, `Verified` degrades to an existence check.
/// Read failures while hashing are treated as a mismatch so the artifact
/// gets re-fetched.
pub async fn check_local(
    persistence: &dyn Persistence,
    path: &Path,
    expected: Option<&ExpectedHash>,
    mode: DedupMode,
) -> LocalState {
    let expected = match (mode, expected) {
        (DedupMode::Verified, Some(expected)) => expected,
        _ => {
            return if persistence.exists(path).await {
                LocalState::Present
            } else {
                LocalState::Missing
            };
        }
    };

    match persistence.content_hash(path, expected.algorithm).await {
        Ok(Some(actual)) if actual == expected.hex => LocalState::Present,
        Ok(Some(actual)) => {
            warn!(
                ?path,
                expected = %expected.hex,
                actual = %actual,
                "local file hash mismatch, fetching again"
            );
            LocalState::Mismatch { actual }
        }
        Ok(None) => LocalState::Missing,
        Err(PersistenceError::NotFound { .. }) => LocalState::Missing,
        Err(e) => {
            debug!(?path, error = %e, "failed to hash local file, fetching again");
            LocalState::Mismatch {
                actual: String::new(),
            }
        }
    }
}
