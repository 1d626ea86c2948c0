//! Shared test helpers for installer and saver tests.

use crate::config::Config;
use crate::error::{PersistenceError, TransportError};
use crate::installer::Installer;
use crate::integrity::HashAlgorithm;
use crate::metadata::{Artifact, AssetIndexRef, VersionDownloads, VersionInfo};
use crate::persistence::{LocalFs, Persistence};
use crate::transport::{HttpTransport, Transport};
use crate::types::WriteMode;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Transport answering from a fixed table; unknown URLs are 404
pub(crate) struct StaticTransport {
    responses: HashMap<String, Result<Bytes, TransportError>>,
}

impl StaticTransport {
    pub(crate) fn new() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }

    pub(crate) fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), Ok(Bytes::copy_from_slice(body)));
        self
    }

    pub(crate) fn with_error(mut self, url: &str, error: TransportError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }
}

#[async_trait::async_trait]
impl Transport for StaticTransport {
    async fn fetch(&self, url: &str) -> Result<Bytes, TransportError> {
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            })
    }
}

/// Local filesystem that refuses to write files with the given names
pub(crate) struct FailingPersistence {
    fail_names: Vec<String>,
}

impl FailingPersistence {
    pub(crate) fn new<const N: usize>(names: [&str; N]) -> Self {
        Self {
            fail_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Persistence for FailingPersistence {
    async fn create_dir_all(&self, path: &Path) -> Result<(), PersistenceError> {
        LocalFs.create_dir_all(path).await
    }

    async fn write_file(
        &self,
        path: &Path,
        data: Bytes,
        mode: WriteMode,
    ) -> Result<(), PersistenceError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_names.contains(&file_name) {
            return Err(PersistenceError::Write {
                path: path.to_path_buf(),
                reason: "disk full".to_string(),
            });
        }
        LocalFs.write_file(path, data, mode).await
    }

    async fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path).await
    }

    async fn content_hash(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
    ) -> Result<Option<String>, PersistenceError> {
        LocalFs.content_hash(path, algorithm).await
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes, PersistenceError> {
        LocalFs.read_file(path).await
    }
}

/// SHA-1 hex of `data`
pub(crate) fn sha1_hex(data: &[u8]) -> String {
    HashAlgorithm::Sha1.digest_hex(data)
}

/// Artifact entry pointing at `url` whose hash matches `data`
pub(crate) fn artifact_for(url: String, path: Option<&str>, data: &[u8]) -> Artifact {
    Artifact {
        path: path.map(str::to_string),
        sha1: sha1_hex(data),
        size: data.len() as u64,
        url,
    }
}

/// Minimal version document served from `base`
pub(crate) fn test_version(base: &str, id: &str, client: &[u8], index: &[u8]) -> VersionInfo {
    VersionInfo {
        id: id.to_string(),
        downloads: VersionDownloads {
            client: artifact_for(format!("{}/client.jar", base), None, client),
            server: None,
        },
        libraries: Vec::new(),
        asset_index: AssetIndexRef {
            id: "test".to_string(),
            sha1: sha1_hex(index),
            size: index.len() as u64,
            total_size: 0,
            url: format!("{}/indexes/test.json", base),
        },
        main_class: "net.minecraft.client.main.Main".to_string(),
    }
}

/// Installer writing into a fresh temp dir, fetching over HTTP from `base`.
/// Returns the installer and the tempdir (which must be kept alive).
pub(crate) fn create_test_installer(base: &str) -> (Installer, tempfile::TempDir) {
    create_test_installer_with(base, |_| {})
}

/// As [`create_test_installer`], with a hook to adjust the config first
pub(crate) fn create_test_installer_with(
    base: &str,
    adjust: impl FnOnce(&mut Config),
) -> (Installer, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.paths.root_dir = temp_dir.path().to_path_buf();
    config.fetch.resources_url = format!("{}/resources", base);
    config.fetch.manifest_url = format!("{}/version_manifest.json", base);
    config.fetch.max_concurrent_fetches = 4;
    config.platform.os_name = "linux".to_string();
    adjust(&mut config);

    let transport = Arc::new(HttpTransport::new(&config.fetch).unwrap());
    let installer = Installer::with_parts(config, transport, Arc::new(LocalFs));
    (installer, temp_dir)
}
