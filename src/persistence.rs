//! Persistence seam: directory creation, file writes, existence and hash checks.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::error::PersistenceError;
use crate::integrity::{HashAlgorithm, Hasher};
use crate::types::WriteMode;

/// Read buffer size for streamed hashing
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Abstraction over the local filesystem, enabling testability.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Create `path` and all missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<(), PersistenceError>;

    /// Write `data` to `path`, creating parent directories as needed
    async fn write_file(
        &self,
        path: &Path,
        data: Bytes,
        mode: WriteMode,
    ) -> Result<(), PersistenceError>;

    /// True if something exists at `path`
    async fn exists(&self, path: &Path) -> bool;

    /// Hex digest of the file at `path`, or `None` if it does not exist
    async fn content_hash(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
    ) -> Result<Option<String>, PersistenceError>;

    /// Whole contents of the file at `path`
    async fn read_file(&self, path: &Path) -> Result<Bytes, PersistenceError>;
}

/// [`Persistence`] over the local filesystem using `tokio::fs`
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

#[async_trait::async_trait]
impl Persistence for LocalFs {
    async fn create_dir_all(&self, path: &Path) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| PersistenceError::CreateDir {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn write_file(
        &self,
        path: &Path,
        data: Bytes,
        mode: WriteMode,
    ) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            self.create_dir_all(parent).await?;
        }

        let write_error = |e: std::io::Error| PersistenceError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        tokio::fs::write(path, &data).await.map_err(write_error)?;

        if mode == WriteMode::Executable {
            set_executable(path).await.map_err(write_error)?;
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn content_hash(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
    ) -> Result<Option<String>, PersistenceError> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let mut hasher = Hasher::new(algorithm);
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| PersistenceError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Some(hasher.finalize_hex()))
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes, PersistenceError> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistenceError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => Err(PersistenceError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Join a slash-separated destination name onto `root`.
///
/// Rejects absolute names and any `..` component so writes stay under `root`.
pub(crate) fn resolve_under(root: &Path, name: &str) -> Result<PathBuf, PersistenceError> {
    let mut path = root.to_path_buf();
    for component in name.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(PersistenceError::InvalidPath {
                    name: name.to_string(),
                    reason: "parent directory component".to_string(),
                });
            }
            part if part.contains('\\') || Path::new(part).is_absolute() => {
                return Err(PersistenceError::InvalidPath {
                    name: name.to_string(),
                    reason: "absolute or platform-specific component".to_string(),
                });
            }
            part => path.push(part),
        }
    }
    if name.starts_with('/') {
        return Err(PersistenceError::InvalidPath {
            name: name.to_string(),
            reason: "absolute path".to_string(),
        });
    }
    if path == root {
        return Err(PersistenceError::InvalidPath {
            name: name.to_string(),
            reason: "empty name".to_string(),
        });
    }
    Ok(path)
}
