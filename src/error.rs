//! Error types for launcher-dl
//!
//! Two layers of errors live here:
//! - [`Error`], the top-level error returned from fallible entry points
//!   (configuration loading, metadata lookups, client construction).
//! - Cloneable domain errors ([`TransportError`], [`PersistenceError`],
//!   [`IntegrityError`], [`ExtractError`], [`MetadataError`]) that describe
//!   the failure of one named operation and can be stored in a batch result
//!   via [`OperationError`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for launcher-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for launcher-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_fetches")
        key: Option<String>,
    },

    /// Fetching a URL failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Filesystem write, read or mkdir failed
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Content hash did not match the expected value
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Archive could not be read or an entry could not be extracted
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Metadata document could not be decoded
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested version or resource does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<OperationError> for Error {
    fn from(error: OperationError) -> Self {
        match error {
            OperationError::Transport(e) => Error::Transport(e),
            OperationError::Persistence(e) => Error::Persistence(e),
            OperationError::Integrity(e) => Error::Integrity(e),
            OperationError::Extract(e) => Error::Extract(e),
            OperationError::Metadata(e) => Error::Metadata(e),
        }
    }
}

/// Failure of a single transport call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// URL could not be parsed or uses a scheme other than http/https
    #[error("unsupported URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Request could not be sent or the connection failed
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The requested URL
        url: String,
        /// The underlying client error
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body could not be read to completion
    #[error("failed to read response body from {url}: {reason}")]
    Body {
        /// The requested URL
        url: String,
        /// The underlying client error
        reason: String,
    },

    /// The fetch queue dropped the request before it completed
    #[error("request for {url} was dropped before completion")]
    Dropped {
        /// The requested URL
        url: String,
    },
}

/// Failure of a filesystem operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Creating a directory failed
    #[error("failed to create directory {path}: {reason}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        reason: String,
    },

    /// Writing a file failed
    #[error("failed to write {path}: {reason}")]
    Write {
        /// File that could not be written
        path: PathBuf,
        /// The underlying I/O error
        reason: String,
    },

    /// Reading a file failed
    #[error("failed to read {path}: {reason}")]
    Read {
        /// File that could not be read
        path: PathBuf,
        /// The underlying I/O error
        reason: String,
    },

    /// File does not exist
    #[error("file not found: {path}")]
    NotFound {
        /// The missing file
        path: PathBuf,
    },

    /// Destination name would escape the batch root
    #[error("invalid destination {name}: {reason}")]
    InvalidPath {
        /// The rejected destination name
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// A reserved save slot was dropped without ever receiving data
    #[error("save slot for {name} was dropped before data arrived")]
    Abandoned {
        /// Destination name of the abandoned slot
        name: String,
    },
}

/// Content hash mismatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Downloaded or local content hashed to an unexpected value
    #[error("hash mismatch for {name}: expected {expected}, got {actual}")]
    Mismatch {
        /// Name of the checked artifact
        name: String,
        /// Hex digest from metadata
        expected: String,
        /// Hex digest of the actual content
        actual: String,
    },
}

/// Failure reading an archive or one of its entries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Bytes are not a readable zip archive
    #[error("invalid archive: {reason}")]
    InvalidArchive {
        /// The underlying zip error
        reason: String,
    },

    /// One entry is corrupt or missing
    #[error("failed to extract entry {name}: {reason}")]
    Entry {
        /// Entry name (or index when the name is unknown)
        name: String,
        /// The underlying zip or I/O error
        reason: String,
    },

    /// Entry name is absolute or contains `..`
    #[error("entry {name} has an unsafe path")]
    UnsafePath {
        /// The rejected entry name
        name: String,
    },

    /// Blocking extraction task panicked or was cancelled
    #[error("extraction task failed: {reason}")]
    TaskFailed {
        /// Join error description
        reason: String,
    },
}

/// Malformed metadata document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// JSON did not match the expected document shape
    #[error("failed to parse {name}: {reason}")]
    Parse {
        /// Name of the document
        name: String,
        /// The underlying serde error
        reason: String,
    },
}

/// Per-name failure recorded in a [`BatchResult`](crate::types::BatchResult)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Fetching the payload failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Writing the payload failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Payload hash did not match metadata
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Payload could not be extracted from its archive
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Payload was a metadata document that could not be decoded
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
