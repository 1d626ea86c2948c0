//! # launcher-dl
//!
//! Bounded-concurrency fetch and persist pipeline for installing game
//! client versions: the client jar, every library (with its native bundle)
//! and the asset set.
//!
//! ## Design
//!
//! - **One shared queue** - a [`Fetcher`] caps the number of transport calls
//!   in flight across every workflow
//! - **Batches, not exceptions** - a [`FileSaver`] aggregates per-name failures
//!   into a [`BatchResult`]; partial failure is a normal outcome
//! - **Verified by default** - local copies are hashed before being trusted;
//!   existence-only checks are an explicit [`DedupMode`]
//! - **Library-first** - no CLI; install logging goes through `tracing`
//!
//! ## Quick Start
//!
//! ```no_run
//! use launcher_dl::{Config, Installer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.paths.root_dir = "/games/minecraft".into();
//!
//!     let installer = Installer::new(config)?;
//!     let report = installer.install("1.14.4").await?;
//!
//!     if report.has_errors() {
//!         eprintln!("install finished with errors: {:?}", report.assets.errors);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Native bundle archives
pub mod archive;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Admission-controlled download queue
pub mod fetcher;
/// Version install workflows
pub mod installer;
/// Dedup and integrity checks
pub mod integrity;
/// Version metadata documents
pub mod metadata;
/// Filesystem seam
pub mod persistence;
/// Batched file writer
pub mod saver;
/// HTTP seam
pub mod transport;
/// Core result types
pub mod types;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ExcludeFilter, NativesArchive};
pub use config::{Config, DedupMode, FetchConfig, PathsConfig, PlatformConfig, VerifyConfig};
pub use error::{
    Error, ExtractError, IntegrityError, MetadataError, OperationError, PersistenceError, Result,
    TransportError,
};
pub use fetcher::{FetchHandle, FetchResult, Fetcher, FetcherStats};
pub use installer::Installer;
pub use integrity::{ExpectedHash, HashAlgorithm, LocalState, check_local};
pub use metadata::{AssetIndex, AssetIndexRef, Library, VersionInfo, VersionManifest};
pub use persistence::{LocalFs, Persistence};
pub use saver::{BatchCompletion, FileSaver, SaveSlot};
pub use transport::{HttpTransport, Transport};
pub use types::{
    BatchResult, InstallReport, LibraryOutcome, NativesOutcome, UnitOutcome, WriteMode,
};
