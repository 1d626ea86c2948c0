//! Core result types shared by the fetch/persist pipeline

use crate::error::OperationError;
use std::collections::BTreeMap;

/// How a file is written by the persistence layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain file
    #[default]
    Regular,
    /// File marked executable (mode 0o755 on Unix)
    Executable,
}

/// Aggregated outcome of one batch, reported exactly once when it drains
///
/// Failures of individual operations are recorded here keyed by destination
/// name; they never abort sibling operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Failure per destination name
    pub errors: BTreeMap<String, OperationError>,
    /// Files actually written
    pub saved: usize,
    /// Operations resolved without a write because the data was already present
    pub skipped: usize,
}

impl BatchResult {
    /// Record a failure for `name`
    pub fn record(&mut self, name: impl Into<String>, error: OperationError) {
        self.errors.insert(name.into(), error);
    }

    /// True if any operation of the batch failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fold another batch into this one
    pub fn merge(&mut self, other: BatchResult) {
        self.saved += other.saved;
        self.skipped += other.skipped;
        for (name, error) in other.errors {
            self.record(name, error);
        }
    }
}

/// Outcome of a single-artifact unit (client jar, server jar, library artifact)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Local copy passed the dedup check; no transport call was made
    AlreadyPresent,
    /// Fetched and written
    Downloaded,
    /// Library rules exclude it on this platform
    NotApplicable,
    /// Fetch, verification or write failed
    Failed(OperationError),
}

impl UnitOutcome {
    /// True for the `Failed` variant
    pub fn is_failed(&self) -> bool {
        matches!(self, UnitOutcome::Failed(_))
    }
}

/// Outcome of the native-bundle side of a library
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativesOutcome {
    /// The library declares no native bundle for this platform
    NotRequired,
    /// The bundle was fetched; entry results are aggregated here
    Extracted(BatchResult),
    /// The bundle itself could not be fetched or read
    Failed(OperationError),
}

impl NativesOutcome {
    /// True if the bundle failed or any of its entries failed
    pub fn has_errors(&self) -> bool {
        match self {
            NativesOutcome::NotRequired => false,
            NativesOutcome::Extracted(result) => result.has_errors(),
            NativesOutcome::Failed(_) => true,
        }
    }
}

/// Joint outcome of a library's artifact and native-bundle downloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryOutcome {
    /// Maven-style library name
    pub name: String,
    /// Artifact side
    pub artifact: UnitOutcome,
    /// Native-bundle side
    pub natives: NativesOutcome,
}

impl LibraryOutcome {
    /// True if either side failed
    pub fn has_errors(&self) -> bool {
        self.artifact.is_failed() || self.natives.has_errors()
    }
}

/// Report of a full version install
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallReport {
    /// Version id
    pub version_id: String,
    /// Client jar
    pub client: UnitOutcome,
    /// One entry per library, in completion order
    pub libraries: Vec<LibraryOutcome>,
    /// Asset set batch
    pub assets: BatchResult,
}

impl InstallReport {
    /// True if any unit of the install failed
    pub fn has_errors(&self) -> bool {
        self.client.is_failed()
            || self.libraries.iter().any(LibraryOutcome::has_errors)
            || self.assets.has_errors()
    }
}
