//! Library artifacts and native bundles

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::Installer;
use super::join::LibraryJoin;
use crate::archive::{ExcludeFilter, NativesArchive};
use crate::config::DedupMode;
use crate::error::{OperationError, PersistenceError};
use crate::metadata::{Artifact, Library};
use crate::saver::{FileSaver, is_directory_marker};
use crate::types::{LibraryOutcome, NativesOutcome, UnitOutcome};

impl Installer {
    /// Download a library's artifact and, if it declares one for this
    /// platform, extract its native bundle into `natives_dir`.
    ///
    /// Both sides run concurrently; the returned outcome is available only
    /// once both have finished, whichever finishes first. Libraries excluded
    /// by platform rules complete immediately without any transport call.
    pub async fn download_library(&self, natives_dir: &Path, library: &Library) -> LibraryOutcome {
        let os_name = &self.config.platform.os_name;
        if !library.is_allowed(os_name) {
            debug!(library = %library.name, os = %os_name, "library not used on this platform");
            return LibraryOutcome {
                name: library.name.clone(),
                artifact: UnitOutcome::NotApplicable,
                natives: NativesOutcome::NotRequired,
            };
        }

        let (join, done) = LibraryJoin::new(&library.name);
        let join = Arc::new(join);

        match library.natives_classifier(os_name).cloned() {
            None => join.natives_done(NativesOutcome::NotRequired),
            Some(bundle) => {
                let this = self.clone();
                let join = Arc::clone(&join);
                let natives_dir = natives_dir.to_path_buf();
                let name = library.name.clone();
                let exclude = library.exclude_prefixes().to_vec();
                tokio::spawn(async move {
                    let outcome = this
                        .download_natives(natives_dir, &name, &bundle, &exclude)
                        .await;
                    join.natives_done(outcome);
                });
            }
        }

        match (&library.downloads.artifact, library.artifact_path()) {
            (Some(artifact), Some(path)) => {
                let this = self.clone();
                let join = Arc::clone(&join);
                let artifact = artifact.clone();
                let name = library.name.clone();
                tokio::spawn(async move {
                    let outcome = this.download_library_artifact(&name, &path, &artifact).await;
                    join.artifact_done(outcome);
                });
            }
            _ => join.artifact_done(UnitOutcome::NotApplicable),
        }

        // Only the spawned sides keep the barrier alive from here on
        drop(join);
        match done.await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = OperationError::from(PersistenceError::Abandoned {
                    name: library.name.clone(),
                });
                LibraryOutcome {
                    name: library.name.clone(),
                    artifact: UnitOutcome::Failed(error.clone()),
                    natives: NativesOutcome::Failed(error),
                }
            }
        }
    }

    /// Library jars are always checked by hash before fetching
    async fn download_library_artifact(
        &self,
        name: &str,
        path: &str,
        artifact: &Artifact,
    ) -> UnitOutcome {
        let outcome = self
            .download_unit(
                self.config.paths.libraries_dir(),
                path,
                artifact,
                DedupMode::Verified,
            )
            .await;

        match &outcome {
            UnitOutcome::AlreadyPresent => info!(library = %name, "library already exists"),
            UnitOutcome::Downloaded => info!(library = %name, "library downloaded"),
            UnitOutcome::Failed(e) => error!(library = %name, error = %e, "library download failed"),
            UnitOutcome::NotApplicable => {}
        }
        outcome
    }

    /// Fetch a native bundle and extract every non-excluded entry as one batch.
    ///
    /// All entries are registered before any extraction starts, so the batch
    /// cannot complete while entries are still being enumerated.
    pub(crate) async fn download_natives(
        &self,
        natives_dir: PathBuf,
        library: &str,
        bundle: &Artifact,
        exclude: &[String],
    ) -> NativesOutcome {
        let data = match self.fetcher.get(&bundle.url).await {
            Ok(data) => data,
            Err(e) => {
                error!(library = %library, error = %e, "failed to fetch natives");
                return NativesOutcome::Failed(e.into());
            }
        };
        let expected = bundle.expected_hash();
        if let Err(e) = self.verify_fetched(&bundle.url, &data, Some(&expected)) {
            error!(library = %library, error = %e, "natives bundle failed verification");
            return NativesOutcome::Failed(e.into());
        }

        let archive = match NativesArchive::parse(data) {
            Ok(archive) => Arc::new(archive),
            Err(e) => {
                error!(library = %library, error = %e, "natives bundle is not a valid archive");
                return NativesOutcome::Failed(e.into());
            }
        };

        let filter = ExcludeFilter::new(exclude).unwrap_or_else(|e| {
            warn!(library = %library, error = %e, "ignoring unusable exclude list");
            ExcludeFilter::default()
        });

        let (saver, completion) = FileSaver::new(natives_dir, self.persistence.clone());
        let slots: Vec<_> = archive
            .entries()
            .iter()
            .filter(|entry| !filter.is_excluded(&entry.name))
            .map(|entry| (entry.index, saver.reserve(entry.name.as_str())))
            .collect();
        saver.seal();
        debug!(library = %library, entries = slots.len(), "natives entries registered");

        for (index, slot) in slots {
            if is_directory_marker(slot.name()) {
                let _ = slot.fulfill(Bytes::new()).await;
                continue;
            }
            let archive = Arc::clone(&archive);
            tokio::spawn(async move {
                match archive.extract(index).await {
                    Ok(data) => {
                        // Failures are recorded in the batch result
                        let _ = slot.fulfill(data).await;
                    }
                    Err(e) => slot.fail(e),
                }
            });
        }

        let result = completion.await;
        if result.has_errors() {
            warn!(library = %library, errors = result.errors.len(), "natives extracted with errors");
        } else {
            info!(library = %library, files = result.saved, "downloaded natives");
        }
        NativesOutcome::Extracted(result)
    }
}
