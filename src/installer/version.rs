//! Manifest lookup and whole-version installs

use std::collections::HashMap;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::Installer;
use crate::error::{Error, OperationError, PersistenceError, Result};
use crate::metadata::{Library, VersionInfo, VersionManifest};
use crate::types::{InstallReport, LibraryOutcome, NativesOutcome, UnitOutcome};

fn abandoned(name: &str) -> OperationError {
    PersistenceError::Abandoned {
        name: name.to_string(),
    }
    .into()
}

/// Add an abandoned outcome for every library whose task ended without
/// reporting, so a panicked task still shows up as a failure
pub(crate) fn account_for_libraries(expected: &[Library], reported: &mut Vec<LibraryOutcome>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for outcome in reported.iter() {
        *seen.entry(outcome.name.as_str()).or_default() += 1;
    }
    let mut missing = Vec::new();
    for library in expected {
        match seen.get_mut(library.name.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(library.name.clone()),
        }
    }
    for name in missing {
        warn!(library = %name, "library task ended without an outcome");
        reported.push(LibraryOutcome {
            artifact: UnitOutcome::Failed(abandoned(&name)),
            natives: NativesOutcome::Failed(abandoned(&name)),
            name,
        });
    }
}

/// Top-level unit of the outer join
enum Unit {
    Client(UnitOutcome),
    Library(LibraryOutcome),
}

impl Installer {
    /// Fetch the version list
    pub async fn version_manifest(&self) -> Result<VersionManifest> {
        let url = self.config.fetch.manifest_url.clone();
        let (manifest, _) = self.fetch_json("version manifest", &url).await?;
        Ok(manifest)
    }

    /// Resolve `id` through the manifest and fetch its version document
    pub async fn version_info(&self, id: &str) -> Result<VersionInfo> {
        let manifest = self.version_manifest().await?;
        let entry = manifest
            .find(id)
            .ok_or_else(|| Error::NotFound(format!("version '{}'", id)))?;
        let (info, _) = self.fetch_json(&format!("{}.json", id), &entry.url).await?;
        Ok(info)
    }

    /// Install the client, every library and the asset set of `version`.
    ///
    /// The client and libraries run concurrently; the asset set starts once
    /// all of them have finished. Failures are reported, never raised.
    pub async fn install_version(&self, version: &VersionInfo) -> InstallReport {
        self.fetcher.set_on_drain(|| info!("all downloads drained"));

        let natives_dir = self.config.paths.natives_dir(&version.id);
        let mut units = JoinSet::new();
        {
            let this = self.clone();
            let version = version.clone();
            units.spawn(async move { Unit::Client(this.download_client(&version).await) });
        }
        for library in &version.libraries {
            let this = self.clone();
            let library = library.clone();
            let natives_dir = natives_dir.clone();
            units.spawn(async move {
                Unit::Library(this.download_library(&natives_dir, &library).await)
            });
        }

        let mut client = None;
        let mut libraries = Vec::with_capacity(version.libraries.len());
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Unit::Client(outcome)) => client = Some(outcome),
                Ok(Unit::Library(outcome)) => libraries.push(outcome),
                Err(e) => error!(error = %e, "install task failed"),
            }
        }
        account_for_libraries(&version.libraries, &mut libraries);
        info!(
            version = %version.id,
            libraries = libraries.len(),
            failed = libraries.iter().filter(|l| l.has_errors()).count(),
            "client and libraries finished"
        );

        let assets = self.download_assets(&version.asset_index).await;
        if assets.has_errors() {
            warn!(errors = ?assets.errors.keys().collect::<Vec<_>>(), "failed to save some assets");
        }

        let client = client.unwrap_or_else(|| UnitOutcome::Failed(abandoned("client.jar")));

        let report = InstallReport {
            version_id: version.id.clone(),
            client,
            libraries,
            assets,
        };
        info!(version = %version.id, has_errors = report.has_errors(), "install finished");
        report
    }

    /// Look up `id` in the manifest and install it
    pub async fn install(&self, id: &str) -> Result<InstallReport> {
        let version = self.version_info(id).await?;
        Ok(self.install_version(&version).await)
    }
}
