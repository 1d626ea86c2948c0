//! Client and server jars

use std::path::PathBuf;

use tracing::{error, info};

use super::Installer;
use crate::config::DedupMode;
use crate::metadata::{Artifact, VersionInfo};
use crate::saver::FileSaver;
use crate::types::UnitOutcome;

impl Installer {
    /// Download `versions/<id>/client.jar` unless a usable copy exists
    pub async fn download_client(&self, version: &VersionInfo) -> UnitOutcome {
        let outcome = self
            .download_unit(
                self.config.paths.version_dir(&version.id),
                "client.jar",
                &version.downloads.client,
                self.config.verify.client_dedup,
            )
            .await;

        match &outcome {
            UnitOutcome::AlreadyPresent => info!(version = %version.id, "client already exists"),
            UnitOutcome::Downloaded => info!(version = %version.id, "client downloaded"),
            UnitOutcome::Failed(e) => {
                error!(version = %version.id, error = %e, "failed to download client")
            }
            UnitOutcome::NotApplicable => {}
        }
        outcome
    }

    /// Download `versions/<id>/server.jar`.
    ///
    /// Versions without a published server jar report `NotApplicable`.
    pub async fn download_server(&self, version: &VersionInfo) -> UnitOutcome {
        let Some(server) = &version.downloads.server else {
            info!(version = %version.id, "no server jar published");
            return UnitOutcome::NotApplicable;
        };

        let outcome = self
            .download_unit(
                self.config.paths.version_dir(&version.id),
                "server.jar",
                server,
                self.config.verify.client_dedup,
            )
            .await;

        match &outcome {
            UnitOutcome::Failed(e) => {
                error!(version = %version.id, error = %e, "failed to download server")
            }
            other => info!(version = %version.id, outcome = ?other, "server jar ready"),
        }
        outcome
    }

    /// A one-file batch: `root/name` from `artifact`
    pub(crate) async fn download_unit(
        &self,
        root: PathBuf,
        name: &str,
        artifact: &Artifact,
        dedup: DedupMode,
    ) -> UnitOutcome {
        let (saver, completion) = FileSaver::new(root, self.persistence.clone());
        let slot = saver.reserve(name);
        saver.seal();

        let expected = artifact.expected_hash();
        let outcome = self
            .fetch_into(slot, &artifact.url, Some(&expected), dedup)
            .await;
        completion.await;
        outcome
    }
}
