//! Asset index and objects

use tracing::{debug, error, info, warn};

use super::Installer;
use crate::integrity::ExpectedHash;
use crate::metadata::{AssetIndex, AssetIndexRef};
use crate::saver::FileSaver;
use crate::types::{BatchResult, UnitOutcome};

impl Installer {
    /// Download every object of an asset index into `assets/`.
    ///
    /// The index document itself is stored as `indexes/<id>.json` and counts
    /// as one operation of the batch. Each object is saved under its asset
    /// name; failures are recorded per name and never stop siblings.
    pub async fn download_assets(&self, index_ref: &AssetIndexRef) -> BatchResult {
        let (saver, completion) =
            FileSaver::new(self.config.paths.assets_dir(), self.persistence.clone());
        let index_slot = saver.reserve(format!("indexes/{}.json", index_ref.id));

        let index_name = index_slot.name().to_string();
        let (index, data) = match self
            .fetch_json::<AssetIndex>(&index_name, &index_ref.url)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(index = %index_ref.id, error = %e, "failed to fetch asset index");
                index_slot.fail(e);
                saver.seal();
                return completion.await;
            }
        };
        let expected_index = ExpectedHash::sha1(&index_ref.sha1);
        if let Err(e) = self.verify_fetched(&index_name, &data, Some(&expected_index)) {
            error!(index = %index_ref.id, error = %e, "asset index failed verification");
            index_slot.fail(e);
            saver.seal();
            return completion.await;
        }

        let slots: Vec<_> = index
            .objects
            .iter()
            .map(|(name, object)| (saver.reserve(name.as_str()), object.clone()))
            .collect();
        saver.seal();
        debug!(index = %index_ref.id, objects = slots.len(), "asset objects registered");

        let _ = index_slot.fulfill(data).await;

        let dedup = self.config.verify.asset_dedup;
        let base = self.config.fetch.resources_url.trim_end_matches('/').to_string();
        for (slot, object) in slots {
            let this = self.clone();
            let url = format!("{}/{}", base, object.object_path());
            tokio::spawn(async move {
                let name = slot.name().to_string();
                let expected = ExpectedHash::sha1(&object.hash);
                match this.fetch_into(slot, &url, Some(&expected), dedup).await {
                    UnitOutcome::AlreadyPresent => debug!(asset = %name, "asset already exists"),
                    UnitOutcome::Downloaded => debug!(asset = %name, "downloaded asset"),
                    UnitOutcome::Failed(e) => warn!(asset = %name, error = %e, "asset failed"),
                    UnitOutcome::NotApplicable => {}
                }
            });
        }

        let result = completion.await;
        info!(
            index = %index_ref.id,
            saved = result.saved,
            skipped = result.skipped,
            errors = result.errors.len(),
            "asset set complete"
        );
        result
    }
}
