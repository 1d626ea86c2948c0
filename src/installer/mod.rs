//! Download workflows built on the shared [`Fetcher`].
//!
//! The `Installer` struct and its methods are organized by workflow:
//! - [`client`] - Client and server jars
//! - [`libraries`] - Library artifacts and native bundles
//! - [`join`] - Two-way barrier closing a library once both sides finish
//! - [`assets`] - Asset index and objects
//! - [`version`] - Manifest lookup and the outer join over a whole version

mod assets;
mod client;
mod join;
mod libraries;
mod version;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::{Config, DedupMode};
use crate::error::{IntegrityError, MetadataError, OperationError, Result};
use crate::fetcher::Fetcher;
use crate::integrity::{ExpectedHash, LocalState, check_local};
use crate::persistence::{LocalFs, Persistence};
use crate::saver::SaveSlot;
use crate::transport::{HttpTransport, Transport};
use crate::types::UnitOutcome;

/// Version installer (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Installer {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Download queue shared by every workflow
    pub(crate) fetcher: Fetcher,
    /// Filesystem seam
    pub(crate) persistence: Arc<dyn Persistence>,
    /// Bounds how many local files are hashed at once
    pub(crate) check_limit: Arc<Semaphore>,
}

impl Installer {
    /// Create an installer over HTTP and the local filesystem.
    ///
    /// Fails only if the configuration is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.fetch)?);
        Ok(Self::with_parts(config, transport, Arc::new(LocalFs)))
    }

    /// Create an installer over custom collaborators
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        let fetcher = Fetcher::new(transport, config.fetch.max_concurrent_fetches);
        let check_limit = Arc::new(Semaphore::new(config.verify.max_concurrent_checks.max(1)));
        tracing::info!(
            max_concurrent_fetches = fetcher.max_concurrency(),
            os = %config.platform.os_name,
            root = ?config.paths.root_dir,
            "installer initialized"
        );
        Self {
            config: Arc::new(config),
            fetcher,
            persistence,
            check_limit,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared download queue
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetch and decode a JSON document
    pub(crate) async fn fetch_json<T: DeserializeOwned>(
        &self,
        name: &str,
        url: &str,
    ) -> std::result::Result<(T, Bytes), OperationError> {
        let data = self.fetcher.get(url).await?;
        let value = serde_json::from_slice(&data).map_err(|e| MetadataError::Parse {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok((value, data))
    }

    /// Dedup check bounded by `max_concurrent_checks`
    pub(crate) async fn check(
        &self,
        path: &Path,
        expected: Option<&ExpectedHash>,
        mode: DedupMode,
    ) -> LocalState {
        // The semaphore is never closed
        let _permit = self.check_limit.acquire().await.ok();
        check_local(self.persistence.as_ref(), path, expected, mode).await
    }

    /// Check fetched bytes when post-download verification is on
    pub(crate) fn verify_fetched(
        &self,
        name: &str,
        data: &[u8],
        expected: Option<&ExpectedHash>,
    ) -> std::result::Result<(), IntegrityError> {
        match expected {
            Some(expected) if self.config.verify.verify_downloads => expected.verify(name, data),
            _ => Ok(()),
        }
    }

    /// Settle `slot` from `url`: skip if the local copy passes the dedup
    /// check, otherwise fetch, verify and write.
    pub(crate) async fn fetch_into(
        &self,
        slot: SaveSlot,
        url: &str,
        expected: Option<&ExpectedHash>,
        dedup: DedupMode,
    ) -> UnitOutcome {
        let local = match slot.destination() {
            Ok(path) => path,
            Err(e) => {
                let error = OperationError::from(e);
                slot.fail(error.clone());
                return UnitOutcome::Failed(error);
            }
        };

        if !self.check(&local, expected, dedup).await.needs_fetch() {
            debug!(name = %slot.name(), "already present");
            slot.skip();
            return UnitOutcome::AlreadyPresent;
        }

        let data = match self.fetcher.get(url).await {
            Ok(data) => data,
            Err(e) => {
                let error = OperationError::from(e);
                slot.fail(error.clone());
                return UnitOutcome::Failed(error);
            }
        };

        if let Err(e) = self.verify_fetched(slot.name(), &data, expected) {
            let error = OperationError::from(e);
            slot.fail(error.clone());
            return UnitOutcome::Failed(error);
        }

        match slot.fulfill(data).await {
            Ok(()) => UnitOutcome::Downloaded,
            Err(e) => UnitOutcome::Failed(e),
        }
    }
}
