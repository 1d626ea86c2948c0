//! Configuration types for launcher-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How an already-present local file is judged to be "already downloaded"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Hash the local file and compare with metadata (default)
    #[default]
    Verified,
    /// Presence only. Fast but accepts stale or corrupt local copies.
    ExistenceOnly,
}

/// Directory layout of an installation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Installation root (default: ".")
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

impl PathsConfig {
    /// Shared library artifacts: `<root>/libraries`
    pub fn libraries_dir(&self) -> PathBuf {
        self.root_dir.join("libraries")
    }

    /// Per-version directory: `<root>/versions/<id>` with whitespace replaced by `_`
    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.root_dir
            .join("versions")
            .join(crate::metadata::replace_spaces(version_id))
    }

    /// Extracted native libraries for a version: `<root>/versions/<id>/natives`
    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join("natives")
    }

    /// Asset objects and indexes: `<root>/assets`
    pub fn assets_dir(&self) -> PathBuf {
        self.root_dir.join("assets")
    }
}

/// Network fetch behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum transport calls in flight at once (default: 8)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Version manifest location
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Base URL of the asset object store; objects live at `<base>/<hh>/<hash>`
    #[serde(default = "default_resources_url")]
    pub resources_url: String,

    /// User-Agent header sent with every request (None = client default)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            request_timeout: default_request_timeout(),
            manifest_url: default_manifest_url(),
            resources_url: default_resources_url(),
            user_agent: None,
        }
    }
}

/// Dedup and integrity checking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Local check used for the client and server jars
    #[serde(default)]
    pub client_dedup: DedupMode,

    /// Local check used for asset objects
    #[serde(default)]
    pub asset_dedup: DedupMode,

    /// Check fetched bytes against metadata hashes before writing (default: true)
    #[serde(default = "default_true")]
    pub verify_downloads: bool,

    /// Maximum local files hashed concurrently (default: 16)
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            client_dedup: DedupMode::default(),
            asset_dedup: DedupMode::default(),
            verify_downloads: true,
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

/// Target platform for library rules and native bundles
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// OS name as used by version metadata: "linux", "osx" or "windows"
    #[serde(default = "default_os_name")]
    pub os_name: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            os_name: default_os_name(),
        }
    }
}

/// Main configuration for [`Installer`](crate::Installer)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Network fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Dedup and integrity checking
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Target platform
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_fetches must be at least 1".to_string(),
                key: Some("max_concurrent_fetches".to_string()),
            });
        }
        if self.verify.max_concurrent_checks == 0 {
            return Err(Error::Config {
                message: "max_concurrent_checks must be at least 1".to_string(),
                key: Some("max_concurrent_checks".to_string()),
            });
        }
        for (key, value) in [
            ("manifest_url", &self.fetch.manifest_url),
            ("resources_url", &self.fetch.resources_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                return Err(Error::Config {
                    message: format!("{} '{}' is not a valid URL: {}", key, value, e),
                    key: Some(key.to_string()),
                });
            }
        }
        Ok(())
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_manifest_url() -> String {
    "https://launchermeta.mojang.com/mc/game/version_manifest.json".to_string()
}

fn default_resources_url() -> String {
    "https://resources.download.minecraft.net".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_checks() -> usize {
    16
}

fn default_os_name() -> String {
    match std::env::consts::OS {
        "macos" => "osx".to_string(),
        other => other.to_string(),
    }
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
