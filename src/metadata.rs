//! Version metadata as published by the launcher metadata service.
//!
//! Only the fields the installer reads are modeled; everything else in the
//! documents is ignored by serde.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::integrity::ExpectedHash;

/// Replace every whitespace character with `_`, as used for version directories
pub fn replace_spaces(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// The version list (`version_manifest.json`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Newest release and snapshot ids
    pub latest: LatestVersions,
    /// All versions, newest first
    pub versions: Vec<VersionEntry>,
}

/// Newest release and snapshot ids
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatestVersions {
    /// Latest release id
    pub release: String,
    /// Latest snapshot id
    pub snapshot: String,
}

/// One row of the version list
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Version id, e.g. "1.14.4"
    pub id: String,
    /// "release", "snapshot", "old_beta" or "old_alpha"
    #[serde(rename = "type")]
    pub kind: String,
    /// Location of the version's [`VersionInfo`]
    pub url: String,
}

impl VersionEntry {
    /// True for snapshot builds
    pub fn is_snapshot(&self) -> bool {
        self.kind == "snapshot"
    }
}

impl VersionManifest {
    /// Listing filter: hide snapshots unless asked, skip `skip` rows, then take `count`
    pub fn select(
        &self,
        include_snapshots: bool,
        skip: usize,
        count: Option<usize>,
    ) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| include_snapshots || !v.is_snapshot())
            .skip(skip)
            .take(count.unwrap_or(usize::MAX))
            .collect()
    }

    /// Look up a version by id
    pub fn find(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

/// A downloadable file with its published digest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Relative path under `libraries/` (library artifacts only)
    #[serde(default)]
    pub path: Option<String>,
    /// SHA-1 of the file
    pub sha1: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Download location
    pub url: String,
}

impl Artifact {
    /// Digest to verify against
    pub fn expected_hash(&self) -> ExpectedHash {
        ExpectedHash::sha1(&self.sha1)
    }
}

/// Per-version document (`<id>.json`)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Version id
    pub id: String,
    /// Client and server jars
    pub downloads: VersionDownloads,
    /// Libraries on the classpath
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Asset set used by this version
    pub asset_index: AssetIndexRef,
    /// Entry point class
    #[serde(default)]
    pub main_class: String,
}

/// Jars published for a version
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionDownloads {
    /// Client jar
    pub client: Artifact,
    /// Dedicated server jar, absent for very old versions
    #[serde(default)]
    pub server: Option<Artifact>,
}

/// Pointer to an asset index document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    /// Index id, e.g. "1.14"
    pub id: String,
    /// SHA-1 of the index document
    pub sha1: String,
    /// Size of the index document
    #[serde(default)]
    pub size: u64,
    /// Sum of all object sizes
    #[serde(default)]
    pub total_size: u64,
    /// Download location
    pub url: String,
}

/// Asset index document: asset name to content-addressed object
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssetIndex {
    /// Objects keyed by asset name
    #[serde(default)]
    pub objects: BTreeMap<String, AssetObject>,
}

/// A content-addressed asset object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    /// SHA-1 of the object
    pub hash: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
}

impl AssetObject {
    /// Location relative to the object store: `<first two hex digits>/<hash>`
    pub fn object_path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}", prefix, self.hash)
    }
}

/// One classpath library
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinates
    pub name: String,
    /// Artifact and native classifiers
    #[serde(default)]
    pub downloads: LibraryDownloads,
    /// OS name to classifier key, e.g. `"linux": "natives-linux"`
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    /// Platform rules; absent means allowed everywhere
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// Native bundle extraction options
    #[serde(default)]
    pub extract: Option<ExtractRules>,
}

/// Files published for a library
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    /// The library jar
    #[serde(default)]
    pub artifact: Option<Artifact>,
    /// Native bundles keyed by classifier
    #[serde(default)]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

/// Native bundle extraction options
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractRules {
    /// Entry-name prefixes not to extract
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Allow or deny
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Allow
    Allow,
    /// Deny
    Disallow,
}

/// One platform rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    /// Decision when the rule applies
    pub action: RuleAction,
    /// Platform condition; absent applies everywhere
    #[serde(default)]
    pub os: Option<OsRule>,
}

/// Platform condition of a rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OsRule {
    /// "linux", "osx" or "windows"
    #[serde(default)]
    pub name: Option<String>,
}

impl Rule {
    /// Fold step: this rule's decision if it applies to `os_name`, else `previous`
    fn apply(&self, os_name: &str, previous: bool) -> bool {
        match &self.os {
            None => self.action == RuleAction::Allow,
            Some(OsRule { name: Some(name) }) if name == os_name => {
                self.action == RuleAction::Allow
            }
            Some(_) => previous,
        }
    }
}

impl Library {
    /// Whether the library is used on `os_name`.
    ///
    /// Without rules it always is. Otherwise start disallowed and let each
    /// applicable rule overwrite the decision in order.
    pub fn is_allowed(&self, os_name: &str) -> bool {
        match &self.rules {
            None => true,
            Some(rules) => rules
                .iter()
                .fold(false, |allowed, rule| rule.apply(os_name, allowed)),
        }
    }

    /// Native bundle for `os_name`, if the library declares one
    pub fn natives_classifier(&self, os_name: &str) -> Option<&Artifact> {
        let key = self.natives.as_ref()?.get(os_name)?;
        let key = key.replace("${arch}", arch_bits());
        self.downloads.classifiers.as_ref()?.get(&key)
    }

    /// Path of the artifact under `libraries/`.
    ///
    /// Uses the published path, falling back to the Maven layout of `name`.
    pub fn artifact_path(&self) -> Option<String> {
        match self.downloads.artifact.as_ref().and_then(|a| a.path.clone()) {
            Some(path) => Some(path),
            None => maven_path(&self.name),
        }
    }

    /// Prefixes excluded from the native bundle
    pub fn exclude_prefixes(&self) -> &[String] {
        self.extract
            .as_ref()
            .map(|e| e.exclude.as_slice())
            .unwrap_or_default()
    }
}

/// `group:artifact:version[:classifier]` to `group/as/dirs/artifact/version/artifact-version[-classifier].jar`
fn maven_path(name: &str) -> Option<String> {
    let mut parts = name.split(':');
    let group = parts.next()?;
    let artifact = parts.next()?;
    let version = parts.next()?;
    let file = match parts.next() {
        Some(classifier) => format!("{}-{}-{}.jar", artifact, version, classifier),
        None => format!("{}-{}.jar", artifact, version),
    };
    Some(format!(
        "{}/{}/{}/{}",
        group.replace('.', "/"),
        artifact,
        version,
        file
    ))
}

fn arch_bits() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "64"
    } else {
        "32"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library(value: serde_json::Value) -> Library {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_replace_spaces_covers_all_whitespace() {
        assert_eq!(replace_spaces("1.14 Pre-Release\t1"), "1.14_Pre-Release_1");
        assert_eq!(replace_spaces("1.14.4"), "1.14.4");
    }

    #[test]
    fn test_library_without_rules_is_allowed() {
        let lib = library(json!({"name": "com.mojang:brigadier:1.0.17"}));
        assert!(lib.is_allowed("linux"));
    }

    #[test]
    fn test_rules_fold_in_order() {
        // Allowed everywhere except osx
        let lib = library(json!({
            "name": "org.lwjgl:lwjgl:3.2.1",
            "rules": [
                {"action": "allow"},
                {"action": "disallow", "os": {"name": "osx"}}
            ]
        }));
        assert!(lib.is_allowed("linux"));
        assert!(!lib.is_allowed("osx"));

        // Allowed only on osx
        let lib = library(json!({
            "name": "ca.weblite:java-objc-bridge:1.0.0",
            "rules": [{"action": "allow", "os": {"name": "osx"}}]
        }));
        assert!(lib.is_allowed("osx"));
        assert!(!lib.is_allowed("windows"));
    }

    #[test]
    fn test_os_rule_without_name_keeps_previous_decision() {
        let lib = library(json!({
            "name": "x:y:1",
            "rules": [{"action": "allow"}, {"action": "disallow", "os": {}}]
        }));
        assert!(lib.is_allowed("linux"));
    }

    #[test]
    fn test_natives_classifier_follows_os_mapping() {
        let lib = library(json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "downloads": {
                "classifiers": {
                    "natives-linux": {"path": "a.jar", "sha1": "aa", "size": 1, "url": "http://h/linux.jar"},
                    "natives-windows-64": {"path": "b.jar", "sha1": "bb", "size": 1, "url": "http://h/win.jar"}
                }
            },
            "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
            "extract": {"exclude": ["META-INF/"]}
        }));

        assert_eq!(lib.natives_classifier("linux").unwrap().url, "http://h/linux.jar");
        assert!(lib.natives_classifier("osx").is_none());
        if cfg!(target_pointer_width = "64") {
            assert_eq!(lib.natives_classifier("windows").unwrap().url, "http://h/win.jar");
        }
        assert_eq!(lib.exclude_prefixes(), ["META-INF/".to_string()]);
    }

    #[test]
    fn test_natives_mapping_without_classifiers_means_no_bundle() {
        let lib = library(json!({"name": "x:y:1", "natives": {"linux": "natives-linux"}}));
        assert!(lib.natives_classifier("linux").is_none());
        assert!(lib.exclude_prefixes().is_empty());
    }

    #[test]
    fn test_artifact_path_prefers_published_path() {
        let lib = library(json!({
            "name": "com.mojang:brigadier:1.0.17",
            "downloads": {"artifact": {
                "path": "com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar",
                "sha1": "c6b7dc51dd44379cc751b7504816006e9be4b1e6",
                "size": 77392,
                "url": "https://libraries.minecraft.net/com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar"
            }}
        }));
        assert_eq!(
            lib.artifact_path().unwrap(),
            "com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar"
        );

        let lib = library(json!({"name": "org.lwjgl:lwjgl:3.2.2:natives-linux"}));
        assert_eq!(
            lib.artifact_path().unwrap(),
            "org/lwjgl/lwjgl/3.2.2/lwjgl-3.2.2-natives-linux.jar"
        );
        assert!(library(json!({"name": "broken"})).artifact_path().is_none());
    }

    #[test]
    fn test_select_hides_snapshots_and_applies_skip_then_count() {
        let manifest: VersionManifest = serde_json::from_value(json!({
            "latest": {"release": "1.14.4", "snapshot": "19w34a"},
            "versions": [
                {"id": "19w34a", "type": "snapshot", "url": "u0"},
                {"id": "1.14.4", "type": "release", "url": "u1"},
                {"id": "1.14.3", "type": "release", "url": "u2"},
                {"id": "1.14.2", "type": "release", "url": "u3"}
            ]
        }))
        .unwrap();

        let ids = |v: Vec<&VersionEntry>| v.into_iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(manifest.select(false, 1, Some(1))), vec!["1.14.3"]);
        assert_eq!(ids(manifest.select(true, 0, Some(2))), vec!["19w34a", "1.14.4"]);
        assert_eq!(manifest.select(false, 0, None).len(), 3);
        assert_eq!(manifest.find("1.14.2").unwrap().url, "u3");
    }

    #[test]
    fn test_version_info_parses_camel_case_fields() {
        let info: VersionInfo = serde_json::from_value(json!({
            "id": "1.14.4",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "1.14", "sha1": "ab", "size": 10, "totalSize": 100, "url": "http://h/1.14.json"},
            "downloads": {"client": {"sha1": "cd", "size": 5, "url": "http://h/client.jar"}},
            "libraries": []
        }))
        .unwrap();

        assert_eq!(info.asset_index.id, "1.14");
        assert_eq!(info.asset_index.total_size, 100);
        assert!(info.downloads.server.is_none());
        assert_eq!(info.main_class, "net.minecraft.client.main.Main");
    }

    #[test]
    fn test_asset_object_path_uses_hash_prefix() {
        let object = AssetObject {
            hash: "bdf48ef6b5d0d23bbb02e17d04865216179f510a".into(),
            size: 1,
        };
        assert_eq!(
            object.object_path(),
            "bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
    }
}
