//! End-to-end installs against a mocked launcher backend
//!
//! Every endpoint the installer touches is served by wiremock; each mock
//! asserts how often it is requested, so a second install also proves
//! deduplication.

mod common;

use std::time::Duration;

use common::*;
use launcher_dl::{Config, Error, Installer, NativesOutcome, UnitOutcome};
use wiremock::MockServer;

fn files_under(dir: &std::path::Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_full_install_writes_every_file() {
    let server = MockServer::start().await;
    mount_release(&server, 1).await;
    let (config, temp_dir) = test_config(&server.uri());
    let installer = Installer::new(config).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), installer.install("1.14.4"))
        .await
        .unwrap()
        .unwrap();

    assert!(!report.has_errors(), "{report:?}");
    assert_eq!(report.version_id, "1.14.4");
    assert_eq!(report.client, UnitOutcome::Downloaded);
    assert_eq!(report.libraries.len(), 3);
    assert_eq!(report.assets.saved, ASSETS.len() + 1);

    let lwjgl = report
        .libraries
        .iter()
        .find(|l| l.name.starts_with("org.lwjgl"))
        .unwrap();
    assert!(matches!(&lwjgl.natives, NativesOutcome::Extracted(r) if r.saved == 2));

    let root = temp_dir.path();
    assert_eq!(
        std::fs::read(root.join("versions/1.14.4/client.jar")).unwrap(),
        CLIENT_JAR
    );
    assert_eq!(
        std::fs::read(root.join("libraries").join(LIBRARY_PATH)).unwrap(),
        LIBRARY_JAR
    );
    assert!(
        !root
            .join("libraries/ca/weblite/java-objc-bridge/1.0.0/java-objc-bridge-1.0.0.jar")
            .exists()
    );
    assert_eq!(
        files_under(&root.join("versions/1.14.4/natives")),
        vec!["libglfw.so", "liblwjgl.so"]
    );
    for (name, data) in ASSETS {
        assert_eq!(std::fs::read(root.join("assets").join(name)).unwrap(), *data);
    }
    assert!(root.join("assets/indexes/1.14.json").exists());

    let stats = installer.fetcher().stats();
    assert_eq!(stats.in_flight(), 0);
    assert_eq!(stats.enqueued, stats.completed);
}

#[tokio::test]
async fn test_reinstall_fetches_only_metadata_and_natives() {
    let server = MockServer::start().await;
    mount_release(&server, 2).await;
    let (config, _temp_dir) = test_config(&server.uri());
    let installer = Installer::new(config).unwrap();

    let first = installer.install("1.14.4").await.unwrap();
    let second = installer.install("1.14.4").await.unwrap();

    assert!(!first.has_errors());
    assert!(!second.has_errors(), "{second:?}");
    assert_eq!(second.client, UnitOutcome::AlreadyPresent);
    assert!(
        second
            .libraries
            .iter()
            .all(|l| l.artifact != UnitOutcome::Downloaded)
    );
    assert_eq!(second.assets.skipped, ASSETS.len());
    // Only the index is rewritten
    assert_eq!(second.assets.saved, 1);
}

#[tokio::test]
async fn test_unknown_version_fails_before_any_download() {
    let server = MockServer::start().await;
    mount_manifest(&server, 1).await;
    let (config, temp_dir) = test_config(&server.uri());
    let installer = Installer::new(config).unwrap();

    let result = installer.install("1.7.10").await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(files_under(temp_dir.path()).is_empty());
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested, vec!["/version_manifest.json"]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = Config::default();
    config.fetch.max_concurrent_fetches = 0;

    assert!(matches!(
        Installer::new(config),
        Err(Error::Config { .. })
    ));
}
