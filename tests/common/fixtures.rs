//! Mock launcher endpoints and payload builders

use std::io::{Cursor, Write};

use launcher_dl::{Config, HashAlgorithm};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::FileOptions;

/// Client jar served by [`mount_release`]
pub const CLIENT_JAR: &[u8] = b"PK client jar";

/// Plain library jar served by [`mount_release`]
pub const LIBRARY_JAR: &[u8] = b"PK brigadier jar";

/// Published path of the plain library
pub const LIBRARY_PATH: &str = "com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar";

/// Asset objects served by [`mount_release`], keyed by asset name
pub const ASSETS: &[(&str, &[u8])] = &[
    ("icons/icon_16x16.png", b"16px icon"),
    ("icons/icon_32x32.png", b"32px icon"),
    ("minecraft/sounds/ambient/cave/cave1.ogg", b"cave sound"),
];

pub fn sha1(data: &[u8]) -> String {
    HashAlgorithm::Sha1.digest_hex(data)
}

/// Zip archive holding `entries`; names ending in '/' become directories
pub fn natives_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        if let Some(dir) = name.strip_suffix('/') {
            writer.add_directory(dir, FileOptions::default()).unwrap();
        } else {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Native bundle served for the lwjgl library
pub fn lwjgl_natives() -> Vec<u8> {
    natives_zip(&[
        ("META-INF/", b""),
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
        ("liblwjgl.so", b"lwjgl"),
        ("libglfw.so", b"glfw"),
    ])
}

/// Route an asset object is served from
pub fn object_route(data: &[u8]) -> String {
    let hash = sha1(data);
    format!("/resources/{}/{}", &hash[..2], hash)
}

pub fn asset_index() -> Vec<u8> {
    let objects: serde_json::Map<String, Value> = ASSETS
        .iter()
        .map(|(name, data)| {
            (
                name.to_string(),
                json!({"hash": sha1(data), "size": data.len()}),
            )
        })
        .collect();
    serde_json::to_vec(&json!({ "objects": objects })).unwrap()
}

/// Version document for `1.14.4` with one plain, one native and one
/// macOS-only library
pub fn version_document(base: &str) -> Value {
    let index = asset_index();
    let natives = lwjgl_natives();
    json!({
        "id": "1.14.4",
        "mainClass": "net.minecraft.client.main.Main",
        "assetIndex": {
            "id": "1.14",
            "sha1": sha1(&index),
            "size": index.len(),
            "totalSize": ASSETS.iter().map(|(_, d)| d.len()).sum::<usize>(),
            "url": format!("{}/indexes/1.14.json", base)
        },
        "downloads": {
            "client": {"sha1": sha1(CLIENT_JAR), "size": CLIENT_JAR.len(), "url": format!("{}/client.jar", base)}
        },
        "libraries": [
            {
                "name": "com.mojang:brigadier:1.0.17",
                "downloads": {"artifact": {
                    "path": LIBRARY_PATH,
                    "sha1": sha1(LIBRARY_JAR),
                    "size": LIBRARY_JAR.len(),
                    "url": format!("{}/libraries/brigadier.jar", base)
                }}
            },
            {
                "name": "org.lwjgl:lwjgl:3.2.2",
                "downloads": {
                    "artifact": {
                        "path": "org/lwjgl/lwjgl/3.2.2/lwjgl-3.2.2.jar",
                        "sha1": sha1(LIBRARY_JAR),
                        "size": LIBRARY_JAR.len(),
                        "url": format!("{}/libraries/lwjgl.jar", base)
                    },
                    "classifiers": {
                        "natives-linux": {
                            "path": "org/lwjgl/lwjgl/3.2.2/lwjgl-3.2.2-natives-linux.jar",
                            "sha1": sha1(&natives),
                            "size": natives.len(),
                            "url": format!("{}/libraries/lwjgl-natives-linux.jar", base)
                        }
                    }
                },
                "natives": {"linux": "natives-linux", "windows": "natives-windows"},
                "extract": {"exclude": ["META-INF/"]}
            },
            {
                "name": "ca.weblite:java-objc-bridge:1.0.0",
                "downloads": {"artifact": {
                    "path": "ca/weblite/java-objc-bridge/1.0.0/java-objc-bridge-1.0.0.jar",
                    "sha1": sha1(b"objc"),
                    "size": 4,
                    "url": format!("{}/libraries/objc.jar", base)
                }},
                "rules": [{"action": "allow", "os": {"name": "osx"}}]
            }
        ]
    })
}

async fn mount(server: &MockServer, route: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Mount a version list naming only `1.14.4`, expected `times` times
pub async fn mount_manifest(server: &MockServer, times: u64) {
    let base = server.uri();
    let manifest = json!({
        "latest": {"release": "1.14.4", "snapshot": "1.14.4"},
        "versions": [
            {"id": "1.14.4", "type": "release", "url": format!("{}/versions/1.14.4.json", base)}
        ]
    });
    mount(
        server,
        "/version_manifest.json",
        serde_json::to_vec(&manifest).unwrap(),
        times,
    )
    .await;
}

/// Mount every document and payload of the `1.14.4` release.
///
/// `installs` is how many times the install runs; payloads are expected once
/// and metadata once per install.
pub async fn mount_release(server: &MockServer, installs: u64) {
    let base = server.uri();
    mount_manifest(server, installs).await;
    mount(
        server,
        "/versions/1.14.4.json",
        serde_json::to_vec(&version_document(&base)).unwrap(),
        installs,
    )
    .await;
    mount(server, "/indexes/1.14.json", asset_index(), installs).await;
    mount(server, "/client.jar", CLIENT_JAR.to_vec(), 1).await;
    mount(server, "/libraries/brigadier.jar", LIBRARY_JAR.to_vec(), 1).await;
    mount(server, "/libraries/lwjgl.jar", LIBRARY_JAR.to_vec(), 1).await;
    // The native bundle is not cached, so it is fetched on every install
    mount(
        server,
        "/libraries/lwjgl-natives-linux.jar",
        lwjgl_natives(),
        installs,
    )
    .await;
    mount(server, "/libraries/objc.jar", b"objc".to_vec(), 0).await;
    for (_, data) in ASSETS {
        mount(server, &object_route(data), data.to_vec(), 1).await;
    }
}

/// Linux config rooted in a fresh temp dir, pointed at `base`
pub fn test_config(base: &str) -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.root_dir = temp_dir.path().to_path_buf();
    config.fetch.manifest_url = format!("{}/version_manifest.json", base);
    config.fetch.resources_url = format!("{}/resources", base);
    config.fetch.max_concurrent_fetches = 2;
    config.platform.os_name = "linux".to_string();
    (config, temp_dir)
}
