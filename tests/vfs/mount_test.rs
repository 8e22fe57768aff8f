/*!
 * Mount Tests
 * Shadowing, unmount and open-failure fallback through the manager
 */

use asset_vfs::vfs::VfsResult;
use asset_vfs::{AssetConfig, AssetError, AssetManager, AssetStream, FileSystem, MemFS, VfsError};
use pretty_assertions::assert_eq;
use std::io::Read;
use std::sync::Arc;

/// Claims every file but fails to open any of them
struct FlakyFS;

impl FileSystem for FlakyFS {
    fn exists(&self, _path: &str) -> bool {
        true
    }

    fn open_read(&self, path: &str) -> VfsResult<AssetStream> {
        Err(VfsError::IoError(format!("device busy: {}", path)))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

fn read(manager: &AssetManager, path: &str) -> String {
    let mut s = String::new();
    manager.open(path).unwrap().read_to_string(&mut s).unwrap();
    s
}

fn mem(files: &[(&str, &str)]) -> Arc<MemFS> {
    let fs = Arc::new(MemFS::new());
    for (path, data) in files {
        fs.write(path, data.as_bytes());
    }
    fs
}

#[test]
fn test_later_mount_shadows_and_unmount_restores() {
    let manager = AssetManager::with_config(AssetConfig::single_threaded());
    manager.mount("content/", mem(&[("a.txt", "A")]), false).unwrap();
    manager.mount("content", mem(&[("a.txt", "B")]), false).unwrap();

    assert_eq!(read(&manager, "content/a.txt"), "B");

    let removed = manager.unmount("content/").unwrap();
    assert_eq!(removed.prefix, "content/");
    assert_eq!(read(&manager, "content/a.txt"), "A");
}

#[test]
fn test_open_failure_falls_back_to_earlier_mount() {
    let manager = AssetManager::with_config(AssetConfig::single_threaded());
    manager.mount("", mem(&[("a.txt", "good")]), false).unwrap();
    manager.mount("", Arc::new(FlakyFS), false).unwrap();

    assert_eq!(read(&manager, "a.txt"), "good");
    assert!(matches!(
        manager.open("missing.txt"),
        Err(AssetError::NotFound { .. })
    ));
}

#[test]
fn test_nested_prefixes() {
    let manager = AssetManager::with_config(AssetConfig::single_threaded());
    manager.mount("", mem(&[("ui/a.txt", "root")]), false).unwrap();
    manager.mount("ui", mem(&[("b.txt", "ui")]), false).unwrap();

    assert_eq!(read(&manager, "ui/a.txt"), "root");
    assert_eq!(read(&manager, "ui/b.txt"), "ui");
    assert!(manager.exists("/ui\\b.txt"));
    assert!(!manager.exists("ui/c.txt"));
}

#[test]
fn test_mount_listing() {
    let manager = AssetManager::with_config(AssetConfig::single_threaded());
    manager.mount("base", mem(&[]), false).unwrap();
    manager.mount("/mods/", Arc::new(FlakyFS), true).unwrap();

    let mounts = manager.mounts();
    let listing: Vec<_> = mounts
        .iter()
        .map(|m| (m.prefix.as_str(), m.name.as_str(), m.hot_reload))
        .collect();
    assert_eq!(
        listing,
        vec![("mods/", "flaky", true), ("base/", "memfs", false)]
    );

    assert_eq!(
        manager.unmount("nowhere").unwrap_err(),
        AssetError::MountNotFound {
            prefix: "nowhere".into()
        }
    );
}
