/*!
 * Archive Reload Tests
 * Archive-backed mounts through the manager, including the buffered load path
 */

use asset_vfs::{ArchiveFS, LoadState};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use crate::common::{counting_text_loader, eventually, manager, watching_manager, Text};

fn write_zip(path: &Path, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_archive_reload_evicts_changed_entries() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pack.zip");
    write_zip(&path, &[("ui/title.txt", "v1"), ("ui/old.txt", "old")]);

    let manager = manager(2);
    let invocations = Arc::new(AtomicUsize::new(0));
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::clone(&invocations)), true)
        .unwrap();

    let archive = Arc::new(ArchiveFS::open(&path).unwrap());
    manager.mount("pack", archive.clone(), true).unwrap();

    let title = manager.load::<Text>("pack/ui/title.txt").unwrap();
    let old = manager.load::<Text>("pack/ui/old.txt").unwrap();
    assert_eq!(title.value().unwrap().0, "v1");
    assert_eq!(old.value().unwrap().0, "old");

    write_zip(&path, &[("ui/title.txt", "v2"), ("ui/new.txt", "new")]);
    let diff = archive.reload().unwrap();
    assert_eq!(diff.changed, vec!["ui/title.txt"]);
    assert_eq!(diff.deleted, vec!["ui/old.txt"]);
    assert_eq!(diff.added, vec!["ui/new.txt"]);

    assert_eq!(title.state(), LoadState::Unloaded);
    // Deleted entries stay cached with their last value
    assert_eq!(old.state(), LoadState::Loaded);

    assert_eq!(title.value().unwrap().0, "v2");
    assert_eq!(
        manager.load::<Text>("pack/ui/new.txt").unwrap().value().unwrap().0,
        "new"
    );
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
}

#[test]
fn test_archive_shadows_folder() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("a.txt"), b"folder").unwrap();
    std::fs::write(assets.join("b.txt"), b"folder-b").unwrap();

    let path = temp.path().join("patch.zip");
    write_zip(&path, &[("a.txt", "patched")]);

    let manager = manager(2);
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), true)
        .unwrap();
    manager
        .mount("", Arc::new(asset_vfs::LocalFS::new(&assets)), false)
        .unwrap();
    manager
        .mount("", Arc::new(ArchiveFS::open(&path).unwrap()), false)
        .unwrap();

    assert_eq!(manager.load::<Text>("a.txt").unwrap().value().unwrap().0, "patched");
    assert_eq!(manager.load::<Text>("b.txt").unwrap().value().unwrap().0, "folder-b");
}

#[test]
fn test_watched_archive_reloads_after_replace() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pack.zip");
    write_zip(&path, &[("ui/title.txt", "v1")]);

    let manager = watching_manager();
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), true)
        .unwrap();
    manager.mount_archive("pack", &path, true).unwrap();

    let title = manager.load::<Text>("pack/ui/title.txt").unwrap();
    assert_eq!(title.value().unwrap().0, "v1");

    // Build tools write elsewhere and rename over the archive
    let staging = temp.path().join("pack.zip.tmp");
    write_zip(&staging, &[("ui/title.txt", "v2")]);
    std::fs::rename(&staging, &path).unwrap();

    assert!(eventually(|| title.value().unwrap().0 == "v2"));
    assert!(manager.stats().hot_reloads >= 1);
}
