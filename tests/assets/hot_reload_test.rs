/*!
 * Hot Reload Tests
 * Change notifications evict cached entries; deletions only warn
 */

use asset_vfs::{FileSystem, LoadState, LocalFS, MemFS};
use pretty_assertions::assert_eq;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{counting_text_loader, eventually, manager, watching_manager, Text};

#[test]
fn test_greeting_scenario() {
    let manager = manager(2);
    let invocations = Arc::new(AtomicUsize::new(0));
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::clone(&invocations)), true)
        .unwrap();

    let fs = Arc::new(MemFS::new());
    fs.write("greeting.txt", b"hi");
    manager.mount("content/", fs.clone(), true).unwrap();

    let handle = manager.load::<Text>("content/greeting.txt").unwrap();
    assert_eq!(handle.value().unwrap().0, "hi");

    fs.write("greeting.txt", b"bye");
    assert_eq!(manager.state("content/greeting.txt"), LoadState::Unloaded);

    let reloaded = manager.load::<Text>("content/greeting.txt").unwrap();
    assert_eq!(reloaded.value().unwrap().0, "bye");
    assert_eq!(invocations.load(Ordering::SeqCst), 2);

    // The original handle follows the cache
    assert_eq!(handle.value().unwrap().0, "bye");
    assert_eq!(manager.stats().hot_reloads, 1);
}

#[test]
fn test_handle_reloads_lazily_after_change() {
    let manager = manager(1);
    let invocations = Arc::new(AtomicUsize::new(0));
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::clone(&invocations)), false)
        .unwrap();

    let fs = Arc::new(MemFS::new());
    fs.write("a.txt", b"one");
    manager.mount("", fs.clone(), true).unwrap();

    let handle = manager.load::<Text>("a.txt").unwrap();
    fs.write("a.txt", b"two");

    // Eviction does not start a new load by itself
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(handle.value().unwrap().0, "two");
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[test]
fn test_change_to_uncached_path_is_ignored() {
    let manager = manager(1);
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), false)
        .unwrap();

    let fs = Arc::new(MemFS::new());
    fs.write("a.txt", b"one");
    fs.write("b.txt", b"one");
    manager.mount("", fs.clone(), true).unwrap();
    manager.load::<Text>("a.txt").unwrap();

    fs.write("b.txt", b"two");
    assert_eq!(manager.state("a.txt"), LoadState::Loaded);
    assert_eq!(manager.stats().hot_reloads, 0);
}

#[test]
fn test_delete_does_not_evict() {
    let manager = manager(1);
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), false)
        .unwrap();

    let fs = Arc::new(MemFS::new());
    fs.write("a.txt", b"one");
    manager.mount("", fs.clone(), true).unwrap();

    let handle = manager.load::<Text>("a.txt").unwrap();
    fs.remove("a.txt").unwrap();

    assert_eq!(handle.state(), LoadState::Loaded);
    assert_eq!(handle.value().unwrap().0, "one");
}

#[test]
fn test_change_during_load_evicts_after_completion() {
    let manager = manager(2);
    let fs = Arc::new(MemFS::new());
    fs.write("a.txt", b"one");
    manager.mount("", fs.clone(), true).unwrap();

    let (gate_tx, gate_rx) = flume::bounded::<()>(1);
    manager
        .register_factory::<Text, _>(
            move |reader: &mut dyn Read| {
                gate_rx.recv().ok();
                let mut s = String::new();
                reader.read_to_string(&mut s)?;
                Ok(Text(s))
            },
            true,
        )
        .unwrap();

    manager.load::<Text>("a.txt").unwrap();
    assert_eq!(manager.state("a.txt"), LoadState::Loading);

    let notified = Arc::new(AtomicBool::new(false));
    let writer = {
        let fs = fs.clone();
        let notified = Arc::clone(&notified);
        thread::spawn(move || {
            fs.write("a.txt", b"two");
            notified.store(true, Ordering::SeqCst);
        })
    };

    // The notification blocks until the in-flight load finishes
    thread::sleep(Duration::from_millis(50));
    assert!(!notified.load(Ordering::SeqCst));

    gate_tx.send(()).unwrap();
    writer.join().unwrap();
    assert_eq!(manager.state("a.txt"), LoadState::Unloaded);

    gate_tx.send(()).unwrap();
    assert_eq!(manager.load::<Text>("a.txt").unwrap().value().unwrap().0, "two");
}

#[test]
fn test_unmounted_filesystem_no_longer_evicts() {
    let manager = manager(1);
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), false)
        .unwrap();

    let base = Arc::new(MemFS::new());
    base.write("a.txt", b"base");
    let overlay = Arc::new(MemFS::new());
    overlay.write("a.txt", b"overlay");

    manager.mount("", base.clone(), false).unwrap();
    manager.mount("", overlay.clone(), true).unwrap();
    assert_eq!(manager.load::<Text>("a.txt").unwrap().value().unwrap().0, "overlay");

    manager.unmount("").unwrap();
    assert_eq!(overlay.events().unwrap().listener_count(), 0);

    overlay.write("a.txt", b"changed");
    assert_eq!(manager.state("a.txt"), LoadState::Loaded);

    manager.unload("a.txt");
    assert_eq!(manager.load::<Text>("a.txt").unwrap().value().unwrap().0, "base");
}

#[test]
fn test_local_folder_notifications() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.txt"), b"v1").unwrap();

    let manager = manager(2);
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), true)
        .unwrap();

    let local = Arc::new(LocalFS::new(temp.path()));
    manager.mount("cfg", local.clone(), true).unwrap();

    let handle = manager.load::<Text>("cfg/config.txt").unwrap();
    assert_eq!(handle.value().unwrap().0, "v1");

    std::fs::write(temp.path().join("config.txt"), b"v2").unwrap();
    local.notify_changed("config.txt");
    assert_eq!(handle.state(), LoadState::Unloaded);
    assert_eq!(handle.value().unwrap().0, "v2");

    local.notify_deleted("config.txt");
    assert_eq!(handle.state(), LoadState::Loaded);
}

#[test]
fn test_watched_folder_picks_up_back_to_back_saves() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("config.txt");
    std::fs::write(&file, b"v1").unwrap();

    let manager = watching_manager();
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), true)
        .unwrap();
    manager.mount_folder("cfg", temp.path(), true).unwrap();

    let handle = manager.load::<Text>("cfg/config.txt").unwrap();
    assert_eq!(handle.value().unwrap().0, "v1");

    std::fs::write(&file, b"v2").unwrap();
    assert!(eventually(|| handle.value().unwrap().0 == "v2"));

    // A second save right after the first must not be swallowed
    std::fs::write(&file, b"v3").unwrap();
    assert!(eventually(|| handle.value().unwrap().0 == "v3"));
    assert!(manager.stats().hot_reloads >= 2);
}

#[test]
fn test_unmounted_folder_stops_watching() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("config.txt");
    std::fs::write(&file, b"v1").unwrap();

    let manager = watching_manager();
    manager
        .register_factory::<Text, _>(counting_text_loader(Arc::new(AtomicUsize::new(0))), true)
        .unwrap();
    manager.mount_folder("cfg", temp.path(), true).unwrap();
    manager.unmount("cfg").unwrap();

    let base = Arc::new(MemFS::new());
    base.write("config.txt", b"memory");
    manager.mount("cfg", base, false).unwrap();
    assert_eq!(manager.load::<Text>("cfg/config.txt").unwrap().value().unwrap().0, "memory");

    std::fs::write(&file, b"v2").unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(manager.state("cfg/config.txt"), LoadState::Loaded);
    assert_eq!(manager.stats().hot_reloads, 0);
}
