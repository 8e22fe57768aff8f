/*!
 * Event Tests
 * Backend notifications delivered to listeners and broadcast subscribers
 */

use asset_vfs::{FileEvent, FileSystem, LocalFS, MemFS};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use parking_lot::Mutex;

#[tokio::test]
async fn test_memfs_broadcasts_changes() {
    let fs = MemFS::new();
    let mut rx = fs.events().unwrap().subscribe();

    fs.write("a.txt", b"1");
    fs.write("a.txt", b"2");
    fs.remove("a.txt").unwrap();

    assert_eq!(rx.recv().await.unwrap(), FileEvent::created("a.txt"));
    assert_eq!(rx.recv().await.unwrap(), FileEvent::modified("a.txt"));
    assert_eq!(rx.recv().await.unwrap(), FileEvent::deleted("a.txt"));
}

#[test]
fn test_listeners_see_normalized_paths() {
    let temp = tempfile::TempDir::new().unwrap();
    let local = LocalFS::new(temp.path());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = local
        .events()
        .unwrap()
        .listen(move |event| sink.lock().push(event.clone()));

    local.notify_changed("/ui\\title.txt");
    local.notify_deleted("ui/./old.txt");
    assert!(local.events().unwrap().unlisten(id));
    local.notify_changed("ignored.txt");

    assert_eq!(
        *seen.lock(),
        vec![
            FileEvent::modified("ui/title.txt"),
            FileEvent::deleted("ui/old.txt"),
        ]
    );
}
