/*!
 * Shared fixtures for asset tests
 */

use asset_vfs::{AssetConfig, AssetManager, BoxError};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Decoded text asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl asset_vfs::Asset for Text {}

/// Text loader that counts how often it ran
pub fn counting_text_loader(
    counter: Arc<AtomicUsize>,
) -> impl Fn(&mut dyn Read) -> Result<Text, BoxError> + Send + Sync + 'static {
    move |reader: &mut dyn Read| -> Result<Text, BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        Ok(Text(s))
    }
}

pub fn manager(workers: usize) -> AssetManager {
    asset_vfs::init_tracing();
    AssetManager::with_config(AssetConfig {
        worker_threads: workers,
        ..AssetConfig::default()
    })
}

/// Manager with a short watch debounce, for tests driven by real host events
pub fn watching_manager() -> AssetManager {
    asset_vfs::init_tracing();
    AssetManager::with_config(AssetConfig {
        worker_threads: 2,
        watch_poll_interval: Duration::from_millis(50),
        watch_debounce: Duration::from_millis(50),
        ..AssetConfig::default()
    })
}

/// Poll `condition` until it holds or five seconds pass
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}
