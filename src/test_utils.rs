//! Fixtures and an in-memory library for tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use crate::api::{DownloadStream, LibraryApi};
use crate::config::StorageConfig;
use crate::error::ApiError;
use crate::models::{Collection, Item, ItemScope, Platform, Profile};
use crate::status::{Gate, SharedState};
use crate::storage::Storage;

pub fn item(id: u64, platform_slug: &str, fs_name: &str) -> Item {
    Item {
        id,
        name: fs_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(fs_name).to_string(),
        fs_name: fs_name.to_string(),
        platform_slug: platform_slug.to_string(),
        fs_size_bytes: 1024,
        multi: false,
    }
}

pub fn platform(id: u64, slug: &str) -> Platform {
    Platform { id, slug: slug.to_string(), display_name: slug.to_uppercase(), rom_count: 1 }
}

pub fn collection(id: &str, is_virtual: bool) -> Collection {
    Collection { id: id.to_string(), name: format!("Collection {id}"), is_virtual, rom_count: 1 }
}

pub fn storage_at(root: PathBuf) -> Storage {
    let mut config = StorageConfig::default();
    config.roots = vec![root];
    Storage::new(&config).unwrap()
}

/// Polls until the gate is idle; false on timeout.
pub fn wait_idle(gate: &Gate) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if gate.is_idle() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// What [`MockLibrary`] should do on a call.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(fn() -> ApiError),
    Panic,
}

/// In-memory [`LibraryApi`] that counts calls per operation.
pub struct MockLibrary {
    pub platforms: Vec<Platform>,
    pub collections: Vec<Collection>,
    pub items: Vec<Item>,
    pub payloads: HashMap<u64, Vec<u8>>,
    pub behavior: Mutex<Behavior>,
    pub calls: Mutex<HashMap<&'static str, usize>>,
    pub downloads: AtomicUsize,
    /// Download ids that fail with a host error.
    pub failing_downloads: HashSet<u64>,
    /// Requests abort on this state once the given item id has been served.
    pub abort_after: Mutex<Option<(u64, Arc<SharedState>)>>,
    /// When set, `fetch_items` blocks until a message arrives.
    pub hold_items: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Default for MockLibrary {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            collections: Vec::new(),
            items: Vec::new(),
            payloads: HashMap::new(),
            behavior: Mutex::new(Behavior::Succeed),
            calls: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            failing_downloads: HashSet::new(),
            abort_after: Mutex::new(None),
            hold_items: Mutex::new(None),
        }
    }
}

impl MockLibrary {
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn enter<T>(&self, op: &'static str, ok: impl FnOnce() -> T) -> Result<T, ApiError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Succeed => Ok(ok()),
            Behavior::Fail(make) => Err(make()),
            Behavior::Panic => panic!("mock {op} panicked"),
        }
    }
}

impl LibraryApi for MockLibrary {
    fn host(&self) -> &str {
        "http://mock.romm"
    }

    fn fetch_platforms(&self) -> Result<Vec<Platform>, ApiError> {
        self.enter("platforms", || self.platforms.clone())
    }

    fn fetch_collections(&self) -> Result<Vec<Collection>, ApiError> {
        self.enter("collections", || self.collections.clone())
    }

    fn fetch_items(&self, _scope: &ItemScope) -> Result<Vec<Item>, ApiError> {
        if let Some(rx) = self.hold_items.lock().unwrap().take() {
            let _ = rx.recv_timeout(Duration::from_secs(5));
        }
        self.enter("items", || self.items.clone())
    }

    fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.enter("profile", || Profile { username: "player1".into(), role: "viewer".into() })
    }

    fn download(&self, item: &Item) -> Result<DownloadStream, ApiError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.failing_downloads.contains(&item.id) {
            return Err(ApiError::HostUnreachable { host: self.host().into(), message: "reset".into() });
        }
        let body = self.payloads.get(&item.id).cloned().unwrap_or_else(|| vec![7u8; 4096]);
        if let Some((id, state)) = self.abort_after.lock().unwrap().as_ref() {
            if *id == item.id {
                state.abort_download.request();
            }
        }
        self.enter("download", || DownloadStream {
            total_bytes: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body)),
        })
    }
}
