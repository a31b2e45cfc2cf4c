//! Process-wide state shared by the frame loop and the background workers.
//!
//! Field groups have exactly one writer each:
//! - entity lists and the profile: the worker holding the matching gate;
//! - download progress: the download worker;
//! - [`Navigation`]: the dispatcher thread;
//! - `download_queue`: the dispatcher, and only after winning the download gate.
//!
//! Lists are published by swapping an `Arc`, so readers hold either the
//! previous complete list or the new complete list.

pub mod filter;
pub mod gate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::ApiError;
use crate::models::{Collection, Item, ItemScope, Platform, Profile};

pub use filter::Filter;
pub use gate::{AbortSignal, Gate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Platforms,
    Collections,
    Items,
}

/// Asynchronous resources guarded by a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Platforms,
    Collections,
    Items,
    Download,
    Profile,
}

/// A list replaced wholesale, never patched in place.
#[derive(Debug)]
pub struct ListCell<T> {
    inner: RwLock<Arc<Vec<T>>>,
}

impl<T> Default for ListCell<T> {
    fn default() -> Self {
        Self { inner: RwLock::new(Arc::new(Vec::new())) }
    }
}

impl<T> ListCell<T> {
    pub fn load(&self) -> Arc<Vec<T>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn replace(&self, list: Vec<T>) {
        let next = Arc::new(list);
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot the renderer reads every frame. Written only by the download worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    pub downloading_item: Option<Item>,
    /// 1-based, for "position/total".
    pub downloading_item_position: usize,
    pub queue_len: usize,
    pub downloaded_percent: f32,
    pub extracting_item: bool,
    pub extracted_percent: f32,
}

/// Dispatcher-owned view state.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub current_view: View,
    pub selected_platform: Option<Platform>,
    pub selected_collection: Option<Collection>,
    pub selected_virtual_collection: Option<Collection>,
    pub current_filter: Filter,
    /// `items` filtered by `current_filter`; rebuilt every frame.
    pub items_to_show: Vec<Item>,
    pub multi_selected_items: Vec<Item>,
    pub start_menu_shown: bool,
    pub contextual_menu_shown: bool,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            current_view: View::Platforms,
            selected_platform: None,
            selected_collection: None,
            selected_virtual_collection: None,
            current_filter: Filter::default(),
            items_to_show: Vec::new(),
            multi_selected_items: Vec::new(),
            start_menu_shown: false,
            contextual_menu_shown: false,
        }
    }
}

impl Navigation {
    pub fn select_platform(&mut self, platform: Platform) {
        self.clear_selection();
        self.selected_platform = Some(platform);
        self.current_view = View::Items;
    }

    pub fn select_collection(&mut self, collection: Collection) {
        self.clear_selection();
        if collection.is_virtual {
            self.selected_virtual_collection = Some(collection);
        } else {
            self.selected_collection = Some(collection);
        }
        self.current_view = View::Items;
    }

    pub fn clear_selection(&mut self) {
        self.selected_platform = None;
        self.selected_collection = None;
        self.selected_virtual_collection = None;
    }

    /// The view the items list was entered from.
    pub fn origin_view(&self) -> View {
        if self.selected_collection.is_some() || self.selected_virtual_collection.is_some() {
            View::Collections
        } else {
            View::Platforms
        }
    }

    pub fn item_scope(&self) -> Option<ItemScope> {
        if let Some(platform) = &self.selected_platform {
            Some(ItemScope::Platform(platform.id))
        } else if let Some(collection) = &self.selected_collection {
            Some(ItemScope::Collection(collection.id.clone()))
        } else {
            self.selected_virtual_collection
                .as_ref()
                .map(|c| ItemScope::VirtualCollection(c.id.clone()))
        }
    }

    pub fn is_multi_selected(&self, item: &Item) -> bool {
        self.multi_selected_items.iter().any(|it| it.id == item.id)
    }

    /// Adds or removes by item id, never by row position.
    pub fn toggle_multi_select(&mut self, item: &Item) {
        if let Some(pos) = self.multi_selected_items.iter().position(|it| it.id == item.id) {
            self.multi_selected_items.remove(pos);
        } else {
            self.multi_selected_items.push(item.clone());
        }
    }

    pub fn all_selected(&self) -> bool {
        !self.multi_selected_items.is_empty() && self.multi_selected_items.len() >= self.items_to_show.len()
    }

    pub fn toggle_select_all(&mut self) {
        if self.multi_selected_items.len() == self.items_to_show.len() {
            self.multi_selected_items.clear();
        } else {
            self.multi_selected_items = self.items_to_show.clone();
        }
    }
}

pub struct SharedState {
    pub platforms_ready: Gate,
    pub collections_ready: Gate,
    pub items_ready: Gate,
    pub download_ready: Gate,
    pub profile_ready: Gate,
    pub abort_download: AbortSignal,

    pub platforms: ListCell<Platform>,
    pub collections: ListCell<Collection>,
    pub items: ListCell<Item>,
    pub download_queue: ListCell<Item>,

    profile: RwLock<Option<Profile>>,
    progress: Mutex<DownloadProgress>,
    valid_host: AtomicBool,
    valid_credentials: AtomicBool,
    nav: Mutex<Navigation>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Platforms, collections and the profile are fetched at startup, so
    /// their gates start busy.
    pub fn new() -> Self {
        Self {
            platforms_ready: Gate::busy("platforms"),
            collections_ready: Gate::busy("collections"),
            items_ready: Gate::idle("items"),
            download_ready: Gate::idle("download"),
            profile_ready: Gate::busy("profile"),
            abort_download: AbortSignal::default(),
            platforms: ListCell::default(),
            collections: ListCell::default(),
            items: ListCell::default(),
            download_queue: ListCell::default(),
            profile: RwLock::new(None),
            progress: Mutex::new(DownloadProgress::default()),
            valid_host: AtomicBool::new(true),
            valid_credentials: AtomicBool::new(true),
            nav: Mutex::new(Navigation::default()),
        }
    }

    pub fn gate(&self, resource: Resource) -> &Gate {
        match resource {
            Resource::Platforms => &self.platforms_ready,
            Resource::Collections => &self.collections_ready,
            Resource::Items => &self.items_ready,
            Resource::Download => &self.download_ready,
            Resource::Profile => &self.profile_ready,
        }
    }

    pub fn nav(&self) -> MutexGuard<'_, Navigation> {
        self.nav.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn progress(&self) -> DownloadProgress {
        self.progress.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update_progress<F>(&self, f: F)
    where
        F: FnOnce(&mut DownloadProgress),
    {
        let mut guard = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *guard);
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_profile(&self, profile: Profile) {
        *self.profile.write().unwrap_or_else(|e| e.into_inner()) = Some(profile);
    }

    /// Collapses any API failure into one of the two one-shot flags.
    pub fn report_api_error(&self, err: &ApiError) {
        if err.is_permission_denied() {
            self.valid_credentials.store(false, Ordering::Release);
        } else {
            self.valid_host.store(false, Ordering::Release);
        }
    }

    /// Read-and-reset: true exactly once per reported host failure.
    pub fn take_host_error(&self) -> bool {
        !self.valid_host.swap(true, Ordering::AcqRel)
    }

    pub fn take_credentials_error(&self) -> bool {
        !self.valid_credentials.swap(true, Ordering::AcqRel)
    }

    /// Hands a batch to the download worker. Callers must hold the download gate.
    pub fn start_download(&self, queue: Vec<Item>) {
        self.abort_download.clear();
        self.update_progress(|p| {
            *p = DownloadProgress { queue_len: queue.len(), ..DownloadProgress::default() };
        });
        self.download_queue.replace(queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_utils::{collection, item, platform};
    use std::thread;

    #[test]
    fn startup_gate_states() {
        let state = SharedState::new();
        assert!(!state.platforms_ready.is_idle());
        assert!(!state.collections_ready.is_idle());
        assert!(!state.profile_ready.is_idle());
        assert!(state.items_ready.is_idle());
        assert!(state.download_ready.is_idle());
        assert!(!state.abort_download.is_requested());
        assert_eq!(state.nav().current_view, View::Platforms);
    }

    #[test]
    fn readers_never_see_a_mixed_list() {
        let state = Arc::new(SharedState::new());
        let old: Vec<Item> = (0..50).map(|i| item(i, "nes", "old.nes")).collect();
        let new: Vec<Item> = (100..180).map(|i| item(i, "snes", "new.sfc")).collect();
        state.items.replace(old);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = state.items.load();
                        let all_old = snapshot.len() == 50 && snapshot.iter().all(|it| it.platform_slug == "nes");
                        let all_new = snapshot.len() == 80 && snapshot.iter().all(|it| it.platform_slug == "snes");
                        assert!(all_old || all_new);
                    }
                })
            })
            .collect();

        state.items.replace(new);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(state.items.len(), 80);
    }

    #[test]
    fn error_flags_are_one_shot() {
        let state = SharedState::new();
        assert!(!state.take_host_error());

        state.report_api_error(&ApiError::HostUnreachable { host: "h".into(), message: "refused".into() });
        assert!(state.take_host_error());
        assert!(!state.take_host_error());

        state.report_api_error(&ApiError::PermissionDenied);
        assert!(!state.take_host_error());
        assert!(state.take_credentials_error());
        assert!(!state.take_credentials_error());
    }

    #[test]
    fn multi_select_toggle_is_identity_keyed() {
        let mut nav = Navigation::default();
        let a = item(1, "nes", "a.nes");
        let b = item(2, "nes", "b.nes");
        nav.toggle_multi_select(&a);
        let before = nav.multi_selected_items.clone();

        nav.toggle_multi_select(&b);
        nav.toggle_multi_select(&b);
        assert_eq!(nav.multi_selected_items, before);

        // A reordered list still toggles the same entry.
        nav.items_to_show = vec![b.clone(), a.clone()];
        let row = nav.items_to_show[1].clone();
        nav.toggle_multi_select(&row);
        assert!(nav.multi_selected_items.is_empty());
    }

    #[test]
    fn select_all_toggles_against_visible_list() {
        let mut nav = Navigation::default();
        nav.items_to_show = vec![item(1, "gb", "a.gb"), item(2, "gb", "b.gb")];
        assert!(!nav.all_selected());

        nav.toggle_select_all();
        assert_eq!(nav.multi_selected_items.len(), 2);
        assert!(nav.all_selected());

        nav.toggle_select_all();
        assert!(nav.multi_selected_items.is_empty());
    }

    #[test]
    fn selections_are_mutually_exclusive() {
        let mut nav = Navigation::default();
        nav.select_platform(platform(4, "gba"));
        assert_eq!(nav.item_scope(), Some(ItemScope::Platform(4)));
        assert_eq!(nav.origin_view(), View::Platforms);

        nav.select_collection(collection("recent", true));
        assert!(nav.selected_platform.is_none());
        assert!(nav.selected_collection.is_none());
        assert_eq!(nav.item_scope(), Some(ItemScope::VirtualCollection("recent".into())));
        assert_eq!(nav.origin_view(), View::Collections);

        nav.select_collection(collection("7", false));
        assert!(nav.selected_virtual_collection.is_none());
        assert_eq!(nav.item_scope(), Some(ItemScope::Collection("7".into())));

        nav.clear_selection();
        assert_eq!(nav.item_scope(), None);
    }

    #[test]
    fn start_download_resets_progress_and_abort() {
        let state = SharedState::new();
        state.abort_download.request();
        state.update_progress(|p| p.downloaded_percent = 80.0);

        state.start_download(vec![item(1, "nes", "a.nes"), item(2, "nes", "b.nes")]);
        assert!(!state.abort_download.is_requested());
        let progress = state.progress();
        assert_eq!(progress.queue_len, 2);
        assert_eq!(progress.downloaded_percent, 0.0);
        assert_eq!(state.download_queue.len(), 2);
    }
}
