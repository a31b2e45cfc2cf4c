//! Background operations. Each runs on its own thread, publishes into
//! [`SharedState`], and releases its gate on every exit path.
//!
//! Callers must already hold the gate (won with `Gate::try_mark_busy`, or a
//! gate that starts busy) before calling any `spawn_*` function.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::api::LibraryApi;
use crate::error::DownloadError;
use crate::models::{Item, ItemScope};
use crate::status::{Resource, SharedState};
use crate::storage::Storage;

fn spawn_gated<F>(state: Arc<SharedState>, resource: Resource, job: F) -> Option<JoinHandle<()>>
where
    F: FnOnce(&SharedState) + Send + 'static,
{
    let name = format!("romdeck-{}", state.gate(resource).name());
    let worker_state = Arc::clone(&state);
    let spawned = thread::Builder::new().name(name).spawn(move || {
        let _release = worker_state.gate(resource).release_on_drop();
        job(&worker_state);
    });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(resource = ?resource, error = %e, "failed to spawn worker thread");
            state.gate(resource).mark_idle();
            None
        }
    }
}

pub fn spawn_fetch_platforms(api: Arc<dyn LibraryApi>, state: Arc<SharedState>) -> Option<JoinHandle<()>> {
    spawn_gated(state, Resource::Platforms, move |state| match api.fetch_platforms() {
        Ok(platforms) => {
            info!(count = platforms.len(), "fetched platforms");
            state.platforms.replace(platforms);
        }
        Err(e) => {
            warn!(error = %e, "fetching platforms failed");
            state.report_api_error(&e);
        }
    })
}

pub fn spawn_fetch_collections(api: Arc<dyn LibraryApi>, state: Arc<SharedState>) -> Option<JoinHandle<()>> {
    spawn_gated(state, Resource::Collections, move |state| match api.fetch_collections() {
        Ok(collections) => {
            info!(count = collections.len(), "fetched collections");
            state.collections.replace(collections);
        }
        Err(e) => {
            warn!(error = %e, "fetching collections failed");
            state.report_api_error(&e);
        }
    })
}

/// Results for a scope the user has already left are dropped.
pub fn spawn_fetch_items(
    api: Arc<dyn LibraryApi>,
    state: Arc<SharedState>,
    scope: ItemScope,
) -> Option<JoinHandle<()>> {
    spawn_gated(state, Resource::Items, move |state| match api.fetch_items(&scope) {
        Ok(items) => {
            if state.nav().item_scope().as_ref() != Some(&scope) {
                debug!(?scope, "discarding items for a scope no longer shown");
                return;
            }
            info!(?scope, count = items.len(), "fetched items");
            state.items.replace(items);
        }
        Err(e) => {
            warn!(?scope, error = %e, "fetching items failed");
            state.report_api_error(&e);
        }
    })
}

pub fn spawn_fetch_profile(api: Arc<dyn LibraryApi>, state: Arc<SharedState>) -> Option<JoinHandle<()>> {
    spawn_gated(state, Resource::Profile, move |state| match api.fetch_profile() {
        Ok(profile) => {
            info!(username = %profile.username, "fetched profile");
            state.set_profile(profile);
        }
        Err(e) => {
            warn!(error = %e, "fetching profile failed");
            state.report_api_error(&e);
        }
    })
}

/// Works through `download_queue`. `storage` is a snapshot taken at spawn.
pub fn spawn_download(api: Arc<dyn LibraryApi>, state: Arc<SharedState>, storage: Storage) -> Option<JoinHandle<()>> {
    spawn_gated(state, Resource::Download, move |state| {
        let _reset = ProgressReset(state);
        run_download_queue(api.as_ref(), state, &storage);
    })
}

/// Clears the in-flight item when the download worker exits, panics included.
struct ProgressReset<'a>(&'a SharedState);

impl Drop for ProgressReset<'_> {
    fn drop(&mut self) {
        self.0.update_progress(|p| {
            p.downloading_item = None;
            p.extracting_item = false;
        });
    }
}

fn run_download_queue(api: &dyn LibraryApi, state: &SharedState, storage: &Storage) {
    let queue = state.download_queue.load();
    info!(count = queue.len(), root = %storage.active_root().display(), "starting downloads");

    for (idx, item) in queue.iter().enumerate() {
        if state.abort_download.is_requested() {
            info!(remaining = queue.len() - idx, "download aborted");
            break;
        }
        state.update_progress(|p| {
            p.downloading_item = Some(item.clone());
            p.downloading_item_position = idx + 1;
            p.queue_len = queue.len();
            p.downloaded_percent = 0.0;
            p.extracting_item = false;
            p.extracted_percent = 0.0;
        });

        match download_item(api, state, storage, item) {
            Ok(path) => info!(item = %item.name, path = %path.display(), "downloaded"),
            Err(DownloadError::Api(e)) => {
                warn!(item = %item.name, error = %e, "download failed, stopping queue");
                state.report_api_error(&e);
                break;
            }
            Err(e) => warn!(item = %item.name, error = %e, "skipping item"),
        }
    }
}

fn download_item(api: &dyn LibraryApi, state: &SharedState, storage: &Storage, item: &Item) -> Result<PathBuf, DownloadError> {
    let dir = storage.platform_directory(&item.platform_slug);
    fs::create_dir_all(&dir).map_err(|e| DownloadError::io(&dir, e))?;

    let target = storage.item_path(item);
    let part = with_suffix(&target, ".part");

    let mut stream = api.download(item)?;
    let total = stream.total_bytes.or(Some(item.fs_size_bytes)).filter(|n| *n > 0);
    if let Err(e) = write_stream(&mut stream.reader, &part, total, |pct| {
        state.update_progress(|p| p.downloaded_percent = p.downloaded_percent.max(pct));
    }) {
        let _ = fs::remove_file(&part);
        return Err(e);
    }
    state.update_progress(|p| p.downloaded_percent = 100.0);

    if item.is_archive() {
        state.update_progress(|p| p.extracting_item = true);
        let staging = with_suffix(&target, ".extracting");
        let extracted = extract_zip(&part, &staging, |pct| {
            state.update_progress(|p| p.extracted_percent = p.extracted_percent.max(pct));
        })
        .and_then(|()| {
            if target.exists() {
                fs::remove_dir_all(&target).map_err(|e| DownloadError::io(&target, e))?;
            }
            fs::rename(&staging, &target).map_err(|e| DownloadError::io(&target, e))
        });
        let _ = fs::remove_file(&part);
        if extracted.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        extracted?;
    } else {
        fs::rename(&part, &target).map_err(|e| DownloadError::io(&target, e))?;
    }
    Ok(target)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn write_stream<R, F>(reader: &mut R, dest: &Path, total: Option<u64>, mut on_progress: F) -> Result<u64, DownloadError>
where
    R: Read + ?Sized,
    F: FnMut(f32),
{
    let mut file = File::create(dest).map_err(|e| DownloadError::io(dest, e))?;
    let mut buffer = [0; 8192];
    let mut downloaded: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::io(dest, e)),
        };
        file.write_all(&buffer[..n]).map_err(|e| DownloadError::io(dest, e))?;
        downloaded += n as u64;

        if let Some(t) = total {
            on_progress(percent(downloaded, t));
        }
    }
    file.flush().map_err(|e| DownloadError::io(dest, e))?;
    Ok(downloaded)
}

fn extract_zip<F>(archive_path: &Path, dest: &Path, mut on_progress: F) -> Result<(), DownloadError>
where
    F: FnMut(f32),
{
    let file = File::open(archive_path).map_err(|e| DownloadError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DownloadError::Archive { path: archive_path.to_path_buf(), message: e.to_string() })?;
    fs::create_dir_all(dest).map_err(|e| DownloadError::io(dest, e))?;

    let count = archive.len();
    for i in 0..count {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DownloadError::Archive { path: archive_path.to_path_buf(), message: e.to_string() })?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let out = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| DownloadError::io(&out, e))?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
            }
            let mut writer = File::create(&out).map_err(|e| DownloadError::io(&out, e))?;
            io::copy(&mut entry, &mut writer).map_err(|e| DownloadError::io(&out, e))?;
        }
        on_progress(percent((i + 1) as u64, count as u64));
    }
    Ok(())
}

fn percent(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 100.0;
    }
    ((done as f64 / total as f64) * 100.0).min(100.0) as f32
}
