use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::App;
use crate::app::state::{MenuAction, MenuEntry, NoticeKind, StartMenuOption};
use crate::input::Key;
use crate::models::Item;
use crate::status::{Navigation, View};
use crate::workers;

/// Y on the platforms view, and the retry on the connection error screen.
pub fn refresh_platforms(app: &mut App) {
    if app.state.platforms_ready.try_mark_busy() {
        workers::spawn_fetch_platforms(Arc::clone(&app.api), Arc::clone(&app.state));
    }
}

pub fn refresh_collections(app: &mut App) {
    if app.state.collections_ready.try_mark_busy() {
        workers::spawn_fetch_collections(Arc::clone(&app.api), Arc::clone(&app.state));
    }
}

/// Re-fetches the items of whatever scope is selected.
pub fn refresh_items(app: &mut App) {
    if !app.state.items_ready.try_mark_busy() {
        return;
    }
    let scope = {
        let mut nav = app.state.nav();
        nav.multi_selected_items.clear();
        nav.item_scope()
    };
    match scope {
        Some(scope) => {
            workers::spawn_fetch_items(Arc::clone(&app.api), Arc::clone(&app.state), scope);
        }
        None => app.state.items_ready.mark_idle(),
    }
}

/// Enters the items view for the row under the cursor, once the previous
/// items fetch has finished.
fn open_items<F>(app: &mut App, select: F)
where
    F: FnOnce(&mut Navigation),
{
    if !app.state.items_ready.try_mark_busy() {
        return;
    }
    app.state.items.clear();
    app.cursors.items = 0;
    let scope = {
        let mut nav = app.state.nav();
        select(&mut nav);
        nav.multi_selected_items.clear();
        nav.items_to_show.clear();
        nav.item_scope()
    };
    match scope {
        Some(scope) => {
            workers::spawn_fetch_items(Arc::clone(&app.api), Arc::clone(&app.state), scope);
        }
        None => app.state.items_ready.mark_idle(),
    }
}

pub fn update_platforms_view(app: &mut App) {
    let platforms = app.state.platforms.load();

    if app.input.key(Key::A) {
        if let Some(platform) = platforms.get(app.cursors.platforms).cloned() {
            info!(platform = %platform.slug, "opening platform");
            open_items(app, |nav| nav.select_platform(platform));
        }
        app.input.reset_input();
    } else if app.input.key(Key::Y) {
        refresh_platforms(app);
        app.input.reset_input();
    } else if app.input.key(Key::X) {
        app.state.nav().current_view = View::Collections;
        app.input.reset_input();
    } else if app.input.key(Key::Start) {
        if let Some(platform) = platforms.get(app.cursors.platforms).cloned() {
            open_contextual_menu(app, vec![MenuEntry::new("ⓘ Platform info", MenuAction::PlatformInfo(platform))]);
        }
        app.input.reset_input();
    } else {
        app.cursors.platforms = app.input.handle_navigation(app.cursors.platforms, app.page_size, platforms.len());
    }
}

pub fn update_collections_view(app: &mut App) {
    let collections = app.state.collections.load();

    if app.input.key(Key::A) {
        if let Some(collection) = collections.get(app.cursors.collections).cloned() {
            info!(collection = %collection.name, is_virtual = collection.is_virtual, "opening collection");
            open_items(app, |nav| nav.select_collection(collection));
        }
        app.input.reset_input();
    } else if app.input.key(Key::Y) {
        refresh_collections(app);
        app.input.reset_input();
    } else if app.input.key(Key::X) {
        app.state.nav().current_view = View::Platforms;
        app.input.reset_input();
    } else if app.input.key(Key::Start) {
        if let Some(collection) = collections.get(app.cursors.collections).cloned() {
            open_contextual_menu(
                app,
                vec![MenuEntry::new("ⓘ Collection info", MenuAction::CollectionInfo(collection))],
            );
        }
        app.input.reset_input();
    } else {
        app.cursors.collections =
            app.input.handle_navigation(app.cursors.collections, app.page_size, collections.len());
    }
}

pub fn update_items_view(app: &mut App) {
    let (items_to_show, current) = {
        let nav = app.state.nav();
        let current = nav.items_to_show.get(app.cursors.items).cloned();
        (nav.items_to_show.len(), current)
    };

    if app.input.key(Key::A) {
        start_download(app, current);
        app.input.reset_input();
    } else if app.input.key(Key::B) {
        let mut nav = app.state.nav();
        let origin = nav.origin_view();
        nav.clear_selection();
        nav.multi_selected_items.clear();
        nav.items_to_show.clear();
        nav.current_view = origin;
        drop(nav);
        app.state.items.clear();
        app.cursors.items = 0;
        app.input.reset_input();
    } else if app.input.key(Key::Y) {
        refresh_items(app);
        app.input.reset_input();
    } else if app.input.key(Key::X) {
        let mut nav = app.state.nav();
        nav.current_filter = nav.current_filter.next();
        drop(nav);
        app.cursors.items = 0;
        app.input.reset_input();
    } else if app.input.key(Key::R1) {
        if app.state.download_ready.is_idle() {
            app.state.nav().toggle_select_all();
        }
        app.input.reset_input();
    } else if app.input.key(Key::Select) {
        if app.state.download_ready.is_idle() {
            if let Some(item) = &current {
                app.state.nav().toggle_multi_select(item);
            }
        }
        app.input.reset_input();
    } else if app.input.key(Key::Start) {
        if let Some(item) = current {
            let mut entries = vec![MenuEntry::new("ⓘ Rom info", MenuAction::ItemInfo(item.clone()))];
            if app.storage.is_item_present(&item) && app.state.download_ready.is_idle() {
                entries.push(MenuEntry::new("✕ Remove from device", MenuAction::RemoveFromDevice(item)));
            }
            open_contextual_menu(app, entries);
        }
        app.input.reset_input();
    } else {
        app.cursors.items = app.input.handle_navigation(app.cursors.items, app.page_size, items_to_show);
    }
}

/// Queues the multi-selection, or the row under the cursor when nothing is
/// selected. Needs both the items and download gates idle.
fn start_download(app: &mut App, current: Option<Item>) {
    if !app.state.items_ready.is_idle() || !app.state.download_ready.try_mark_busy() {
        return;
    }
    let queue: Vec<Item> = {
        let nav = app.state.nav();
        if nav.multi_selected_items.is_empty() {
            current.into_iter().collect()
        } else {
            nav.multi_selected_items.clone()
        }
    };
    if queue.is_empty() {
        app.state.download_ready.mark_idle();
        return;
    }
    info!(count = queue.len(), "queueing downloads");
    app.state.start_download(queue);
    workers::spawn_download(Arc::clone(&app.api), Arc::clone(&app.state), app.storage.clone());
}

fn open_contextual_menu(app: &mut App, entries: Vec<MenuEntry>) {
    app.contextual_menu = entries;
    app.cursors.contextual_menu = 0;
    app.state.nav().contextual_menu_shown = true;
}

pub fn update_start_menu(app: &mut App) {
    if app.input.key(Key::A) {
        match StartMenuOption::ALL.get(app.cursors.start_menu).copied() {
            Some(StartMenuOption::AbortDownload) => {
                if !app.state.download_ready.is_idle() {
                    app.state.abort_download.request();
                    app.notify(NoticeKind::Info, "Aborting downloads...");
                } else {
                    app.notify(NoticeKind::Info, "No downloads in progress");
                }
                app.state.nav().start_menu_shown = false;
            }
            Some(StartMenuOption::SwitchStorage) => {
                match app.storage.switch_root().map(Path::to_path_buf) {
                    Ok(root) => {
                        let text = format!("Set download path to SD {}: {}", app.storage.active_slot(), root.display());
                        app.notify(NoticeKind::Success, text);
                    }
                    Err(e) => {
                        warn!(error = %e, "storage switch failed");
                        app.notify(NoticeKind::Error, format!("Error: {e}"));
                    }
                }
                app.free_space = app.storage.available_space();
                app.state.nav().start_menu_shown = false;
            }
            Some(StartMenuOption::Exit) => app.should_quit = true,
            None => {}
        }
        app.input.reset_input();
    } else if app.input.key(Key::B) {
        app.state.nav().start_menu_shown = false;
        app.input.reset_input();
    } else {
        let total = StartMenuOption::ALL.len();
        app.cursors.start_menu = app.input.handle_navigation(app.cursors.start_menu, total, total);
    }
}

pub fn update_contextual_menu(app: &mut App) {
    if app.input.key(Key::A) {
        if let Some(entry) = app.contextual_menu.get(app.cursors.contextual_menu).cloned() {
            run_menu_action(app, entry.action);
        }
        app.state.nav().contextual_menu_shown = false;
        app.input.reset_input();
    } else if app.input.key(Key::B) {
        app.state.nav().contextual_menu_shown = false;
        app.input.reset_input();
    } else {
        let total = app.contextual_menu.len();
        app.cursors.contextual_menu = app.input.handle_navigation(app.cursors.contextual_menu, total, total);
    }
}

fn run_menu_action(app: &mut App, action: MenuAction) {
    match action {
        MenuAction::PlatformInfo(platform) => {
            let text = format!("{} [{}]: {} roms", platform.display_name, platform.slug, platform.rom_count);
            app.notify(NoticeKind::Info, text);
        }
        MenuAction::CollectionInfo(collection) => {
            let kind = if collection.is_virtual { "virtual collection" } else { "collection" };
            let text = format!("{} ({kind}): {} roms", collection.name, collection.rom_count);
            app.notify(NoticeKind::Info, text);
        }
        MenuAction::ItemInfo(item) => {
            let text = format!("{} | {} | {}", item.fs_name, item.platform_slug, item.size_label());
            app.notify(NoticeKind::Info, text);
        }
        MenuAction::RemoveFromDevice(item) => match app.storage.remove_item(&item) {
            Ok(()) => {
                info!(item = %item.fs_name, "removed from device");
                app.notify(NoticeKind::Success, format!("Removed {}", item.fs_name));
                app.free_space = app.storage.available_space();
            }
            Err(e) => {
                warn!(item = %item.fs_name, error = %e, "remove failed");
                app.notify(NoticeKind::Error, format!("Error: {e}"));
            }
        },
    }
}

/// Keys honoured on every frame regardless of view.
pub fn update_common(app: &mut App) {
    if app.input.key(Key::Quit) {
        app.should_quit = true;
        app.input.reset_input();
        return;
    }
    let mut nav = app.state.nav();
    if app.input.key(Key::Menu) && !nav.contextual_menu_shown {
        nav.start_menu_shown = !nav.start_menu_shown;
        drop(nav);
        app.cursors.start_menu = 0;
        app.input.reset_input();
    } else if app.input.key(Key::Start) && nav.contextual_menu_shown {
        nav.contextual_menu_shown = false;
        drop(nav);
        app.input.reset_input();
    }
}

