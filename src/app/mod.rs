pub mod actions;
pub mod state;
pub mod ui;

use std::sync::Arc;
use std::time::Duration;

use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::api::LibraryApi;
use crate::config::UiConfig;
use crate::input::{Input, Key};
use crate::status::{SharedState, View};
use crate::storage::Storage;
use crate::workers;

use state::{Cursors, MenuEntry, Notice, NoticeKind, Spinner};

pub struct App {
    pub(crate) api: Arc<dyn LibraryApi>,
    pub(crate) state: Arc<SharedState>,
    pub(crate) storage: Storage,
    pub(crate) input: Input,
    pub(crate) cursors: Cursors,
    pub(crate) contextual_menu: Vec<MenuEntry>,
    pub(crate) page_size: usize,
    pub(crate) spinner: Spinner,
    pub(crate) notice: Option<Notice>,
    /// Full-screen error shown while there is nothing to browse.
    pub(crate) connection_error: Option<String>,
    pub(crate) free_space: Option<u64>,
    pub(crate) should_quit: bool,
    fixed_page_size: Option<usize>,
    frame_time: Duration,
    was_downloading: bool,
}

impl App {
    pub fn new(api: Arc<dyn LibraryApi>, state: Arc<SharedState>, storage: Storage, ui: &UiConfig) -> Self {
        let free_space = storage.available_space();
        Self {
            api,
            state,
            storage,
            input: Input::default(),
            cursors: Cursors::default(),
            contextual_menu: Vec::new(),
            page_size: ui.page_size.unwrap_or(10).max(1),
            spinner: Spinner::default(),
            notice: None,
            connection_error: None,
            free_space,
            should_quit: false,
            fixed_page_size: ui.page_size,
            frame_time: Duration::from_millis(ui.frame_ms.max(1)),
            was_downloading: false,
        }
    }

    /// Kicks off the startup fetches. Their gates start busy, so no
    /// `try_mark_busy` here.
    pub fn start(&mut self) {
        info!(host = %self.api.host(), root = %self.storage.active_root().display(), "starting");
        workers::spawn_fetch_platforms(Arc::clone(&self.api), Arc::clone(&self.state));
        workers::spawn_fetch_collections(Arc::clone(&self.api), Arc::clone(&self.state));
        workers::spawn_fetch_profile(Arc::clone(&self.api), Arc::clone(&self.state));
    }

    pub fn run(&mut self) -> Result<(), String> {
        if let Err(e) = enable_raw_mode() {
            return Err(format!("failed to enable raw mode: {e}"));
        }
        let mut stdout = std::io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            disable_raw_mode().ok();
            return Err(format!("failed to enter alternate screen: {e}"));
        }

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = match Terminal::new(backend) {
            Ok(t) => t,
            Err(e) => {
                disable_raw_mode().ok();
                return Err(format!("failed to create terminal: {e}"));
            }
        };

        self.start();
        let result = self.event_loop(&mut terminal);

        // Downloads in flight are abandoned; the .part file stays behind.
        if !self.state.download_ready.is_idle() {
            warn!("exiting with downloads in progress");
            self.state.abort_download.request();
        }

        disable_raw_mode().ok();
        terminal.backend_mut().execute(LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<(), String> {
        while !self.should_quit {
            if self.fixed_page_size.is_none() {
                let size = terminal.size().map_err(|e| format!("failed to read terminal size: {e}"))?;
                self.page_size = ui::list_rows(size.height);
            }

            if let Err(e) = terminal.draw(|f| ui::render(self, f)) {
                return Err(format!("failed to draw frame: {e}"));
            }

            if let Err(e) = self.input.poll(self.frame_time) {
                return Err(format!("failed to read input: {e}"));
            }
            self.tick();
        }
        info!("exiting");
        Ok(())
    }

    /// One frame of state bookkeeping and input dispatch.
    pub fn tick(&mut self) {
        self.spinner.tick();
        self.sync_lists();
        self.collect_api_errors();
        self.track_downloads();
        self.dispatch();
    }

    /// Rebuilds `items_to_show` and pulls cursors back inside their lists.
    fn sync_lists(&mut self) {
        self.cursors.platforms = clamp_cursor(self.cursors.platforms, self.state.platforms.len());
        self.cursors.collections = clamp_cursor(self.cursors.collections, self.state.collections.len());

        let items = self.state.items.load();
        let mut nav = self.state.nav();
        if nav.current_view != View::Items {
            return;
        }
        let storage = &self.storage;
        let filter = nav.current_filter;
        nav.items_to_show = filter.apply(&items, |it| storage.is_item_present(it));
        let shown = nav.items_to_show.len();
        drop(nav);
        self.cursors.items = clamp_cursor(self.cursors.items, shown);
    }

    /// Consumes the one-shot error flags raised by workers.
    fn collect_api_errors(&mut self) {
        let message = if self.state.take_host_error() {
            Some(format!("Error: Can't connect to host {}", self.api.host()))
        } else if self.state.take_credentials_error() {
            Some("Error: Permission denied".to_string())
        } else {
            None
        };

        if !self.state.platforms.is_empty() {
            self.connection_error = None;
        }
        let Some(message) = message else {
            return;
        };
        if self.state.platforms.is_empty() {
            self.connection_error = Some(message);
        } else {
            self.notify(NoticeKind::Error, message);
        }
    }

    fn track_downloads(&mut self) {
        let downloading = !self.state.download_ready.is_idle();
        if self.was_downloading && !downloading {
            self.free_space = self.storage.available_space();
            if self.state.abort_download.is_requested() {
                self.notify(NoticeKind::Info, "Downloads aborted");
            }
        }
        self.was_downloading = downloading;
    }

    fn dispatch(&mut self) {
        let (view, start_menu_shown, contextual_menu_shown) = {
            let nav = self.state.nav();
            (nav.current_view, nav.start_menu_shown, nav.contextual_menu_shown)
        };

        if self.connection_error.is_some() {
            if !start_menu_shown && self.input.key(Key::Y) {
                self.connection_error = None;
                actions::refresh_platforms(self);
                actions::refresh_collections(self);
                self.input.reset_input();
            }
        } else if !start_menu_shown && !contextual_menu_shown {
            match view {
                View::Platforms => actions::update_platforms_view(self),
                View::Collections => actions::update_collections_view(self),
                View::Items => actions::update_items_view(self),
            }
        }

        if start_menu_shown {
            actions::update_start_menu(self);
        } else if contextual_menu_shown {
            actions::update_contextual_menu(self);
        }

        actions::update_common(self);
    }

    pub(crate) fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice::new(kind, text));
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}
