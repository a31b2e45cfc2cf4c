use std::time::{Duration, Instant};

use crate::models::{Collection, Item, Platform};

pub const NOTICE_TTL: Duration = Duration::from_secs(3);
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_SPEED: Duration = Duration::from_millis(50);

/// Row under the selection bar in each list. Dispatcher-local.
#[derive(Debug, Default, Clone)]
pub struct Cursors {
    pub platforms: usize,
    pub collections: usize,
    pub items: usize,
    pub start_menu: usize,
    pub contextual_menu: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMenuOption {
    AbortDownload,
    SwitchStorage,
    Exit,
}

impl StartMenuOption {
    pub const ALL: [StartMenuOption; 3] =
        [StartMenuOption::AbortDownload, StartMenuOption::SwitchStorage, StartMenuOption::Exit];

    pub fn label(self) -> &'static str {
        match self {
            StartMenuOption::AbortDownload => "✕ Abort downloads",
            StartMenuOption::SwitchStorage => "⇄ Switch SD",
            StartMenuOption::Exit => "⏻ Exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    PlatformInfo(Platform),
    CollectionInfo(Collection),
    ItemInfo(Item),
    RemoveFromDevice(Item),
}

/// One row of a contextual menu, built fresh each time the menu opens.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub action: MenuAction,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, action: MenuAction) -> Self {
        Self { label: label.into(), action }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A one-line message shown in the status bar for [`NOTICE_TTL`].
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    pub shown_at: Instant,
}

impl Notice {
    pub fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self { text: text.into(), kind, shown_at: Instant::now() }
    }

    pub fn is_fresh(&self) -> bool {
        self.shown_at.elapsed() < NOTICE_TTL
    }
}

#[derive(Debug)]
pub struct Spinner {
    frame: usize,
    last_update: Instant,
}

impl Default for Spinner {
    fn default() -> Self {
        Self { frame: 0, last_update: Instant::now() }
    }
}

impl Spinner {
    pub fn tick(&mut self) {
        if self.last_update.elapsed() >= SPINNER_SPEED {
            self.last_update = Instant::now();
            self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.frame]
    }
}

/// "current/total" page label; "0/0" for an empty list.
pub fn page_indicator(selected: usize, page_size: usize, total: usize) -> String {
    let page_size = page_size.max(1);
    let total_pages = total.div_ceil(page_size);
    if total_pages == 0 {
        return "0/0".to_string();
    }
    let current = (selected / page_size + 1).min(total_pages);
    format!("{current}/{total_pages}")
}

/// First row of the page containing `selected`.
pub fn page_start(selected: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    (selected / page_size) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_indicator_examples() {
        assert_eq!(page_indicator(0, 5, 0), "0/0");
        assert_eq!(page_indicator(0, 5, 7), "1/2");
        assert_eq!(page_indicator(4, 5, 7), "1/2");
        assert_eq!(page_indicator(5, 5, 7), "2/2");
        assert_eq!(page_indicator(6, 5, 7), "2/2");
        assert_eq!(page_indicator(0, 0, 3), "1/3");
    }

    #[test]
    fn page_start_aligns_to_page() {
        assert_eq!(page_start(0, 5), 0);
        assert_eq!(page_start(7, 5), 5);
        assert_eq!(page_start(3, 0), 3);
    }

    #[test]
    fn stale_notice_expires() {
        let mut notice = Notice::new(NoticeKind::Error, "Error: Permission denied");
        assert!(notice.is_fresh());
        notice.shown_at = Instant::now() - NOTICE_TTL;
        assert!(!notice.is_fresh());
    }

    #[test]
    fn start_menu_has_fixed_order() {
        assert_eq!(StartMenuOption::ALL[0], StartMenuOption::AbortDownload);
        assert_eq!(StartMenuOption::ALL[2].label(), "⏻ Exit");
    }
}
