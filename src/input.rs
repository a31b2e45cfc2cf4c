use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Logical controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    A,
    B,
    X,
    Y,
    Start,
    Select,
    R1,
    /// Opens the start menu.
    Menu,
    Up,
    Down,
    Left,
    Right,
    /// Window close or Ctrl-C; handled like the Exit menu entry.
    Quit,
}

impl Key {
    /// Keyboard layout standing in for the handheld's buttons.
    pub fn from_event(key: &KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Key::Quit);
        }
        Some(match key.code {
            KeyCode::Enter | KeyCode::Char('a') => Key::A,
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => Key::B,
            KeyCode::Char('x') => Key::X,
            KeyCode::Char('y') => Key::Y,
            KeyCode::Char('s') => Key::Start,
            KeyCode::Char(' ') => Key::Select,
            KeyCode::Tab | KeyCode::Char('r') => Key::R1,
            KeyCode::F(1) | KeyCode::Char('m') => Key::Menu,
            KeyCode::Up | KeyCode::Char('k') => Key::Up,
            KeyCode::Down | KeyCode::Char('j') => Key::Down,
            KeyCode::Left | KeyCode::PageUp | KeyCode::Char('h') => Key::Left,
            KeyCode::Right | KeyCode::PageDown | KeyCode::Char('l') => Key::Right,
            _ => return None,
        })
    }
}

/// Edge-triggered input: holds at most one press per frame.
#[derive(Debug, Default)]
pub struct Input {
    pressed: Option<Key>,
}

impl Input {
    /// Waits up to `timeout` for the next press, replacing whatever the
    /// previous frame left behind.
    pub fn poll(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.pressed = None;
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                self.pressed = Key::from_event(&key);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn press(&mut self, key: Key) {
        self.pressed = Some(key);
    }

    pub fn key(&self, key: Key) -> bool {
        self.pressed == Some(key)
    }

    /// Consumes the current press so a later handler in the same frame
    /// does not act on it again.
    pub fn reset_input(&mut self) {
        self.pressed = None;
    }

    /// Applies a pending directional press to `current` and consumes it.
    pub fn handle_navigation(&mut self, current: usize, page_size: usize, total: usize) -> usize {
        let Some(key) = self.pressed else {
            return navigate(None, current, page_size, total);
        };
        let next = navigate(Some(key), current, page_size, total);
        if matches!(key, Key::Up | Key::Down | Key::Left | Key::Right) {
            self.reset_input();
        }
        next
    }
}

/// Up/Down move one row and wrap; Left/Right move one page and clamp.
/// Always returns an index in `[0, total)`, or 0 when `total` is 0.
pub fn navigate(key: Option<Key>, current: usize, page_size: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let current = current.min(total - 1);
    let page = page_size.max(1);
    match key {
        Some(Key::Down) => {
            if current + 1 >= total { 0 } else { current + 1 }
        }
        Some(Key::Up) => {
            if current == 0 { total - 1 } else { current - 1 }
        }
        Some(Key::Right) => (current + page).min(total - 1),
        Some(Key::Left) => current.saturating_sub(page),
        _ => current,
    }
}
