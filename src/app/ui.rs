use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::App;
use crate::app::state::{NoticeKind, StartMenuOption, page_indicator, page_start};
use crate::status::{Navigation, View};

const HEADER_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;

/// List rows that fit between the header, status bar and footer.
pub fn list_rows(terminal_height: u16) -> usize {
    let chrome = HEADER_HEIGHT + STATUS_HEIGHT + FOOTER_HEIGHT + 2;
    usize::from(terminal_height.saturating_sub(chrome)).max(1)
}

pub fn render(app: &App, frame: &mut Frame) {
    let area = frame.area();
    let nav = app.state.nav();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(STATUS_HEIGHT),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);

    render_header(app, frame, main_layout[0]);
    match &app.connection_error {
        Some(message) => render_connection_error(message, frame, main_layout[1]),
        None => match nav.current_view {
            View::Platforms => render_platforms(app, frame, main_layout[1]),
            View::Collections => render_collections(app, frame, main_layout[1]),
            View::Items => render_items(app, &nav, frame, main_layout[1]),
        },
    }
    render_status(app, &nav, frame, main_layout[2]);
    render_footer(app, &nav, frame, main_layout[3]);

    if nav.start_menu_shown {
        render_start_menu(app, frame, area);
    } else if nav.contextual_menu_shown {
        render_contextual_menu(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let host_color = if app.connection_error.is_some() { Color::Red } else { Color::Green };
    let user = if app.state.profile_ready.is_idle() {
        match app.state.profile() {
            Some(profile) if profile.role.is_empty() => profile.username,
            Some(profile) => format!("{} ({})", profile.username, profile.role),
            None => "-".to_string(),
        }
    } else {
        app.spinner.glyph().to_string()
    };
    let free = app.free_space.map(format_bytes).unwrap_or_else(|| "?".to_string());

    let line = Line::from(vec![
        Span::styled(" HOST: ", Style::default().fg(Color::Gray)),
        Span::styled(app.api.host(), Style::default().fg(host_color).add_modifier(Modifier::BOLD)),
        Span::styled(" | USER: ", Style::default().fg(Color::Gray)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
        Span::styled(format!(" | SD {}: ", app.storage.active_slot()), Style::default().fg(Color::Gray)),
        Span::styled(app.storage.active_root().display().to_string(), Style::default().fg(Color::Yellow)),
        Span::styled(format!(" ({free} free)"), Style::default().fg(Color::DarkGray)),
    ]);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("  romdeck  ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, area);
}

fn render_connection_error(message: &str, frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Y] ", Style::default().fg(Color::Yellow)),
            Span::raw("Retry"),
        ]),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Red)));
    frame.render_widget(paragraph, area);
}

/// Renders one page of rows around `cursor`.
fn render_page(frame: &mut Frame, area: Rect, title: String, rows: Vec<ListItem>, cursor: usize, page_size: usize) {
    let list = List::new(rows)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().bg(Color::Rgb(40, 40, 40)).fg(Color::Blue).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(cursor - page_start(cursor, page_size)));
    frame.render_stateful_widget(list, area, &mut state);
}

fn page_bounds(cursor: usize, page_size: usize, total: usize) -> (usize, usize) {
    let start = page_start(cursor, page_size).min(total);
    (start, (start + page_size.max(1)).min(total))
}

fn render_platforms(app: &App, frame: &mut Frame, area: Rect) {
    let platforms = app.state.platforms.load();
    let cursor = app.cursors.platforms;
    let (start, end) = page_bounds(cursor, app.page_size, platforms.len());

    let rows = platforms[start..end]
        .iter()
        .map(|p| {
            ListItem::new(Line::from(vec![
                Span::styled(p.display_name.as_str(), Style::default().fg(Color::White)),
                Span::styled(format!("  ({})", p.rom_count), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let title = format!("  Platforms [{}]  ", page_indicator(cursor, app.page_size, platforms.len()));
    render_page(frame, area, title, rows, cursor, app.page_size);
}

fn render_collections(app: &App, frame: &mut Frame, area: Rect) {
    let collections = app.state.collections.load();
    let cursor = app.cursors.collections;
    let (start, end) = page_bounds(cursor, app.page_size, collections.len());

    let rows = collections[start..end]
        .iter()
        .map(|c| {
            let mut spans = vec![Span::styled(c.name.as_str(), Style::default().fg(Color::White))];
            if c.is_virtual {
                spans.push(Span::styled(" ◆", Style::default().fg(Color::Magenta)));
            }
            spans.push(Span::styled(format!("  ({})", c.rom_count), Style::default().fg(Color::DarkGray)));
            ListItem::new(Line::from(spans))
        })
        .collect();
    let title = format!("  Collections [{}]  ", page_indicator(cursor, app.page_size, collections.len()));
    render_page(frame, area, title, rows, cursor, app.page_size);
}

fn render_items(app: &App, nav: &Navigation, frame: &mut Frame, area: Rect) {
    let items = &nav.items_to_show;
    let cursor = app.cursors.items;
    let (start, end) = page_bounds(cursor, app.page_size, items.len());
    let from_collection = nav.selected_platform.is_none();

    let rows = items[start..end]
        .iter()
        .map(|it| {
            let checkbox = if nav.is_multi_selected(it) { "[x] " } else { "[ ] " };
            let present = app.storage.is_item_present(it);
            let name_style = if present { Style::default().fg(Color::Green) } else { Style::default().fg(Color::White) };
            let mut spans = vec![Span::styled(checkbox, Style::default().fg(Color::Yellow))];
            if from_collection {
                spans.push(Span::styled(format!("[{}] ", it.platform_slug), Style::default().fg(Color::DarkGray)));
            }
            spans.push(Span::styled(it.name.as_str(), name_style));
            spans.push(Span::styled(format!("  {}", it.size_label()), Style::default().fg(Color::DarkGray)));
            if present {
                spans.push(Span::styled(" ✓", Style::default().fg(Color::Green)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let scope_name = nav
        .selected_platform
        .as_ref()
        .map(|p| p.display_name.as_str())
        .or_else(|| nav.selected_collection.as_ref().map(|c| c.name.as_str()))
        .or_else(|| nav.selected_virtual_collection.as_ref().map(|c| c.name.as_str()))
        .unwrap_or("Roms");
    let title = format!(
        "  {} [{}] | {}  ",
        scope_name,
        page_indicator(cursor, app.page_size, items.len()),
        nav.current_filter.label()
    );
    render_page(frame, area, title, rows, cursor, app.page_size);
}

fn render_status(app: &App, nav: &Navigation, frame: &mut Frame, area: Rect) {
    let fetching = match nav.current_view {
        View::Platforms if !app.state.platforms_ready.is_idle() => Some("Fetching platforms"),
        View::Collections if !app.state.collections_ready.is_idle() => Some("Fetching collections"),
        View::Items if !app.state.items_ready.is_idle() => Some("Fetching roms"),
        _ => None,
    };
    let block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));

    if let Some(what) = fetching {
        let line = Line::from(vec![
            Span::styled(format!(" {} ", app.spinner.glyph()), Style::default().fg(Color::Cyan)),
            Span::styled(format!("{what}..."), Style::default().fg(Color::Gray)),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);
        return;
    }

    if !app.state.download_ready.is_idle() {
        let progress = app.state.progress();
        let Some(item) = progress.downloading_item.as_ref() else {
            let line = Line::from(Span::styled(
                format!(" {} Preparing...", app.spinner.glyph()),
                Style::default().fg(Color::Gray),
            ));
            frame.render_widget(Paragraph::new(line).block(block), area);
            return;
        };
        let (title, percent, color) = if progress.extracting_item {
            ("  Extracting  ", progress.extracted_percent, Color::Magenta)
        } else {
            ("  Downloading  ", progress.downloaded_percent, Color::Green)
        };
        let label = format!(
            "{}/{} | {:.0}% | {} ({})",
            progress.downloading_item_position, progress.queue_len, percent, item.name, item.fs_name
        );
        let gauge = Gauge::default()
            .block(block.title(title).border_style(Style::default().fg(color)))
            .gauge_style(Style::default().fg(color).bg(Color::Black).add_modifier(Modifier::BOLD))
            .ratio(f64::from(percent / 100.0).clamp(0.0, 1.0))
            .label(label);
        frame.render_widget(gauge, area);
        return;
    }

    if let Some(notice) = app.notice.as_ref().filter(|n| n.is_fresh()) {
        let color = match notice.kind {
            NoticeKind::Info => Color::Cyan,
            NoticeKind::Success => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        let line = Line::from(Span::styled(format!(" {}", notice.text), Style::default().fg(color)));
        frame.render_widget(Paragraph::new(line).block(block), area);
        return;
    }

    frame.render_widget(block, area);
}

fn render_footer(app: &App, nav: &Navigation, frame: &mut Frame, area: Rect) {
    let buttons: Vec<(&str, &str)> = if app.connection_error.is_some() {
        vec![("Y", "Retry"), ("MENU", "Menu")]
    } else if nav.start_menu_shown || nav.contextual_menu_shown {
        vec![("A", "Select"), ("B", "Close")]
    } else {
        match nav.current_view {
            View::Platforms => vec![("A", "Open"), ("X", "Collections"), ("Y", "Refresh"), ("START", "Options"), ("MENU", "Menu")],
            View::Collections => vec![("A", "Open"), ("X", "Platforms"), ("Y", "Refresh"), ("START", "Options"), ("MENU", "Menu")],
            View::Items => vec![
                ("A", "Download"),
                ("B", "Back"),
                ("X", "Filter"),
                ("Y", "Refresh"),
                ("SELECT", "Mark"),
                ("R1", if nav.all_selected() { "Deselect all" } else { "Select all" }),
                ("START", "Options"),
            ],
        }
    };

    let mut spans = Vec::with_capacity(buttons.len() * 2);
    for (button, action) in &buttons {
        spans.push(Span::styled(format!("[{button}] "), Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!("{action}  ")));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), area);
}

fn render_start_menu(app: &App, frame: &mut Frame, area: Rect) {
    let rows: Vec<ListItem> = StartMenuOption::ALL.iter().map(|opt| ListItem::new(opt.label())).collect();
    let popup = popup_area(area, 32, rows.len() as u16 + 2);
    render_menu(frame, popup, rows, app.cursors.start_menu, "  Main menu  ", Some(concat!("v", env!("CARGO_PKG_VERSION"))));
}

fn render_contextual_menu(app: &App, frame: &mut Frame, area: Rect) {
    let rows: Vec<ListItem> = app.contextual_menu.iter().map(|entry| ListItem::new(entry.label.as_str())).collect();
    let popup = popup_area(area, 32, rows.len() as u16 + 2);
    render_menu(frame, popup, rows, app.cursors.contextual_menu, "  Options  ", None);
}

fn render_menu(frame: &mut Frame, area: Rect, rows: Vec<ListItem>, cursor: usize, title: &str, footer: Option<&str>) {
    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Yellow));
    if let Some(footer) = footer {
        block = block.title_bottom(Line::from(footer).right_aligned());
    }
    let list = List::new(rows)
        .block(block)
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(cursor));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{bytes} B") } else { format!("{value:.1} {}", UNITS[unit]) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UiConfig;
    use crate::input::Key;
    use crate::models::Item;
    use crate::status::SharedState;
    use crate::test_utils::{MockLibrary, item, platform, storage_at};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn app(dir: &std::path::Path) -> App {
        let ui = UiConfig { frame_ms: 33, page_size: Some(5) };
        App::new(Arc::new(MockLibrary::default()), Arc::new(SharedState::new()), storage_at(dir.to_path_buf()), &ui)
    }

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 16)).unwrap();
        terminal.draw(|f| render(app, f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn list_rows_leaves_room_for_chrome() {
        assert_eq!(list_rows(24), 15);
        assert_eq!(list_rows(3), 1);
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn page_title_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.state.platforms_ready.mark_idle();
        app.state.platforms.replace((1..=7).map(|i| platform(i, &format!("sys{i}"))).collect());
        app.cursors.platforms = 6;

        let screen = draw(&app);
        assert!(screen.contains("Platforms [2/2]"));
        assert!(screen.contains("SYS7"));
        assert!(!screen.contains("SYS1 "));
    }

    #[test]
    fn download_progress_line() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        app.state.platforms_ready.mark_idle();
        app.state.download_ready.mark_busy();
        let rom: Item = item(4, "gba", "Zelda.gba");
        app.state.start_download(vec![rom.clone(), item(5, "gba", "Metroid.gba")]);
        app.state.update_progress(|p| {
            p.downloading_item = Some(rom);
            p.downloading_item_position = 1;
            p.downloaded_percent = 42.0;
        });

        let screen = draw(&app);
        assert!(screen.contains("1/2 | 42% | Zelda (Zelda.gba)"));
    }

    #[test]
    fn start_menu_popup() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.input.press(Key::Menu);
        app.tick();
        let screen = draw(&app);
        assert!(screen.contains("Main menu"));
        assert!(screen.contains("Switch SD"));
    }

    #[test]
    fn select_all_label_follows_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.state.nav().select_platform(platform(1, "nes"));
        app.state.items.replace(vec![item(1, "nes", "a.nes"), item(2, "nes", "b.nes")]);
        app.tick();
        assert!(draw(&app).contains("Select all"));

        app.input.press(Key::R1);
        app.tick();
        let screen = draw(&app);
        assert!(screen.contains("Deselect all"));

        app.input.press(Key::Select);
        app.tick();
        let screen = draw(&app);
        assert!(screen.contains("Select all"));
        assert!(!screen.contains("Deselect all"));
    }

    #[test]
    fn connection_error_screen() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.connection_error = Some("Error: Can't connect to host http://mock.romm".to_string());
        let screen = draw(&app);
        assert!(screen.contains("Can't connect to host"));
        assert!(screen.contains("Retry"));
    }
}
