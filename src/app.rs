use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread::JoinHandle;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use power_cursors::cursors::command::CursorCommand;
use power_cursors::cursors::controller::Outcome;
use power_cursors::cursors::host::ViewId;
use power_cursors::cursors::session::{CursorSessions, TransitionStatus};
use power_cursors::keymap::Keymap;
use power_cursors::model::buffer::{Buffer, Direction as MoveDir};
use power_cursors::model::config::AppConfig;
use power_cursors::model::edit::Edit;
use power_cursors::model::mode::Mode;
use power_cursors::model::region::Region;

use crate::msg::Msg;
use crate::views::Views;

/// How a document cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Plain,
    LiveSelection,
    LiveCaret,
    StaticSelection,
    StaticCaret,
}

impl CellKind {
    fn style(self) -> Style {
        match self {
            CellKind::Plain => Style::default(),
            CellKind::LiveSelection => Style::default().add_modifier(Modifier::REVERSED),
            CellKind::LiveCaret => Style::default().fg(Color::Black).bg(Color::Cyan),
            CellKind::StaticSelection => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::UNDERLINED),
            CellKind::StaticCaret => Style::default().fg(Color::Black).bg(Color::Yellow),
        }
    }
}

pub struct App {
    pub mode: Mode,
    views: Views,
    tabs: Vec<ViewId>,
    active: ViewId,
    sessions: CursorSessions,
    keymap: Keymap,
    pub config: AppConfig,
    pub should_quit: bool,
    pub notifications: VecDeque<String>,
    quit_confirm_armed: bool,
    pending_saves: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(config: AppConfig, files: Vec<PathBuf>) -> Result<Self> {
        let keymap = config.keymap()?;
        let sessions = CursorSessions::new(config.cursors);

        let mut views = Views::default();
        let mut tabs = Vec::new();
        for path in files {
            let mut buffer = if path.exists() {
                Buffer::from_file(path)?
            } else {
                let mut buf = Buffer::new();
                buf.path = Some(path);
                buf
            };
            buffer.viewport.scroll_off = config.editor.scroll_off;
            tabs.push(views.insert(buffer));
        }
        if tabs.is_empty() {
            let mut scratch = Buffer::new();
            scratch.viewport.scroll_off = config.editor.scroll_off;
            tabs.push(views.insert(scratch));
        }
        let active = tabs[0];

        tracing::info!(views = tabs.len(), bindings = keymap.len(), "editor ready");

        Ok(Self {
            mode: Mode::Normal,
            views,
            tabs,
            active,
            sessions,
            keymap,
            config,
            should_quit: false,
            notifications: VecDeque::new(),
            quit_confirm_armed: false,
            pending_saves: Vec::new(),
        })
    }

    fn buffer(&self) -> Option<&Buffer> {
        self.views.get(self.active)
    }

    fn pending_write_count(&self) -> usize {
        self.tabs
            .iter()
            .filter_map(|&view| self.views.get(view))
            .filter(|buffer| buffer.dirty && buffer.path.is_some())
            .count()
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key)?,
            Msg::InsertChar(ch) => {
                let text = ch.to_string();
                self.edit(|buffer| buffer.insert_text(&text));
            }
            Msg::InsertText(text) => self.edit(|buffer| buffer.insert_text(&text)),
            Msg::DeleteChar => self.edit(Buffer::delete_backward),
            Msg::NewLine => self.edit(|buffer| buffer.insert_text("\n")),
            Msg::MoveCursor { dir, extend } => self.move_cursor(dir, extend),
            Msg::Cursor(command) => self.run_cursor_command(command),
            Msg::SetMode(mode) => self.mode = mode,
            Msg::SwitchView(delta) => self.switch_view(delta),
            Msg::SaveActiveBuffer => self.save_buffer(self.active),
            Msg::SaveAllBuffers => self.save_all_buffers(),
            Msg::Quit => self.should_quit = true,
            Msg::Resize(_w, h) => {
                for (_, buffer) in self.views.iter_mut() {
                    buffer.viewport.height = h.saturating_sub(2); // tab + status bar
                }
            }
        }
        Ok(())
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > 8 {
            self.notifications.pop_front();
        }
    }

    fn run_cursor_command(&mut self, command: CursorCommand) {
        let outcome = self.sessions.execute(&mut self.views, self.active, command);
        if let Outcome::NoOp(reason) = outcome {
            self.push_notification(format!("{}: {reason}", command.name()));
        }
    }

    fn edit(&mut self, op: impl FnOnce(&mut Buffer) -> Vec<Edit>) {
        let view = self.active;
        let Some(buffer) = self.views.get_mut(view) else {
            return;
        };

        let edits = op(buffer);
        let head = buffer.primary().head;
        buffer.scroll_to(head);

        if !edits.is_empty() {
            self.sessions.document_edited(&mut self.views, view, &edits);
        }
    }

    fn move_cursor(&mut self, dir: MoveDir, extend: bool) {
        let view = self.active;
        let Some(buffer) = self.views.get_mut(view) else {
            return;
        };

        buffer.move_selections(dir, extend);
        let head = buffer.primary().head;
        buffer.scroll_to(head);
        self.sessions.selection_changed(&mut self.views, view);
    }

    fn switch_view(&mut self, delta: isize) {
        if self.tabs.len() < 2 {
            return;
        }
        let Some(current) = self.tabs.iter().position(|&view| view == self.active) else {
            return;
        };
        let len = self.tabs.len() as isize;
        let next = (current as isize + delta).rem_euclid(len) as usize;
        self.active = self.tabs[next];
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        if self.mode == Mode::Insert && key.code == KeyCode::Esc {
            self.mode = Mode::Normal;
            return Ok(());
        }

        let in_transition = self.sessions.in_transition(self.active);
        if let Some(command) = self.keymap.lookup(&key, in_transition) {
            self.quit_confirm_armed = false;
            return self.update(Msg::Cursor(command));
        }

        match self.mode {
            Mode::Normal => self.handle_key_normal(key),
            Mode::Insert => self.handle_key_insert(key),
        }
    }

    fn handle_key_normal(&mut self, key: KeyEvent) -> Result<()> {
        if key.code != KeyCode::Char('q') {
            self.quit_confirm_armed = false;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        let msg = match key.code {
            KeyCode::Char('q') if !ctrl => {
                if self.pending_write_count() == 0 || self.quit_confirm_armed {
                    Msg::Quit
                } else {
                    self.quit_confirm_armed = true;
                    return Ok(());
                }
            }
            KeyCode::Char('Q') => {
                self.save_all_buffers();
                Msg::Quit
            }
            KeyCode::Char('i') => Msg::SetMode(Mode::Insert),
            KeyCode::Char('s') if ctrl => Msg::SaveActiveBuffer,
            KeyCode::Char('n') if ctrl => Msg::SwitchView(1),
            KeyCode::Char('p') if ctrl => Msg::SwitchView(-1),
            KeyCode::Char('h') => move_msg(MoveDir::Left, false),
            KeyCode::Char('j') => move_msg(MoveDir::Down, false),
            KeyCode::Char('k') => move_msg(MoveDir::Up, false),
            KeyCode::Char('l') => move_msg(MoveDir::Right, false),
            KeyCode::Char('H') => move_msg(MoveDir::Left, true),
            KeyCode::Char('J') => move_msg(MoveDir::Down, true),
            KeyCode::Char('K') => move_msg(MoveDir::Up, true),
            KeyCode::Char('L') => move_msg(MoveDir::Right, true),
            KeyCode::Char('0') => move_msg(MoveDir::LineStart, false),
            KeyCode::Char('$') => move_msg(MoveDir::LineEnd, false),
            code => match arrow_direction(code) {
                Some(dir) => move_msg(dir, shift),
                None => return Ok(()),
            },
        };

        self.update(msg)
    }

    fn handle_key_insert(&mut self, key: KeyEvent) -> Result<()> {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        let msg = match key.code {
            KeyCode::Enter => Msg::NewLine,
            KeyCode::Backspace => Msg::DeleteChar,
            KeyCode::Tab => Msg::InsertText(" ".repeat(self.config.editor.tab_width as usize)),
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Msg::SaveActiveBuffer
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                Msg::InsertChar(ch)
            }
            code => match arrow_direction(code) {
                Some(dir) => move_msg(dir, shift),
                None => return Ok(()),
            },
        };

        self.update(msg)
    }

    fn save_buffer(&mut self, view: ViewId) {
        let Some(buffer) = self.views.get_mut(view) else {
            return;
        };
        let Some(path) = buffer.path.clone() else {
            self.push_notification("scratch buffer has no file".to_string());
            return;
        };

        buffer.dirty = false;
        let rope = buffer.rope.clone();
        self.push_notification(format!("saved {}", path.display()));
        self.pending_saves.retain(|handle| !handle.is_finished());
        self.pending_saves.push(spawn_buffer_save(path, rope));
    }

    /// Block until every background save has finished.
    pub fn finish_saves(&mut self) {
        for handle in self.pending_saves.drain(..) {
            if handle.join().is_err() {
                tracing::error!("save thread panicked");
            }
        }
    }

    fn save_all_buffers(&mut self) {
        let dirty: Vec<ViewId> = self
            .tabs
            .iter()
            .copied()
            .filter(|&view| {
                self.views
                    .get(view)
                    .is_some_and(|buffer| buffer.dirty && buffer.path.is_some())
            })
            .collect();

        for view in dirty {
            self.save_buffer(view);
        }
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // tab bar
                Constraint::Min(1),    // editor
                Constraint::Length(1), // status bar
            ])
            .split(frame.area());

        self.render_tab_bar(frame, chunks[0]);
        self.render_editor(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);
    }

    fn render_editor(&self, frame: &mut Frame, area: Rect) {
        let Some(buffer) = self.buffer() else {
            return;
        };

        let top = buffer.viewport.top_line;
        let bottom = (top + area.height as usize).min(buffer.line_count());
        let lines: Vec<Line<'static>> = (top..bottom)
            .map(|row| render_line(buffer, row))
            .collect();
        frame.render_widget(Paragraph::new(lines), area);

        let (row, col) = buffer.point(buffer.primary().head);
        if row >= top && row < bottom {
            let x = area.x + (col as u16).min(area.width.saturating_sub(1));
            let y = area.y + (row - top) as u16;
            frame.set_cursor_position((x, y));
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Normal => Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            Mode::Insert => Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        };
        let mode_span = Span::styled(format!(" {} ", self.mode.label()), mode_style);

        let status = self.sessions.status(self.active);
        let status_style = match status {
            TransitionStatus::Native => Style::default().fg(Color::Gray).bg(Color::Black),
            TransitionStatus::Transition(_) => Style::default().fg(Color::Black).bg(Color::Yellow),
            TransitionStatus::AllActive(_) => Style::default().fg(Color::Black).bg(Color::Green),
        };
        let status_span = Span::styled(format!(" {} ", status.label()), status_style);

        let (file_name, dirty_marker, position, cursors) = match self.buffer() {
            Some(buffer) => {
                let (row, col) = buffer.point(buffer.primary().head);
                (
                    buffer_name(buffer),
                    if buffer.dirty { " [+]" } else { "" },
                    format!("{}:{}", row + 1, col + 1),
                    buffer.selections().len(),
                )
            }
            None => ("[none]".to_string(), "", String::new(), 0),
        };

        let mut suffix = String::new();
        if cursors > 1 {
            suffix.push_str(&format!(" | {cursors} cursors"));
        }
        if self.quit_confirm_armed {
            let pending = self.pending_write_count();
            suffix.push_str(&format!(" | {pending} unsaved, press q again to quit"));
        } else if let Some(note) = self.notifications.back() {
            suffix.push_str(&format!(" | {note}"));
        }

        let info = Span::styled(
            format!(" {file_name}{dirty_marker}  {position}{suffix} "),
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        let bar = Line::from(vec![mode_span, status_span, info]);
        let status = Paragraph::new(bar).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for &view in &self.tabs {
            let Some(buffer) = self.views.get(view) else {
                continue;
            };
            let dirty = if buffer.dirty { "+" } else { "" };
            let label = format!(" {}{dirty} ", buffer_name(buffer));
            let style = if view == self.active {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray).bg(Color::Rgb(20, 20, 30))
            };
            spans.push(Span::styled(label, style));
        }

        let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(20, 20, 30)));
        frame.render_widget(bar, area);
    }
}

fn move_msg(dir: MoveDir, extend: bool) -> Msg {
    Msg::MoveCursor { dir, extend }
}

fn arrow_direction(code: KeyCode) -> Option<MoveDir> {
    match code {
        KeyCode::Left => Some(MoveDir::Left),
        KeyCode::Right => Some(MoveDir::Right),
        KeyCode::Up => Some(MoveDir::Up),
        KeyCode::Down => Some(MoveDir::Down),
        KeyCode::Home => Some(MoveDir::LineStart),
        KeyCode::End => Some(MoveDir::LineEnd),
        _ => None,
    }
}

fn buffer_name(buffer: &Buffer) -> String {
    buffer
        .path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "[scratch]".to_string())
}

fn cell_kind(buffer: &Buffer, pos: usize) -> CellKind {
    let caret_at = |regions: &[Region]| regions.iter().any(|r| r.is_caret() && r.head == pos);
    let covered = |regions: &[Region]| regions.iter().any(|r| r.covers(pos));
    let live = buffer.selections();

    // The primary caret is drawn by the terminal cursor.
    if covered(live) {
        CellKind::LiveSelection
    } else if live.iter().skip(1).any(|r| r.is_caret() && r.head == pos) {
        CellKind::LiveCaret
    } else if caret_at(buffer.statics.as_slice()) {
        CellKind::StaticCaret
    } else if covered(buffer.statics.as_slice()) {
        CellKind::StaticSelection
    } else {
        CellKind::Plain
    }
}

fn render_line(buffer: &Buffer, row: usize) -> Line<'static> {
    let text = buffer.line_text(row).unwrap_or_default();
    let line_start = buffer.rope.line_to_char(row);

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_kind = CellKind::Plain;

    let mut push = |ch: char, kind: CellKind, run: &mut String, run_kind: &mut CellKind| {
        if kind != *run_kind && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(run), run_kind.style()));
        }
        *run_kind = kind;
        run.push(ch);
    };

    let mut len = 0;
    for (col, ch) in text.chars().enumerate() {
        push(ch, cell_kind(buffer, line_start + col), &mut run, &mut run_kind);
        len = col + 1;
    }

    // Carets parked at the end of the line get a blank cell.
    let end_kind = cell_kind(buffer, line_start + len);
    if matches!(end_kind, CellKind::LiveCaret | CellKind::StaticCaret) {
        push(' ', end_kind, &mut run, &mut run_kind);
    }

    if !run.is_empty() {
        spans.push(Span::styled(run, run_kind.style()));
    }
    Line::from(spans)
}

fn spawn_buffer_save(path: PathBuf, rope: ropey::Rope) -> JoinHandle<()> {
    std::thread::spawn(move || {
        use std::io::Write;
        let result = (|| -> Result<()> {
            let tmp = path.with_extension("tmp");
            let file = std::fs::File::create(&tmp)?;
            let mut writer = std::io::BufWriter::new(file);
            for chunk in rope.chunks() {
                writer.write_all(chunk.as_bytes())?;
            }
            writer.flush()?;
            std::fs::rename(&tmp, &path)?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::error!("save failed: {e}");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(AppConfig::defaults().unwrap(), Vec::new()).unwrap()
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        app.update(Msg::Key(KeyEvent::new(code, modifiers))).unwrap();
    }

    #[test]
    fn compose_then_type_at_every_cursor() {
        let mut app = app();
        app.update(Msg::InsertText("hello world".to_string())).unwrap();

        press(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        press(&mut app, KeyCode::Left, KeyModifiers::NONE);
        press(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        assert_eq!(app.sessions.status(app.active), TransitionStatus::Transition(2));
        assert_eq!(app.buffer().unwrap().statics, vec![Region::caret(11)]);

        press(&mut app, KeyCode::Char('a'), KeyModifiers::ALT);
        assert_eq!(app.sessions.status(app.active), TransitionStatus::AllActive(2));

        app.update(Msg::InsertChar('X')).unwrap();
        let buffer = app.buffer().unwrap();
        assert_eq!(buffer.rope.to_string(), "hello worlXdX");
        assert_eq!(buffer.selections(), &[Region::caret(11), Region::caret(13)]);

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        let buffer = app.buffer().unwrap();
        assert_eq!(buffer.selections(), &[Region::caret(11)]);
        assert!(buffer.statics.is_empty());
        assert_eq!(app.sessions.status(app.active), TransitionStatus::Native);
    }

    #[test]
    fn transition_bindings_need_a_transition() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'), KeyModifiers::ALT);
        assert_eq!(app.sessions.status(app.active), TransitionStatus::Native);
        assert!(app.notifications.is_empty());
    }

    #[test]
    fn ignored_commands_are_reported() {
        let mut app = app();
        app.update(Msg::Cursor(CursorCommand::Select { forward: true }))
            .unwrap();
        let note = app.notifications.back().unwrap();
        assert!(note.starts_with("select: "));
    }

    #[test]
    fn escape_leaves_insert_mode_before_exiting() {
        let mut app = app();
        press(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        press(&mut app, KeyCode::Char('i'), KeyModifiers::NONE);
        assert_eq!(app.mode, Mode::Insert);

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.sessions.in_transition(app.active));

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(!app.sessions.in_transition(app.active));
    }

    #[test]
    fn quit_asks_again_with_unsaved_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "abc").unwrap();

        let mut app = App::new(AppConfig::defaults().unwrap(), vec![path.clone()]).unwrap();
        app.update(Msg::InsertChar('x')).unwrap();

        press(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(app.should_quit);

        app.update(Msg::SaveAllBuffers).unwrap();
        app.finish_saves();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "xabc");
    }
}
