use ropey::Rope;
use std::path::PathBuf;

use super::edit::Edit;
use super::region::{CharIdx, Region};

/// Direction for cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    LineStart,
    LineEnd,
}

/// Viewport state for scroll tracking.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub top_line: usize,
    pub height: u16,
    pub scroll_off: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_line: 0,
            height: 24,
            scroll_off: 3,
        }
    }
}

/// A text buffer backed by a Rope, with native multi-cursor editing.
pub struct Buffer {
    pub rope: Rope,
    pub path: Option<PathBuf>,
    pub dirty: bool,
    /// Live cursors and selections, sorted, never empty.
    selections: Vec<Region>,
    /// Frozen regions drawn on top of the text.
    pub statics: Vec<Region>,
    pub viewport: Viewport,
}

impl Buffer {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::from_rope(Rope::new(), None)
    }

    /// Create a buffer from file contents.
    pub fn from_file(path: PathBuf) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::from_rope(Rope::from_str(&text), Some(path)))
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_rope(Rope::from_str(text), None)
    }

    fn from_rope(rope: Rope, path: Option<PathBuf>) -> Self {
        Self {
            rope,
            path,
            dirty: false,
            selections: vec![Region::caret(0)],
            statics: Vec::new(),
            viewport: Viewport::default(),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Get the text of a specific line (without trailing newline).
    pub fn line_text(&self, idx: usize) -> Option<String> {
        if idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(idx);
        let mut s: String = line.chunks().collect();
        if s.ends_with('\n') {
            s.pop();
        }
        if s.ends_with('\r') {
            s.pop();
        }
        Some(s)
    }

    /// Line length in characters, line ending excluded.
    pub fn line_len(&self, row: usize) -> usize {
        if row >= self.rope.len_lines() {
            return 0;
        }
        let line = self.rope.line(row);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && line.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    /// Row and column (both 0-indexed, in characters) of a position.
    pub fn point(&self, pos: CharIdx) -> (usize, usize) {
        let pos = pos.min(self.len_chars());
        let row = self.rope.char_to_line(pos);
        (row, pos - self.rope.line_to_char(row))
    }

    /// Position of a row and column, clamped to the document.
    pub fn pos_at(&self, row: usize, col: usize) -> CharIdx {
        let row = row.min(self.line_count().saturating_sub(1));
        self.rope.line_to_char(row) + col.min(self.line_len(row))
    }

    pub fn selections(&self) -> &[Region] {
        &self.selections
    }

    /// The cursor the terminal caret is drawn at.
    pub fn primary(&self) -> Region {
        self.selections
            .first()
            .copied()
            .unwrap_or_else(|| Region::caret(0))
    }

    /// Replace the live selections, clamped to the document.
    pub fn set_selections(&mut self, regions: &[Region]) {
        let len = self.len_chars();
        self.selections = regions
            .iter()
            .map(|r| Region::new(r.anchor.min(len), r.head.min(len)))
            .collect();
        self.normalize_selections();
    }

    pub fn set_statics(&mut self, regions: &[Region]) {
        let len = self.len_chars();
        self.statics = regions
            .iter()
            .map(|r| Region::new(r.anchor.min(len), r.head.min(len)))
            .collect();
    }

    /// Move every live cursor; `extend` keeps anchors in place.
    pub fn move_selections(&mut self, dir: Direction, extend: bool) {
        let moved: Vec<Region> = self
            .selections
            .iter()
            .map(|region| {
                let head = self.step(region.head, dir);
                if extend {
                    Region::new(region.anchor, head)
                } else {
                    Region::caret(head)
                }
            })
            .collect();
        self.selections = moved;
        self.normalize_selections();
    }

    fn step(&self, pos: CharIdx, dir: Direction) -> CharIdx {
        let (row, col) = self.point(pos);
        match dir {
            Direction::Left => pos.saturating_sub(1),
            Direction::Right => (pos + 1).min(self.len_chars()),
            Direction::Up if row == 0 => 0,
            Direction::Up => self.pos_at(row - 1, col),
            Direction::Down if row + 1 >= self.line_count() => self.pos_at(row, usize::MAX),
            Direction::Down => self.pos_at(row + 1, col),
            Direction::LineStart => self.rope.line_to_char(row),
            Direction::LineEnd => self.pos_at(row, usize::MAX),
        }
    }

    /// Replace every live selection with `text`; returns the edits in the
    /// order they were applied.
    pub fn insert_text(&mut self, text: &str) -> Vec<Edit> {
        let inserted = text.chars().count();
        let mut edits = Vec::with_capacity(self.selections.len());

        for i in (0..self.selections.len()).rev() {
            let region = self.selections[i];
            let edit = Edit {
                offset: region.start(),
                deleted: region.width(),
                inserted,
            };
            self.rope.remove(region.start()..region.end());
            self.rope.insert(region.start(), text);
            self.map_other_selections(&edit, i);
            self.selections[i] = Region::caret(region.start() + inserted);
            edits.push(edit);
        }

        self.dirty = true;
        self.normalize_selections();
        edits
    }

    /// Backspace at every live cursor: selections are deleted, carets remove
    /// the character before them.
    pub fn delete_backward(&mut self) -> Vec<Edit> {
        let mut edits = Vec::with_capacity(self.selections.len());

        for i in (0..self.selections.len()).rev() {
            let region = self.selections[i];
            let (start, end) = if region.is_caret() {
                if region.start() == 0 {
                    continue;
                }
                (region.start() - 1, region.start())
            } else {
                (region.start(), region.end())
            };
            let end = end.min(self.len_chars());
            if start >= end {
                continue;
            }

            let edit = Edit::delete(start, end - start);
            self.rope.remove(start..end);
            self.map_other_selections(&edit, i);
            self.selections[i] = Region::caret(start);
            edits.push(edit);
        }

        if !edits.is_empty() {
            self.dirty = true;
        }
        self.normalize_selections();
        edits
    }

    fn map_other_selections(&mut self, edit: &Edit, skip: usize) {
        for (j, region) in self.selections.iter_mut().enumerate() {
            if j != skip {
                *region = region.map(edit);
            }
        }
    }

    fn normalize_selections(&mut self) {
        self.selections.sort();
        self.selections.dedup();
        if self.selections.is_empty() {
            self.selections.push(Region::caret(0));
        }
    }

    /// Ensure the viewport keeps `pos` visible.
    pub fn scroll_to(&mut self, pos: CharIdx) {
        let (row, _) = self.point(pos);
        let off = self.viewport.scroll_off as usize;
        let height = (self.viewport.height as usize).max(1);
        let off = off.min(height.saturating_sub(1) / 2);

        if row < self.viewport.top_line + off {
            self.viewport.top_line = row.saturating_sub(off);
        }
        if row + off >= self.viewport.top_line + height {
            self.viewport.top_line = row + off + 1 - height;
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_at_every_cursor() {
        let mut buf = Buffer::from_text("ab\ncd\n");
        buf.set_selections(&[Region::caret(0), Region::caret(3)]);
        let edits = buf.insert_text("xy");

        assert_eq!(buf.rope.to_string(), "xyab\nxycd\n");
        assert_eq!(buf.selections(), &[Region::caret(2), Region::caret(7)]);
        assert_eq!(edits, vec![Edit::insert(3, 2), Edit::insert(0, 2)]);
        assert!(buf.dirty);
    }

    #[test]
    fn typing_replaces_selections() {
        let mut buf = Buffer::from_text("hello world");
        buf.set_selections(&[Region::new(0, 5), Region::new(11, 6)]);
        buf.insert_text("X");

        assert_eq!(buf.rope.to_string(), "X X");
        assert_eq!(buf.selections(), &[Region::caret(1), Region::caret(3)]);
    }

    #[test]
    fn backspace_at_every_cursor() {
        let mut buf = Buffer::from_text("abc def");
        buf.set_selections(&[Region::caret(0), Region::caret(3), Region::caret(7)]);
        let edits = buf.delete_backward();

        assert_eq!(buf.rope.to_string(), "ab de");
        assert_eq!(buf.selections(), &[Region::caret(0), Region::caret(2), Region::caret(5)]);
        assert_eq!(edits.len(), 2);
    }

    #[test]
    fn vertical_movement_clamps_column() {
        let mut buf = Buffer::from_text("long line\nab\nlonger line\n");
        buf.set_selections(&[Region::caret(7)]);
        buf.move_selections(Direction::Down, false);
        assert_eq!(buf.point(buf.primary().head), (1, 2));

        buf.move_selections(Direction::Down, false);
        assert_eq!(buf.point(buf.primary().head), (2, 2));
    }

    #[test]
    fn extend_keeps_anchor() {
        let mut buf = Buffer::from_text("abcdef");
        buf.set_selections(&[Region::caret(2)]);
        buf.move_selections(Direction::Right, true);
        buf.move_selections(Direction::Right, true);
        assert_eq!(buf.primary(), Region::new(2, 4));

        buf.move_selections(Direction::LineStart, false);
        assert_eq!(buf.primary(), Region::caret(0));
    }

    #[test]
    fn moving_merges_coincident_cursors() {
        let mut buf = Buffer::from_text("abc");
        buf.set_selections(&[Region::caret(0), Region::caret(1)]);
        buf.move_selections(Direction::Left, false);
        assert_eq!(buf.selections(), &[Region::caret(0)]);
    }

    #[test]
    fn line_len_ignores_crlf() {
        let buf = Buffer::from_text("abc\r\nde");
        assert_eq!(buf.line_len(0), 3);
        assert_eq!(buf.line_len(1), 2);
        assert_eq!(buf.line_text(0).as_deref(), Some("abc"));
    }

    #[test]
    fn scroll_follows_position() {
        let text = "x\n".repeat(100);
        let mut buf = Buffer::from_text(&text);
        buf.viewport.height = 10;
        buf.viewport.scroll_off = 2;

        buf.scroll_to(buf.pos_at(50, 0));
        assert_eq!(buf.viewport.top_line, 43);

        buf.scroll_to(buf.pos_at(5, 0));
        assert_eq!(buf.viewport.top_line, 3);
    }
}
