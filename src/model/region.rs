use std::cmp::Ordering;

use serde::Deserialize;

use super::edit::Edit;

/// A position in the document, measured in characters.
pub type CharIdx = usize;

/// A contiguous span of the document: a caret when both ends coincide,
/// a selection otherwise.
///
/// The anchor is the fixed end and the head is the end that moves while the
/// user extends the selection. Position comparisons only look at
/// [`start`](Region::start) and [`end`](Region::end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub anchor: CharIdx,
    pub head: CharIdx,
}

/// Which part of a live region survives when it is collapsed to a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepAlive {
    /// Keep the whole region, selection included.
    #[default]
    Region,
    Anchor,
    Head,
    Start,
    End,
}

impl Region {
    pub fn new(anchor: CharIdx, head: CharIdx) -> Self {
        Self { anchor, head }
    }

    pub fn caret(pos: CharIdx) -> Self {
        Self::new(pos, pos)
    }

    #[inline]
    pub fn start(&self) -> CharIdx {
        self.anchor.min(self.head)
    }

    #[inline]
    pub fn end(&self) -> CharIdx {
        self.anchor.max(self.head)
    }

    pub fn is_caret(&self) -> bool {
        self.anchor == self.head
    }

    /// Number of selected characters; zero for a caret.
    pub fn width(&self) -> usize {
        self.end() - self.start()
    }

    /// Whether `pos` falls inside the selected span (end exclusive).
    pub fn covers(&self, pos: CharIdx) -> bool {
        pos >= self.start() && pos < self.end()
    }

    /// Collapse to a caret at the boundary chosen by `keep`.
    pub fn collapse(self, keep: KeepAlive) -> Self {
        match keep {
            KeepAlive::Region => self,
            KeepAlive::Anchor => Self::caret(self.anchor),
            KeepAlive::Head => Self::caret(self.head),
            KeepAlive::Start => Self::caret(self.start()),
            KeepAlive::End => Self::caret(self.end()),
        }
    }

    /// Move both ends through a document edit.
    pub fn map(self, edit: &Edit) -> Self {
        Self::new(edit.map_pos(self.anchor), edit.map_pos(self.head))
    }

    /// Ordering by position: start offset, then end offset.
    pub fn cmp_position(&self, other: &Self) -> Ordering {
        (self.start(), self.end()).cmp(&(other.start(), other.end()))
    }
}

impl PartialOrd for Region {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Region {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_position(other)
            .then_with(|| self.anchor.cmp(&other.anchor))
    }
}
