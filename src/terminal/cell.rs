use std::ops::{Bound, RangeBounds};

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use super::attr::Attr;

bitflags! {
    /// Per-cell flags for wide character tracking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CellFlags: u8 {
        /// This cell holds a wide (2-column) character
        const WIDE_CHAR   = 1 << 0;
        /// This cell is the trailing continuation of a wide character
        const WIDE_SPACER = 1 << 1;
    }
}

/// A single terminal cell: a base character, optional combining marks, and
/// the attribute pack it was printed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub c: char,
    /// Combining marks accumulated on top of the base character. Boxed so the
    /// common no-marks case stays small.
    zerowidth: Option<Box<Vec<char>>>,
    pub attr: Attr,
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            zerowidth: None,
            attr: Attr::default(),
            flags: CellFlags::empty(),
        }
    }
}

impl Cell {
    pub fn new(c: char, attr: Attr) -> Self {
        let flags = if UnicodeWidthChar::width(c).unwrap_or(1) == 2 {
            CellFlags::WIDE_CHAR
        } else {
            CellFlags::empty()
        };
        Self {
            c,
            zerowidth: None,
            attr,
            flags,
        }
    }

    /// The continuation cell for the trailing half of a wide character.
    /// Carries the same attribute pack as the wide cell to its left.
    pub fn wide_spacer(attr: Attr) -> Self {
        Self {
            c: ' ',
            zerowidth: None,
            attr,
            flags: CellFlags::WIDE_SPACER,
        }
    }

    /// Blank cell carrying the given erase attribute.
    pub fn blank(attr: Attr) -> Self {
        Self {
            c: ' ',
            zerowidth: None,
            attr,
            flags: CellFlags::empty(),
        }
    }

    /// Overwrite with a character printed under `attr`.
    pub fn write(&mut self, c: char, attr: Attr, flags: CellFlags) {
        self.c = c;
        self.zerowidth = None;
        self.attr = attr;
        self.flags = flags;
    }

    /// Append a combining mark to this cell's grapheme cluster.
    pub fn combine(&mut self, mark: char) {
        self.zerowidth
            .get_or_insert_with(|| Box::new(Vec::new()))
            .push(mark);
    }

    /// Erase to a blank cell carrying `attr` (per ECMA-48 the erase
    /// background persists).
    pub fn erase(&mut self, attr: Attr) {
        self.c = ' ';
        self.zerowidth = None;
        self.attr = attr;
        self.flags = CellFlags::empty();
    }

    /// Rendered width of this cell: 0 for wide continuations, 2 for wide
    /// characters, 1 otherwise.
    pub fn width(&self) -> u8 {
        if self.flags.contains(CellFlags::WIDE_SPACER) {
            0
        } else if self.flags.contains(CellFlags::WIDE_CHAR) {
            2
        } else {
            1
        }
    }

    /// The full grapheme cluster: base character plus combining marks.
    pub fn content(&self) -> String {
        let mut s = String::new();
        s.push(self.c);
        if let Some(marks) = &self.zerowidth {
            s.extend(marks.iter());
        }
        s
    }

    pub fn is_blank(&self) -> bool {
        self.c == ' ' && self.zerowidth.is_none() && !self.flags.contains(CellFlags::WIDE_SPACER)
    }
}

/// A single row of the grid: `cols` cells plus a flag recording whether the
/// logical line continues on the next physical row (set when auto-wrap broke
/// it mid-word).
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub cells: Vec<Cell>,
    pub wrapped: bool,
}

impl Line {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    /// A row of blank cells carrying the given erase attribute.
    pub fn blank(cols: u16, attr: Attr) -> Self {
        Self {
            cells: vec![Cell::blank(attr); cols as usize],
            wrapped: false,
        }
    }

    /// Build a line from text, one cell per grapheme cluster. Wide clusters
    /// get their trailing continuation cell. Content past `cols` is dropped.
    pub fn from_text(s: &str, cols: u16, attr: Attr) -> Self {
        let mut line = Line::new(cols);
        let mut col = 0usize;
        for grapheme in s.graphemes(true) {
            let mut chars = grapheme.chars();
            let Some(base) = chars.next() else { continue };
            let width = UnicodeWidthChar::width(base).unwrap_or(1);
            if col + width > cols as usize {
                break;
            }
            let mut cell = Cell::new(base, attr);
            for mark in chars {
                cell.combine(mark);
            }
            line.cells[col] = cell;
            if width == 2 {
                line.cells[col + 1] = Cell::wide_spacer(attr);
            }
            col += width.max(1);
        }
        line
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Fill `[start, end)` with blank cells carrying `attr`. A wide pair cut
    /// by either boundary is blanked entirely so no orphaned halves remain.
    pub fn erase(&mut self, start: usize, end: usize, attr: Attr) {
        let end = end.min(self.cells.len());
        let start = start.min(end);
        if start > 0 && start < self.cells.len() && self.cells[start].width() == 0 {
            self.cells[start - 1].erase(attr);
        }
        if end < self.cells.len() && self.cells[end].width() == 0 {
            self.cells[end].erase(attr);
        }
        for cell in &mut self.cells[start..end] {
            cell.erase(attr);
        }
    }

    /// Insert `n` blank cells at `col`, shifting the rest right; cells pushed
    /// past the end are dropped.
    pub fn insert_cells(&mut self, col: usize, n: usize, attr: Attr) {
        let len = self.cells.len();
        if col >= len {
            return;
        }
        if self.cells[col].width() == 0 && col > 0 {
            self.cells[col - 1].erase(attr);
        }
        for _ in 0..n.min(len - col) {
            self.cells.pop();
            self.cells.insert(col, Cell::blank(attr));
        }
        self.fix_trailing_wide(attr);
    }

    /// Delete `n` cells at `col`, shifting the rest left and filling the tail
    /// with blanks carrying `attr`.
    pub fn delete_cells(&mut self, col: usize, n: usize, attr: Attr) {
        let len = self.cells.len();
        if col >= len {
            return;
        }
        if self.cells[col].width() == 0 && col > 0 {
            self.cells[col - 1].erase(attr);
        }
        for _ in 0..n.min(len - col) {
            self.cells.remove(col);
            self.cells.push(Cell::blank(attr));
        }
        // a continuation shifted into the gap lost its wide cell
        if col < self.cells.len() && self.cells[col].width() == 0 {
            self.cells[col].erase(attr);
        }
    }

    /// A wide character whose continuation fell off the end of the row is
    /// blanked out.
    fn fix_trailing_wide(&mut self, attr: Attr) {
        if let Some(last) = self.cells.last_mut() {
            if last.width() == 2 {
                last.erase(attr);
            }
        }
    }

    /// Grow or shrink to `cols`, padding with default cells.
    pub fn resize(&mut self, cols: u16) {
        self.cells.resize(cols as usize, Cell::default());
    }

    /// Concatenate cell contents over `range`, skipping wide-character
    /// continuation cells. With `trim_right` trailing whitespace is removed.
    pub fn translate_to_string(&self, trim_right: bool, range: impl RangeBounds<usize>) -> String {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.cells.len(),
        }
        .min(self.cells.len());

        let mut s = String::new();
        for cell in &self.cells[start.min(end)..end] {
            if cell.flags.contains(CellFlags::WIDE_SPACER) {
                continue;
            }
            s.push_str(&cell.content());
        }
        if trim_right {
            s.truncate(s.trim_end().len());
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::color::Color;

    #[test]
    fn wide_cell_pair_shares_attr() {
        let mut attr = Attr::default();
        attr.bg = Color::Indexed(4);
        let line = Line::from_text("日本", 6, attr);
        assert_eq!(line.cells[0].width(), 2);
        assert_eq!(line.cells[1].width(), 0);
        assert_eq!(line.cells[0].attr, line.cells[1].attr);
        assert_eq!(line.translate_to_string(true, ..), "日本");
    }

    #[test]
    fn combining_marks_extend_content() {
        let mut cell = Cell::new('e', Attr::default());
        cell.combine('\u{0301}');
        assert_eq!(cell.content(), "e\u{0301}");
        assert_eq!(cell.width(), 1);
    }

    #[test]
    fn insert_cells_shifts_right_and_drops_tail() {
        let mut line = Line::from_text("abcde", 5, Attr::default());
        line.insert_cells(1, 2, Attr::default());
        assert_eq!(line.translate_to_string(true, ..), "a  bc");
    }

    #[test]
    fn delete_cells_shifts_left_and_pads() {
        let mut line = Line::from_text("abcde", 5, Attr::default());
        line.delete_cells(1, 2, Attr::default());
        assert_eq!(line.translate_to_string(true, ..), "ade");
        assert_eq!(line.cells.len(), 5);
    }

    #[test]
    fn translate_range_and_trim() {
        let line = Line::from_text("hello", 10, Attr::default());
        assert_eq!(line.translate_to_string(false, ..).len(), 10);
        assert_eq!(line.translate_to_string(true, ..), "hello");
        assert_eq!(line.translate_to_string(true, 1..4), "ell");
    }

    #[test]
    fn erase_keeps_background() {
        let mut attr = Attr::default();
        attr.bg = Color::Indexed(2);
        let mut line = Line::from_text("xy", 2, Attr::default());
        line.erase(0, 2, attr.erase_attr());
        assert!(line.cells[0].is_blank());
        assert_eq!(line.cells[0].attr.bg, Color::Indexed(2));
    }
}
