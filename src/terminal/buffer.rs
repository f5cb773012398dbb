use super::attr::Attr;
use super::cell::{Cell, CellFlags, Line};
use super::charset::CharsetState;
use super::cursor::{Cursor, SavedCursor};
use super::scrollback::Scrollback;

/// Row span touched since the last `take_damage` call. `full` is set when
/// the whole buffer was cleared or rebuilt and per-row diffing is pointless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
    pub start: u16,
    pub end: u16,
    pub full: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct DamageState {
    dirty: bool,
    min: u16,
    max: u16,
    full: bool,
}

/// One screen buffer: the live grid, its scrollback ring, cursor, scroll
/// region, and the viewport over the logical line sequence (ring followed by
/// the live rows). The alternate screen is a `Buffer` with ring capacity 0.
#[derive(Debug, Clone)]
pub struct Buffer {
    history: Scrollback,
    screen: Vec<Line>,
    cols: u16,
    rows: u16,
    cursor: Cursor,
    pen: Attr,
    scroll_top: u16,
    scroll_bottom: u16,
    viewport_y: usize,
    saved: SavedCursor,
    damage: DamageState,
}

impl Buffer {
    pub fn new(cols: u16, rows: u16, scrollback: usize) -> Self {
        let mut screen = Vec::with_capacity(rows as usize);
        for _ in 0..rows {
            screen.push(Line::new(cols));
        }
        Self {
            history: Scrollback::new(scrollback),
            screen,
            cols,
            rows,
            cursor: Cursor::default(),
            pen: Attr::default(),
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
            viewport_y: 0,
            saved: SavedCursor::default(),
            damage: DamageState {
                dirty: true,
                min: 0,
                max: rows.saturating_sub(1),
                full: true,
            },
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn pen(&self) -> Attr {
        self.pen
    }

    pub fn pen_mut(&mut self) -> &mut Attr {
        &mut self.pen
    }

    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    /// Number of lines currently in the scrollback ring. Logical line index
    /// `base_y` is the first live row.
    pub fn base_y(&self) -> usize {
        self.history.len()
    }

    /// Total logical lines: scrollback followed by the live rows.
    pub fn len(&self) -> usize {
        self.history.len() + self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest legal `viewport_y`; equals the scrollback length.
    pub fn max_scrollback(&self) -> usize {
        self.history.len()
    }

    pub fn viewport_y(&self) -> usize {
        self.viewport_y
    }

    /// The viewport shows the live area.
    pub fn is_at_bottom(&self) -> bool {
        self.viewport_y == self.base_y()
    }

    /// Line by logical index: scrollback first, then the live rows.
    pub fn line(&self, index: usize) -> Option<&Line> {
        let base = self.base_y();
        if index < base {
            self.history.get(index)
        } else {
            self.screen.get(index - base)
        }
    }

    /// Live row by screen-relative index (0 = top of screen).
    pub fn visible_line(&self, row: u16) -> Option<&Line> {
        self.screen.get(row as usize)
    }

    fn screen_line_mut(&mut self, row: u16) -> &mut Line {
        &mut self.screen[row as usize]
    }

    // ------------------------------------------------------------------
    // Damage tracking
    // ------------------------------------------------------------------

    fn mark_dirty(&mut self, row: u16) {
        self.mark_range(row, row);
    }

    fn mark_range(&mut self, start: u16, end: u16) {
        if !self.damage.dirty {
            self.damage.dirty = true;
            self.damage.min = start;
            self.damage.max = end;
        } else {
            self.damage.min = self.damage.min.min(start);
            self.damage.max = self.damage.max.max(end);
        }
    }

    fn mark_all(&mut self) {
        self.mark_range(0, self.rows.saturating_sub(1));
    }

    fn mark_cleared(&mut self) {
        self.mark_all();
        self.damage.full = true;
    }

    /// Mark the whole buffer for redraw, as on buffer switches.
    pub(crate) fn damage_all(&mut self) {
        self.mark_cleared();
    }

    /// Consume and reset the accumulated damage span.
    pub fn take_damage(&mut self) -> Option<Damage> {
        if !self.damage.dirty {
            return None;
        }
        let damage = Damage {
            start: self.damage.min,
            end: self.damage.max,
            full: self.damage.full,
        };
        self.damage = DamageState::default();
        Some(damage)
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    /// Write one printable character of the given width (1 or 2) at the
    /// cursor, honoring pending wrap, wide-pair atomicity, and insert mode.
    /// Returns true when the write discharged a pending wrap into a new line.
    pub fn put_char(&mut self, c: char, width: u8, autowrap: bool, insert: bool) -> bool {
        let mut fed = false;
        if self.cursor.x >= self.cols {
            if autowrap {
                let y = self.cursor.y;
                self.screen_line_mut(y).wrapped = true;
                self.cursor.x = 0;
                self.line_feed();
                fed = true;
            } else {
                self.cursor.x = self.cols.saturating_sub(1);
            }
            self.cursor.wrap_pending = false;
        }

        // A wide glyph that does not fit in the remaining columns wraps
        // immediately rather than leaving a half cell.
        if width == 2 {
            if self.cols < 2 {
                return fed;
            }
            if self.cursor.x + 1 >= self.cols {
                if autowrap {
                    let y = self.cursor.y;
                    self.screen_line_mut(y).wrapped = true;
                    self.cursor.x = 0;
                    self.line_feed();
                    fed = true;
                } else {
                    self.cursor.x = self.cols - 2;
                }
                self.cursor.wrap_pending = false;
            }
        }

        let x = self.cursor.x as usize;
        let y = self.cursor.y;
        let pen = self.pen;
        let erase = pen.erase_attr();

        if insert {
            self.screen_line_mut(y).insert_cells(x, width as usize, erase);
        }

        let cols = self.cols as usize;
        let line = self.screen_line_mut(y);
        // Overwriting half of an existing wide pair blanks the other half.
        if line.cells[x].width() == 0 && x > 0 {
            line.cells[x - 1].erase(erase);
        }
        if line.cells[x].width() == 2 && x + 1 < cols {
            line.cells[x + 1].erase(erase);
        }

        let flags = if width == 2 {
            CellFlags::WIDE_CHAR
        } else {
            CellFlags::empty()
        };
        line.cells[x].write(c, pen, flags);
        if width == 2 {
            line.cells[x + 1] = Cell::wide_spacer(pen);
        }
        self.mark_dirty(y);

        let next = self.cursor.x + width as u16;
        if next >= self.cols {
            // park in the pending-wrap slot one past the last column
            self.cursor.x = self.cols;
            self.cursor.wrap_pending = true;
        } else {
            self.cursor.x = next;
        }
        fed
    }

    /// Append a combining mark to the most recently written cell. A mark with
    /// no base on this line is silently discarded.
    pub fn combine(&mut self, mark: char) {
        if self.cursor.x == 0 || self.cols == 0 {
            return;
        }
        let y = self.cursor.y;
        let mut col = (self.cursor.x.min(self.cols) - 1) as usize;
        let line = self.screen_line_mut(y);
        if line.cells[col].width() == 0 && col > 0 {
            col -= 1;
        }
        if line.cells[col].width() == 0 {
            return;
        }
        line.cells[col].combine(mark);
        self.mark_dirty(y);
    }

    // ------------------------------------------------------------------
    // Cursor motion
    // ------------------------------------------------------------------

    pub fn carriage_return(&mut self) {
        self.cursor.x = 0;
        self.cursor.wrap_pending = false;
    }

    /// LF: advance a row, scrolling the region when the cursor sits on its
    /// bottom margin.
    pub fn line_feed(&mut self) {
        if self.cursor.y == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.y + 1 < self.rows {
            self.cursor.y += 1;
        }
    }

    /// RI: move up a row, scrolling the region down when the cursor sits on
    /// its top margin.
    pub fn reverse_index(&mut self) {
        if self.cursor.y == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
    }

    pub fn cursor_up(&mut self, n: u16) {
        let min_row = if self.cursor.y >= self.scroll_top && self.cursor.y <= self.scroll_bottom {
            self.scroll_top
        } else {
            0
        };
        self.cursor.y = self.cursor.y.saturating_sub(n.max(1)).max(min_row);
        self.cursor.wrap_pending = false;
        self.cursor.x = self.cursor.x.min(self.cols.saturating_sub(1));
    }

    pub fn cursor_down(&mut self, n: u16) {
        let max_row = if self.cursor.y >= self.scroll_top && self.cursor.y <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows.saturating_sub(1)
        };
        self.cursor.y = (self.cursor.y + n.max(1)).min(max_row);
        self.cursor.wrap_pending = false;
        self.cursor.x = self.cursor.x.min(self.cols.saturating_sub(1));
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.x = (self.cursor.x.min(self.cols.saturating_sub(1)) + n.max(1))
            .min(self.cols.saturating_sub(1));
        self.cursor.wrap_pending = false;
    }

    pub fn cursor_back(&mut self, n: u16) {
        self.cursor.x = self
            .cursor
            .x
            .min(self.cols.saturating_sub(1))
            .saturating_sub(n.max(1));
        self.cursor.wrap_pending = false;
    }

    /// CHA/HPA: absolute column, 0-based.
    pub fn cursor_to_col(&mut self, col: u16) {
        self.cursor.x = col.min(self.cols.saturating_sub(1));
        self.cursor.wrap_pending = false;
    }

    /// VPA: absolute row, 0-based; origin mode offsets into the region.
    pub fn cursor_to_row(&mut self, row: u16, origin: bool) {
        self.cursor.y = if origin {
            (self.scroll_top + row).min(self.scroll_bottom)
        } else {
            row.min(self.rows.saturating_sub(1))
        };
        self.cursor.wrap_pending = false;
    }

    /// CUP/HVP: absolute position, 0-based; origin mode is relative to the
    /// scroll region top.
    pub fn cup(&mut self, row: u16, col: u16, origin: bool) {
        self.cursor_to_row(row, origin);
        self.cursor_to_col(col);
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    /// Shift the scroll region up by `n`. Evicted lines feed the scrollback
    /// ring only when the region spans the full screen; the bottom fills with
    /// blanks carrying the current erase attribute.
    pub fn scroll_up(&mut self, n: u16) {
        let region_len = self.scroll_bottom - self.scroll_top + 1;
        let n = n.max(1).min(region_len) as usize;
        let erase = self.pen.erase_attr();
        let full_screen = self.scroll_top == 0 && self.scroll_bottom + 1 == self.rows;

        if full_screen {
            let was_at_bottom = self.is_at_bottom();
            for _ in 0..n {
                let line = self.screen.remove(0);
                self.history.push(line);
                self.screen.push(Line::blank(self.cols, erase));
            }
            if was_at_bottom {
                self.viewport_y = self.history.len();
            } else {
                self.viewport_y = self.viewport_y.min(self.history.len());
            }
        } else {
            for _ in 0..n {
                self.screen.remove(self.scroll_top as usize);
                self.screen
                    .insert(self.scroll_bottom as usize, Line::blank(self.cols, erase));
            }
        }
        self.mark_range(self.scroll_top, self.scroll_bottom);
    }

    /// Shift the scroll region down by `n`; no scrollback interaction.
    pub fn scroll_down(&mut self, n: u16) {
        let region_len = self.scroll_bottom - self.scroll_top + 1;
        let n = n.max(1).min(region_len) as usize;
        let erase = self.pen.erase_attr();
        for _ in 0..n {
            self.screen.remove(self.scroll_bottom as usize);
            self.screen
                .insert(self.scroll_top as usize, Line::blank(self.cols, erase));
        }
        self.mark_range(self.scroll_top, self.scroll_bottom);
    }

    // ------------------------------------------------------------------
    // Erase / insert / delete
    // ------------------------------------------------------------------

    /// ED: 0 = cursor to end, 1 = start to cursor, 2 = whole screen,
    /// 3 = whole screen plus scrollback.
    pub fn erase_in_display(&mut self, mode: u16) {
        let erase = self.pen.erase_attr();
        let y = self.cursor.y;
        let x = self.cursor.x.min(self.cols.saturating_sub(1)) as usize;
        let cols = self.cols as usize;
        match mode {
            0 => {
                self.screen_line_mut(y).erase(x, cols, erase);
                for row in (y + 1)..self.rows {
                    *self.screen_line_mut(row) = Line::blank(self.cols, erase);
                }
                self.mark_range(y, self.rows.saturating_sub(1));
            }
            1 => {
                for row in 0..y {
                    *self.screen_line_mut(row) = Line::blank(self.cols, erase);
                }
                self.screen_line_mut(y).erase(0, x + 1, erase);
                self.mark_range(0, y);
            }
            2 => {
                for row in 0..self.rows {
                    *self.screen_line_mut(row) = Line::blank(self.cols, erase);
                }
                self.mark_cleared();
            }
            3 => {
                for row in 0..self.rows {
                    *self.screen_line_mut(row) = Line::blank(self.cols, erase);
                }
                self.history.clear();
                self.viewport_y = 0;
                self.mark_cleared();
            }
            _ => {}
        }
    }

    /// EL: 0 = cursor to end of line, 1 = start to cursor, 2 = whole line.
    pub fn erase_in_line(&mut self, mode: u16) {
        let erase = self.pen.erase_attr();
        let y = self.cursor.y;
        let x = self.cursor.x.min(self.cols.saturating_sub(1)) as usize;
        let cols = self.cols as usize;
        match mode {
            0 => self.screen_line_mut(y).erase(x, cols, erase),
            1 => self.screen_line_mut(y).erase(0, x + 1, erase),
            2 => self.screen_line_mut(y).erase(0, cols, erase),
            _ => return,
        }
        self.mark_dirty(y);
    }

    /// IL: insert blank lines at the cursor, pushing region content down.
    /// No-op when the cursor is outside the scroll region.
    pub fn insert_lines(&mut self, n: u16) {
        if self.cursor.y < self.scroll_top || self.cursor.y > self.scroll_bottom {
            return;
        }
        let erase = self.pen.erase_attr();
        let n = n.max(1).min(self.scroll_bottom - self.cursor.y + 1);
        for _ in 0..n {
            self.screen.remove(self.scroll_bottom as usize);
            self.screen
                .insert(self.cursor.y as usize, Line::blank(self.cols, erase));
        }
        self.cursor.x = 0;
        self.cursor.wrap_pending = false;
        self.mark_range(self.cursor.y, self.scroll_bottom);
    }

    /// DL: delete lines at the cursor, pulling region content up.
    pub fn delete_lines(&mut self, n: u16) {
        if self.cursor.y < self.scroll_top || self.cursor.y > self.scroll_bottom {
            return;
        }
        let erase = self.pen.erase_attr();
        let n = n.max(1).min(self.scroll_bottom - self.cursor.y + 1);
        for _ in 0..n {
            self.screen.remove(self.cursor.y as usize);
            self.screen
                .insert(self.scroll_bottom as usize, Line::blank(self.cols, erase));
        }
        self.cursor.x = 0;
        self.cursor.wrap_pending = false;
        self.mark_range(self.cursor.y, self.scroll_bottom);
    }

    /// ICH: insert blank cells at the cursor, shifting the row tail right.
    pub fn insert_chars(&mut self, n: u16) {
        let erase = self.pen.erase_attr();
        let x = self.cursor.x.min(self.cols.saturating_sub(1)) as usize;
        let y = self.cursor.y;
        self.screen_line_mut(y)
            .insert_cells(x, n.max(1) as usize, erase);
        self.mark_dirty(y);
    }

    /// DCH: delete cells at the cursor, shifting the row tail left.
    pub fn delete_chars(&mut self, n: u16) {
        let erase = self.pen.erase_attr();
        let x = self.cursor.x.min(self.cols.saturating_sub(1)) as usize;
        let y = self.cursor.y;
        self.screen_line_mut(y)
            .delete_cells(x, n.max(1) as usize, erase);
        self.mark_dirty(y);
    }

    /// ECH: blank cells from the cursor without shifting.
    pub fn erase_chars(&mut self, n: u16) {
        let erase = self.pen.erase_attr();
        let x = self.cursor.x.min(self.cols.saturating_sub(1)) as usize;
        let end = x + n.max(1) as usize;
        let y = self.cursor.y;
        self.screen_line_mut(y).erase(x, end, erase);
        self.mark_dirty(y);
    }

    // ------------------------------------------------------------------
    // Scroll region, save/restore
    // ------------------------------------------------------------------

    /// DECSTBM with 1-based margins; `bottom` of 0 or past the screen means
    /// the last row. Ignored unless top < bottom. The cursor homes, honoring
    /// origin mode.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16, origin: bool) {
        let top0 = top.max(1) - 1;
        let bottom = if bottom == 0 { self.rows } else { bottom };
        let bot0 = bottom.min(self.rows).saturating_sub(1);
        if top0 >= bot0 {
            return;
        }
        self.scroll_top = top0;
        self.scroll_bottom = bot0;
        self.cursor = Cursor {
            x: 0,
            y: if origin { self.scroll_top } else { 0 },
            wrap_pending: false,
        };
    }

    /// DECSC: snapshot cursor, pen, charsets, and origin mode.
    pub fn save_cursor(&mut self, charsets: CharsetState, origin: bool) {
        self.saved = SavedCursor {
            cursor: self.cursor,
            pen: self.pen,
            charsets,
            origin_mode: origin,
        };
    }

    /// DECRC: restore the snapshot; the caller reapplies the returned charset
    /// state and origin mode to the terminal.
    pub fn restore_cursor(&mut self) -> SavedCursor {
        let saved = self.saved;
        self.cursor = saved.cursor;
        self.cursor.y = self.cursor.y.min(self.rows.saturating_sub(1));
        self.cursor.x = self.cursor.x.min(self.cols);
        self.pen = saved.pen;
        saved
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    /// Scroll the viewport to an absolute scrollback offset, clamped.
    pub fn scroll_to_line(&mut self, line: usize) {
        self.viewport_y = line.min(self.max_scrollback());
        self.mark_all();
    }

    /// Scroll the viewport by a delta; positive moves toward the live area.
    pub fn scroll_viewport(&mut self, delta: i64) {
        let target = (self.viewport_y as i64 + delta).max(0) as usize;
        self.scroll_to_line(target);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_to_line(0);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_to_line(self.max_scrollback());
    }

    // ------------------------------------------------------------------
    // Whole-buffer operations
    // ------------------------------------------------------------------

    /// Blank the screen and home the cursor, as on alternate-buffer entry.
    pub fn clear_screen(&mut self) {
        let erase = self.pen.erase_attr();
        for row in 0..self.rows {
            *self.screen_line_mut(row) = Line::blank(self.cols, erase);
        }
        self.cursor = Cursor::default();
        self.mark_cleared();
    }

    /// Resize preserving content in the overlapping area. Grown rows fill
    /// with blanks; on shrink, rows lost from the top of the live area go to
    /// the scrollback ring (discarded when the ring has no capacity).
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }

        if cols != self.cols {
            for line in self.history.iter_mut() {
                line.resize(cols);
            }
            for line in &mut self.screen {
                line.resize(cols);
            }
            self.cols = cols;
        }

        if rows > self.rows {
            for _ in self.rows..rows {
                self.screen.push(Line::new(cols));
            }
        } else if rows < self.rows {
            let lost = self.rows - rows;
            let was_at_bottom = self.is_at_bottom();
            for _ in 0..lost {
                let line = self.screen.remove(0);
                self.history.push(line);
            }
            self.cursor.y = self.cursor.y.saturating_sub(lost);
            self.saved.cursor.y = self.saved.cursor.y.saturating_sub(lost);
            if was_at_bottom {
                self.viewport_y = self.history.len();
            }
        }
        self.rows = rows;

        self.scroll_top = 0;
        self.scroll_bottom = rows.saturating_sub(1);
        self.cursor.x = self.cursor.x.min(cols.saturating_sub(1));
        self.cursor.y = self.cursor.y.min(rows.saturating_sub(1));
        self.cursor.wrap_pending = false;
        self.saved.cursor.x = self.saved.cursor.x.min(cols.saturating_sub(1));
        self.saved.cursor.y = self.saved.cursor.y.min(rows.saturating_sub(1));
        self.viewport_y = self.viewport_y.min(self.max_scrollback());
        self.mark_cleared();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(cols: u16, rows: u16, scrollback: usize) -> Buffer {
        let mut buffer = Buffer::new(cols, rows, scrollback);
        for i in 0..rows {
            buffer.cup(i, 0, false);
            let c = (b'A' + (i % 26) as u8) as char;
            buffer.put_char(c, 1, true, false);
        }
        buffer.cup(0, 0, false);
        buffer
    }

    fn row_text(buffer: &Buffer, row: u16) -> String {
        buffer
            .visible_line(row)
            .unwrap()
            .translate_to_string(true, ..)
    }

    #[test]
    fn pending_wrap_discharges_on_next_print() {
        let mut buffer = Buffer::new(4, 3, 0);
        for c in "abcd".chars() {
            buffer.put_char(c, 1, true, false);
        }
        // parked one past the last column, nothing wrapped yet
        assert_eq!(buffer.cursor().x, 4);
        assert!(buffer.cursor().wrap_pending);
        assert_eq!(row_text(&buffer, 1), "");

        buffer.put_char('e', 1, true, false);
        assert_eq!(buffer.cursor(), Cursor { x: 1, y: 1, wrap_pending: false });
        assert_eq!(row_text(&buffer, 0), "abcd");
        assert!(buffer.visible_line(0).unwrap().wrapped);
        assert_eq!(row_text(&buffer, 1), "e");
    }

    #[test]
    fn carriage_return_cancels_pending_wrap() {
        let mut buffer = Buffer::new(3, 2, 0);
        for c in "xyz".chars() {
            buffer.put_char(c, 1, true, false);
        }
        assert!(buffer.cursor().wrap_pending);
        buffer.carriage_return();
        buffer.put_char('A', 1, true, false);
        assert_eq!(row_text(&buffer, 0), "Ayz");
        assert!(!buffer.visible_line(0).unwrap().wrapped);
    }

    #[test]
    fn wide_char_in_last_column_wraps_immediately() {
        let mut buffer = Buffer::new(4, 3, 0);
        for c in "abc".chars() {
            buffer.put_char(c, 1, true, false);
        }
        buffer.put_char('漢', 2, true, false);
        assert_eq!(row_text(&buffer, 0), "abc");
        assert!(buffer.visible_line(0).unwrap().wrapped);
        assert_eq!(row_text(&buffer, 1), "漢");
        let line = buffer.visible_line(1).unwrap();
        assert_eq!(line.cells[0].width(), 2);
        assert_eq!(line.cells[1].width(), 0);
        assert_eq!(line.cells[0].attr, line.cells[1].attr);
    }

    #[test]
    fn overwriting_wide_pair_blanks_other_half() {
        let mut buffer = Buffer::new(6, 2, 0);
        buffer.put_char('漢', 2, true, false);
        buffer.cup(0, 1, false);
        buffer.put_char('x', 1, true, false);
        let line = buffer.visible_line(0).unwrap();
        assert_eq!(line.cells[0].c, ' ');
        assert_eq!(line.cells[0].width(), 1);
        assert_eq!(line.cells[1].c, 'x');
    }

    #[test]
    fn linefeed_at_region_bottom_scrolls_region_only() {
        let mut buffer = filled(10, 8, 100);
        buffer.set_scroll_region(3, 6, false);
        buffer.cup(5, 0, false); // region bottom (0-based 5 = row 6)
        buffer.line_feed();
        assert_eq!(buffer.cursor().y, 5);
        assert_eq!(row_text(&buffer, 0), "A");
        assert_eq!(row_text(&buffer, 2), "D"); // region top scrolled away C
        assert_eq!(row_text(&buffer, 5), "");
        assert_eq!(row_text(&buffer, 6), "G");
        // nothing entered scrollback: region is not full-screen
        assert_eq!(buffer.base_y(), 0);
    }

    #[test]
    fn full_screen_scroll_feeds_scrollback() {
        let mut buffer = filled(10, 4, 2);
        buffer.cup(3, 0, false);
        buffer.line_feed();
        buffer.line_feed();
        buffer.line_feed();
        // three lines scrolled off, ring capacity keeps the last two
        assert_eq!(buffer.base_y(), 2);
        assert_eq!(buffer.line(0).unwrap().translate_to_string(true, ..), "B");
        assert_eq!(buffer.line(1).unwrap().translate_to_string(true, ..), "C");
        assert_eq!(buffer.len(), buffer.base_y() + 4);
        assert!(buffer.is_at_bottom());
    }

    #[test]
    fn viewport_holds_position_while_output_scrolls() {
        let mut buffer = filled(10, 4, 100);
        buffer.cup(3, 0, false);
        buffer.line_feed();
        assert!(buffer.is_at_bottom());
        buffer.scroll_to_top();
        assert_eq!(buffer.viewport_y(), 0);
        buffer.line_feed();
        buffer.line_feed();
        assert_eq!(buffer.viewport_y(), 0);
        assert!(!buffer.is_at_bottom());
        buffer.scroll_to_bottom();
        assert!(buffer.is_at_bottom());
    }

    #[test]
    fn scroll_viewport_clamps_to_range() {
        let mut buffer = filled(10, 4, 100);
        buffer.cup(3, 0, false);
        for _ in 0..5 {
            buffer.line_feed();
        }
        assert_eq!(buffer.max_scrollback(), 5);
        buffer.scroll_viewport(-100);
        assert_eq!(buffer.viewport_y(), 0);
        buffer.scroll_viewport(3);
        assert_eq!(buffer.viewport_y(), 3);
        buffer.scroll_viewport(100);
        assert_eq!(buffer.viewport_y(), 5);
    }

    #[test]
    fn erase_display_modes() {
        let mut buffer = filled(10, 4, 10);
        buffer.cup(1, 0, false);
        buffer.erase_in_display(0);
        assert_eq!(row_text(&buffer, 0), "A");
        assert_eq!(row_text(&buffer, 1), "");
        assert_eq!(row_text(&buffer, 3), "");

        let mut buffer = filled(10, 4, 10);
        buffer.cup(2, 5, false);
        buffer.erase_in_display(1);
        assert_eq!(row_text(&buffer, 0), "");
        assert_eq!(row_text(&buffer, 2), "");
        assert_eq!(row_text(&buffer, 3), "D");

        let mut buffer = filled(10, 4, 10);
        buffer.cup(2, 3, false);
        buffer.erase_in_display(2);
        for row in 0..4 {
            assert_eq!(row_text(&buffer, row), "");
        }
        // ED 2 leaves the cursor alone
        assert_eq!(buffer.cursor().y, 2);
        assert_eq!(buffer.cursor().x, 3);
    }

    #[test]
    fn erase_display_3_drops_scrollback() {
        let mut buffer = filled(10, 4, 100);
        buffer.cup(3, 0, false);
        for _ in 0..6 {
            buffer.line_feed();
        }
        assert_eq!(buffer.base_y(), 6);
        buffer.erase_in_display(3);
        assert_eq!(buffer.base_y(), 0);
        assert_eq!(buffer.viewport_y(), 0);
        assert!(buffer.is_at_bottom());
    }

    #[test]
    fn insert_delete_lines_confined_to_region() {
        let mut buffer = filled(10, 6, 10);
        buffer.set_scroll_region(2, 5, false);
        // cursor above the region: no-op
        buffer.cup(0, 0, false);
        buffer.insert_lines(2);
        assert_eq!(row_text(&buffer, 1), "B");

        buffer.cup(2, 0, false);
        buffer.insert_lines(1);
        assert_eq!(row_text(&buffer, 2), "");
        assert_eq!(row_text(&buffer, 3), "C");
        assert_eq!(row_text(&buffer, 5), "F"); // below region untouched

        buffer.delete_lines(1);
        assert_eq!(row_text(&buffer, 2), "C");
        assert_eq!(row_text(&buffer, 4), "");
    }

    #[test]
    fn save_restore_cursor_round_trip() {
        let mut buffer = Buffer::new(20, 5, 0);
        buffer.cup(2, 7, false);
        buffer.pen_mut().fg = crate::terminal::color::Color::Indexed(3);
        buffer.save_cursor(CharsetState::default(), false);
        buffer.cup(4, 0, false);
        buffer.pen_mut().reset();
        let saved = buffer.restore_cursor();
        assert_eq!(buffer.cursor().x, 7);
        assert_eq!(buffer.cursor().y, 2);
        assert_eq!(
            buffer.pen().fg,
            crate::terminal::color::Color::Indexed(3)
        );
        assert!(!saved.origin_mode);
    }

    #[test]
    fn resize_shrink_pushes_rows_to_scrollback() {
        let mut buffer = filled(10, 6, 100);
        buffer.cup(5, 2, false);
        buffer.resize(10, 4);
        assert_eq!(buffer.base_y(), 2);
        assert_eq!(buffer.line(0).unwrap().translate_to_string(true, ..), "A");
        assert_eq!(buffer.line(1).unwrap().translate_to_string(true, ..), "B");
        assert_eq!(row_text(&buffer, 0), "C");
        // cursor follows its content up
        assert_eq!(buffer.cursor().y, 3);
        assert_eq!(buffer.cursor().x, 2);
    }

    #[test]
    fn resize_grow_and_narrow_preserves_overlap() {
        let mut buffer = filled(10, 3, 0);
        buffer.resize(5, 5);
        assert_eq!(buffer.rows(), 5);
        assert_eq!(buffer.cols(), 5);
        assert_eq!(row_text(&buffer, 0), "A");
        assert_eq!(row_text(&buffer, 4), "");
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn damage_span_accumulates_and_resets() {
        let mut buffer = Buffer::new(10, 6, 0);
        let initial = buffer.take_damage().unwrap();
        assert!(initial.full);
        assert!(buffer.take_damage().is_none());

        buffer.cup(2, 0, false);
        buffer.put_char('x', 1, true, false);
        buffer.cup(4, 0, false);
        buffer.put_char('y', 1, true, false);
        let damage = buffer.take_damage().unwrap();
        assert_eq!((damage.start, damage.end), (2, 4));
        assert!(!damage.full);
    }

    #[test]
    fn scroll_region_rejects_degenerate_bounds() {
        let mut buffer = Buffer::new(10, 6, 0);
        buffer.set_scroll_region(4, 4, false);
        assert_eq!(buffer.scroll_top(), 0);
        assert_eq!(buffer.scroll_bottom(), 5);
        buffer.set_scroll_region(2, 99, false);
        assert_eq!(buffer.scroll_top(), 1);
        assert_eq!(buffer.scroll_bottom(), 5);
    }
}
