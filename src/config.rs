use serde::{Deserialize, Serialize};

use crate::terminal::cursor::CursorStyle;

/// Construction-time options for a terminal instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalOptions {
    /// Grid width in columns.
    pub cols: u16,
    /// Grid height in rows.
    pub rows: u16,
    /// Scrollback line capacity for the normal buffer; 0 disables scrollback.
    pub scrollback: usize,
    /// Distance between default tab stops.
    pub tab_stop_width: u16,
    /// Treat incoming LF as CRLF.
    pub convert_eol: bool,
    /// Initial cursor shape.
    pub cursor_style: CursorStyle,
    /// Initial cursor blink state.
    pub cursor_blink: bool,
    /// Terminal name advertised through XTGETTCAP (`TN`).
    pub term_name: String,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback: 1000,
            tab_stop_width: 8,
            convert_eol: false,
            cursor_style: CursorStyle::Block,
            cursor_blink: false,
            term_name: "xterm-256color".to_string(),
        }
    }
}

impl TerminalOptions {
    /// Clamp degenerate values to a usable grid.
    pub(crate) fn sanitized(mut self) -> Self {
        self.cols = self.cols.max(1);
        self.rows = self.rows.max(1);
        self.tab_stop_width = self.tab_stop_width.max(1);
        self
    }
}
