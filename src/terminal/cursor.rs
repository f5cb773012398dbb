use serde::{Deserialize, Serialize};

use super::attr::Attr;
use super::charset::CharsetState;

/// Cursor shape for rendering, set via configuration or DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor position in screen-relative coordinates. `x` may sit at `cols`
/// (one past the last column) while a wrap is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
    /// Latched when a glyph lands in the last column with auto-wrap on;
    /// discharged by the next printable character.
    pub wrap_pending: bool,
}

/// Snapshot taken by DECSC / SCOSC and restored by DECRC / SCORC.
#[derive(Debug, Clone, Copy)]
pub struct SavedCursor {
    pub cursor: Cursor,
    pub pen: Attr,
    pub charsets: CharsetState,
    pub origin_mode: bool,
}

impl Default for SavedCursor {
    fn default() -> Self {
        Self {
            cursor: Cursor::default(),
            pen: Attr::default(),
            charsets: CharsetState::default(),
            origin_mode: false,
        }
    }
}
