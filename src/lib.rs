//! Headless VT100/xterm-compatible terminal emulation core.
//!
//! `mist` consumes the byte stream a program writes to its terminal and
//! maintains a cell grid plus scrollback according to the ANSI/VT escape
//! sequences in it. Rendering is out of scope: the host reads the grid
//! through [`terminal::buffer::Buffer`] and listens for damage and other
//! events on [`event::TerminalEvents`]. Device replies and encoded key or
//! mouse input surface on the `data_out` sink for the host to forward back
//! to the program.
//!
//! ```
//! use mist::{Terminal, TerminalOptions};
//!
//! let mut term = Terminal::new(TerminalOptions::default());
//! term.write(b"\x1b[1;31mhello\x1b[0m world");
//! let line = term
//!     .active_buffer()
//!     .visible_line(0)
//!     .unwrap()
//!     .translate_to_string(true, ..);
//! assert_eq!(line, "hello world");
//! ```

pub mod config;
pub mod event;
pub mod input;
pub mod parser;
pub mod terminal;

pub use config::TerminalOptions;
pub use event::{
    ActiveBuffer, ClipboardEvent, CursorStyleChange, EventEmitter, PaletteChange, Subscription,
    TerminalEvents, WindowInfoKind, WindowInfoReply, WindowInfoRequest, WindowOp,
};
pub use input::{KeyCode, KeyModifiers, MouseAction, MouseButton};
pub use parser::{Params, Parser, Perform};
pub use terminal::attr::{Attr, AttrFlags, UnderlineStyle};
pub use terminal::buffer::{Buffer, Damage};
pub use terminal::cell::{Cell, CellFlags, Line};
pub use terminal::color::Color;
pub use terminal::cursor::{Cursor, CursorStyle};
pub use terminal::modes::TerminalModes;
pub use terminal::Terminal;
