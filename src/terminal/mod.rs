pub mod attr;
pub mod buffer;
pub mod cell;
pub mod charset;
pub mod color;
pub mod cursor;
pub mod modes;
pub mod scrollback;
pub mod state;

pub use state::Terminal;
