pub mod keyboard;
pub mod mouse;

pub use keyboard::{encode_key, KeyCode, KeyModifiers};
pub use mouse::{encode_mouse, MouseAction, MouseButton};
