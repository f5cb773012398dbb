use bitflags::bitflags;

use crate::terminal::modes::TerminalModes;

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const META  = 1 << 3;
    }
}

impl KeyModifiers {
    /// The xterm modifier parameter: 1 + shift(1) + alt(2) + ctrl(4).
    pub fn xterm_code(&self) -> u8 {
        let mut code = 1;
        if self.contains(KeyModifiers::SHIFT) {
            code += 1;
        }
        if self.contains(KeyModifiers::ALT) {
            code += 2;
        }
        if self.contains(KeyModifiers::CTRL) {
            code += 4;
        }
        code
    }

    /// Modifiers that change an escape encoding (shift alone does not alter
    /// printable characters).
    fn has_encoding_mods(&self) -> bool {
        self.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT | KeyModifiers::CTRL)
    }
}

/// Keys the encoder understands. Printable input arrives as `Char` carrying
/// the already-shifted character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Function key F1..=F12.
    F(u8),
}

/// Encode a key press as the byte sequence a program expects from an
/// xterm-compatible terminal. Returns an empty vector for combinations that
/// produce no input.
pub fn encode_key(key: KeyCode, mods: KeyModifiers, modes: &TerminalModes) -> Vec<u8> {
    let app_cursor = modes.cursor_keys_application;
    match key {
        KeyCode::Char(c) => encode_char(c, mods),
        KeyCode::Enter => prefix_alt(b"\r".to_vec(), mods),
        KeyCode::Tab => {
            if mods.contains(KeyModifiers::SHIFT) {
                b"\x1b[Z".to_vec()
            } else {
                prefix_alt(b"\t".to_vec(), mods)
            }
        }
        KeyCode::Backspace => {
            let byte = if modes.backarrow_sends_bs { 0x08 } else { 0x7f };
            prefix_alt(vec![byte], mods)
        }
        KeyCode::Escape => prefix_alt(vec![0x1b], mods),
        KeyCode::Up => arrow(b'A', mods, app_cursor),
        KeyCode::Down => arrow(b'B', mods, app_cursor),
        KeyCode::Right => arrow(b'C', mods, app_cursor),
        KeyCode::Left => arrow(b'D', mods, app_cursor),
        KeyCode::Home => arrow(b'H', mods, app_cursor),
        KeyCode::End => arrow(b'F', mods, app_cursor),
        KeyCode::PageUp => tilde_key(5, mods),
        KeyCode::PageDown => tilde_key(6, mods),
        KeyCode::Insert => tilde_key(2, mods),
        KeyCode::Delete => tilde_key(3, mods),
        KeyCode::F(n @ 1..=4) => {
            let final_byte = b'P' + (n - 1);
            if mods.has_encoding_mods() {
                format!("\x1b[1;{}{}", mods.xterm_code(), final_byte as char).into_bytes()
            } else {
                vec![0x1b, b'O', final_byte]
            }
        }
        KeyCode::F(n @ 5..=12) => {
            const CODES: [u8; 8] = [15, 17, 18, 19, 20, 21, 23, 24];
            tilde_key(CODES[(n - 5) as usize], mods)
        }
        KeyCode::F(_) => Vec::new(),
    }
}

fn encode_char(c: char, mods: KeyModifiers) -> Vec<u8> {
    let mut bytes = Vec::new();
    if mods.contains(KeyModifiers::ALT) {
        bytes.push(0x1b);
    }
    if mods.contains(KeyModifiers::CTRL) {
        if let Some(ctrl) = control_byte(c) {
            bytes.push(ctrl);
            return bytes;
        }
    }
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    bytes
}

/// Ctrl+key → C0 byte: letters mask to 0x01..0x1A, and the usual symbol
/// mappings (`@`, `[`, `\`, `]`, `^`, `_`, space).
fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 & 0x1f),
        'A'..='Z' => Some(c as u8 & 0x1f),
        '@' | ' ' => Some(0x00),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        '?' => Some(0x7f),
        _ => None,
    }
}

fn prefix_alt(mut bytes: Vec<u8>, mods: KeyModifiers) -> Vec<u8> {
    if mods.contains(KeyModifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    bytes
}

/// Arrow-style keys (including Home/End): `SS3 x` in application cursor
/// mode, `CSI x` otherwise, `CSI 1;M x` when modified.
fn arrow(final_byte: u8, mods: KeyModifiers, app_cursor: bool) -> Vec<u8> {
    if mods.has_encoding_mods() {
        format!("\x1b[1;{}{}", mods.xterm_code(), final_byte as char).into_bytes()
    } else if app_cursor {
        vec![0x1b, b'O', final_byte]
    } else {
        vec![0x1b, b'[', final_byte]
    }
}

/// Editing-pad keys: `CSI n ~`, `CSI n;M ~` when modified.
fn tilde_key(code: u8, mods: KeyModifiers) -> Vec<u8> {
    if mods.has_encoding_mods() {
        format!("\x1b[{};{}~", code, mods.xterm_code()).into_bytes()
    } else {
        format!("\x1b[{}~", code).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes() -> TerminalModes {
        TerminalModes::default()
    }

    #[test]
    fn plain_chars_pass_through() {
        assert_eq!(encode_key(KeyCode::Char('a'), KeyModifiers::empty(), &modes()), b"a");
        assert_eq!(encode_key(KeyCode::Char('Z'), KeyModifiers::SHIFT, &modes()), b"Z");
        assert_eq!(
            encode_key(KeyCode::Char('é'), KeyModifiers::empty(), &modes()),
            "é".as_bytes()
        );
    }

    #[test]
    fn ctrl_letters_mask_to_c0() {
        assert_eq!(encode_key(KeyCode::Char('c'), KeyModifiers::CTRL, &modes()), &[0x03]);
        assert_eq!(encode_key(KeyCode::Char('C'), KeyModifiers::CTRL, &modes()), &[0x03]);
        assert_eq!(encode_key(KeyCode::Char('['), KeyModifiers::CTRL, &modes()), &[0x1b]);
        assert_eq!(encode_key(KeyCode::Char(' '), KeyModifiers::CTRL, &modes()), &[0x00]);
    }

    #[test]
    fn alt_prefixes_escape() {
        assert_eq!(encode_key(KeyCode::Char('x'), KeyModifiers::ALT, &modes()), b"\x1bx");
        assert_eq!(
            encode_key(KeyCode::Char('b'), KeyModifiers::ALT | KeyModifiers::CTRL, &modes()),
            &[0x1b, 0x02]
        );
    }

    #[test]
    fn arrows_follow_cursor_key_mode() {
        let mut m = modes();
        assert_eq!(encode_key(KeyCode::Up, KeyModifiers::empty(), &m), b"\x1b[A");
        m.cursor_keys_application = true;
        assert_eq!(encode_key(KeyCode::Up, KeyModifiers::empty(), &m), b"\x1bOA");
    }

    #[test]
    fn modified_arrow_uses_xterm_parameter() {
        // ctrl+shift → 1 + 1 + 4 = 6
        assert_eq!(
            encode_key(KeyCode::Up, KeyModifiers::CTRL | KeyModifiers::SHIFT, &modes()),
            b"\x1b[1;6A"
        );
        // modifiers win over application cursor mode
        let mut m = modes();
        m.cursor_keys_application = true;
        assert_eq!(encode_key(KeyCode::Left, KeyModifiers::ALT, &m), b"\x1b[1;3D");
    }

    #[test]
    fn function_keys() {
        assert_eq!(encode_key(KeyCode::F(1), KeyModifiers::empty(), &modes()), b"\x1bOP");
        assert_eq!(encode_key(KeyCode::F(4), KeyModifiers::empty(), &modes()), b"\x1bOS");
        assert_eq!(encode_key(KeyCode::F(2), KeyModifiers::SHIFT, &modes()), b"\x1b[1;2Q");
        assert_eq!(encode_key(KeyCode::F(5), KeyModifiers::empty(), &modes()), b"\x1b[15~");
        assert_eq!(encode_key(KeyCode::F(12), KeyModifiers::empty(), &modes()), b"\x1b[24~");
        assert_eq!(encode_key(KeyCode::F(8), KeyModifiers::CTRL, &modes()), b"\x1b[19;5~");
    }

    #[test]
    fn editing_keys() {
        assert_eq!(encode_key(KeyCode::PageUp, KeyModifiers::empty(), &modes()), b"\x1b[5~");
        assert_eq!(encode_key(KeyCode::Delete, KeyModifiers::empty(), &modes()), b"\x1b[3~");
        assert_eq!(encode_key(KeyCode::Insert, KeyModifiers::empty(), &modes()), b"\x1b[2~");
        assert_eq!(
            encode_key(KeyCode::PageDown, KeyModifiers::SHIFT, &modes()),
            b"\x1b[6;2~"
        );
    }

    #[test]
    fn home_end_honor_application_mode() {
        let mut m = modes();
        assert_eq!(encode_key(KeyCode::Home, KeyModifiers::empty(), &m), b"\x1b[H");
        assert_eq!(encode_key(KeyCode::End, KeyModifiers::empty(), &m), b"\x1b[F");
        m.cursor_keys_application = true;
        assert_eq!(encode_key(KeyCode::Home, KeyModifiers::empty(), &m), b"\x1bOH");
        assert_eq!(encode_key(KeyCode::End, KeyModifiers::empty(), &m), b"\x1bOF");
    }

    #[test]
    fn backspace_honors_decbkm() {
        let mut m = modes();
        assert_eq!(encode_key(KeyCode::Backspace, KeyModifiers::empty(), &m), &[0x7f]);
        m.backarrow_sends_bs = true;
        assert_eq!(encode_key(KeyCode::Backspace, KeyModifiers::empty(), &m), &[0x08]);
    }

    #[test]
    fn shift_tab_is_backtab() {
        assert_eq!(encode_key(KeyCode::Tab, KeyModifiers::SHIFT, &modes()), b"\x1b[Z");
    }
}
