use super::keyboard::KeyModifiers;
use crate::terminal::modes::TerminalModes;

/// Mouse buttons as encoded in the xterm protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    /// Motion with no button held.
    None,
}

impl MouseButton {
    fn code(&self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::None => 3,
            MouseButton::WheelUp => 64,
            MouseButton::WheelDown => 65,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    Motion,
}

/// Encode a mouse event for the active tracking/encoding modes. `x` and `y`
/// are 0-based cell coordinates. Returns an empty vector when the event is
/// not reported under the current modes.
pub fn encode_mouse(
    button: MouseButton,
    action: MouseAction,
    x: u16,
    y: u16,
    mods: KeyModifiers,
    modes: &TerminalModes,
) -> Vec<u8> {
    if !modes.mouse_reporting() {
        return Vec::new();
    }

    // Which events the active tracking mode reports.
    match action {
        MouseAction::Press => {}
        MouseAction::Release => {
            if modes.mouse_x10 && !modes.mouse_click && !modes.mouse_motion && !modes.mouse_all_motion
            {
                return Vec::new();
            }
        }
        MouseAction::Motion => {
            let held = !matches!(button, MouseButton::None);
            let wanted = modes.mouse_all_motion || (modes.mouse_motion && held);
            if !wanted {
                return Vec::new();
            }
        }
    }

    let mut b = button.code();
    if action == MouseAction::Motion {
        b += 32;
    }
    // X10 mode reports no modifiers.
    if !modes.mouse_x10 {
        if mods.contains(KeyModifiers::SHIFT) {
            b += 4;
        }
        if mods.contains(KeyModifiers::META) {
            b += 8;
        }
        if mods.contains(KeyModifiers::CTRL) {
            b += 16;
        }
    }

    if modes.sgr_mouse || modes.sgr_pixel_mouse {
        let terminator = if action == MouseAction::Release { 'm' } else { 'M' };
        return format!("\x1b[<{};{};{}{}", b, x + 1, y + 1, terminator).into_bytes();
    }

    if modes.urxvt_mouse {
        let b = if action == MouseAction::Release {
            MouseButton::None.code() + 32
        } else {
            b + 32
        };
        return format!("\x1b[{};{};{}M", b, x + 1, y + 1).into_bytes();
    }

    // Legacy encodings fold release into button code 3.
    let b = if action == MouseAction::Release {
        let mut code = MouseButton::None.code();
        if !modes.mouse_x10 {
            if mods.contains(KeyModifiers::SHIFT) {
                code += 4;
            }
            if mods.contains(KeyModifiers::META) {
                code += 8;
            }
            if mods.contains(KeyModifiers::CTRL) {
                code += 16;
            }
        }
        code
    } else {
        b
    };

    let mut out = vec![0x1b, b'[', b'M', 32 + b];
    if modes.utf8_mouse {
        push_utf8_coord(&mut out, x);
        push_utf8_coord(&mut out, y);
    } else {
        // default X10 bytes cap at 255 - 32
        out.push(32 + 1 + x.min(222) as u8);
        out.push(32 + 1 + y.min(222) as u8);
    }
    out
}

/// Mode 1005 coordinate: 32 + 1-based position, UTF-8 encoded when it
/// exceeds one byte.
fn push_utf8_coord(out: &mut Vec<u8>, pos: u16) {
    let value = (32 + 1 + pos.min(2014)) as u32;
    let mut buf = [0u8; 4];
    let encoded = char::from_u32(value)
        .unwrap_or(' ')
        .encode_utf8(&mut buf);
    out.extend_from_slice(encoded.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking() -> TerminalModes {
        TerminalModes {
            mouse_click: true,
            ..TerminalModes::default()
        }
    }

    #[test]
    fn no_tracking_mode_reports_nothing() {
        let modes = TerminalModes::default();
        assert!(encode_mouse(
            MouseButton::Left,
            MouseAction::Press,
            0,
            0,
            KeyModifiers::empty(),
            &modes
        )
        .is_empty());
    }

    #[test]
    fn x10_press_encoding() {
        let modes = tracking();
        let bytes = encode_mouse(
            MouseButton::Left,
            MouseAction::Press,
            4,
            2,
            KeyModifiers::empty(),
            &modes,
        );
        assert_eq!(bytes, vec![0x1b, b'[', b'M', 32, 32 + 5, 32 + 3]);
    }

    #[test]
    fn x10_release_uses_button_three() {
        let modes = tracking();
        let bytes = encode_mouse(
            MouseButton::Left,
            MouseAction::Release,
            0,
            0,
            KeyModifiers::empty(),
            &modes,
        );
        assert_eq!(bytes, vec![0x1b, b'[', b'M', 32 + 3, 33, 33]);
    }

    #[test]
    fn sgr_press_and_release() {
        let mut modes = tracking();
        modes.sgr_mouse = true;
        assert_eq!(
            encode_mouse(
                MouseButton::Left,
                MouseAction::Press,
                9,
                4,
                KeyModifiers::empty(),
                &modes
            ),
            b"\x1b[<0;10;5M"
        );
        assert_eq!(
            encode_mouse(
                MouseButton::Left,
                MouseAction::Release,
                9,
                4,
                KeyModifiers::empty(),
                &modes
            ),
            b"\x1b[<0;10;5m"
        );
    }

    #[test]
    fn urxvt_encoding() {
        let mut modes = tracking();
        modes.urxvt_mouse = true;
        assert_eq!(
            encode_mouse(
                MouseButton::Right,
                MouseAction::Press,
                0,
                0,
                KeyModifiers::empty(),
                &modes
            ),
            b"\x1b[34;1;1M"
        );
    }

    #[test]
    fn modifiers_fold_into_button_code() {
        let mut modes = tracking();
        modes.sgr_mouse = true;
        assert_eq!(
            encode_mouse(
                MouseButton::Left,
                MouseAction::Press,
                0,
                0,
                KeyModifiers::CTRL | KeyModifiers::SHIFT,
                &modes
            ),
            b"\x1b[<20;1;1M"
        );
    }

    #[test]
    fn wheel_buttons_use_64_base() {
        let mut modes = tracking();
        modes.sgr_mouse = true;
        assert_eq!(
            encode_mouse(
                MouseButton::WheelUp,
                MouseAction::Press,
                0,
                0,
                KeyModifiers::empty(),
                &modes
            ),
            b"\x1b[<64;1;1M"
        );
    }

    #[test]
    fn motion_requires_motion_mode() {
        let mut modes = tracking();
        assert!(encode_mouse(
            MouseButton::Left,
            MouseAction::Motion,
            1,
            1,
            KeyModifiers::empty(),
            &modes
        )
        .is_empty());

        modes.mouse_motion = true;
        modes.sgr_mouse = true;
        assert_eq!(
            encode_mouse(
                MouseButton::Left,
                MouseAction::Motion,
                1,
                1,
                KeyModifiers::empty(),
                &modes
            ),
            b"\x1b[<32;2;2M"
        );
        // motion with no button held still needs all-motion mode
        assert!(encode_mouse(
            MouseButton::None,
            MouseAction::Motion,
            1,
            1,
            KeyModifiers::empty(),
            &modes
        )
        .is_empty());
    }

    #[test]
    fn x10_mode_omits_release_and_modifiers() {
        let modes = TerminalModes {
            mouse_x10: true,
            ..TerminalModes::default()
        };
        assert!(encode_mouse(
            MouseButton::Left,
            MouseAction::Release,
            0,
            0,
            KeyModifiers::empty(),
            &modes
        )
        .is_empty());
        let bytes = encode_mouse(
            MouseButton::Left,
            MouseAction::Press,
            0,
            0,
            KeyModifiers::CTRL,
            &modes,
        );
        assert_eq!(bytes, vec![0x1b, b'[', b'M', 32, 33, 33]);
    }

    #[test]
    fn utf8_coords_expand_past_95() {
        let mut modes = tracking();
        modes.utf8_mouse = true;
        let bytes = encode_mouse(
            MouseButton::Left,
            MouseAction::Press,
            200,
            0,
            KeyModifiers::empty(),
            &modes,
        );
        // 32 + 201 = 233 → two UTF-8 bytes
        assert_eq!(&bytes[..4], &[0x1b, b'[', b'M', 32]);
        assert_eq!(bytes.len(), 4 + 2 + 1);
    }
}
