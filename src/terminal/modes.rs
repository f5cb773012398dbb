/// Terminal mode flags tracking the DEC private and ANSI modes shared across
/// both screen buffers. The scroll region and cursor are per-buffer and live
/// in `Buffer`.
#[derive(Debug, Clone)]
pub struct TerminalModes {
    /// DECCKM (?1): cursor key mode (application vs normal)
    pub cursor_keys_application: bool,
    /// DECOM (?6): origin mode
    pub origin: bool,
    /// DECAWM (?7): auto-wrap mode
    pub autowrap: bool,
    /// DECARM (?8): auto-repeat keys
    pub auto_repeat: bool,
    /// DECTCEM (?25): text cursor visible
    pub cursor_visible: bool,
    /// DECNKM (?66) / ESC = and ESC >: application keypad
    pub application_keypad: bool,
    /// DECBKM (?67): backarrow key sends BS instead of DEL
    pub backarrow_sends_bs: bool,
    /// X10 mouse reporting (?9): button press only
    pub mouse_x10: bool,
    /// Normal mouse tracking (?1000): press and release
    pub mouse_click: bool,
    /// Button-event mouse tracking (?1002): motion while a button is held
    pub mouse_motion: bool,
    /// Any-event mouse tracking (?1003)
    pub mouse_all_motion: bool,
    /// Focus in/out reporting (?1004)
    pub focus_events: bool,
    /// UTF-8 mouse coordinate encoding (?1005)
    pub utf8_mouse: bool,
    /// SGR mouse reporting (?1006)
    pub sgr_mouse: bool,
    /// URXVT mouse reporting (?1015)
    pub urxvt_mouse: bool,
    /// SGR-pixel mouse reporting (?1016); encoded like SGR here
    pub sgr_pixel_mouse: bool,
    /// Bracketed paste mode (?2004)
    pub bracketed_paste: bool,
    /// Alternate screen active (?47 / ?1047 / ?1049)
    pub alt_screen: bool,
    /// Insert mode (IRM, ANSI 4)
    pub insert: bool,
    /// Line feed / new line mode (LNM, ANSI 20)
    pub linefeed_newline: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            cursor_keys_application: false,
            origin: false,
            autowrap: true,
            auto_repeat: true,
            cursor_visible: true,
            application_keypad: false,
            backarrow_sends_bs: false,
            mouse_x10: false,
            mouse_click: false,
            mouse_motion: false,
            mouse_all_motion: false,
            focus_events: false,
            utf8_mouse: false,
            sgr_mouse: false,
            urxvt_mouse: false,
            sgr_pixel_mouse: false,
            bracketed_paste: false,
            alt_screen: false,
            insert: false,
            linefeed_newline: false,
        }
    }
}

impl TerminalModes {
    /// Whether any mouse reporting mode is active.
    pub fn mouse_reporting(&self) -> bool {
        self.mouse_x10 || self.mouse_click || self.mouse_motion || self.mouse_all_motion
    }
}
