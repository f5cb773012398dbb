use std::mem;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use unicode_width::UnicodeWidthChar;

use super::attr::{AttrFlags, UnderlineStyle};
use super::buffer::Buffer;
use super::charset::{Charset, CharsetIndex, CharsetState};
use super::color::{indexed_to_rgb, Color};
use super::cursor::{Cursor, CursorStyle};
use super::modes::TerminalModes;
use crate::config::TerminalOptions;
use crate::event::{
    ActiveBuffer, ClipboardEvent, CursorStyleChange, PaletteChange, TerminalEvents,
    WindowInfoKind, WindowInfoReply, WindowInfoRequest, WindowOp,
};
use crate::input::{encode_key, encode_mouse, KeyCode, KeyModifiers, MouseAction, MouseButton};
use crate::parser::{Params, Parser, Perform, PARAM_OMITTED};

/// Colors reported for OSC 10/11/12 queries.
const DEFAULT_FOREGROUND: (u8, u8, u8) = (0xd4, 0xd4, 0xd4);
const DEFAULT_BACKGROUND: (u8, u8, u8) = (0x0e, 0x0e, 0x0e);
const DEFAULT_CURSOR_COLOR: (u8, u8, u8) = (0xd4, 0xd4, 0xd4);

/// Cap DCS data at 16 MB to prevent unbounded growth from malformed streams.
const MAX_DCS_DATA: usize = 16 * 1024 * 1024;

/// Upper bound on CSI REP repetition.
const REP_MAX: i32 = 2048;

/// A headless terminal: feeds bytes through the parser, interprets the
/// dispatches against the active screen buffer, and surfaces everything a
/// renderer or host needs through typed event sinks.
pub struct Terminal {
    parser: Parser,
    normal: Buffer,
    alt: Buffer,
    active: ActiveBuffer,
    modes: TerminalModes,
    charsets: CharsetState,
    tab_stops: Vec<bool>,
    title: String,
    icon_name: String,
    cursor_style: CursorStyle,
    cursor_blink: bool,
    options: TerminalOptions,
    events: TerminalEvents,
    /// Device replies queued during a chunk; flushed to `data_out` after the
    /// chunk completes.
    pending_responses: Vec<Vec<u8>>,
    dcs_buffer: Vec<u8>,
    dcs_intermediates: Vec<u8>,
    dcs_action: Option<char>,
    /// Active hyperlink URL from OSC 8 (None when no hyperlink is open).
    active_hyperlink: Option<String>,
    /// Last character passed through `print()`, used by CSI REP.
    last_printed_char: Option<char>,
}

impl Terminal {
    pub fn new(options: TerminalOptions) -> Self {
        let options = options.sanitized();
        Self {
            parser: Parser::new(),
            normal: Buffer::new(options.cols, options.rows, options.scrollback),
            alt: Buffer::new(options.cols, options.rows, 0),
            active: ActiveBuffer::Normal,
            modes: TerminalModes::default(),
            charsets: CharsetState::default(),
            tab_stops: build_tab_stops(options.cols, options.tab_stop_width),
            title: String::new(),
            icon_name: String::new(),
            cursor_style: options.cursor_style,
            cursor_blink: options.cursor_blink,
            options,
            events: TerminalEvents::default(),
            pending_responses: Vec::new(),
            dcs_buffer: Vec::new(),
            dcs_intermediates: Vec::new(),
            dcs_action: None,
            active_hyperlink: None,
            last_printed_char: None,
        }
    }

    // ------------------------------------------------------------------
    // Host-facing surface
    // ------------------------------------------------------------------

    pub fn events(&self) -> &TerminalEvents {
        &self.events
    }

    /// Feed a chunk of program output. Partial escape sequences and split
    /// UTF-8 survive chunk boundaries. Queued device replies and the damage
    /// span are flushed once the whole chunk has been interpreted.
    pub fn write(&mut self, bytes: &[u8]) {
        let mut parser = mem::take(&mut self.parser);
        for &byte in bytes {
            parser.advance(self, byte);
        }
        self.parser = parser;
        self.flush_effects();
    }

    /// Resize the grid. A zero dimension is rejected as a no-op.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.resize_grid(cols, rows) {
            self.flush_effects();
        }
    }

    fn resize_grid(&mut self, cols: u16, rows: u16) -> bool {
        if cols == 0 || rows == 0 {
            return false;
        }
        if cols == self.cols() && rows == self.rows() {
            return false;
        }
        self.normal.resize(cols, rows);
        self.alt.resize(cols, rows);
        self.tab_stops = build_tab_stops(cols, self.options.tab_stop_width);
        self.events.resized.fire(&(cols, rows));
        true
    }

    /// Encode a key press for the current modes; non-empty sequences surface
    /// on `data_out` before this returns.
    pub fn generate_key_input(&mut self, key: KeyCode, mods: KeyModifiers) -> Vec<u8> {
        let bytes = encode_key(key, mods, &self.modes);
        if !bytes.is_empty() {
            self.events.data_out.fire(&bytes);
        }
        bytes
    }

    /// Encode a mouse event for the active tracking/encoding modes;
    /// non-empty sequences surface on `data_out` before this returns.
    pub fn generate_mouse_input(
        &mut self,
        button: MouseButton,
        action: MouseAction,
        x: u16,
        y: u16,
        mods: KeyModifiers,
    ) -> Vec<u8> {
        let bytes = encode_mouse(button, action, x, y, mods, &self.modes);
        if !bytes.is_empty() {
            self.events.data_out.fire(&bytes);
        }
        bytes
    }

    pub fn switch_to_alt_buffer(&mut self) {
        self.enter_alt_buffer(false);
        self.flush_effects();
    }

    pub fn switch_to_normal_buffer(&mut self) {
        self.exit_alt_buffer(false);
        self.flush_effects();
    }

    /// Hard reset (RIS): buffers, scrollback, modes, charsets, tab stops and
    /// cursor all return to their initial state. The grid size is kept.
    pub fn reset(&mut self) {
        let cols = self.cols();
        let rows = self.rows();
        let was_alt = self.active == ActiveBuffer::Alternate;

        self.parser.reset();
        self.normal = Buffer::new(cols, rows, self.options.scrollback);
        self.alt = Buffer::new(cols, rows, 0);
        self.active = ActiveBuffer::Normal;
        self.modes = TerminalModes::default();
        self.charsets = CharsetState::default();
        self.tab_stops = build_tab_stops(cols, self.options.tab_stop_width);
        self.title.clear();
        self.icon_name.clear();
        self.cursor_style = self.options.cursor_style;
        self.cursor_blink = self.options.cursor_blink;
        self.pending_responses.clear();
        self.dcs_buffer.clear();
        self.dcs_intermediates.clear();
        self.dcs_action = None;
        self.active_hyperlink = None;
        self.last_printed_char = None;

        if was_alt {
            self.events.buffer_changed.fire(&ActiveBuffer::Normal);
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.active_buffer_mut().scroll_to_top();
        self.flush_effects();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.active_buffer_mut().scroll_to_bottom();
        self.flush_effects();
    }

    pub fn scroll_to_line(&mut self, line: usize) {
        self.active_buffer_mut().scroll_to_line(line);
        self.flush_effects();
    }

    /// Scroll the viewport by a delta; positive moves toward the live area.
    pub fn scroll_lines(&mut self, delta: i64) {
        self.active_buffer_mut().scroll_viewport(delta);
        self.flush_effects();
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    pub fn active_buffer(&self) -> &Buffer {
        match self.active {
            ActiveBuffer::Normal => &self.normal,
            ActiveBuffer::Alternate => &self.alt,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.normal
    }

    pub fn alt_buffer(&self) -> &Buffer {
        &self.alt
    }

    pub fn active_buffer_kind(&self) -> ActiveBuffer {
        self.active
    }

    pub fn cols(&self) -> u16 {
        self.normal.cols()
    }

    pub fn rows(&self) -> u16 {
        self.normal.rows()
    }

    pub fn cursor(&self) -> Cursor {
        self.active_buffer().cursor()
    }

    pub fn cursor_visible(&self) -> bool {
        self.modes.cursor_visible
    }

    pub fn cursor_style(&self) -> (CursorStyle, bool) {
        (self.cursor_style, self.cursor_blink)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon_name(&self) -> &str {
        &self.icon_name
    }

    pub fn modes(&self) -> &TerminalModes {
        &self.modes
    }

    /// Count of malformed or aborted escape sequences seen so far.
    pub fn parse_error_count(&self) -> u64 {
        self.parser.error_count()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn active_buffer_mut(&mut self) -> &mut Buffer {
        match self.active {
            ActiveBuffer::Normal => &mut self.normal,
            ActiveBuffer::Alternate => &mut self.alt,
        }
    }

    fn flush_effects(&mut self) {
        let responses = mem::take(&mut self.pending_responses);
        for response in responses {
            self.events.data_out.fire(&response);
        }
        if let Some(damage) = self.active_buffer_mut().take_damage() {
            self.events.damage.fire(&damage);
        }
    }

    fn respond(&mut self, bytes: Vec<u8>) {
        self.pending_responses.push(bytes);
    }

    fn linefeed(&mut self) {
        self.active_buffer_mut().line_feed();
        self.events.line_fed.fire(&());
    }

    fn save_cursor(&mut self) {
        let charsets = self.charsets;
        let origin = self.modes.origin;
        self.active_buffer_mut().save_cursor(charsets, origin);
    }

    fn restore_cursor(&mut self) {
        let saved = self.active_buffer_mut().restore_cursor();
        self.charsets = saved.charsets;
        self.modes.origin = saved.origin_mode;
    }

    fn enter_alt_buffer(&mut self, clear: bool) {
        if self.active == ActiveBuffer::Alternate {
            return;
        }
        self.active = ActiveBuffer::Alternate;
        self.modes.alt_screen = true;
        if clear {
            self.alt.clear_screen();
        } else {
            self.alt.damage_all();
        }
        self.events.buffer_changed.fire(&ActiveBuffer::Alternate);
    }

    fn exit_alt_buffer(&mut self, clear_alt: bool) {
        if self.active == ActiveBuffer::Normal {
            return;
        }
        if clear_alt {
            self.alt.clear_screen();
        }
        self.active = ActiveBuffer::Normal;
        self.modes.alt_screen = false;
        self.normal.damage_all();
        self.events.buffer_changed.fire(&ActiveBuffer::Normal);
    }

    // ------------------------------------------------------------------
    // Tab stops
    // ------------------------------------------------------------------

    fn tab_forward(&mut self, n: u16) {
        let cols = self.cols();
        let mut x = self.active_buffer().cursor().x.min(cols.saturating_sub(1));
        for _ in 0..n.max(1) {
            let mut next = cols.saturating_sub(1);
            for col in (x + 1)..cols {
                if self.tab_stops.get(col as usize).copied().unwrap_or(false) {
                    next = col;
                    break;
                }
            }
            x = next;
        }
        self.active_buffer_mut().cursor_to_col(x);
    }

    fn tab_backward(&mut self, n: u16) {
        let cols = self.cols();
        let mut x = self.active_buffer().cursor().x.min(cols.saturating_sub(1));
        for _ in 0..n.max(1) {
            let mut prev = 0;
            for col in (0..x).rev() {
                if self.tab_stops.get(col as usize).copied().unwrap_or(false) {
                    prev = col;
                    break;
                }
            }
            x = prev;
        }
        self.active_buffer_mut().cursor_to_col(x);
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    fn set_dec_mode(&mut self, groups: &[&[i32]], enable: bool) {
        for group in groups {
            let mode = group[0];
            if mode <= 0 {
                continue;
            }
            match mode {
                1 => self.modes.cursor_keys_application = enable,
                2 => {} // DECANM; VT52 mode is not emulated
                3 => self.set_deccolm(enable),
                6 => {
                    self.modes.origin = enable;
                    // DECOM toggle homes the cursor
                    let home_row = if enable {
                        self.active_buffer().scroll_top()
                    } else {
                        0
                    };
                    self.active_buffer_mut().cup(home_row, 0, false);
                }
                7 => self.modes.autowrap = enable,
                8 => self.modes.auto_repeat = enable,
                12 => {
                    self.cursor_blink = enable;
                    self.fire_cursor_style();
                }
                25 => self.modes.cursor_visible = enable,
                66 => self.modes.application_keypad = enable,
                67 => self.modes.backarrow_sends_bs = enable,
                9 => self.modes.mouse_x10 = enable,
                1000 | 1001 => self.modes.mouse_click = enable,
                1002 => self.modes.mouse_motion = enable,
                1003 => self.modes.mouse_all_motion = enable,
                1004 => self.modes.focus_events = enable,
                1005 => self.modes.utf8_mouse = enable,
                1006 => self.modes.sgr_mouse = enable,
                1015 => self.modes.urxvt_mouse = enable,
                1016 => self.modes.sgr_pixel_mouse = enable,
                47 => {
                    if enable {
                        self.enter_alt_buffer(false);
                    } else {
                        self.exit_alt_buffer(false);
                    }
                }
                1047 => {
                    if enable {
                        self.enter_alt_buffer(false);
                    } else {
                        // the alternate buffer is cleared before switching back
                        self.exit_alt_buffer(true);
                    }
                }
                1048 => {
                    if enable {
                        self.save_cursor();
                    } else {
                        self.restore_cursor();
                    }
                }
                1049 => {
                    if enable {
                        if self.active == ActiveBuffer::Normal {
                            self.save_cursor();
                            self.enter_alt_buffer(true);
                        }
                    } else if self.active == ActiveBuffer::Alternate {
                        self.exit_alt_buffer(false);
                        self.restore_cursor();
                    }
                }
                2004 => self.modes.bracketed_paste = enable,
                _ => tracing::trace!(mode, enable, "ignoring unknown DEC private mode"),
            }
        }
    }

    fn set_ansi_mode(&mut self, groups: &[&[i32]], enable: bool) {
        for group in groups {
            match group[0] {
                4 => self.modes.insert = enable,
                20 => self.modes.linefeed_newline = enable,
                mode => tracing::trace!(mode, enable, "ignoring unknown ANSI mode"),
            }
        }
    }

    /// DECCOLM switches between 80 and 132 columns, clearing the screen and
    /// resetting the scroll region.
    fn set_deccolm(&mut self, enable: bool) {
        let cols = if enable { 132 } else { 80 };
        let rows = self.rows();
        self.resize_grid(cols, rows);
        let origin = self.modes.origin;
        let buffer = self.active_buffer_mut();
        buffer.erase_in_display(2);
        buffer.set_scroll_region(1, 0, origin);
    }

    fn dec_mode_state(&self, mode: i32) -> Option<bool> {
        match mode {
            1 => Some(self.modes.cursor_keys_application),
            6 => Some(self.modes.origin),
            7 => Some(self.modes.autowrap),
            8 => Some(self.modes.auto_repeat),
            12 => Some(self.cursor_blink),
            25 => Some(self.modes.cursor_visible),
            66 => Some(self.modes.application_keypad),
            67 => Some(self.modes.backarrow_sends_bs),
            9 => Some(self.modes.mouse_x10),
            1000 | 1001 => Some(self.modes.mouse_click),
            1002 => Some(self.modes.mouse_motion),
            1003 => Some(self.modes.mouse_all_motion),
            1004 => Some(self.modes.focus_events),
            1005 => Some(self.modes.utf8_mouse),
            1006 => Some(self.modes.sgr_mouse),
            1015 => Some(self.modes.urxvt_mouse),
            1016 => Some(self.modes.sgr_pixel_mouse),
            47 | 1047 | 1049 => Some(self.active == ActiveBuffer::Alternate),
            2004 => Some(self.modes.bracketed_paste),
            _ => None,
        }
    }

    fn ansi_mode_state(&self, mode: i32) -> Option<bool> {
        match mode {
            4 => Some(self.modes.insert),
            20 => Some(self.modes.linefeed_newline),
            _ => None,
        }
    }

    /// DECRQM / RQM: report a mode as set (1), reset (2), or unrecognized (0).
    fn report_modes(&mut self, groups: &[&[i32]], dec_private: bool) {
        let prefix = if dec_private { "?" } else { "" };
        for group in groups {
            let mode = group[0].max(0);
            let state = if dec_private {
                self.dec_mode_state(mode)
            } else {
                self.ansi_mode_state(mode)
            };
            let pm = match state {
                Some(true) => 1,
                Some(false) => 2,
                None => 0,
            };
            self.respond(format!("\x1b[{}{};{}$y", prefix, mode, pm).into_bytes());
        }
    }

    fn fire_cursor_style(&self) {
        self.events.cursor_style_changed.fire(&CursorStyleChange {
            style: self.cursor_style,
            blink: self.cursor_blink,
        });
    }

    // ------------------------------------------------------------------
    // SGR
    // ------------------------------------------------------------------

    fn handle_sgr(&mut self, params: &Params) {
        let mut pen = self.active_buffer().pen();

        if params.is_empty() {
            pen.reset();
            *self.active_buffer_mut().pen_mut() = pen;
            return;
        }

        let groups: Vec<&[i32]> = params.iter().collect();
        let mut i = 0;
        while i < groups.len() {
            let group = groups[i];
            let code = if group[0] == PARAM_OMITTED { 0 } else { group[0] };
            match code {
                0 => pen.reset(),
                1 => pen.flags.insert(AttrFlags::BOLD),
                2 => pen.flags.insert(AttrFlags::DIM),
                3 => pen.flags.insert(AttrFlags::ITALIC),
                4 => {
                    let style = match group.get(1).copied() {
                        Some(0) => UnderlineStyle::None,
                        Some(2) => UnderlineStyle::Double,
                        Some(3) => UnderlineStyle::Curly,
                        Some(4) => UnderlineStyle::Dotted,
                        Some(5) => UnderlineStyle::Dashed,
                        _ => UnderlineStyle::Single,
                    };
                    pen.set_underline(style);
                }
                5 | 6 => pen.flags.insert(AttrFlags::BLINK),
                7 => pen.flags.insert(AttrFlags::INVERSE),
                8 => pen.flags.insert(AttrFlags::HIDDEN),
                9 => pen.flags.insert(AttrFlags::STRIKETHROUGH),
                21 => pen.set_underline(UnderlineStyle::Double),
                22 => pen
                    .flags
                    .remove(AttrFlags::BOLD | AttrFlags::DIM),
                23 => pen.flags.remove(AttrFlags::ITALIC),
                24 => pen.set_underline(UnderlineStyle::None),
                25 => pen.flags.remove(AttrFlags::BLINK),
                27 => pen.flags.remove(AttrFlags::INVERSE),
                28 => pen.flags.remove(AttrFlags::HIDDEN),
                29 => pen.flags.remove(AttrFlags::STRIKETHROUGH),
                30..=37 => pen.fg = Color::Indexed((code - 30) as u8),
                38 => {
                    let (color, consumed) = parse_extended_color(&groups, i);
                    if let Some(color) = color {
                        pen.fg = color;
                    }
                    i += consumed;
                }
                39 => pen.fg = Color::Default,
                40..=47 => pen.bg = Color::Indexed((code - 40) as u8),
                48 => {
                    let (color, consumed) = parse_extended_color(&groups, i);
                    if let Some(color) = color {
                        pen.bg = color;
                    }
                    i += consumed;
                }
                49 => pen.bg = Color::Default,
                53 => pen.flags.insert(AttrFlags::OVERLINE),
                55 => pen.flags.remove(AttrFlags::OVERLINE),
                // underline color; parsed for its shape, not stored
                58 => {
                    let (_, consumed) = parse_extended_color(&groups, i);
                    i += consumed;
                }
                59 => {}
                90..=97 => pen.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => pen.bg = Color::Indexed((code - 100 + 8) as u8),
                _ => tracing::trace!(code, "ignoring unknown SGR code"),
            }
            i += 1;
        }

        *self.active_buffer_mut().pen_mut() = pen;
    }

    // ------------------------------------------------------------------
    // OSC
    // ------------------------------------------------------------------

    fn handle_osc(&mut self, payload: &[u8]) {
        let payload = String::from_utf8_lossy(payload).into_owned();
        let (code, rest) = match payload.split_once(';') {
            Some((code, rest)) => (code, rest),
            None => (payload.as_str(), ""),
        };

        match code {
            "0" => {
                self.title = rest.to_string();
                self.icon_name = rest.to_string();
                self.events.title_changed.fire(&self.title);
            }
            "1" => {
                self.icon_name = rest.to_string();
                self.events.title_changed.fire(&self.icon_name);
            }
            "2" => {
                self.title = rest.to_string();
                self.events.title_changed.fire(&self.title);
            }
            "4" => self.handle_osc_palette(rest),
            "7" => {
                let cwd = if let Some(path) = rest.strip_prefix("file://") {
                    // drop the host part of the file URI
                    match path.find('/') {
                        Some(slash) => path[slash..].to_string(),
                        None => return,
                    }
                } else {
                    rest.to_string()
                };
                self.events.cwd_changed.fire(&cwd);
            }
            "8" => {
                // OSC 8 ; params ; uri — empty uri closes the hyperlink
                let uri = rest.split_once(';').map(|(_, uri)| uri).unwrap_or("");
                self.active_hyperlink = if uri.is_empty() {
                    None
                } else {
                    Some(uri.to_string())
                };
                self.events.hyperlink.fire(&self.active_hyperlink);
            }
            "10" | "11" | "12" => {
                if rest == "?" {
                    let (r, g, b) = match code {
                        "10" => DEFAULT_FOREGROUND,
                        "11" => DEFAULT_BACKGROUND,
                        _ => DEFAULT_CURSOR_COLOR,
                    };
                    self.respond(osc_color_reply(code, r, g, b));
                }
            }
            "52" => self.handle_osc_clipboard(rest),
            "104" => {
                if rest.is_empty() {
                    self.events
                        .palette_changed
                        .fire(&PaletteChange::Reset { index: None });
                } else {
                    for index in rest.split(';').filter_map(|s| s.parse::<u8>().ok()) {
                        self.events
                            .palette_changed
                            .fire(&PaletteChange::Reset { index: Some(index) });
                    }
                }
            }
            "110" => self
                .events
                .palette_changed
                .fire(&PaletteChange::ResetDefaultForeground),
            "111" => self
                .events
                .palette_changed
                .fire(&PaletteChange::ResetDefaultBackground),
            "112" => self
                .events
                .palette_changed
                .fire(&PaletteChange::ResetCursorColor),
            _ => tracing::trace!(code, "ignoring unknown OSC"),
        }
    }

    /// OSC 4: `index;spec` pairs. A `?` spec queries the entry; anything
    /// else is announced as an advisory palette change.
    fn handle_osc_palette(&mut self, rest: &str) {
        let parts: Vec<&str> = rest.split(';').collect();
        for pair in parts.chunks(2) {
            let [index, spec] = pair else { continue };
            let Ok(index) = index.parse::<u8>() else {
                continue;
            };
            if *spec == "?" {
                let (r, g, b) = indexed_to_rgb(index);
                let reply = format!(
                    "\x1b]4;{};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
                    index,
                    r as u16 * 0x0101,
                    g as u16 * 0x0101,
                    b as u16 * 0x0101
                );
                self.respond(reply.into_bytes());
            } else {
                self.events.palette_changed.fire(&PaletteChange::Set {
                    index,
                    spec: spec.to_string(),
                });
            }
        }
    }

    /// OSC 52: `selection;payload` with a base64 payload, `?` for a query,
    /// or empty to clear.
    fn handle_osc_clipboard(&mut self, rest: &str) {
        let (selection, payload) = match rest.split_once(';') {
            Some((selection, payload)) => (selection, payload),
            None => return,
        };
        let selection = if selection.is_empty() { "c" } else { selection }.to_string();

        let event = if payload == "?" {
            ClipboardEvent::Query { selection }
        } else if payload.is_empty() {
            ClipboardEvent::Clear { selection }
        } else {
            match BASE64_STANDARD.decode(payload.as_bytes()) {
                Ok(decoded) => ClipboardEvent::Set {
                    selection,
                    text: String::from_utf8_lossy(&decoded).into_owned(),
                },
                Err(_) => return,
            }
        };
        self.events.clipboard.fire(&event);
    }

    // ------------------------------------------------------------------
    // DCS
    // ------------------------------------------------------------------

    fn handle_dcs(&mut self, action: Option<char>, intermediates: &[u8], data: &[u8]) {
        match (action, intermediates) {
            // XTGETTCAP: DCS + q Pt ST
            (Some('q'), [b'+']) => self.handle_xtgettcap(data),
            // DECRQSS: DCS $ q Pt ST
            (Some('q'), [b'$']) => self.handle_decrqss(data),
            _ => tracing::trace!(?action, "ignoring unknown DCS"),
        }
    }

    fn handle_xtgettcap(&mut self, data: &[u8]) {
        let raw = String::from_utf8_lossy(data);
        let mut pairs: Vec<String> = Vec::new();
        for item in raw.split(';') {
            if item.is_empty() {
                continue;
            }
            let Some(name) = decode_hex_ascii(item) else {
                self.respond(b"\x1bP0+r\x1b\\".to_vec());
                return;
            };
            let Some(value) = self.tcap_capability_value(&name) else {
                self.respond(b"\x1bP0+r\x1b\\".to_vec());
                return;
            };
            pairs.push(format!(
                "{}={}",
                encode_hex_ascii(&name),
                encode_hex_ascii(&value)
            ));
        }

        if pairs.is_empty() {
            self.respond(b"\x1bP0+r\x1b\\".to_vec());
            return;
        }
        self.respond(format!("\x1bP1+r{}\x1b\\", pairs.join(";")).into_bytes());
    }

    /// Capability set needed by multiplexers and modern TUIs.
    fn tcap_capability_value(&self, name: &str) -> Option<String> {
        match name {
            "TN" | "name" => Some(self.options.term_name.clone()),
            "Co" | "colors" => Some("256".to_string()),
            "RGB" | "Tc" => Some("8".to_string()),
            // OSC 52 clipboard capability (terminfo "Ms")
            "Ms" => Some("\x1b]52;%p1%s;%p2%s\x07".to_string()),
            // Cursor style: DECSCUSR set and reset
            "Ss" => Some("\x1b[%p1%d q".to_string()),
            "Se" => Some("\x1b[2 q".to_string()),
            _ => None,
        }
    }

    /// DECRQSS: report the settable status strings modern tools query.
    fn handle_decrqss(&mut self, data: &[u8]) {
        let query = String::from_utf8_lossy(data);
        let status = match query.as_ref() {
            "m" => Some("0m".to_string()),
            " q" => {
                let style = match (self.cursor_style, self.cursor_blink) {
                    (CursorStyle::Block, true) => 1,
                    (CursorStyle::Block, false) => 2,
                    (CursorStyle::Underline, true) => 3,
                    (CursorStyle::Underline, false) => 4,
                    (CursorStyle::Bar, true) => 5,
                    (CursorStyle::Bar, false) => 6,
                };
                Some(format!("{} q", style))
            }
            "r" => {
                let buffer = self.active_buffer();
                Some(format!(
                    "{};{}r",
                    buffer.scroll_top() + 1,
                    buffer.scroll_bottom() + 1
                ))
            }
            _ => None,
        };

        match status {
            Some(pt) => self.respond(format!("\x1bP1$r{}\x1b\\", pt).into_bytes()),
            None => self.respond(b"\x1bP0$r\x1b\\".to_vec()),
        }
    }

    // ------------------------------------------------------------------
    // Window manipulation (CSI t)
    // ------------------------------------------------------------------

    fn window_command(&mut self, groups: &[&[i32]]) {
        let op = raw_arg(groups, 0).unwrap_or(0);
        match op {
            1 => self.events.window_op.fire(&WindowOp::Restored),
            2 => self.events.window_op.fire(&WindowOp::Minimized),
            3 => {
                let x = raw_arg(groups, 1).unwrap_or(0);
                let y = raw_arg(groups, 2).unwrap_or(0);
                self.events.window_op.fire(&WindowOp::Moved { x, y });
            }
            4 => {
                let height = raw_arg(groups, 1).unwrap_or(0).max(0) as u32;
                let width = raw_arg(groups, 2).unwrap_or(0).max(0) as u32;
                self.events
                    .window_op
                    .fire(&WindowOp::Resized { width, height });
            }
            8 => {
                // resize the text area in character cells
                let rows = arg_u16(groups, 1, self.rows() as i32);
                let cols = arg_u16(groups, 2, self.cols() as i32);
                self.resize_grid(cols, rows);
            }
            9 => match raw_arg(groups, 1).unwrap_or(0) {
                1 => self.events.window_op.fire(&WindowOp::Maximized),
                0 => self.events.window_op.fire(&WindowOp::Restored),
                _ => {}
            },
            11 => {
                let minimized = match self.window_info(WindowInfoKind::State) {
                    Some(WindowInfoReply::State { minimized }) => minimized,
                    _ => false,
                };
                let reply: &[u8] = if minimized { b"\x1b[2t" } else { b"\x1b[1t" };
                self.respond(reply.to_vec());
            }
            13 => {
                let (x, y) = match self.window_info(WindowInfoKind::Position) {
                    Some(WindowInfoReply::Position { x, y }) => (x, y),
                    _ => (0, 0),
                };
                self.respond(format!("\x1b[3;{};{}t", x, y).into_bytes());
            }
            14 => {
                let (width, height) = match self.window_info(WindowInfoKind::SizePixels) {
                    Some(WindowInfoReply::SizePixels { width, height }) => (width, height),
                    _ => (0, 0),
                };
                self.respond(format!("\x1b[4;{};{}t", height, width).into_bytes());
            }
            18 => {
                let reply = format!("\x1b[8;{};{}t", self.rows(), self.cols());
                self.respond(reply.into_bytes());
            }
            19 => {
                let reply = format!("\x1b[9;{};{}t", self.rows(), self.cols());
                self.respond(reply.into_bytes());
            }
            20 => {
                let label = match self.window_info(WindowInfoKind::IconLabel) {
                    Some(WindowInfoReply::Text(text)) => text,
                    _ => self.icon_name.clone(),
                };
                self.respond(format!("\x1b]L{}\x1b\\", label).into_bytes());
            }
            21 => {
                let title = match self.window_info(WindowInfoKind::Title) {
                    Some(WindowInfoReply::Text(text)) => text,
                    _ => self.title.clone(),
                };
                self.respond(format!("\x1b]l{}\x1b\\", title).into_bytes());
            }
            _ => tracing::trace!(op, "ignoring unknown window op"),
        }
    }

    /// Ask the host for window information; subscribers answer in place.
    fn window_info(&self, kind: WindowInfoKind) -> Option<WindowInfoReply> {
        let request = WindowInfoRequest::new(kind);
        self.events.window_info_requested.fire(&request);
        request.take_reply()
    }

    /// DECSCUSR: cursor style and blink from the `Ps SP q` parameter.
    fn set_cursor_style(&mut self, param: i32) {
        let (style, blink) = match param {
            0 | 1 => (CursorStyle::Block, true),
            2 => (CursorStyle::Block, false),
            3 => (CursorStyle::Underline, true),
            4 => (CursorStyle::Underline, false),
            5 => (CursorStyle::Bar, true),
            6 => (CursorStyle::Bar, false),
            _ => return,
        };
        self.cursor_style = style;
        self.cursor_blink = blink;
        self.fire_cursor_style();
    }

    /// CSI REP: repeat the last printed character.
    fn repeat_last_char(&mut self, n: i32) {
        let Some(c) = self.last_printed_char else {
            return;
        };
        for _ in 0..n.clamp(1, REP_MAX) {
            self.print(c);
        }
    }

    /// DSR 6 (CPR): cursor position, origin-relative while DECOM is set.
    fn report_cursor_position(&mut self) {
        let buffer = self.active_buffer();
        let cursor = buffer.cursor();
        let row = if self.modes.origin {
            cursor.y.saturating_sub(buffer.scroll_top()) + 1
        } else {
            cursor.y + 1
        };
        let col = cursor.x.min(buffer.cols().saturating_sub(1)) + 1;
        self.respond(format!("\x1b[{};{}R", row, col).into_bytes());
    }
}

impl Perform for Terminal {
    fn print(&mut self, c: char) {
        let c = self.charsets.map(c);
        let width = UnicodeWidthChar::width(c).unwrap_or(1);
        if width == 0 {
            self.active_buffer_mut().combine(c);
            return;
        }
        self.last_printed_char = Some(c);
        let autowrap = self.modes.autowrap;
        let insert = self.modes.insert;
        let fed = self
            .active_buffer_mut()
            .put_char(c, width.min(2) as u8, autowrap, insert);
        if fed {
            self.events.line_fed.fire(&());
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.events.bell.fire(&()),
            0x08 => self.active_buffer_mut().cursor_back(1),
            0x09 => self.tab_forward(1),
            0x0A | 0x0B | 0x0C => {
                self.linefeed();
                if self.options.convert_eol || self.modes.linefeed_newline {
                    self.active_buffer_mut().carriage_return();
                }
            }
            0x0D => self.active_buffer_mut().carriage_return(),
            0x0E => self.charsets.shift_out(),
            0x0F => self.charsets.shift_in(),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], action: char) {
        let groups: Vec<&[i32]> = params.iter().collect();
        let private = intermediates.contains(&b'?');
        let has_gt = intermediates.contains(&b'>');
        let has_dollar = intermediates.contains(&b'$');
        let has_space = intermediates.contains(&b' ');

        // DECRQM / ANSI RQM mode reports
        if action == 'p' && has_dollar {
            self.report_modes(&groups, private);
            return;
        }

        // Secondary Device Attributes: CSI > c
        if action == 'c' && has_gt {
            if arg(&groups, 0, 0) == 0 {
                self.respond(b"\x1b[>0;10;0c".to_vec());
            }
            return;
        }

        // DECSCUSR: CSI Ps SP q
        if action == 'q' && has_space {
            self.set_cursor_style(arg(&groups, 0, 0));
            return;
        }

        let origin = self.modes.origin;
        match (action, private) {
            ('@', false) => self.active_buffer_mut().insert_chars(arg_u16(&groups, 0, 1)),
            ('A', false) => self.active_buffer_mut().cursor_up(arg_u16(&groups, 0, 1)),
            ('B', false) => self.active_buffer_mut().cursor_down(arg_u16(&groups, 0, 1)),
            ('C', false) => self.active_buffer_mut().cursor_forward(arg_u16(&groups, 0, 1)),
            ('D', false) => self.active_buffer_mut().cursor_back(arg_u16(&groups, 0, 1)),
            ('E', false) => {
                let n = arg_u16(&groups, 0, 1);
                let buffer = self.active_buffer_mut();
                buffer.cursor_down(n);
                buffer.carriage_return();
            }
            ('F', false) => {
                let n = arg_u16(&groups, 0, 1);
                let buffer = self.active_buffer_mut();
                buffer.cursor_up(n);
                buffer.carriage_return();
            }
            ('G', false) | ('`', false) => {
                let col = arg_u16(&groups, 0, 1).saturating_sub(1);
                self.active_buffer_mut().cursor_to_col(col);
            }
            ('H', false) | ('f', false) => {
                let row = arg_u16(&groups, 0, 1).saturating_sub(1);
                let col = arg_u16(&groups, 1, 1).saturating_sub(1);
                self.active_buffer_mut().cup(row, col, origin);
            }
            ('I', false) => self.tab_forward(arg_u16(&groups, 0, 1)),
            ('Z', false) => self.tab_backward(arg_u16(&groups, 0, 1)),
            ('J', _) => self.active_buffer_mut().erase_in_display(arg_u16(&groups, 0, 0)),
            ('K', _) => self.active_buffer_mut().erase_in_line(arg_u16(&groups, 0, 0)),
            ('L', false) => self.active_buffer_mut().insert_lines(arg_u16(&groups, 0, 1)),
            ('M', false) => self.active_buffer_mut().delete_lines(arg_u16(&groups, 0, 1)),
            ('P', false) => self.active_buffer_mut().delete_chars(arg_u16(&groups, 0, 1)),
            ('S', false) => self.active_buffer_mut().scroll_up(arg_u16(&groups, 0, 1)),
            ('T', false) => self.active_buffer_mut().scroll_down(arg_u16(&groups, 0, 1)),
            ('X', false) => self.active_buffer_mut().erase_chars(arg_u16(&groups, 0, 1)),
            ('b', false) => self.repeat_last_char(arg(&groups, 0, 1)),
            ('c', false) => {
                // Primary Device Attributes: VT100 with advanced video option
                if arg(&groups, 0, 0) == 0 {
                    self.respond(b"\x1b[?1;2c".to_vec());
                }
            }
            ('d', false) => {
                let row = arg_u16(&groups, 0, 1).saturating_sub(1);
                self.active_buffer_mut().cursor_to_row(row, origin);
            }
            ('g', false) => match arg(&groups, 0, 0) {
                0 => {
                    let x = self.active_buffer().cursor().x;
                    if let Some(stop) = self.tab_stops.get_mut(x as usize) {
                        *stop = false;
                    }
                }
                3 => self.tab_stops.iter_mut().for_each(|stop| *stop = false),
                _ => {}
            },
            ('h', true) => self.set_dec_mode(&groups, true),
            ('l', true) => self.set_dec_mode(&groups, false),
            ('h', false) => self.set_ansi_mode(&groups, true),
            ('l', false) => self.set_ansi_mode(&groups, false),
            ('m', false) => self.handle_sgr(params),
            ('n', false) => match arg(&groups, 0, 0) {
                5 => self.respond(b"\x1b[0n".to_vec()),
                6 => self.report_cursor_position(),
                _ => {}
            },
            ('r', false) => {
                let top = arg_u16(&groups, 0, 1);
                let bottom = arg_u16(&groups, 1, 0);
                self.active_buffer_mut().set_scroll_region(top, bottom, origin);
            }
            ('s', false) => self.save_cursor(),
            ('u', false) => self.restore_cursor(),
            ('t', false) => self.window_command(&groups),
            _ => tracing::trace!(action = %action, private, "ignoring unknown CSI"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
        match (byte, intermediates) {
            (b'c', []) => self.reset(),
            (b'D', []) => self.linefeed(),
            (b'E', []) => {
                self.active_buffer_mut().carriage_return();
                self.linefeed();
            }
            (b'H', []) => {
                let x = self.active_buffer().cursor().x;
                if let Some(stop) = self.tab_stops.get_mut(x as usize) {
                    *stop = true;
                }
            }
            (b'M', []) => self.active_buffer_mut().reverse_index(),
            (b'7', []) => self.save_cursor(),
            (b'8', []) => self.restore_cursor(),
            (b'=', []) => self.modes.application_keypad = true,
            (b'>', []) => self.modes.application_keypad = false,
            // String Terminator; the parser already closed the string
            (b'\\', []) => {}
            _ => {
                if let [designator] = intermediates {
                    if let (Some(index), Some(charset)) = (
                        CharsetIndex::from_intermediate(*designator),
                        Charset::from_designator(byte),
                    ) {
                        self.charsets.designate(index, charset);
                        return;
                    }
                }
                tracing::trace!(byte, "ignoring unknown ESC sequence");
            }
        }
    }

    fn osc_dispatch(&mut self, payload: &[u8], _bell_terminated: bool) {
        self.handle_osc(payload);
    }

    fn dcs_hook(&mut self, _params: &Params, intermediates: &[u8], action: char) {
        self.dcs_buffer.clear();
        self.dcs_intermediates.clear();
        self.dcs_intermediates.extend_from_slice(intermediates);
        self.dcs_action = Some(action);
    }

    fn dcs_put(&mut self, byte: u8) {
        if self.dcs_buffer.len() < MAX_DCS_DATA {
            self.dcs_buffer.push(byte);
        }
    }

    fn dcs_unhook(&mut self) {
        let data = mem::take(&mut self.dcs_buffer);
        let intermediates = mem::take(&mut self.dcs_intermediates);
        let action = self.dcs_action.take();
        self.handle_dcs(action, &intermediates, &data);
    }
}

fn build_tab_stops(cols: u16, width: u16) -> Vec<bool> {
    let width = width.max(1) as usize;
    let mut stops = vec![false; cols as usize];
    for col in (0..cols as usize).step_by(width) {
        stops[col] = true;
    }
    stops
}

/// Positive parameter with a default for omitted or zero values.
fn arg(groups: &[&[i32]], idx: usize, default: i32) -> i32 {
    match groups.get(idx) {
        Some(group) if group[0] > 0 => group[0],
        _ => default,
    }
}

fn arg_u16(groups: &[&[i32]], idx: usize, default: i32) -> u16 {
    arg(groups, idx, default).clamp(0, u16::MAX as i32) as u16
}

/// Parameter value preserving explicit zeros; None when absent.
fn raw_arg(groups: &[&[i32]], idx: usize) -> Option<i32> {
    groups.get(idx).map(|group| {
        if group[0] == PARAM_OMITTED {
            0
        } else {
            group[0]
        }
    })
}

/// SGR 38/48/58 extended color, in both sub-parameter (`38:2::r:g:b`,
/// `38:5:n`) and parameter (`38;2;r;g;b`, `38;5;n`) forms. Returns the color
/// and how many extra parameter groups were consumed.
fn parse_extended_color(groups: &[&[i32]], i: usize) -> (Option<Color>, usize) {
    let group = groups[i];
    if group.len() > 1 {
        // colon form: everything lives in this group
        let color = match group[1] {
            2 => {
                // with or without the optional colorspace slot
                let rgb = if group.len() >= 6 {
                    &group[3..6]
                } else if group.len() >= 5 {
                    &group[2..5]
                } else {
                    return (None, 0);
                };
                Some(Color::Rgb(
                    clamp_color(rgb[0]),
                    clamp_color(rgb[1]),
                    clamp_color(rgb[2]),
                ))
            }
            5 => group.get(2).map(|&index| Color::Indexed(clamp_color(index))),
            _ => None,
        };
        return (color, 0);
    }

    // semicolon form: the mode and channels follow as separate groups
    match groups.get(i + 1).map(|g| g[0]) {
        Some(2) => {
            if i + 4 < groups.len() {
                let color = Color::Rgb(
                    clamp_color(groups[i + 2][0]),
                    clamp_color(groups[i + 3][0]),
                    clamp_color(groups[i + 4][0]),
                );
                (Some(color), 4)
            } else {
                (None, groups.len() - i - 1)
            }
        }
        Some(5) => {
            if i + 2 < groups.len() {
                (Some(Color::Indexed(clamp_color(groups[i + 2][0]))), 2)
            } else {
                (None, groups.len() - i - 1)
            }
        }
        _ => (None, 0),
    }
}

fn clamp_color(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

fn osc_color_reply(code: &str, r: u8, g: u8, b: u8) -> Vec<u8> {
    format!(
        "\x1b]{};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
        code,
        r as u16 * 0x0101,
        g as u16 * 0x0101,
        b as u16 * 0x0101
    )
    .into_bytes()
}

fn decode_hex_ascii(input: &str) -> Option<String> {
    if input.len() % 2 != 0 {
        return None;
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(input.len() / 2);
    let mut i = 0;
    while i + 1 < bytes.len() {
        let pair = std::str::from_utf8(&bytes[i..i + 2]).ok()?;
        out.push(u8::from_str_radix(pair, 16).ok()?);
        i += 2;
    }
    String::from_utf8(out).ok()
}

fn encode_hex_ascii(input: &str) -> String {
    input.as_bytes().iter().map(|b| format!("{:02x}", b)).collect()
}
