//! VT500-series escape sequence parser.
//!
//! A byte-driven state machine covering ground, escape, CSI, OSC, DCS and
//! SOS/PM/APC handling. The parser owns no buffer state beyond the sequence
//! being collected, so chunks may split anywhere — including mid-UTF-8 and
//! mid-escape — and dispatch identically to the unsplit stream.

pub mod params;

pub use params::{Params, MAX_PARAMS, PARAM_MAX, PARAM_OMITTED};

/// Upper bound on collected OSC payload bytes; beyond it input is dropped to
/// keep malformed streams from growing the buffer without bound.
const MAX_OSC_RAW: usize = 64 * 1024;

/// Receiver for parser dispatch events. Mirrors the shape of the `vte`
/// callback surface so interpreter code reads the same way.
pub trait Perform {
    /// A decoded printable character.
    fn print(&mut self, c: char);

    /// A C0 control code.
    fn execute(&mut self, byte: u8);

    /// A complete CSI sequence. Private markers (`?`, `>`, ...) appear at the
    /// front of `intermediates`.
    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], action: char);

    /// A complete non-CSI escape sequence (charset designations, DECSC, ...).
    fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8);

    /// A complete OSC string: the raw `number;rest` payload.
    fn osc_dispatch(&mut self, payload: &[u8], bell_terminated: bool);

    /// A DCS sequence opened with the given action byte; data follows via
    /// `dcs_put` until `dcs_unhook`.
    fn dcs_hook(&mut self, params: &Params, intermediates: &[u8], action: char);

    /// One byte of DCS passthrough data.
    fn dcs_put(&mut self, byte: u8);

    /// The DCS string terminated.
    fn dcs_unhook(&mut self);
}

/// Parser states, per the VT500 state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    OscString,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsIgnore,
    DcsPassthrough,
    SosPmApcString,
}

#[derive(Debug, Default)]
pub struct Parser {
    state: State,
    params: Params,
    param: i32,
    param_started: bool,
    /// The parameter being collected is a sub-parameter (followed a `:`).
    param_is_sub: bool,
    /// A parameter slot is syntactically open (digits seen or a separator
    /// consumed), so dispatch must flush it.
    param_pending: bool,
    intermediates: [u8; 2],
    intermediates_len: usize,
    osc: Vec<u8>,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_remaining: usize,
    errors: u64,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of malformed or aborted sequences seen since construction.
    pub fn error_count(&self) -> u64 {
        self.errors
    }

    /// Force the parser back to ground and drop all accumulators.
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_seq();
        self.osc.clear();
        self.utf8_len = 0;
        self.utf8_remaining = 0;
    }

    fn clear_seq(&mut self) {
        self.params.clear();
        self.param = 0;
        self.param_started = false;
        self.param_is_sub = false;
        self.param_pending = false;
        self.intermediates_len = 0;
    }

    fn intermediates(&self) -> &[u8] {
        &self.intermediates[..self.intermediates_len]
    }

    /// Feed one byte, invoking `performer` for any dispatches it completes.
    pub fn advance<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        // CAN, SUB, and ESC act from any state.
        match byte {
            0x18 | 0x1A => {
                self.abort_string(performer);
                if self.state != State::Ground {
                    self.errors += 1;
                }
                self.state = State::Ground;
                self.utf8_remaining = 0;
                self.utf8_len = 0;
                performer.execute(byte);
                return;
            }
            0x1B if self.state != State::Ground || self.utf8_remaining == 0 => {
                self.abort_string(performer);
                if self.utf8_remaining > 0 {
                    self.errors += 1;
                    self.utf8_remaining = 0;
                    self.utf8_len = 0;
                }
                self.clear_seq();
                self.state = State::Escape;
                return;
            }
            _ => {}
        }

        match self.state {
            State::Ground => self.ground(performer, byte),
            State::Escape => self.escape(performer, byte),
            State::EscapeIntermediate => self.escape_intermediate(performer, byte),
            State::CsiEntry => self.csi_entry(performer, byte),
            State::CsiParam => self.csi_param(performer, byte),
            State::CsiIntermediate => self.csi_intermediate(performer, byte),
            State::CsiIgnore => self.csi_ignore(performer, byte),
            State::OscString => self.osc_string(performer, byte),
            State::DcsEntry => self.dcs_entry(performer, byte),
            State::DcsParam => self.dcs_param(performer, byte),
            State::DcsIntermediate => self.dcs_intermediate(performer, byte),
            State::DcsIgnore => self.dcs_ignore(byte),
            State::DcsPassthrough => self.dcs_passthrough(performer, byte),
            State::SosPmApcString => self.sos_pm_apc(byte),
        }
    }

    /// Finalize a string-collecting state that is being exited abnormally.
    fn abort_string<P: Perform>(&mut self, performer: &mut P) {
        match self.state {
            State::OscString => {
                performer.osc_dispatch(&self.osc, false);
                self.osc.clear();
            }
            State::DcsPassthrough => performer.dcs_unhook(),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Ground and UTF-8
    // ------------------------------------------------------------------

    fn ground<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        if self.utf8_remaining > 0 {
            self.utf8_continue(performer, byte);
            return;
        }
        match byte {
            0x00..=0x1F => performer.execute(byte),
            0x20..=0x7E => performer.print(byte as char),
            0x7F => {}
            _ => self.utf8_start(performer, byte),
        }
    }

    fn utf8_start<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        let need = match byte {
            0xC2..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF4 => 3,
            _ => {
                self.errors += 1;
                performer.print(char::REPLACEMENT_CHARACTER);
                return;
            }
        };
        self.utf8[0] = byte;
        self.utf8_len = 1;
        self.utf8_remaining = need;
    }

    fn utf8_continue<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        if !(0x80..=0xBF).contains(&byte) {
            self.errors += 1;
            self.utf8_remaining = 0;
            self.utf8_len = 0;
            performer.print(char::REPLACEMENT_CHARACTER);
            // the interrupting byte is processed on its own
            self.advance(performer, byte);
            return;
        }
        self.utf8[self.utf8_len] = byte;
        self.utf8_len += 1;
        self.utf8_remaining -= 1;
        if self.utf8_remaining == 0 {
            match std::str::from_utf8(&self.utf8[..self.utf8_len]) {
                Ok(s) => {
                    if let Some(c) = s.chars().next() {
                        performer.print(c);
                    }
                }
                Err(_) => {
                    self.errors += 1;
                    performer.print(char::REPLACEMENT_CHARACTER);
                }
            }
            self.utf8_len = 0;
        }
    }

    // ------------------------------------------------------------------
    // Escape
    // ------------------------------------------------------------------

    fn escape<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            0x20..=0x2F => {
                self.collect(byte);
                self.state = State::EscapeIntermediate;
            }
            b'[' => self.state = State::CsiEntry,
            b']' => {
                self.osc.clear();
                self.state = State::OscString;
            }
            b'P' => self.state = State::DcsEntry,
            b'X' | b'^' | b'_' => self.state = State::SosPmApcString,
            0x30..=0x7E => {
                performer.esc_dispatch(self.intermediates(), byte);
                self.state = State::Ground;
            }
            _ => {}
        }
    }

    fn escape_intermediate<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            0x20..=0x2F => self.collect(byte),
            0x30..=0x7E => {
                performer.esc_dispatch(self.intermediates(), byte);
                self.state = State::Ground;
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // CSI
    // ------------------------------------------------------------------

    fn csi_entry<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            0x20..=0x2F => {
                self.collect(byte);
                if self.state != State::CsiIgnore {
                    self.state = State::CsiIntermediate;
                }
            }
            b'0'..=b'9' | b';' | b':' => {
                self.param_byte(byte);
                self.state = State::CsiParam;
            }
            // private markers, only valid before any parameter
            0x3C..=0x3F => {
                self.collect(byte);
                if self.state != State::CsiIgnore {
                    self.state = State::CsiParam;
                }
            }
            0x40..=0x7E => self.csi_finish(performer, byte),
            _ => {}
        }
    }

    fn csi_param<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            b'0'..=b'9' | b';' | b':' => self.param_byte(byte),
            0x20..=0x2F => {
                self.collect(byte);
                if self.state != State::CsiIgnore {
                    self.state = State::CsiIntermediate;
                }
            }
            0x3C..=0x3F => {
                self.errors += 1;
                self.state = State::CsiIgnore;
            }
            0x40..=0x7E => self.csi_finish(performer, byte),
            _ => {}
        }
    }

    fn csi_intermediate<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            0x20..=0x2F => self.collect(byte),
            0x30..=0x3F => {
                self.errors += 1;
                self.state = State::CsiIgnore;
            }
            0x40..=0x7E => self.csi_finish(performer, byte),
            _ => {}
        }
    }

    fn csi_ignore<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => performer.execute(byte),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    fn csi_finish<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        if self.param_pending {
            self.finish_param();
        }
        performer.csi_dispatch(&self.params, self.intermediates(), byte as char);
        self.state = State::Ground;
    }

    // ------------------------------------------------------------------
    // DCS
    // ------------------------------------------------------------------

    fn dcs_entry<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x20..=0x2F => {
                self.collect_dcs(byte);
                if self.state != State::DcsIgnore {
                    self.state = State::DcsIntermediate;
                }
            }
            b'0'..=b'9' | b';' | b':' => {
                self.param_byte(byte);
                self.state = State::DcsParam;
            }
            0x3C..=0x3F => {
                self.collect_dcs(byte);
                if self.state != State::DcsIgnore {
                    self.state = State::DcsParam;
                }
            }
            0x40..=0x7E => self.dcs_finish(performer, byte),
            _ => {}
        }
    }

    fn dcs_param<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.param_byte(byte),
            0x20..=0x2F => {
                self.collect_dcs(byte);
                if self.state != State::DcsIgnore {
                    self.state = State::DcsIntermediate;
                }
            }
            0x3C..=0x3F => {
                self.errors += 1;
                self.state = State::DcsIgnore;
            }
            0x40..=0x7E => self.dcs_finish(performer, byte),
            _ => {}
        }
    }

    fn dcs_intermediate<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x20..=0x2F => self.collect_dcs(byte),
            0x30..=0x3F => {
                self.errors += 1;
                self.state = State::DcsIgnore;
            }
            0x40..=0x7E => self.dcs_finish(performer, byte),
            _ => {}
        }
    }

    fn dcs_finish<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        if self.param_pending {
            self.finish_param();
        }
        performer.dcs_hook(&self.params, self.intermediates(), byte as char);
        self.state = State::DcsPassthrough;
    }

    fn dcs_passthrough<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x9C => {
                performer.dcs_unhook();
                self.state = State::Ground;
            }
            0x7F => {}
            _ => performer.dcs_put(byte),
        }
    }

    fn dcs_ignore(&mut self, byte: u8) {
        if byte == 0x9C {
            self.state = State::Ground;
        }
    }

    // ------------------------------------------------------------------
    // OSC and SOS/PM/APC
    // ------------------------------------------------------------------

    fn osc_string<P: Perform>(&mut self, performer: &mut P, byte: u8) {
        match byte {
            0x07 => {
                performer.osc_dispatch(&self.osc, true);
                self.osc.clear();
                self.state = State::Ground;
            }
            0x9C => {
                performer.osc_dispatch(&self.osc, false);
                self.osc.clear();
                self.state = State::Ground;
            }
            0x00..=0x1F => {}
            _ => {
                if self.osc.len() < MAX_OSC_RAW {
                    self.osc.push(byte);
                }
            }
        }
    }

    fn sos_pm_apc(&mut self, byte: u8) {
        if byte == 0x9C {
            self.state = State::Ground;
        }
    }

    // ------------------------------------------------------------------
    // Collection helpers
    // ------------------------------------------------------------------

    fn collect(&mut self, byte: u8) {
        if self.intermediates_len == self.intermediates.len() {
            self.errors += 1;
            self.state = State::CsiIgnore;
            return;
        }
        self.intermediates[self.intermediates_len] = byte;
        self.intermediates_len += 1;
    }

    fn collect_dcs(&mut self, byte: u8) {
        if self.intermediates_len == self.intermediates.len() {
            self.errors += 1;
            self.state = State::DcsIgnore;
            return;
        }
        self.intermediates[self.intermediates_len] = byte;
        self.intermediates_len += 1;
    }

    fn param_byte(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' => {
                self.param = self
                    .param
                    .saturating_mul(10)
                    .saturating_add((byte - b'0') as i32)
                    .min(PARAM_MAX);
                self.param_started = true;
                self.param_pending = true;
            }
            b';' => {
                self.finish_param();
                self.param_is_sub = false;
                self.param_pending = true;
            }
            b':' => {
                self.finish_param();
                self.param_is_sub = true;
                self.param_pending = true;
            }
            _ => {}
        }
    }

    fn finish_param(&mut self) {
        let value = if self.param_started {
            self.param
        } else {
            PARAM_OMITTED
        };
        if self.param_is_sub {
            self.params.push_subparam(value);
        } else {
            self.params.push(value);
        }
        self.param = 0;
        self.param_started = false;
        self.param_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Perform for Recorder {
        fn print(&mut self, c: char) {
            self.events.push(format!("print:{c}"));
        }

        fn execute(&mut self, byte: u8) {
            self.events.push(format!("exec:{byte:02x}"));
        }

        fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], action: char) {
            let groups: Vec<Vec<i32>> = params.iter().map(|g| g.to_vec()).collect();
            self.events.push(format!(
                "csi:{action}:{groups:?}:{}",
                String::from_utf8_lossy(intermediates)
            ));
        }

        fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
            self.events.push(format!(
                "esc:{}:{}",
                byte as char,
                String::from_utf8_lossy(intermediates)
            ));
        }

        fn osc_dispatch(&mut self, payload: &[u8], bell_terminated: bool) {
            self.events.push(format!(
                "osc:{}:{bell_terminated}",
                String::from_utf8_lossy(payload)
            ));
        }

        fn dcs_hook(&mut self, params: &Params, intermediates: &[u8], action: char) {
            let groups: Vec<Vec<i32>> = params.iter().map(|g| g.to_vec()).collect();
            self.events.push(format!(
                "hook:{action}:{groups:?}:{}",
                String::from_utf8_lossy(intermediates)
            ));
        }

        fn dcs_put(&mut self, byte: u8) {
            self.events.push(format!("put:{}", byte as char));
        }

        fn dcs_unhook(&mut self) {
            self.events.push("unhook".into());
        }
    }

    fn run(bytes: &[u8]) -> Vec<String> {
        let mut parser = Parser::new();
        let mut recorder = Recorder::default();
        for &b in bytes {
            parser.advance(&mut recorder, b);
        }
        recorder.events
    }

    #[test]
    fn plain_text_prints() {
        assert_eq!(run(b"hi"), ["print:h", "print:i"]);
    }

    #[test]
    fn csi_with_params() {
        assert_eq!(run(b"\x1b[5;10H"), ["csi:H:[[5], [10]]:"]);
    }

    #[test]
    fn csi_private_marker_lands_in_intermediates() {
        assert_eq!(run(b"\x1b[?1049h"), ["csi:h:[[1049]]:?"]);
    }

    #[test]
    fn omitted_params_read_as_minus_one() {
        assert_eq!(run(b"\x1b[;5H"), ["csi:H:[[-1], [5]]:"]);
        assert_eq!(run(b"\x1b[1;H"), ["csi:H:[[1], [-1]]:"]);
        assert_eq!(run(b"\x1b[m"), ["csi:m:[]:"]);
    }

    #[test]
    fn subparams_stay_grouped() {
        assert_eq!(
            run(b"\x1b[38:2::10:20:30m"),
            ["csi:m:[[38, 2, -1, 10, 20, 30]]:"]
        );
        assert_eq!(run(b"\x1b[4:3m"), ["csi:m:[[4, 3]]:"]);
    }

    #[test]
    fn c0_executes_inside_csi() {
        assert_eq!(
            run(b"\x1b[2\x08;3H"),
            ["exec:08", "csi:H:[[2], [3]]:"]
        );
    }

    #[test]
    fn esc_sequences_dispatch() {
        assert_eq!(run(b"\x1b7"), ["esc:7:"]);
        assert_eq!(run(b"\x1b(0"), ["esc:0:("]);
    }

    #[test]
    fn osc_terminated_by_bel_and_st() {
        assert_eq!(run(b"\x1b]0;title\x07"), ["osc:0;title:true"]);
        assert_eq!(run(b"\x1b]2;other\x1b\\"), ["osc:2;other:false", "esc:\\:"]);
    }

    #[test]
    fn dcs_hook_put_unhook() {
        assert_eq!(
            run(b"\x1bP$qm\x1b\\"),
            ["hook:q:[]:$", "put:m", "unhook", "esc:\\:"]
        );
    }

    #[test]
    fn too_many_intermediates_ignores_sequence() {
        let events = run(b"\x1b[ ! \"x");
        assert!(events.is_empty(), "expected no dispatch, got {events:?}");
    }

    #[test]
    fn can_aborts_sequence() {
        assert_eq!(run(b"\x1b[12\x18A"), ["exec:18", "print:A"]);
    }

    #[test]
    fn utf8_decodes_across_chunks() {
        let mut parser = Parser::new();
        let mut recorder = Recorder::default();
        let bytes = "é漢".as_bytes();
        // feed one byte at a time
        for &b in bytes {
            parser.advance(&mut recorder, b);
        }
        assert_eq!(recorder.events, ["print:é", "print:漢"]);
    }

    #[test]
    fn invalid_utf8_prints_replacement() {
        let events = run(&[0xFF, b'a']);
        assert_eq!(events, ["print:\u{FFFD}", "print:a"]);
    }

    #[test]
    fn split_sequences_match_unsplit() {
        let input = b"A\x1b[31;1mB\x1b]0;t\x07\x1b[?25l";
        let whole = run(input);

        for split in 1..input.len() {
            let mut parser = Parser::new();
            let mut recorder = Recorder::default();
            for &b in &input[..split] {
                parser.advance(&mut recorder, b);
            }
            for &b in &input[split..] {
                parser.advance(&mut recorder, b);
            }
            assert_eq!(recorder.events, whole, "split at {split}");
        }
    }

    #[test]
    fn reset_returns_to_ground() {
        let mut parser = Parser::new();
        let mut recorder = Recorder::default();
        for &b in b"\x1b[12;3" {
            parser.advance(&mut recorder, b);
        }
        parser.reset();
        parser.advance(&mut recorder, b'X');
        assert_eq!(recorder.events, ["print:X"]);
    }

    #[test]
    fn param_overflow_clamps() {
        let events = run(b"\x1b[99999999999999999999C");
        assert_eq!(events, [format!("csi:C:[[{PARAM_MAX}]]:")]);
    }
}
