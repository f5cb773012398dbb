use bitflags::bitflags;

use super::color::Color;

bitflags! {
    /// Cell text attributes as a compact bitflag set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct AttrFlags: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        const INVERSE       = 1 << 5;
        const HIDDEN        = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
        const OVERLINE      = 1 << 8;
    }
}

/// Underline rendition selected by SGR 4 and its `4:n` sub-parameter form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

/// The full attribute pack applied to printed cells: style flags, underline
/// rendition, and foreground/background colors. A plain value type; the
/// cursor carries the current pack and every printed cell copies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attr {
    pub flags: AttrFlags,
    pub underline: UnderlineStyle,
    pub fg: Color,
    pub bg: Color,
}

impl Attr {
    /// Set the underline style, keeping the UNDERLINE flag in sync.
    pub fn set_underline(&mut self, style: UnderlineStyle) {
        self.underline = style;
        self.flags
            .set(AttrFlags::UNDERLINE, style != UnderlineStyle::None);
    }

    /// Reset to the default pack: no flags, default fg and bg.
    pub fn reset(&mut self) {
        *self = Attr::default();
    }

    /// The attribute used when erasing cells: background carries over
    /// (per ECMA-48), everything else resets.
    pub fn erase_attr(&self) -> Attr {
        Attr {
            bg: self.bg,
            ..Attr::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_yields_default_pack() {
        let mut attr = Attr {
            flags: AttrFlags::BOLD | AttrFlags::INVERSE,
            underline: UnderlineStyle::Curly,
            fg: Color::Indexed(1),
            bg: Color::Rgb(1, 2, 3),
        };
        attr.reset();
        assert_eq!(attr, Attr::default());
    }

    #[test]
    fn underline_style_tracks_flag() {
        let mut attr = Attr::default();
        attr.set_underline(UnderlineStyle::Double);
        assert!(attr.flags.contains(AttrFlags::UNDERLINE));
        attr.set_underline(UnderlineStyle::None);
        assert!(!attr.flags.contains(AttrFlags::UNDERLINE));
    }

    #[test]
    fn erase_attr_keeps_background_only() {
        let mut attr = Attr::default();
        attr.flags.insert(AttrFlags::BOLD);
        attr.fg = Color::Indexed(2);
        attr.bg = Color::Indexed(4);
        let erase = attr.erase_attr();
        assert_eq!(erase.bg, Color::Indexed(4));
        assert_eq!(erase.fg, Color::Default);
        assert!(erase.flags.is_empty());
    }
}
