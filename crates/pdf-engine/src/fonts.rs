//! Standard Type 1 font variants and their advance widths.

/// One of the four Helvetica variants every PDF reader ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontVariant {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl FontVariant {
    pub const ALL: [FontVariant; 4] =
        [Self::Regular, Self::Bold, Self::Oblique, Self::BoldOblique];

    pub fn select(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Self::Regular,
            (true, false) => Self::Bold,
            (false, true) => Self::Oblique,
            (true, true) => Self::BoldOblique,
        }
    }

    /// PostScript name used as the font's `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Regular => "Helvetica",
            Self::Bold => "Helvetica-Bold",
            Self::Oblique => "Helvetica-Oblique",
            Self::BoldOblique => "Helvetica-BoldOblique",
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, Self::Bold | Self::BoldOblique)
    }

    /// Advance width of `ch` in 1/1000 em.
    pub fn glyph_width(self, ch: char) -> u16 {
        let table = if self.is_bold() { &HELVETICA_BOLD } else { &HELVETICA };
        match ch as u32 {
            code @ 32..=126 => table[(code - 32) as usize],
            _ => DEFAULT_WIDTH,
        }
    }

    /// Width of `text` when set at `size` points. Line breaks are not
    /// interpreted.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| self.glyph_width(ch) as u32).sum();
        units as f32 * size / 1000.0
    }
}

const DEFAULT_WIDTH: u16 = 556;

// Obliques share the upright metrics.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Encodes `text` for a WinAnsi simple font. Latin-1 characters map to their
/// code point; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_maps_weight_and_style() {
        assert_eq!(FontVariant::select(false, false).base_font(), "Helvetica");
        assert_eq!(FontVariant::select(true, false).base_font(), "Helvetica-Bold");
        assert_eq!(FontVariant::select(false, true).base_font(), "Helvetica-Oblique");
        assert_eq!(FontVariant::select(true, true).base_font(), "Helvetica-BoldOblique");
    }

    #[test]
    fn widths_come_from_the_right_table() {
        assert_eq!(FontVariant::Regular.glyph_width('i'), 222);
        assert_eq!(FontVariant::Bold.glyph_width('i'), 278);
        assert_eq!(FontVariant::Oblique.glyph_width('W'), 944);
        assert_eq!(FontVariant::Regular.glyph_width('@'), 1015);
        assert_eq!(FontVariant::Regular.glyph_width('\u{4e2d}'), DEFAULT_WIDTH);
    }

    #[test]
    fn text_width_scales_with_size() {
        // "Hi" = 722 + 222
        assert!((FontVariant::Regular.text_width("Hi", 10.0) - 9.44).abs() < 1e-4);
        assert!((FontVariant::Bold.text_width("Hi", 20.0) - 20.0).abs() < 1e-4);
        assert_eq!(FontVariant::Regular.text_width("", 12.0), 0.0);
    }

    #[test]
    fn win_ansi_replaces_characters_outside_latin1() {
        assert_eq!(encode_win_ansi("Café"), b"Caf\xe9".to_vec());
        assert_eq!(encode_win_ansi("a→b"), b"a?b".to_vec());
        assert_eq!(encode_win_ansi("tab\t"), b"tab?".to_vec());
    }
}
