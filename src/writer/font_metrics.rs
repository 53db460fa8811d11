//! Base-14 font metrics and WinAnsi text encoding.
//!
//! The certificate only uses Helvetica and Helvetica-Bold. Widths are the
//! Adobe AFM advance widths for the printable ASCII range; anything outside
//! it measures as the font's default width.

/// Standard (non-embedded) fonts available to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    /// Helvetica
    Helvetica,
    /// Helvetica-Bold
    HelveticaBold,
}

impl StandardFont {
    /// All fonts the writer registers on every page.
    pub const ALL: [StandardFont; 2] = [StandardFont::Helvetica, StandardFont::HelveticaBold];

    /// PostScript name used as `/BaseFont`.
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Name of the font in the page `/Resources /Font` dictionary.
    pub fn resource_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "F1",
            StandardFont::HelveticaBold => "F2",
        }
    }

    /// Metrics for this font.
    pub fn metrics(&self) -> &'static FontMetrics {
        match self {
            StandardFont::Helvetica => &HELVETICA,
            StandardFont::HelveticaBold => &HELVETICA_BOLD,
        }
    }
}

/// Horizontal and vertical metrics in 1/1000 em units.
#[derive(Debug)]
pub struct FontMetrics {
    /// Advance widths for U+0020..=U+007E
    widths: [u16; 95],
    /// Width for characters outside the table
    default_width: u16,
    /// Ascender height
    pub ascender: i16,
    /// Descender depth (negative)
    pub descender: i16,
    /// Font bounding box height (yMax - yMin)
    pub bbox_height: u16,
}

impl FontMetrics {
    /// Advance width of one character in font units.
    pub fn char_width(&self, ch: char) -> u16 {
        match ch {
            ' '..='~' => self.widths[ch as usize - 0x20],
            _ => self.default_width,
        }
    }

    /// Width of `text` in points, including `character_spacing` between characters.
    pub fn text_width(&self, text: &str, size: f32, character_spacing: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        let gaps = text.chars().count().saturating_sub(1) as f32;
        units as f32 * size / 1000.0 + character_spacing * gaps
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascent(&self, size: f32) -> f32 {
        f32::from(self.ascender) * size / 1000.0
    }

    /// Line advance: the bounding box height scaled to the font size.
    pub fn line_height(&self, size: f32) -> f32 {
        f32::from(self.bbox_height) * size / 1000.0
    }
}

#[rustfmt::skip]
static HELVETICA: FontMetrics = FontMetrics {
    widths: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // 'p'..'~'
    ],
    default_width: 556,
    ascender: 718,
    descender: -207,
    bbox_height: 1156,
};

#[rustfmt::skip]
static HELVETICA_BOLD: FontMetrics = FontMetrics {
    widths: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
        975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
        333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
        611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
    ],
    default_width: 556,
    ascender: 718,
    descender: -207,
    bbox_height: 1190,
};

/// Encode text for a simple font with `/WinAnsiEncoding`.
///
/// Latin-1 maps directly, the Windows-1252 extras map to 0x80..0x9F, and
/// anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            0x20..=0x7E | 0xA0..=0xFF => ch as u8,
            _ => cp1252_extra(ch).unwrap_or(b'?'),
        })
        .collect()
}

fn cp1252_extra(ch: char) -> Option<u8> {
    let code = match ch {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_widths() {
        let regular = StandardFont::Helvetica.metrics();
        let bold = StandardFont::HelveticaBold.metrics();
        assert_eq!(regular.char_width(' '), 278);
        assert_eq!(regular.char_width('W'), 944);
        assert_eq!(regular.char_width('i'), 222);
        assert_eq!(bold.char_width('i'), 278);
        assert_eq!(bold.char_width('~'), 584);
        assert_eq!(regular.char_width('é'), 556);
    }

    #[test]
    fn test_text_width() {
        let bold = StandardFont::HelveticaBold.metrics();
        // C=722 E=667 R=722 T=611 I=278 F=611 I=278 C=722 A=722 T=611 E=667
        let width = bold.text_width("CERTIFICATE", 40.0, 0.0);
        assert!((width - 6611.0 * 40.0 / 1000.0).abs() < 1e-3);

        let spaced = bold.text_width("OF", 20.0, 2.0);
        assert!((spaced - ((778.0 + 611.0) * 20.0 / 1000.0 + 2.0)).abs() < 1e-3);
        assert_eq!(bold.text_width("", 20.0, 2.0), 0.0);
    }

    #[test]
    fn test_vertical_metrics() {
        let regular = StandardFont::Helvetica.metrics();
        assert!((regular.line_height(12.0) - 13.872).abs() < 1e-4);
        assert!((regular.ascent(10.0) - 7.18).abs() < 1e-4);
        assert!((StandardFont::HelveticaBold.metrics().line_height(10.0) - 11.9).abs() < 1e-4);
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(StandardFont::Helvetica.resource_name(), "F1");
        assert_eq!(StandardFont::HelveticaBold.base_font(), "Helvetica-Bold");
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Test User"), b"Test User");
        assert_eq!(encode_win_ansi("José Müller"), b"Jos\xe9 M\xfcller");
        assert_eq!(encode_win_ansi("\u{2019}\u{20AC}"), vec![0x92, 0x80]);
        assert_eq!(encode_win_ansi("漢"), b"?");
    }
}
