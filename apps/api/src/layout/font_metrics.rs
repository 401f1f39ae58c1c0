//! Static glyph-width tables for the two standard PDF fonts the form uses.
//!
//! Widths come from the Adobe Core 14 AFM files, in em units (thousandths
//! divided by 1000). The tables cover ASCII 0x20..=0x7E; index = (char) - 32.
//! Accented Latin letters measure as their base letter, which is exact for
//! Helvetica. Anything else falls back to `average_char_width`.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font enum
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PdfFont {
    Helvetica,
    HelveticaBold,
}

impl PdfFont {
    /// `/BaseFont` name of the standard font.
    pub fn base_font(self) -> &'static str {
        match self {
            PdfFont::Helvetica => "Helvetica",
            PdfFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Resource name the page content refers to.
    pub fn resource_name(self) -> &'static str {
        match self {
            PdfFont::Helvetica => "F1",
            PdfFont::HelveticaBold => "F2",
        }
    }

    pub fn metrics(self) -> &'static FontMetricTable {
        match self {
            PdfFont::Helvetica => &HELVETICA,
            PdfFont::HelveticaBold => &HELVETICA_BOLD,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Fallback width for characters outside the table.
    pub average_char_width: f32,
}

impl FontMetricTable {
    pub fn char_width(&self, c: char) -> f32 {
        let c = base_letter(c).unwrap_or(c);
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths[code - 32]
        } else if c == '\t' {
            self.widths[0]
        } else {
            self.average_char_width
        }
    }

    /// Width of a string in em units.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }

    /// Width of a string in points at `size_pt`.
    pub fn text_width(&self, s: &str, size_pt: f32) -> f32 {
        self.measure_str(s) * size_pt
    }
}

/// Maps accented Latin-1 letters to the ASCII letter with the same advance.
fn base_letter(c: char) -> Option<char> {
    let base = match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(base)
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

#[rustfmt::skip]
pub static HELVETICA: FontMetricTable = FontMetricTable {
    widths: [
        // sp    !      "      #      $      %      &      '
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191,
        // (     )      *      +      ,      -      .      /
        0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0-9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :     ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A-Z
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500,
        0.667, 0.556, 0.833, 0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611,
        0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [     \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a-z
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222,
        0.500, 0.222, 0.833, 0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278,
        0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {     |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
};

#[rustfmt::skip]
pub static HELVETICA_BOLD: FontMetricTable = FontMetricTable {
    widths: [
        // sp    !      "      #      $      %      &      '
        0.278, 0.333, 0.474, 0.556, 0.556, 0.889, 0.722, 0.238,
        // (     )      *      +      ,      -      .      /
        0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0-9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :     ;      <      =      >      ?      @
        0.333, 0.333, 0.584, 0.584, 0.584, 0.611, 0.975,
        // A-Z
        0.722, 0.722, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.556,
        0.722, 0.611, 0.833, 0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611,
        0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [     \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.584, 0.556, 0.333,
        // a-z
        0.556, 0.611, 0.556, 0.611, 0.556, 0.333, 0.611, 0.611, 0.278, 0.278,
        0.556, 0.278, 0.889, 0.611, 0.611, 0.611, 0.611, 0.389, 0.556, 0.333,
        0.611, 0.556, 0.778, 0.556, 0.556, 0.500,
        // {     |      }      ~
        0.389, 0.280, 0.389, 0.584,
    ],
    average_char_width: 0.611,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        let m = PdfFont::Helvetica.metrics();
        assert!((m.char_width(' ') - 0.278).abs() < 1e-6);
        assert!((m.char_width('W') - 0.944).abs() < 1e-6);
        assert!((m.char_width('~') - 0.584).abs() < 1e-6);
        assert!((PdfFont::HelveticaBold.metrics().char_width('m') - 0.889).abs() < 1e-6);
    }

    #[test]
    fn test_accented_letters_measure_as_base() {
        let m = PdfFont::Helvetica.metrics();
        assert_eq!(m.measure_str("Tránsito"), m.measure_str("Transito"));
        assert_eq!(m.char_width('Ñ'), m.char_width('N'));
        assert_eq!(m.char_width('€'), m.average_char_width);
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let m = PdfFont::Helvetica.metrics();
        let at_10 = m.text_width("MIC/DTA", 10.0);
        let at_20 = m.text_width("MIC/DTA", 20.0);
        assert!((at_20 - 2.0 * at_10).abs() < 1e-4);
    }
}
