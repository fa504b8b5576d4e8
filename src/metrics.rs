use crate::types::Pt;

/// The two Times faces the certificate form is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
}

impl FontStyle {
    pub fn base_font(self) -> &'static str {
        match self {
            FontStyle::Regular => "Times-Roman",
            FontStyle::Bold => "Times-Bold",
        }
    }

    pub fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
        }
    }
}

// Adobe AFM advance widths (1000 units/em) for the printable ASCII range,
// indexed from 0x20.
#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 333, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 333, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

const MISSING_WIDTH: u16 = 500;

fn advance_units(ch: char, style: FontStyle) -> u16 {
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        let table = match style {
            FontStyle::Regular => &TIMES_ROMAN,
            FontStyle::Bold => &TIMES_BOLD,
        };
        return table[(code - 0x20) as usize];
    }
    // WinAnsi extras the form actually uses.
    match (ch, style) {
        ('\u{00b0}', _) => 400,                       // degree
        ('\u{00b1}', FontStyle::Regular) => 564,      // plus-minus
        ('\u{00b1}', FontStyle::Bold) => 570,
        ('\u{00b2}', _) | ('\u{00b3}', _) => 300,     // superscript 2/3
        ('\u{2013}', _) => 500,                       // en dash
        ('\u{2014}', _) => 1000,                      // em dash
        ('\u{2018}', _) | ('\u{2019}', _) => 333,
        _ => MISSING_WIDTH,
    }
}

/// Measured advance width of `text` at `size`, in points.
pub fn text_width(text: &str, style: FontStyle, size: Pt) -> Pt {
    let units: i64 = text
        .chars()
        .map(|ch| advance_units(ch, style) as i64)
        .sum();
    // width = units/1000 * size, carried out in milli-points.
    let milli = size.to_milli_i64().saturating_mul(units) / 1000;
    Pt::from_milli_i64(milli)
}

/// Maps a char to its WinAnsi code for content-stream emission. Characters
/// outside the encoding degrade to '?' rather than dropping out of the cell.
pub fn winansi_byte(ch: char) -> u8 {
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        return code as u8;
    }
    match ch {
        '\u{00b0}' => 0xb0,
        '\u{00b1}' => 0xb1,
        '\u{00b2}' => 0xb2,
        '\u{00b3}' => 0xb3,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        _ => b'?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_widths_match_afm() {
        // "N/A" in Times-Roman 10pt: 722 + 278 + 722 = 1722 units.
        let w = text_width("N/A", FontStyle::Regular, Pt::from_f32(10.0));
        assert_eq!(w.to_milli_i64(), 17_220);
    }

    #[test]
    fn bold_is_wider_than_regular_for_caps() {
        let r = text_width("GRADE", FontStyle::Regular, Pt::from_f32(10.0));
        let b = text_width("GRADE", FontStyle::Bold, Pt::from_f32(10.0));
        assert!(b > r);
    }

    #[test]
    fn unit_superscripts_encode_to_winansi() {
        assert_eq!(winansi_byte('\u{00b2}'), 0xb2);
        assert_eq!(winansi_byte('\u{00b3}'), 0xb3);
        assert_eq!(winansi_byte('\u{4e2d}'), b'?');
    }
}
