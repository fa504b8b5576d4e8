use crate::metrics::{FontStyle, text_width};
use crate::types::{Pt, Rect, mm};

/// Lowest y any page content may reach; the footer band below this line is
/// reserved on every page of the form.
pub fn content_floor() -> Pt {
    mm(250.0)
}

/// Horizontal breathing room inside a table cell when searching for a
/// fitting font size.
fn cell_padding() -> Pt {
    mm(2.0)
}

/// A vertical strip of the page with a downward-moving cursor. Composers
/// reserve row rectangles from it instead of tracking raw y positions.
#[derive(Debug, Clone)]
pub struct Region {
    rect: Rect,
    cursor: Pt,
}

impl Region {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor: rect.y,
        }
    }

    /// Absolute y of the cursor, in page coordinates.
    pub fn cursor(&self) -> Pt {
        self.cursor
    }

    pub fn advance(&mut self, dy: Pt) {
        self.cursor += dy;
    }

    /// Takes the next full-width strip of `height` and moves the cursor
    /// past it.
    pub fn reserve(&mut self, height: Pt) -> Rect {
        let strip = Rect::new(self.rect.x, self.cursor, self.rect.width, height);
        self.cursor += height;
        strip
    }

    /// True when a row of `height` would cross the region's bottom edge.
    pub fn needs_break(&self, height: Pt) -> bool {
        self.cursor + height > self.rect.bottom()
    }

    pub fn x(&self) -> Pt {
        self.rect.x
    }
}

/// Largest size in `[min, max]` at which `text` fits a cell of `width`
/// with padding on both sides, stepping down half a point at a time. Long
/// values shrink instead of overflowing their box; `min` bounds how far.
pub fn fit_font_size(text: &str, style: FontStyle, width: Pt, max: Pt, min: Pt) -> Pt {
    let available = width - cell_padding() * 2;
    let mut size = max;
    let step = Pt::from_f32(0.5);
    while size > min {
        if text_width(text, style, size) <= available {
            return size;
        }
        size -= step;
    }
    min
}

/// Cuts `text` so it fits `width` at the given size, marking the cut with
/// an ellipsis. Returns the text unchanged when it already fits.
pub fn truncate_to_width(text: &str, style: FontStyle, size: Pt, width: Pt) -> String {
    if text_width(text, style, size) <= width {
        return text.to_string();
    }
    let ellipsis = "...";
    let mut kept = String::new();
    for ch in text.chars() {
        let mut candidate = kept.clone();
        candidate.push(ch);
        candidate.push_str(ellipsis);
        if text_width(&candidate, style, size) > width {
            break;
        }
        kept.push(ch);
    }
    kept.push_str(ellipsis);
    kept
}

/// Greedy word wrap. A single word wider than the line gets its own line
/// rather than being split mid-word; the form's cells are wide enough that
/// such words only occur in free-text remarks.
pub fn wrap_to_width(text: &str, style: FontStyle, size: Pt, width: Pt) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, style, size) <= width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_advances_cursor() {
        let mut region = Region::new(Rect::new(mm(10.0), mm(40.0), mm(190.0), mm(210.0)));
        let first = region.reserve(mm(9.0));
        let second = region.reserve(mm(9.0));
        assert_eq!(first.y, mm(40.0));
        assert_eq!(second.y, mm(49.0));
        assert!(!region.needs_break(mm(190.0)));
        assert!(region.needs_break(mm(200.0)));
    }

    #[test]
    fn fit_font_size_shrinks_long_values() {
        let width = mm(30.0);
        let max = Pt::from_f32(10.0);
        let min = Pt::from_f32(6.0);
        let short = fit_font_size("M25", FontStyle::Regular, width, max, min);
        assert_eq!(short, max);
        let long = fit_font_size(
            "Rebound Hammer + Ultrasonic Pulse Velocity",
            FontStyle::Regular,
            width,
            max,
            min,
        );
        assert!(long < max);
        assert!(long >= min);
    }

    #[test]
    fn truncate_keeps_fitting_text_intact() {
        let size = Pt::from_f32(9.0);
        assert_eq!(
            truncate_to_width("CTM (2000KN)", FontStyle::Regular, size, mm(60.0)),
            "CTM (2000KN)"
        );
        let cut = truncate_to_width(
            "An extremely long location description that cannot fit",
            FontStyle::Regular,
            size,
            mm(30.0),
        );
        assert!(cut.ends_with("..."));
        assert!(text_width(&cut, FontStyle::Regular, size) <= mm(30.0));
    }

    #[test]
    fn wrap_splits_on_word_boundaries() {
        let size = Pt::from_f32(8.0);
        let lines = wrap_to_width(
            "The Test Report cannot be reproduced without the written approval",
            FontStyle::Regular,
            size,
            mm(60.0),
        );
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, FontStyle::Regular, size) <= mm(60.0));
        }
    }
}
