use std::collections::BTreeMap;

use crate::metrics::FontStyle;
use crate::types::{Color, Pt, Rect, Size};

/// One drawing primitive. Coordinates are top-left-origin page points; the
/// PDF serializer flips them into PDF space. Text coordinates address the
/// baseline, matching the measured widths from [`crate::metrics`].
#[derive(Debug, Clone)]
pub enum Command {
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont {
        style: FontStyle,
        size: Pt,
    },
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        rect: Rect,
        mode: PaintMode,
    },
    DrawLine {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
    },
    DrawImage {
        rect: Rect,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Fill,
    Stroke,
}

/// A raster ready for embedding: baseline JPEG, always DeviceRGB.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: BTreeMap<String, EncodedImage>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_style: FontStyle,
    font_size: Pt,
}

impl GraphicsState {
    fn page_default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_style: FontStyle::Regular,
            font_size: Pt::from_f32(12.0),
        }
    }
}

/// Recording surface for one document. State setters deduplicate no-op
/// changes so repeated cell drawing does not bloat the content stream.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state: GraphicsState,
    images: BTreeMap<String, EncodedImage>,
    next_image_id: usize,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state: GraphicsState::page_default(),
            images: BTreeMap::new(),
            next_image_id: 1,
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.stroke_color == color {
            return;
        }
        self.state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, style: FontStyle, size: Pt) {
        if self.state.font_style == style && self.state.font_size == size {
            return;
        }
        self.state.font_style = style;
        self.state.font_size = size;
        self.current.commands.push(Command::SetFont { style, size });
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current.commands.push(Command::DrawString { x, y, text });
    }

    pub fn fill_rect(&mut self, rect: Rect) {
        self.current.commands.push(Command::DrawRect {
            rect,
            mode: PaintMode::Fill,
        });
    }

    pub fn stroke_rect(&mut self, rect: Rect) {
        self.current.commands.push(Command::DrawRect {
            rect,
            mode: PaintMode::Stroke,
        });
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.current.commands.push(Command::DrawLine { x1, y1, x2, y2 });
    }

    /// Registers an embeddable raster and returns its resource id. The same
    /// id may be drawn any number of times on any page.
    pub fn register_image(&mut self, image: EncodedImage) -> String {
        let id = format!("Im{}", self.next_image_id);
        self.next_image_id += 1;
        self.images.insert(id.clone(), image);
        id
    }

    pub fn draw_image(&mut self, rect: Rect, resource_id: impl Into<String>) {
        self.current.commands.push(Command::DrawImage {
            rect,
            resource_id: resource_id.into(),
        });
    }

    /// Closes the current page. Graphics state resets to the page default,
    /// so every page's content stream is self-contained.
    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state = GraphicsState::page_default();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::mm;

    #[test]
    fn state_setters_deduplicate() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_fill_color(Color::rgb8(255, 255, 0));
        canvas.set_fill_color(Color::rgb8(255, 255, 0));
        canvas.set_font(FontStyle::Bold, Pt::from_f32(10.0));
        canvas.set_font(FontStyle::Bold, Pt::from_f32(10.0));
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].commands.len(), 2);
    }

    #[test]
    fn show_page_resets_state() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(FontStyle::Bold, Pt::from_f32(22.0));
        canvas.show_page();
        // Same font again on the new page must be re-emitted.
        canvas.set_font(FontStyle::Bold, Pt::from_f32(22.0));
        canvas.draw_string(mm(10.0), mm(20.0), "x");
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        assert!(matches!(
            doc.pages[1].commands[0],
            Command::SetFont { .. }
        ));
    }

    #[test]
    fn image_ids_are_unique_and_registered() {
        let mut canvas = Canvas::new(Size::a4());
        let a = canvas.register_image(EncodedImage {
            width: 1,
            height: 1,
            jpeg: vec![0xff],
        });
        let b = canvas.register_image(EncodedImage {
            width: 2,
            height: 2,
            jpeg: vec![0xfe],
        });
        assert_ne!(a, b);
        let doc = canvas.finish();
        assert_eq!(doc.images.len(), 2);
    }
}
