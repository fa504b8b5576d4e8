use lopdf::{Document as LoDocument, Object, Stream, dictionary};

use crate::canvas::{Command, Document, PaintMode};
use crate::error::ReportError;
use crate::metrics::{FontStyle, winansi_byte};
use crate::types::Pt;

/// Serializes a recorded document into PDF 1.7 bytes. Canvas commands use a
/// top-left origin; everything is flipped into PDF space here so the layout
/// code can stay in form coordinates.
pub fn document_to_pdf(document: &Document) -> Result<Vec<u8>, ReportError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let times_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => FontStyle::Regular.base_font(),
        "Encoding" => "WinAnsiEncoding",
    });
    let times_bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => FontStyle::Bold.base_font(),
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = lopdf::Dictionary::new();
    for (resource_id, image) in &document.images {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        );
        let id = doc.add_object(stream);
        xobjects.set(resource_id.as_bytes().to_vec(), Object::Reference(id));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => times_id,
            "F2" => times_bold_id,
        },
        "XObject" => Object::Dictionary(xobjects),
    });

    let page_height = document.page_size.height;
    let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = emit_content(&page.commands, page_height);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(document.page_size.width.to_f32()),
                Object::Real(page_height.to_f32()),
            ],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes: Vec<u8> = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| ReportError::Render(format!("pdf serialization failed: {}", err)))?;
    Ok(bytes)
}

fn emit_content(commands: &[Command], page_height: Pt) -> Vec<u8> {
    let mut out = String::new();
    // Font state is tracked here and re-emitted inside each text object.
    let mut font = FontStyle::Regular;
    let mut font_size = Pt::from_f32(12.0);

    for command in commands {
        match command {
            Command::SetFillColor(color) => {
                push_line(
                    &mut out,
                    &format!(
                        "{} {} {} rg",
                        fmt_f32(color.r),
                        fmt_f32(color.g),
                        fmt_f32(color.b)
                    ),
                );
            }
            Command::SetStrokeColor(color) => {
                push_line(
                    &mut out,
                    &format!(
                        "{} {} {} RG",
                        fmt_f32(color.r),
                        fmt_f32(color.g),
                        fmt_f32(color.b)
                    ),
                );
            }
            Command::SetLineWidth(width) => {
                push_line(&mut out, &format!("{} w", fmt_pt(*width)));
            }
            Command::SetFont { style, size } => {
                font = *style;
                font_size = *size;
            }
            Command::DrawString { x, y, text } => {
                let ty = page_height - *y;
                push_line(
                    &mut out,
                    &format!(
                        "BT /{} {} Tf {} {} Td ({}) Tj ET",
                        font.resource_name(),
                        fmt_pt(font_size),
                        fmt_pt(*x),
                        fmt_pt(ty),
                        escape_text(text)
                    ),
                );
            }
            Command::DrawRect { rect, mode } => {
                let op = match mode {
                    PaintMode::Fill => "f",
                    PaintMode::Stroke => "S",
                };
                let y = page_height - rect.y - rect.height;
                push_line(
                    &mut out,
                    &format!(
                        "{} {} {} {} re {}",
                        fmt_pt(rect.x),
                        fmt_pt(y),
                        fmt_pt(rect.width),
                        fmt_pt(rect.height),
                        op
                    ),
                );
            }
            Command::DrawLine { x1, y1, x2, y2 } => {
                push_line(
                    &mut out,
                    &format!(
                        "{} {} m {} {} l S",
                        fmt_pt(*x1),
                        fmt_pt(page_height - *y1),
                        fmt_pt(*x2),
                        fmt_pt(page_height - *y2)
                    ),
                );
            }
            Command::DrawImage { rect, resource_id } => {
                let y = page_height - rect.y - rect.height;
                push_line(
                    &mut out,
                    &format!(
                        "q {} 0 0 {} {} {} cm /{} Do Q",
                        fmt_pt(rect.width),
                        fmt_pt(rect.height),
                        fmt_pt(rect.x),
                        fmt_pt(y),
                        resource_id
                    ),
                );
            }
        }
    }
    out.into_bytes()
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

// Milli-point fixed formatting keeps content streams byte-stable across
// runs; trailing zeros are trimmed so emitted reals stay minimal.
fn fmt_pt(value: Pt) -> String {
    let milli = value.to_milli_i64();
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let whole = abs / 1000;
    let frac = abs % 1000;
    if frac == 0 {
        return format!("{}{}", sign, whole);
    }
    let frac = format!("{:03}", frac);
    let frac = frac.trim_end_matches('0');
    format!("{}{}.{}", sign, whole, frac)
}

fn fmt_f32(value: f32) -> String {
    let milli = (value as f64 * 1000.0).round() as i64;
    fmt_pt(Pt::from_milli_i64(milli))
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        let byte = winansi_byte(ch);
        match byte {
            b'\\' => escaped.push_str("\\\\"),
            b'(' => escaped.push_str("\\("),
            b')' => escaped.push_str("\\)"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:03o}", byte)),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, EncodedImage};
    use crate::types::{Color, Rect, Size, mm};

    #[test]
    fn fmt_pt_trims_trailing_zeros() {
        assert_eq!(fmt_pt(Pt::from_f32(12.0)), "12");
        assert_eq!(fmt_pt(Pt::from_f32(4.5)), "4.5");
        assert_eq!(fmt_pt(Pt::from_f32(-0.2)), "-0.2");
    }

    #[test]
    fn escape_text_handles_parens_and_winansi() {
        assert_eq!(escape_text("(Civil)"), "\\(Civil\\)");
        assert_eq!(escape_text("N/mm\u{00b2}"), "N/mm\\262");
    }

    #[test]
    fn serialized_document_loads_with_expected_page_count() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(mm(10.0), mm(20.0), "page one");
        canvas.show_page();
        canvas.set_fill_color(Color::rgb8(255, 255, 0));
        canvas.fill_rect(Rect::new(mm(10.0), mm(10.0), mm(50.0), mm(4.0)));
        canvas.show_page();
        let bytes = document_to_pdf(&canvas.finish()).expect("serialize");
        let loaded = LoDocument::load_mem(&bytes).expect("load pdf");
        assert_eq!(loaded.get_pages().len(), 2);
    }

    #[test]
    fn images_become_dctdecode_xobjects() {
        let mut canvas = Canvas::new(Size::a4());
        let id = canvas.register_image(EncodedImage {
            width: 4,
            height: 4,
            jpeg: vec![0xff, 0xd8, 0xff, 0xd9],
        });
        canvas.draw_image(Rect::new(mm(10.0), mm(10.0), mm(40.0), mm(30.0)), id);
        let bytes = document_to_pdf(&canvas.finish()).expect("serialize");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        assert!(text.contains("DCTDecode"));
        assert!(text.contains("/Im1 Do"));
    }
}
