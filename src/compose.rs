use std::collections::BTreeMap;

use crate::canvas::Canvas;
use crate::chart::{HAlign, StrengthChart};
use crate::layout::{Region, content_floor, fit_font_size, truncate_to_width, wrap_to_width};
use crate::metrics::{FontStyle, text_width};
use crate::model::{
    CustomerInfo, PhotoSlot, ReportDefaults, ReviewerInfo, SampleSummary, TestRequestInfo,
    UNAVAILABLE_LABEL, fmt_date, or_na,
};
use crate::observations::CubeObservation;
use crate::types::{Color, Pt, Rect, mm, palette};

pub const PAGE_COUNT: usize = 3;

/// Everything the page builders need, resolved and image-registered by the
/// orchestrator. Raster resource ids refer to images already registered on
/// the canvas.
pub struct ComposeInput<'a> {
    pub defaults: &'a ReportDefaults,
    pub test_request: &'a TestRequestInfo,
    pub customer: &'a CustomerInfo,
    pub sample: &'a SampleSummary,
    pub reviewer: &'a ReviewerInfo,
    pub cubes: &'a [CubeObservation],
    pub report_date: String,
    pub chart: Option<&'a StrengthChart>,
    pub chart_id: Option<String>,
    pub logo_id: Option<String>,
    pub certification_id: Option<String>,
    pub stamp_id: Option<String>,
    pub photo_ids: &'a BTreeMap<(u32, PhotoSlot), String>,
}

/// Draws the full three-page certificate onto `canvas`. Page order and
/// every fixed coordinate follow the lab's issued form.
pub fn compose_report(canvas: &mut Canvas, input: &ComposeInput) {
    page_one(canvas, input);
    page_two(canvas, input);
    page_three(canvas, input);
}

// Shared measurements of the form. The usable width inside the 10 mm
// margins is 190 mm; the info grid splits it 24/26/24/26.
const PAGE_W_MM: f32 = 210.0;
const MARGIN_MM: f32 = 10.0;
const BODY_W_MM: f32 = 190.0;
const LABEL_W_MM: f32 = BODY_W_MM * 0.24;
const VALUE_W_MM: f32 = BODY_W_MM * 0.26;
const GRID_ROW_MM: f32 = 4.0;
// Lowest top edge for the page-1 signature band. The band spans 32 mm, so
// its last line still sits above the end marker at 265 mm.
const SIGNATURE_TOP_MAX_MM: f32 = 230.0;

fn baseline(rect: Rect, size: Pt) -> Pt {
    rect.y + (rect.height + size * 0.7) / 2
}

fn text_at(canvas: &mut Canvas, x: Pt, y: Pt, text: &str, style: FontStyle, size: Pt, align: HAlign) {
    let x = match align {
        HAlign::Left => x,
        HAlign::Center => x - text_width(text, style, size) / 2,
        HAlign::Right => x - text_width(text, style, size),
    };
    canvas.set_font(style, size);
    canvas.draw_string(x, y, text);
}

/// Bordered cell with the form's responsive font search: shrink from `max`
/// to `min` until the value fits, then truncate as a last resort.
fn cell(
    canvas: &mut Canvas,
    rect: Rect,
    text: &str,
    style: FontStyle,
    max: Pt,
    min: Pt,
    align: HAlign,
) {
    canvas.stroke_rect(rect);
    cell_text(canvas, rect, text, style, max, min, align);
}

fn cell_text(
    canvas: &mut Canvas,
    rect: Rect,
    text: &str,
    style: FontStyle,
    max: Pt,
    min: Pt,
    align: HAlign,
) {
    let size = fit_font_size(text, style, rect.width, max, min);
    let text = truncate_to_width(text, style, size, rect.width - mm(2.0));
    let y = baseline(rect, size);
    let x = match align {
        HAlign::Left => rect.x + mm(1.0),
        HAlign::Center => rect.x + rect.width / 2,
        HAlign::Right => rect.right() - mm(1.0),
    };
    text_at(canvas, x, y, &text, style, size, align);
}

/// Yellow marker behind a value, sized to the text like the issued form's
/// hand highlights.
fn highlight_in_cell(canvas: &mut Canvas, rect: Rect, text: &str, style: FontStyle, size: Pt) {
    let width = text_width(text, style, size);
    canvas.set_fill_color(palette::HIGHLIGHT_YELLOW);
    canvas.fill_rect(Rect::new(
        rect.x + mm(1.0),
        rect.y + mm(0.5),
        width + mm(2.0),
        mm(4.0),
    ));
    canvas.set_fill_color(Color::BLACK);
}

fn page_header(canvas: &mut Canvas, input: &ComposeInput, title: &str, first_page: bool) {
    let logo_rect = Rect::new(mm(10.0), mm(8.0), mm(40.0), mm(25.0));
    if let Some(id) = &input.logo_id {
        canvas.draw_image(logo_rect, id.clone());
    }
    canvas.set_stroke_color(palette::BORDER_GRAY);
    canvas.set_line_width(Pt::from_f32(0.8));
    canvas.stroke_rect(logo_rect);

    if first_page {
        let mark_rect = Rect::new(mm(170.0), mm(8.0), mm(25.0), mm(25.0));
        if let Some(id) = &input.certification_id {
            canvas.draw_image(mark_rect, id.clone());
        }
        if let Some(mark) = &input.defaults.certification_mark {
            canvas.set_fill_color(Color::BLACK);
            text_at(
                canvas,
                mark_rect.x + mark_rect.width / 2,
                mm(38.0),
                mark,
                FontStyle::Bold,
                Pt::from_f32(8.0),
                HAlign::Center,
            );
        }
    }

    canvas.set_fill_color(palette::HEADING_RED);
    text_at(
        canvas,
        mm(PAGE_W_MM / 2.0),
        mm(22.0),
        &input.defaults.organization_name,
        FontStyle::Bold,
        Pt::from_f32(22.0),
        HAlign::Center,
    );
    canvas.set_fill_color(palette::SIGNATURE_BLUE);
    text_at(
        canvas,
        mm(PAGE_W_MM / 2.0),
        mm(29.0),
        &input.defaults.organization_subtitle,
        FontStyle::Bold,
        Pt::from_f32(14.0),
        HAlign::Center,
    );

    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(Pt::from_f32(0.8));
    let rule_end = if first_page { 162.0 } else { 200.0 };
    canvas.line(mm(55.0), mm(33.0), mm(rule_end), mm(33.0));

    canvas.set_fill_color(Color::BLACK);
    let title_size = Pt::from_f32(14.0);
    let title_w = text_width(title, FontStyle::Bold, title_size);
    let title_x = mm(PAGE_W_MM / 2.0) - title_w / 2;
    text_at(
        canvas,
        mm(PAGE_W_MM / 2.0),
        mm(40.0),
        title,
        FontStyle::Bold,
        title_size,
        HAlign::Center,
    );
    canvas.line(title_x, mm(42.0), title_x + title_w, mm(42.0));
}

fn page_footer(canvas: &mut Canvas, input: &ComposeInput, page_number: usize, footer_mm: f32) {
    let small = Pt::from_f32(8.0);
    let center = mm(PAGE_W_MM / 2.0);

    canvas.set_fill_color(palette::FOOTER_RED);
    text_at(
        canvas,
        center,
        mm(footer_mm + 3.0),
        &input.defaults.address_line,
        FontStyle::Regular,
        small,
        HAlign::Center,
    );
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        mm(200.0),
        mm(footer_mm + 3.0),
        &format!("Page {} of {}", page_number, PAGE_COUNT),
        FontStyle::Regular,
        small,
        HAlign::Right,
    );

    let second = footer_mm + 7.0;
    text_at(
        canvas,
        mm(10.0),
        mm(second),
        &input.defaults.document_control_id,
        FontStyle::Regular,
        small,
        HAlign::Left,
    );
    canvas.set_fill_color(palette::FOOTER_RED);
    text_at(
        canvas,
        center,
        mm(second),
        &input.defaults.contact_line,
        FontStyle::Regular,
        small,
        HAlign::Center,
    );
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        mm(200.0),
        mm(second),
        &input.defaults.issue_label,
        FontStyle::Regular,
        small,
        HAlign::Right,
    );
}

fn end_marker(canvas: &mut Canvas, label: &str) {
    let text = format!(
        "X----------X----------X----------X----------{}----------X----------X----------X----------X",
        label
    );
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        mm(PAGE_W_MM / 2.0),
        mm(265.0),
        &text,
        FontStyle::Bold,
        Pt::from_f32(10.0),
        HAlign::Center,
    );
}

/// Two-column signature band shared by pages 1 and 3.
fn signature_block(canvas: &mut Canvas, input: &ComposeInput, top_mm: f32, heading: Pt) {
    let name = heading;
    let detail = heading - Pt::from_f32(1.0);

    canvas.set_fill_color(palette::SIGNATURE_BLUE);
    text_at(
        canvas,
        mm(28.0),
        mm(top_mm),
        "Reviewed by -",
        FontStyle::Bold,
        heading,
        HAlign::Left,
    );
    text_at(
        canvas,
        mm(122.0),
        mm(top_mm),
        "Authorized by -",
        FontStyle::Bold,
        heading,
        HAlign::Left,
    );
    if let Some(id) = &input.stamp_id {
        canvas.draw_image(Rect::new(mm(90.0), mm(top_mm), mm(30.0), mm(30.0)), id.clone());
    }

    let mut y = top_mm + 8.0;
    text_at(
        canvas,
        mm(45.0),
        mm(y),
        &input.reviewer.name,
        FontStyle::Bold,
        name,
        HAlign::Left,
    );
    text_at(
        canvas,
        mm(135.0),
        mm(y),
        &input.defaults.authorized.name,
        FontStyle::Bold,
        name,
        HAlign::Left,
    );
    y += 8.0;
    text_at(
        canvas,
        mm(45.0),
        mm(y),
        &format!("({})", input.reviewer.designation),
        FontStyle::Regular,
        detail,
        HAlign::Left,
    );
    text_at(
        canvas,
        mm(135.0),
        mm(y),
        &format!("({})", input.defaults.authorized.designation),
        FontStyle::Regular,
        detail,
        HAlign::Left,
    );
    y += 8.0;
    text_at(
        canvas,
        mm(45.0),
        mm(y),
        &input.reviewer.qualification,
        FontStyle::Regular,
        detail,
        HAlign::Left,
    );
    for line in &input.defaults.authorized.qualifications {
        text_at(
            canvas,
            mm(135.0),
            mm(y),
            line,
            FontStyle::Regular,
            detail,
            HAlign::Left,
        );
        y += 8.0;
    }
    canvas.set_fill_color(Color::BLACK);
}

/// Both dynamic tables on page 1 share this row height. Up to seven
/// specimens print at the form's natural 4 mm; beyond that both tables
/// shrink together so their combined height never exceeds the budget,
/// whatever the specimen count.
pub fn evidence_row_height(count: usize) -> Pt {
    let budget = 56.0_f32;
    mm((budget / (2.0 * count.max(1) as f32)).min(GRID_ROW_MM))
}

fn page_one(canvas: &mut Canvas, input: &ComposeInput) {
    page_header(canvas, input, "TEST REPORT", true);

    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(Pt::from_f32(0.2));
    canvas.set_fill_color(Color::BLACK);

    let body_top = mm(44.0);
    let mut region = Region::new(Rect::new(
        mm(MARGIN_MM),
        body_top,
        mm(BODY_W_MM),
        content_floor() - body_top,
    ));
    info_grid(canvas, input, &mut region);
    region.advance(mm(4.0));

    let row_h = evidence_row_height(input.cubes.len());
    description_table(canvas, input, &mut region, row_h);
    region.advance(mm(4.0));
    results_table(canvas, input, &mut region, row_h);
    region.advance(row_h + mm(8.0));

    // Terms stop where the signature band may begin, so the band never
    // overprints them and still clears the end marker and footer.
    let terms_bottom = mm(SIGNATURE_TOP_MAX_MM - 4.0);
    let mut terms_region = Region::new(Rect::new(
        region.x(),
        region.cursor(),
        mm(BODY_W_MM),
        (terms_bottom - region.cursor()).max(Pt::ZERO),
    ));
    terms_section(canvas, input, &mut terms_region);

    let signature_top = (terms_region.cursor() + mm(12.0))
        .to_mm_f32()
        .min(SIGNATURE_TOP_MAX_MM);
    signature_block(canvas, input, signature_top, Pt::from_f32(10.0));

    end_marker(canvas, "END OF REPORT");
    page_footer(canvas, input, 1, 271.0);
    canvas.show_page();
}

fn info_grid(canvas: &mut Canvas, input: &ComposeInput, region: &mut Region) {
    let max = Pt::from_f32(11.0);
    let min = Pt::from_f32(6.0);
    let x1 = region.x();
    let x2 = x1 + mm(LABEL_W_MM + VALUE_W_MM);

    // Merged customer cell on the left, report date over ULR on the right.
    let top = region.reserve(mm(15.0));
    let label_cell = Rect::new(x1, top.y, mm(LABEL_W_MM), mm(15.0));
    canvas.stroke_rect(label_cell);
    let label_size = Pt::from_f32(11.0);
    canvas.set_font(FontStyle::Regular, label_size);
    canvas.draw_string(x1 + mm(1.0), top.y + mm(5.0), "Customer/Site Name &");
    canvas.draw_string(x1 + mm(1.0), top.y + mm(10.0), "Address");

    let value_cell = Rect::new(x1 + mm(LABEL_W_MM), top.y, mm(VALUE_W_MM), mm(15.0));
    canvas.stroke_rect(value_cell);
    let combined = format!(
        "{}, {}",
        input.customer.display_name(),
        or_na(input.customer.address.as_deref())
    );
    let body_size = fit_font_size(
        &combined,
        FontStyle::Regular,
        value_cell.width * 2.4,
        Pt::from_f32(11.0),
        Pt::from_f32(9.0),
    );
    let lines = wrap_to_width(
        &combined,
        FontStyle::Regular,
        body_size,
        value_cell.width - mm(2.0),
    );
    canvas.set_font(FontStyle::Regular, body_size);
    let mut line_y = top.y + mm(5.0);
    for line in lines.iter().take(3) {
        canvas.draw_string(value_cell.x + mm(1.0), line_y, line);
        line_y += mm(5.0);
    }

    cell(
        canvas,
        Rect::new(x2, top.y, mm(LABEL_W_MM), mm(GRID_ROW_MM)),
        "Date of Report",
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    cell(
        canvas,
        Rect::new(x2 + mm(LABEL_W_MM), top.y, mm(VALUE_W_MM), mm(GRID_ROW_MM)),
        &input.report_date,
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    let ulr_h = mm(15.0 - GRID_ROW_MM);
    cell(
        canvas,
        Rect::new(x2, top.y + mm(GRID_ROW_MM), mm(LABEL_W_MM), ulr_h),
        "ULR Number",
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    cell(
        canvas,
        Rect::new(x2 + mm(LABEL_W_MM), top.y + mm(GRID_ROW_MM), mm(VALUE_W_MM), ulr_h),
        &or_na(input.test_request.ulr_number.as_deref()),
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );

    let pair = |canvas: &mut Canvas,
                region: &mut Region,
                left_label: &str,
                left_value: &str,
                right_label: &str,
                right_value: &str,
                highlight_left: bool,
                highlight_right: bool| {
        let row = region.reserve(mm(GRID_ROW_MM));
        let cells = [
            (row.x, mm(LABEL_W_MM), left_label, true, false),
            (row.x + mm(LABEL_W_MM), mm(VALUE_W_MM), left_value, false, highlight_left),
            (x2, mm(LABEL_W_MM), right_label, true, false),
            (x2 + mm(LABEL_W_MM), mm(VALUE_W_MM), right_value, false, highlight_right),
        ];
        for (x, w, text, _is_label, highlight) in cells {
            let rect = Rect::new(x, row.y, w, row.height);
            if highlight {
                let size = fit_font_size(text, FontStyle::Regular, w, max, min);
                highlight_in_cell(canvas, rect, text, FontStyle::Regular, size);
            }
            cell(canvas, rect, text, FontStyle::Regular, max, min, HAlign::Left);
        }
    };

    let full = |canvas: &mut Canvas, region: &mut Region, label: &str, value: &str| {
        let row = region.reserve(mm(GRID_ROW_MM));
        cell(
            canvas,
            Rect::new(row.x, row.y, mm(LABEL_W_MM), row.height),
            label,
            FontStyle::Regular,
            max,
            min,
            HAlign::Left,
        );
        cell(
            canvas,
            Rect::new(
                row.x + mm(LABEL_W_MM),
                row.y,
                mm(BODY_W_MM - LABEL_W_MM),
                row.height,
            ),
            value,
            FontStyle::Regular,
            max,
            min,
            HAlign::Left,
        );
    };

    let sample = input.sample;
    let request = input.test_request;
    pair(
        canvas,
        region,
        "Reference Number",
        &or_na(sample.sample_code_number.as_deref()),
        "Job Code Number",
        &or_na(request.job_number.as_deref()),
        false,
        false,
    );
    full(
        canvas,
        region,
        "Location/Structure Type",
        &or_na(sample.location_nature.as_deref()),
    );

    // Age of Specimen renders as a split cell: highlighted count on the
    // left half, the word "Days" on the right.
    let row = region.reserve(mm(GRID_ROW_MM));
    cell(
        canvas,
        Rect::new(row.x, row.y, mm(LABEL_W_MM), row.height),
        "Date of Receipt",
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    cell(
        canvas,
        Rect::new(row.x + mm(LABEL_W_MM), row.y, mm(VALUE_W_MM), row.height),
        &fmt_date(request.receipt_date),
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    cell(
        canvas,
        Rect::new(x2, row.y, mm(LABEL_W_MM), row.height),
        "Age of Specimen",
        FontStyle::Regular,
        max,
        min,
        HAlign::Left,
    );
    let age_cell = Rect::new(x2 + mm(LABEL_W_MM), row.y, mm(VALUE_W_MM), row.height);
    match sample.age_in_days {
        Some(age) => {
            let half = age_cell.width / 2;
            let left_half = Rect::new(age_cell.x, age_cell.y, half, age_cell.height);
            let right_half = Rect::new(age_cell.x + half, age_cell.y, half, age_cell.height);
            let count = age.to_string();
            let size = fit_font_size(&count, FontStyle::Regular, half, max, min);
            highlight_in_cell(canvas, left_half, &count, FontStyle::Regular, size);
            cell(canvas, left_half, &count, FontStyle::Regular, max, min, HAlign::Left);
            cell(canvas, right_half, "Days", FontStyle::Regular, max, min, HAlign::Left);
        }
        None => {
            cell(
                canvas,
                age_cell,
                UNAVAILABLE_LABEL,
                FontStyle::Regular,
                max,
                min,
                HAlign::Left,
            );
        }
    }

    pair(
        canvas,
        region,
        "Date of Casting",
        &fmt_date(sample.casting_date),
        "Date of Testing",
        &fmt_date(sample.testing_date),
        true,
        false,
    );
    pair(
        canvas,
        region,
        "Type of Specimen",
        request.specimen_kind.label(),
        "Grade of Specimen",
        &or_na(sample.grade.as_deref()),
        false,
        true,
    );
    pair(
        canvas,
        region,
        "Condition of Specimen",
        sample.cube_condition.as_deref().unwrap_or("Acceptable"),
        "Curing Condition",
        sample.curing_condition.as_deref().unwrap_or(""),
        false,
        false,
    );
    full(
        canvas,
        region,
        "Machine used for Testing",
        sample
            .machine_used
            .as_deref()
            .unwrap_or(&input.defaults.default_machine),
    );
    pair(
        canvas,
        region,
        "Capacity Range",
        &input.defaults.capacity_range,
        "Calibration Due Date",
        &input.defaults.calibration_due,
        false,
        false,
    );
    pair(
        canvas,
        region,
        "Test Method",
        sample
            .test_method
            .as_deref()
            .unwrap_or(&input.defaults.default_test_method),
        "Environmental condition",
        &input.defaults.environmental_condition,
        false,
        false,
    );
}

// Column plan for the specimen description table, in mm.
const SR_W: f32 = 12.0;
const ID_W: f32 = 36.2;
const DIM_W: f32 = 54.3;
const AREA_W: f32 = BODY_W_MM * 0.12;
const WEIGHT_W: f32 = BODY_W_MM * 0.12;
const LOAD_W: f32 = BODY_W_MM - SR_W - ID_W - DIM_W - AREA_W - WEIGHT_W;

fn description_table(canvas: &mut Canvas, input: &ComposeInput, region: &mut Region, row_h: Pt) {
    let header = region.reserve(mm(12.0));
    let grade_w = mm(SR_W + ID_W);
    let grade_cell = Rect::new(header.x, header.y, grade_w, header.height);
    let grade_text = format!(
        "GRADE OF CONCRETE: {}",
        or_na(input.sample.grade.as_deref())
    );
    let grade_size = fit_font_size(
        &grade_text,
        FontStyle::Bold,
        grade_w,
        Pt::from_f32(9.0),
        Pt::from_f32(7.0),
    );
    canvas.stroke_rect(grade_cell);
    let text_w = text_width(&grade_text, FontStyle::Bold, grade_size);
    canvas.set_fill_color(palette::HIGHLIGHT_YELLOW);
    canvas.fill_rect(Rect::new(
        grade_cell.x + (grade_cell.width - text_w) / 2 - mm(1.0),
        header.y + mm(3.0),
        text_w + mm(2.0),
        mm(6.0),
    ));
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        grade_cell.x + grade_cell.width / 2,
        baseline(grade_cell, grade_size),
        &grade_text,
        FontStyle::Bold,
        grade_size,
        HAlign::Center,
    );
    cell(
        canvas,
        Rect::new(header.x + grade_w, header.y, mm(BODY_W_MM) - grade_w, header.height),
        "DESCRIPTION OF TEST SAMPLE",
        FontStyle::Bold,
        Pt::from_f32(9.0),
        Pt::from_f32(7.0),
        HAlign::Center,
    );

    let max = Pt::from_f32(10.0);
    let min = Pt::from_f32(8.0);
    let head = region.reserve(mm(GRID_ROW_MM));
    let mut x = head.x;
    for (w, label) in [
        (SR_W, "Sr. No."),
        (ID_W, "ID Mark"),
        (DIM_W, "Dimensions (mm) (L x B x H)"),
        (AREA_W, "Area (mm\u{b2})"),
        (WEIGHT_W, "Weight (kg)"),
        (LOAD_W, "Max Load (kN)"),
    ] {
        cell(
            canvas,
            Rect::new(x, head.y, mm(w), head.height),
            label,
            FontStyle::Bold,
            max,
            min,
            HAlign::Center,
        );
        x += mm(w);
    }

    for cube in input.cubes {
        let row = region.reserve(row_h);
        let dim_col = mm(DIM_W) / 3;
        let values = [
            (mm(SR_W), cube.serial.to_string()),
            (mm(ID_W), cube.display_mark()),
            (dim_col, cube.length.fmt_num(1)),
            (dim_col, cube.width.fmt_num(1)),
            (dim_col, cube.height.fmt_num(1)),
            (mm(AREA_W), cube.area.fmt_num(2)),
            (mm(WEIGHT_W), cube.weight.fmt_num(1)),
            (mm(LOAD_W), cube.crushing_load.fmt_num(1)),
        ];
        let mut x = row.x;
        for (w, value) in values {
            cell(
                canvas,
                Rect::new(x, row.y, w, row.height),
                &value,
                FontStyle::Regular,
                max,
                min,
                HAlign::Center,
            );
            x += w;
        }
    }
}

fn results_table(canvas: &mut Canvas, input: &ComposeInput, region: &mut Region, row_h: Pt) {
    let table_w = 140.0_f32;
    let table_x = mm((PAGE_W_MM - table_w) / 2.0);

    let title = "Test Result for Density and Compressive Strength of Concrete Cubes";
    let title_size = Pt::from_f32(10.0);
    let title_row = region.reserve(mm(6.0));
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        mm(PAGE_W_MM / 2.0),
        title_row.y + mm(4.0),
        title,
        FontStyle::Bold,
        title_size,
        HAlign::Center,
    );
    let title_w = text_width(title, FontStyle::Bold, title_size);
    canvas.set_line_width(Pt::from_f32(0.5));
    let underline_x = mm(PAGE_W_MM / 2.0) - title_w / 2;
    canvas.line(underline_x, title_row.bottom(), underline_x + title_w, title_row.bottom());
    canvas.set_line_width(Pt::from_f32(0.2));
    region.advance(mm(2.0));

    // Column plan, mm: Sr 18, ID 22, Density 25, Strength 40, Average 35.
    let widths = [18.0, 22.0, 25.0, 40.0, 35.0];
    let header = region.reserve(mm(12.0));
    let max = Pt::from_f32(10.0);
    let min = Pt::from_f32(7.0);
    let mut x = table_x;
    for (index, label) in ["Sr. No.", "ID Mark", "Density (kg/m\u{b3})"]
        .iter()
        .enumerate()
    {
        cell(
            canvas,
            Rect::new(x, header.y, mm(widths[index]), header.height),
            label,
            FontStyle::Regular,
            max,
            min,
            HAlign::Center,
        );
        x += mm(widths[index]);
    }
    for (width, lines) in [
        (widths[3], ["Compressive", "Strength (N/mm\u{b2})"]),
        (widths[4], ["Average Compressive", "Strength (N/mm\u{b2})"]),
    ] {
        let rect = Rect::new(x, header.y, mm(width), header.height);
        canvas.stroke_rect(rect);
        for (line_no, line) in lines.iter().enumerate() {
            let size = fit_font_size(line, FontStyle::Regular, rect.width, max, min);
            text_at(
                canvas,
                rect.x + rect.width / 2,
                rect.y + mm(5.0 + line_no as f32 * 4.0),
                line,
                FontStyle::Regular,
                size,
                HAlign::Center,
            );
        }
        x += mm(width);
    }

    let count = input.cubes.len().max(1);
    let average = match input.sample.average_strength {
        Some(value) => format!("{:.1}", value),
        None => "Pending Observation".to_string(),
    };

    let body_top = region.cursor();
    for cube in input.cubes {
        let row = region.reserve(row_h);
        let values = [
            cube.serial.to_string(),
            cube.display_mark(),
            cube.density.fmt_num(1),
            match cube.compressive_strength.measured() {
                Some(value) if *value > 0.0 => format!("{:.1}", value),
                _ => cube.compressive_strength.fmt_num(1),
            },
        ];
        let mut x = table_x;
        for (index, value) in values.iter().enumerate() {
            cell(
                canvas,
                Rect::new(x, row.y, mm(widths[index]), row.height),
                value,
                FontStyle::Regular,
                max,
                min,
                HAlign::Center,
            );
            x += mm(widths[index]);
        }
    }

    // Average strength spans all data rows as one merged, highlighted cell.
    let avg_x = table_x + mm(widths[0] + widths[1] + widths[2] + widths[3]);
    let avg_rect = Rect::new(avg_x, body_top, mm(widths[4]), row_h * count as i32);
    let avg_size = Pt::from_f32(12.0);
    let avg_w = text_width(&average, FontStyle::Bold, avg_size);
    canvas.set_fill_color(palette::HIGHLIGHT_YELLOW);
    canvas.fill_rect(Rect::new(
        avg_rect.x + (avg_rect.width - avg_w) / 2 - mm(3.0),
        avg_rect.y + (avg_rect.height - mm(6.0)) / 2,
        avg_w + mm(6.0),
        mm(6.0),
    ));
    canvas.set_fill_color(Color::BLACK);
    cell(
        canvas,
        avg_rect,
        &average,
        FontStyle::Bold,
        avg_size,
        Pt::from_f32(8.0),
        HAlign::Center,
    );
}

fn terms_section(canvas: &mut Canvas, input: &ComposeInput, region: &mut Region) {
    let heading = region.reserve(mm(4.0));
    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        heading.x,
        heading.bottom(),
        "Terms & Conditions :-",
        FontStyle::Bold,
        Pt::from_f32(11.0),
        HAlign::Left,
    );
    region.advance(mm(2.0));

    let size = Pt::from_f32(10.0);
    for term in &input.defaults.terms {
        for line in wrap_to_width(term, FontStyle::Regular, size, mm(BODY_W_MM)) {
            if region.needs_break(mm(4.0)) {
                return;
            }
            let row = region.reserve(mm(4.0));
            text_at(canvas, row.x, row.bottom(), &line, FontStyle::Regular, size, HAlign::Left);
        }
        region.advance(mm(0.5));
    }
}

/// Photo cells shrink from the form's 50 mm once the annexure grid would
/// otherwise collide with the formula and witness blocks below it.
pub fn photo_cell_height(count: usize) -> Pt {
    let available = 127.0_f32;
    mm((available / count.max(1) as f32).min(50.0))
}

fn page_two(canvas: &mut Canvas, input: &ComposeInput) {
    page_header(canvas, input, "ANNEXURE - I", false);
    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(Pt::from_f32(0.2));
    canvas.set_fill_color(Color::BLACK);

    let table_x = mm(15.0);
    let table_y = mm(45.0);
    let cell_w = mm(60.0);
    let header_h = mm(12.0);
    let caption_h = mm(6.0);
    let count = input.cubes.len().max(1);
    let cell_h = photo_cell_height(count);
    let grid_h = header_h + cell_h * count as i32 + caption_h;

    canvas.stroke_rect(Rect::new(table_x, table_y, cell_w * 3, grid_h));

    canvas.set_font(FontStyle::Bold, Pt::from_f32(10.0));
    for (col, slot) in PhotoSlot::ALL.into_iter().enumerate() {
        let center = table_x + cell_w * col as i32 + cell_w / 2;
        let [first, second] = slot.header_lines();
        text_at(
            canvas,
            center,
            table_y + mm(4.0),
            first,
            FontStyle::Bold,
            Pt::from_f32(10.0),
            HAlign::Center,
        );
        text_at(
            canvas,
            center,
            table_y + mm(8.0),
            second,
            FontStyle::Bold,
            Pt::from_f32(10.0),
            HAlign::Center,
        );
    }

    let caption_top = table_y + header_h + cell_h * count as i32;
    canvas.line(table_x, table_y + header_h, table_x + cell_w * 3, table_y + header_h);
    // Column rules stop above the caption row, which spans all three.
    canvas.line(table_x + cell_w, table_y, table_x + cell_w, caption_top);
    canvas.line(table_x + cell_w * 2, table_y, table_x + cell_w * 2, caption_top);
    for row in 1..=count {
        let y = table_y + header_h + cell_h * row as i32;
        canvas.line(table_x, y, table_x + cell_w * 3, y);
    }

    for row in 0..count {
        let specimen = row as u32 + 1;
        for (col, slot) in PhotoSlot::ALL.into_iter().enumerate() {
            let cell_origin_x = table_x + cell_w * col as i32;
            let cell_origin_y = table_y + header_h + cell_h * row as i32;
            match input.photo_ids.get(&(specimen, slot)) {
                Some(id) => {
                    let image_rect = Rect::new(
                        cell_origin_x + mm(2.0),
                        cell_origin_y,
                        cell_w - mm(4.0),
                        cell_h - mm(2.0),
                    );
                    canvas.draw_image(image_rect, id.clone());
                }
                None => {
                    let center_x = cell_origin_x + cell_w / 2;
                    let mid_y = cell_origin_y + cell_h / 2;
                    let size = Pt::from_f32(9.0);
                    text_at(
                        canvas,
                        center_x,
                        mid_y - mm(4.0),
                        &format!("Cube {}", specimen),
                        FontStyle::Regular,
                        size,
                        HAlign::Center,
                    );
                    text_at(
                        canvas,
                        center_x,
                        mid_y + mm(1.0),
                        slot.slot_name(),
                        FontStyle::Regular,
                        size,
                        HAlign::Center,
                    );
                    text_at(
                        canvas,
                        center_x,
                        mid_y + mm(6.0),
                        "Missing",
                        FontStyle::Regular,
                        size,
                        HAlign::Center,
                    );
                }
            }
        }
    }

    text_at(
        canvas,
        table_x + cell_w * 3 / 2,
        caption_top + mm(4.0),
        "Fig 1 - Pictorial view of Failure Pattern of Concrete Cube with Digital Readings",
        FontStyle::Bold,
        Pt::from_f32(10.0),
        HAlign::Center,
    );

    formula_box(canvas, caption_top + caption_h + mm(8.0));

    let witness_y = caption_top + caption_h + mm(8.0 + 22.0 + 30.0);
    canvas.set_fill_color(palette::WITNESS_BLUE);
    let witness = "TEST WITNESSED:";
    let witness_size = Pt::from_f32(12.0);
    text_at(canvas, mm(15.0), witness_y, witness, FontStyle::Bold, witness_size, HAlign::Left);
    canvas.set_stroke_color(palette::WITNESS_BLUE);
    canvas.set_line_width(Pt::from_f32(0.5));
    let witness_w = text_width(witness, FontStyle::Bold, witness_size);
    canvas.line(mm(15.0), witness_y + mm(1.0), mm(15.0) + witness_w, witness_y + mm(1.0));
    canvas.set_stroke_color(Color::BLACK);
    canvas.set_fill_color(Color::BLACK);

    page_footer(canvas, input, 2, 270.0);
    canvas.show_page();
}

/// The P over L x B fraction box under the annexure grid.
fn formula_box(canvas: &mut Canvas, top: Pt) {
    let x = mm(15.0);
    let rect = Rect::new(x, top, mm(130.0), mm(22.0));
    canvas.set_line_width(Pt::from_f32(0.5));
    canvas.stroke_rect(rect);
    canvas.set_line_width(Pt::from_f32(0.2));

    canvas.set_fill_color(Color::BLACK);
    text_at(
        canvas,
        x + mm(5.0),
        top + mm(12.0),
        "Compressive Strength =",
        FontStyle::Bold,
        Pt::from_f32(12.0),
        HAlign::Left,
    );
    text_at(
        canvas,
        x + mm(59.0),
        top + mm(8.0),
        "P",
        FontStyle::Regular,
        Pt::from_f32(12.0),
        HAlign::Left,
    );
    text_at(
        canvas,
        x + mm(58.0),
        top + mm(17.0),
        "LB",
        FontStyle::Regular,
        Pt::from_f32(12.0),
        HAlign::Left,
    );
    canvas.line(x + mm(55.0), top + mm(11.0), x + mm(64.0), top + mm(11.0));
    text_at(
        canvas,
        x + mm(70.0),
        top + mm(13.0),
        "=",
        FontStyle::Bold,
        Pt::from_f32(12.0),
        HAlign::Left,
    );
    text_at(
        canvas,
        x + mm(82.0),
        top + mm(8.0),
        "Peak Load (N)",
        FontStyle::Regular,
        Pt::from_f32(11.0),
        HAlign::Left,
    );
    text_at(
        canvas,
        x + mm(81.0),
        top + mm(17.0),
        "Surface Area (mm\u{b2})",
        FontStyle::Regular,
        Pt::from_f32(11.0),
        HAlign::Left,
    );
    canvas.line(x + mm(78.0), top + mm(11.0), x + mm(110.0), top + mm(11.0));
}

// Fixed checklist of the observations page; verdicts come from the sample's
// checklist slots and default to "--".
const CHECKLIST: [&str; 6] = [
    "Compressive Strength acquired after specified duration",
    "Individual test results within \u{b1}15% of average strength",
    "Weight of cube",
    "Type of failure Pattern as per IS 516(Part-1/Sec-1): - 2021 Fig 1",
    "Bonding between Aggregates and cement paste.",
    "Compressive Strength as per acceptance criteria as C1,16.1 of IS 456:2000 (Fck+4) From Table No.11",
];

fn page_three(canvas: &mut Canvas, input: &ComposeInput) {
    page_header(canvas, input, "Observations", false);
    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(Pt::from_f32(0.2));
    canvas.set_fill_color(Color::BLACK);

    let table_x = mm(15.0);
    let table_y = mm(45.0);
    let table_w = mm(180.0);
    let col1 = mm(15.0);
    let col2 = mm(125.0);
    let col3 = mm(40.0);
    let row_h = mm(6.0);
    let last_row_h = mm(9.0);
    let total_h = row_h * 5 + last_row_h;

    canvas.stroke_rect(Rect::new(table_x, table_y, table_w, total_h));
    canvas.line(table_x + col1, table_y, table_x + col1, table_y + total_h);
    canvas.line(table_x + col1 + col2, table_y, table_x + col1 + col2, table_y + total_h);
    for row in 1..6 {
        let y = table_y + row_h * row;
        canvas.line(table_x, y, table_x + table_w, y);
    }

    let checklist = &input.sample.observations;
    let verdicts = [
        checklist.strength_duration.as_deref(),
        checklist.results_within_spread.as_deref(),
        checklist.cube_weight.as_deref(),
        checklist.failure_pattern.as_deref(),
        checklist.bonding.as_deref(),
        checklist.acceptance_criteria.as_deref(),
    ];

    let size = Pt::from_f32(11.0);
    canvas.set_font(FontStyle::Regular, size);
    for (index, description) in CHECKLIST.iter().enumerate() {
        let height = if index == 5 { last_row_h } else { row_h };
        let top = table_y + row_h * index as i32;
        let mid = top + height / 2 + size * 0.35;

        text_at(canvas, table_x + mm(7.0), mid, &format!("{}.", index + 1), FontStyle::Regular, size, HAlign::Left);

        let lines = wrap_to_width(description, FontStyle::Regular, size, col2 - mm(6.0));
        if lines.len() > 1 {
            text_at(canvas, table_x + col1 + mm(3.0), mid - mm(1.0), &lines[0], FontStyle::Regular, size, HAlign::Left);
            text_at(canvas, table_x + col1 + mm(3.0), mid + mm(2.5), &lines[1], FontStyle::Regular, size, HAlign::Left);
        } else {
            text_at(canvas, table_x + col1 + mm(3.0), mid, description, FontStyle::Regular, size, HAlign::Left);
        }

        let verdict = match verdicts[index] {
            Some(text) if !text.trim().is_empty() => text,
            _ => "--",
        };
        text_at(
            canvas,
            table_x + col1 + col2 + col3 / 2,
            mid,
            verdict,
            FontStyle::Regular,
            size,
            HAlign::Center,
        );
    }

    let graph_top = table_y + row_h * 6 + mm(12.0);
    match (&input.chart, &input.chart_id) {
        (Some(chart), Some(id)) => {
            let frame = Rect::new(mm(40.0), graph_top, mm(130.0), mm(70.0));
            canvas.set_line_width(Pt::from_f32(0.5));
            canvas.stroke_rect(frame);
            canvas.set_line_width(Pt::from_f32(0.2));
            let plate = Rect::new(
                frame.x + mm(6.0),
                frame.y + mm(1.0),
                mm(120.0),
                frame.height - mm(2.0),
            );
            canvas.draw_image(plate, id.clone());
            for label in &chart.labels {
                canvas.set_fill_color(label.color);
                let style = if label.bold {
                    FontStyle::Bold
                } else {
                    FontStyle::Regular
                };
                text_at(
                    canvas,
                    plate.x + plate.width * label.x_frac,
                    plate.y + plate.height * label.y_frac,
                    &label.text,
                    style,
                    Pt::from_f32(label.size),
                    label.align,
                );
            }
            canvas.set_fill_color(Color::BLACK);
            text_at(
                canvas,
                mm(40.0),
                graph_top + mm(75.0),
                "Fig. 2 - Graphical Representation of Comparison of Compressive Strengths",
                FontStyle::Bold,
                Pt::from_f32(10.0),
                HAlign::Left,
            );
        }
        _ => {
            text_at(
                canvas,
                mm(PAGE_W_MM / 2.0),
                graph_top + mm(40.0),
                "No strength data available for graph",
                FontStyle::Regular,
                Pt::from_f32(12.0),
                HAlign::Center,
            );
        }
    }

    signature_block(
        canvas,
        input,
        (graph_top + mm(100.0)).to_mm_f32(),
        Pt::from_f32(11.0),
    );

    end_marker(canvas, "END OF OBSERVATIONS");
    page_footer(canvas, input, 3, 270.0);
    canvas.show_page();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_rows_stay_natural_up_to_seven() {
        assert_eq!(evidence_row_height(1), mm(4.0));
        assert_eq!(evidence_row_height(7), mm(4.0));
        assert!(evidence_row_height(10) < mm(4.0));
    }

    #[test]
    fn evidence_tables_hold_their_budget_for_any_count() {
        for count in [1_usize, 7, 13, 30, 60] {
            let total = evidence_row_height(count) * (2 * count as i32);
            assert!(total <= mm(56.01), "count {}", count);
        }
    }

    #[test]
    fn photo_cells_compress_past_two_specimens() {
        assert_eq!(photo_cell_height(1), mm(50.0));
        assert_eq!(photo_cell_height(2), mm(50.0));
        assert!(photo_cell_height(3) < mm(50.0));
        for count in [7_usize, 12, 30] {
            assert!(
                photo_cell_height(count) * count as i32 <= mm(127.01),
                "count {}",
                count
            );
        }
    }

    #[test]
    fn description_columns_fill_the_body_width() {
        let total = SR_W + ID_W + DIM_W + AREA_W + WEIGHT_W + LOAD_W;
        assert!((total - BODY_W_MM).abs() < 0.01);
    }
}
