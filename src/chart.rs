use image::RgbImage;
use tiny_skia::{Paint, Pixmap, Rect as SkRect, Transform};

use crate::canvas::EncodedImage;
use crate::error::ReportError;
use crate::model::StrengthSeries;
use crate::photo;
use crate::types::Color;

/// Raster resolution of the chart plate. The plate is placed at 130x70 mm,
/// so this renders at 10 px/mm.
const CHART_W: u32 = 1300;
const CHART_H: u32 = 700;

// Plot frame as fractions of the whole plate. The margins stay white in the
// raster; tick and category labels are overlaid there as vector text.
const PLOT_LEFT: f32 = 0.10;
const PLOT_RIGHT: f32 = 0.975;
const PLOT_TOP: f32 = 0.12;
const PLOT_BOTTOM: f32 = 0.84;

// Data-space x axis. Categories sit at 0.0, 0.6 and 1.2 with symmetric
// margins, the spacing the lab's earlier chart plots used.
const CATEGORY_X: [f32; 3] = [0.0, 0.6, 1.2];
const X_MIN: f32 = -0.35;
const X_MAX: f32 = 1.55;
const BAR_WIDTH: f32 = 0.15;
const BAR_OFFSET: f32 = 0.085;

const Y_TICK_STEP: f32 = 5.0;
const Y_AXIS_FLOOR: f32 = 35.0;

const REQUIRED_COLOR: Color = Color {
    r: 70.0 / 255.0,
    g: 130.0 / 255.0,
    b: 180.0 / 255.0,
};
const ACTUAL_COLOR: Color = Color {
    r: 1.0,
    g: 165.0 / 255.0,
    b: 0.0,
};
const GRID_COLOR: Color = Color {
    r: 0.85,
    g: 0.85,
    b: 0.85,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Text placed over the chart plate by the page composer. Positions are
/// fractions of the plate rectangle, top-left origin, `y_frac` at the text
/// baseline.
#[derive(Debug, Clone)]
pub struct OverlayLabel {
    pub x_frac: f32,
    pub y_frac: f32,
    pub text: String,
    pub size: f32,
    pub bold: bool,
    pub color: Color,
    pub align: HAlign,
}

pub struct StrengthChart {
    pub raster: EncodedImage,
    pub labels: Vec<OverlayLabel>,
}

/// Renders the required-vs-actual strength comparison. Missing values plot
/// as zero-height bars and get no value label; the chart never fails on
/// missing data, only on raster allocation or encode problems, which abort
/// the whole generation call.
pub fn render_strength_chart(series: &StrengthSeries) -> Result<StrengthChart, ReportError> {
    let axis_max = axis_max(series);
    let mut pixmap = Pixmap::new(CHART_W, CHART_H)
        .ok_or_else(|| ReportError::Render("chart pixmap allocation failed".to_string()))?;
    pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

    // Gridlines, one per tick, drawn under the bars.
    let tick_count = (axis_max / Y_TICK_STEP).round() as u32;
    for tick in 1..=tick_count {
        let y = y_frac(tick as f32 * Y_TICK_STEP, axis_max);
        fill_frac_rect(
            &mut pixmap,
            PLOT_LEFT,
            y - 0.001,
            PLOT_RIGHT - PLOT_LEFT,
            0.002,
            GRID_COLOR,
        );
    }

    for (index, center) in CATEGORY_X.iter().enumerate() {
        let required = series.required()[index].unwrap_or(0.0).max(0.0) as f32;
        let actual = series.actual()[index].unwrap_or(0.0).max(0.0) as f32;
        draw_bar(&mut pixmap, center - BAR_OFFSET, required, axis_max, REQUIRED_COLOR);
        draw_bar(&mut pixmap, center + BAR_OFFSET, actual, axis_max, ACTUAL_COLOR);
    }

    draw_frame(&mut pixmap);
    draw_legend_swatches(&mut pixmap);

    let raster = photo::encode_rgb(rgb_from_pixmap(&pixmap))
        .ok_or_else(|| ReportError::Render("chart raster encode failed".to_string()))?;
    Ok(StrengthChart {
        raster,
        labels: build_labels(series, axis_max),
    })
}

fn axis_max(series: &StrengthSeries) -> f32 {
    let data_max = (series.max_value() * 1.1) as f32;
    let raw = data_max.max(Y_AXIS_FLOOR);
    // Round up to the next tick so the top gridline closes the scale.
    (raw / Y_TICK_STEP).ceil() * Y_TICK_STEP
}

fn x_frac(data_x: f32) -> f32 {
    PLOT_LEFT + (data_x - X_MIN) / (X_MAX - X_MIN) * (PLOT_RIGHT - PLOT_LEFT)
}

fn y_frac(value: f32, axis_max: f32) -> f32 {
    PLOT_BOTTOM - (value / axis_max).clamp(0.0, 1.0) * (PLOT_BOTTOM - PLOT_TOP)
}

fn draw_bar(pixmap: &mut Pixmap, center_x: f32, value: f32, axis_max: f32, color: Color) {
    if value <= 0.0 {
        return;
    }
    let left = x_frac(center_x - BAR_WIDTH / 2.0);
    let right = x_frac(center_x + BAR_WIDTH / 2.0);
    let top = y_frac(value, axis_max);
    fill_frac_rect(pixmap, left, top, right - left, PLOT_BOTTOM - top, color);
}

fn draw_frame(pixmap: &mut Pixmap) {
    let thickness = 0.0025;
    let width = PLOT_RIGHT - PLOT_LEFT;
    let height = PLOT_BOTTOM - PLOT_TOP;
    fill_frac_rect(pixmap, PLOT_LEFT, PLOT_TOP, width, thickness, Color::BLACK);
    fill_frac_rect(pixmap, PLOT_LEFT, PLOT_BOTTOM - thickness, width, thickness, Color::BLACK);
    fill_frac_rect(pixmap, PLOT_LEFT, PLOT_TOP, thickness * 0.55, height, Color::BLACK);
    fill_frac_rect(
        pixmap,
        PLOT_RIGHT - thickness * 0.55,
        PLOT_TOP,
        thickness * 0.55,
        height,
        Color::BLACK,
    );
}

// Legend swatch geometry, shared with the overlay labels below.
const LEGEND_X: f32 = 0.705;
const LEGEND_Y: [f32; 2] = [0.155, 0.205];
const LEGEND_SWATCH_W: f32 = 0.028;
const LEGEND_SWATCH_H: f32 = 0.03;

fn draw_legend_swatches(pixmap: &mut Pixmap) {
    for (row, color) in [REQUIRED_COLOR, ACTUAL_COLOR].into_iter().enumerate() {
        fill_frac_rect(
            pixmap,
            LEGEND_X,
            LEGEND_Y[row] - LEGEND_SWATCH_H / 2.0,
            LEGEND_SWATCH_W,
            LEGEND_SWATCH_H,
            color,
        );
    }
}

fn fill_frac_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color) {
    let Some(rect) = SkRect::from_xywh(
        x * CHART_W as f32,
        y * CHART_H as f32,
        (w * CHART_W as f32).max(1.0),
        (h * CHART_H as f32).max(1.0),
    ) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::from_rgba(color.r, color.g, color.b, 1.0).unwrap_or(
        tiny_skia::Color::BLACK,
    ));
    paint.anti_alias = false;
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}

fn rgb_from_pixmap(pixmap: &Pixmap) -> RgbImage {
    // The plate is fully opaque, so premultiplied RGBA collapses to RGB.
    let mut rgb = Vec::with_capacity((CHART_W * CHART_H * 3) as usize);
    for pixel in pixmap.pixels() {
        rgb.push(pixel.red());
        rgb.push(pixel.green());
        rgb.push(pixel.blue());
    }
    RgbImage::from_raw(CHART_W, CHART_H, rgb).unwrap_or_else(|| {
        RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]))
    })
}

fn build_labels(series: &StrengthSeries, axis_max: f32) -> Vec<OverlayLabel> {
    let mut labels = Vec::new();

    labels.push(OverlayLabel {
        x_frac: (PLOT_LEFT + PLOT_RIGHT) / 2.0,
        y_frac: 0.075,
        text: "Comparison of Required and Actual Strength".to_string(),
        size: 10.0,
        bold: true,
        color: Color::BLACK,
        align: HAlign::Center,
    });

    // y tick labels, right-aligned against the plot frame.
    let tick_count = (axis_max / Y_TICK_STEP).round() as u32;
    for tick in 0..=tick_count {
        let value = tick as f32 * Y_TICK_STEP;
        labels.push(OverlayLabel {
            x_frac: PLOT_LEFT - 0.012,
            y_frac: y_frac(value, axis_max) + 0.012,
            text: format!("{}", value as u32),
            size: 6.5,
            bold: false,
            color: Color::BLACK,
            align: HAlign::Right,
        });
    }

    for (index, name) in ["7 Days", "14 Days", "28 Days"].iter().enumerate() {
        labels.push(OverlayLabel {
            x_frac: x_frac(CATEGORY_X[index]),
            y_frac: PLOT_BOTTOM + 0.055,
            text: (*name).to_string(),
            size: 7.5,
            bold: false,
            color: Color::BLACK,
            align: HAlign::Center,
        });
    }

    labels.push(OverlayLabel {
        x_frac: (PLOT_LEFT + PLOT_RIGHT) / 2.0,
        y_frac: PLOT_BOTTOM + 0.125,
        text: "Age of Specimen".to_string(),
        size: 8.0,
        bold: false,
        color: Color::BLACK,
        align: HAlign::Center,
    });

    // Value labels ride just above each bar; zero-height bars get none.
    for (index, center) in CATEGORY_X.iter().enumerate() {
        for (value, offset) in [
            (series.required()[index], -BAR_OFFSET),
            (series.actual()[index], BAR_OFFSET),
        ] {
            let Some(value) = value else { continue };
            if value <= 0.0 {
                continue;
            }
            labels.push(OverlayLabel {
                x_frac: x_frac(center + offset),
                y_frac: y_frac(value as f32, axis_max) - 0.015,
                text: format!("{:.1}", value),
                size: 6.5,
                bold: false,
                color: Color::BLACK,
                align: HAlign::Center,
            });
        }
    }

    for (row, name) in ["Required Strength", "Actual Strength"].iter().enumerate() {
        labels.push(OverlayLabel {
            x_frac: LEGEND_X + LEGEND_SWATCH_W + 0.01,
            y_frac: LEGEND_Y[row] + 0.012,
            text: (*name).to_string(),
            size: 7.0,
            bold: false,
            color: Color::BLACK,
            align: HAlign::Left,
        });
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_series() -> StrengthSeries {
        StrengthSeries {
            required_7: Some(16.2),
            required_14: Some(22.5),
            required_28: Some(25.0),
            actual_7: Some(17.8),
            actual_14: Some(24.1),
            actual_28: Some(27.6),
        }
    }

    #[test]
    fn axis_floor_holds_for_small_values() {
        let series = StrengthSeries {
            actual_28: Some(10.0),
            ..StrengthSeries::default()
        };
        assert_eq!(axis_max(&series), 35.0);
    }

    #[test]
    fn axis_expands_and_rounds_to_tick() {
        let series = StrengthSeries {
            actual_28: Some(60.0),
            ..StrengthSeries::default()
        };
        // 60 * 1.1 = 66, rounded up to the next multiple of 5.
        assert_eq!(axis_max(&series), 70.0);
    }

    #[test]
    fn empty_series_still_renders() {
        let chart = render_strength_chart(&StrengthSeries::default()).expect("chart");
        assert_eq!(chart.raster.width, CHART_W);
        assert_eq!(chart.raster.height, CHART_H);
        // Title, 8 ticks (0..=35), 3 categories, axis caption, legend; no
        // value labels for an empty series.
        assert!(!chart.labels.iter().any(|label| label.text == "0.0"));
        assert!(chart.labels.iter().any(|label| label.text == "28 Days"));
    }

    #[test]
    fn value_labels_follow_measured_bars_only() {
        let series = StrengthSeries {
            required_28: Some(25.0),
            actual_28: Some(0.0),
            ..full_series()
        };
        let chart = render_strength_chart(&series).expect("chart");
        assert!(chart.labels.iter().any(|label| label.text == "25.0"));
        // A zero actual bar is suppressed even though the value is present.
        let zero_labels = chart
            .labels
            .iter()
            .filter(|label| label.text == "0.0")
            .count();
        assert_eq!(zero_labels, 0);
    }
}
