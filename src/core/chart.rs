// Chart rendering.
//
// Each figure is drawn onto its own `Canvas`, which owns the pixel buffer and
// is dropped when the render call returns. Output is PNG bytes at 150 DPI.
use crate::domain::model::{GroupedSummary, TimeSeries};
use crate::utils::error::RenderError;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
use once_cell::sync::OnceCell;
use plotters::coord::Shift;
use plotters::element::DashedPathElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle, FontTransform};
use std::ops::Range;
use std::path::PathBuf;

pub const DPI: u32 = 150;
/// 10 x 4 inches.
pub const TIMESERIES_SIZE: (u32, u32) = (10 * DPI, 4 * DPI);
/// 8 x 4 inches.
pub const BAR_SIZE: (u32, u32) = (8 * DPI, 4 * DPI);
/// 8 x 3 inches.
pub const PLACEHOLDER_SIZE: (u32, u32) = (8 * DPI, 3 * DPI);

pub const NO_TIMESERIES: &str = "No time series data";
pub const NO_DATA: &str = "No data";

/// Environment variable naming a TrueType font for chart text.
pub const FONT_ENV: &str = "REPORT_CHART_FONT";

const FONT: &str = "sans-serif";
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const SERIES_COLOR: RGBColor = RGBColor(31, 119, 180);
/// Upper bound on gridlines per axis.
const GRID_LINES: usize = 10;

type DrawResult = Result<(), Box<dyn std::error::Error>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

static FONT_READY: OnceCell<bool> = OnceCell::new();

/// Register a font for chart text. The first call wins; later calls return
/// the cached outcome.
///
/// Candidates are tried in order: `preferred`, `$REPORT_CHART_FONT`, then a
/// list of common system locations.
pub fn install_font(preferred: Option<&str>) -> bool {
    *FONT_READY.get_or_init(|| {
        let candidates = preferred
            .map(PathBuf::from)
            .into_iter()
            .chain(std::env::var_os(FONT_ENV).map(PathBuf::from))
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // The font registry keeps a 'static reference for the whole process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT, FontStyle::Normal, bytes) {
                Ok(()) => {
                    tracing::debug!("Using chart font {}", path.display());
                    return true;
                }
                Err(_) => tracing::warn!("Ignoring font {}: not a usable TrueType font", path.display()),
            }
        }
        tracing::warn!("No usable TrueType font found; charts will be drawn without text");
        false
    })
}

/// Whether a figure is drawn with its titles and labels or as shapes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Full,
    Bare,
}

/// One figure's RGB pixel buffer.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new((width, height): (u32, u32)) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; (width * height * 3) as usize],
        }
    }

    fn paint<F>(&mut self, draw: F) -> DrawResult
    where
        F: FnOnce(&Area<'_>) -> DrawResult,
    {
        let root = BitMapBackend::with_buffer(&mut self.pixels, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
        Ok(())
    }

    /// Draw with text first; if text cannot be drawn, redraw without it.
    pub fn paint_with_fallback<F>(&mut self, draw: F) -> Result<(), RenderError>
    where
        F: Fn(&Area<'_>, TextMode) -> DrawResult,
    {
        if let Err(e) = self.paint(|area| draw(area, TextMode::Full)) {
            tracing::debug!("Chart text unavailable ({}), drawing without labels", e);
            self.paint(|area| draw(area, TextMode::Bare))
                .map_err(|e| RenderError::Chart {
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    pub fn into_png(self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(
            &self.pixels,
            self.width,
            self.height,
            ColorType::Rgb8,
        )?;
        Ok(out)
    }
}

/// Padded y range that always includes zero.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max - min < f64::EPSILON {
        return (min, min + 1.0);
    }
    let pad = (max - min) * 0.1;
    (if min < 0.0 { min - pad } else { min }, max + pad)
}

/// Light dashed gridlines across the plot rectangle at the given pixel
/// columns and rows.
fn draw_dashed_grid(area: &Area<'_>, plot: (Range<i32>, Range<i32>), xs: &[i32], ys: &[i32]) -> DrawResult {
    let (x_range, y_range) = plot;
    let style = BLACK.mix(0.2).stroke_width(1);
    for &y in ys {
        area.draw(&DashedPathElement::new(
            vec![(x_range.start, y), (x_range.end, y)],
            6,
            4,
            style,
        ))?;
    }
    for &x in xs {
        area.draw(&DashedPathElement::new(
            vec![(x, y_range.start), (x, y_range.end)],
            6,
            4,
            style,
        ))?;
    }
    Ok(())
}

fn draw_message(area: &Area<'_>, message: &str, title: Option<&str>, text: TextMode) -> DrawResult {
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);

    // The bar placeholder keeps its axes frame; the time-series one hides it.
    if let Some(title) = title {
        area.draw(&Rectangle::new(
            [(w / 10, h / 8), (w - w / 20, h - h / 8)],
            BLACK.stroke_width(1),
        ))?;
        if text == TextMode::Full {
            let style = TextStyle::from((FONT, 24).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
            area.draw(&Text::new(title.to_string(), (w / 2, h / 40), style))?;
        }
    }
    if text == TextMode::Full {
        let style = TextStyle::from((FONT, 24).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        area.draw(&Text::new(message.to_string(), (w / 2, h / 2), style))?;
    }
    Ok(())
}

fn draw_timeseries(area: &Area<'_>, series: &TimeSeries, title: &str, text: TextMode) -> DrawResult {
    let labels: Vec<String> = series
        .points
        .iter()
        .map(|(ts, _)| ts.format(series.frequency.label_format()).to_string())
        .collect();
    let points: Vec<(i32, f64)> = series
        .points
        .iter()
        .enumerate()
        .map(|(i, (_, v))| (i as i32, *v))
        .collect();
    let (lo, hi) = value_range(points.iter().map(|(_, v)| *v));
    let last = (points.len() as i32 - 1).max(1);

    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if text == TextMode::Full {
        builder
            .caption(title, (FONT, 28))
            .x_label_area_size(120)
            .y_label_area_size(90);
    }
    let mut chart = builder.build_cartesian_2d(0..last, lo..hi)?;

    if text == TextMode::Full {
        let formatter = |x: &i32| {
            usize::try_from(*x)
                .ok()
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_labels(labels.len().min(15))
            .x_label_formatter(&formatter)
            .x_label_style((FONT, 16).into_font().transform(FontTransform::Rotate90))
            .y_label_style((FONT, 16))
            .x_desc("Date")
            .y_desc("Value")
            .axis_desc_style((FONT, 18))
            .disable_mesh()
            .draw()?;
    }

    let step = (points.len() / GRID_LINES).max(1);
    let xs: Vec<i32> = (0..points.len())
        .step_by(step)
        .map(|i| chart.backend_coord(&(i as i32, lo)).0)
        .collect();
    let ys: Vec<i32> = chart
        .as_coord_spec()
        .y_spec()
        .key_points(GRID_LINES)
        .into_iter()
        .map(|y| chart.backend_coord(&(0, y)).1)
        .collect();
    draw_dashed_grid(area, chart.plotting_area().get_pixel_range(), &xs, &ys)?;

    chart.draw_series(LineSeries::new(points.iter().copied(), SERIES_COLOR.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, SERIES_COLOR.filled())))?;
    Ok(())
}

fn draw_bar(area: &Area<'_>, grouped: &GroupedSummary, title: &str, text: TextMode) -> DrawResult {
    let keys: Vec<String> = grouped.rows.iter().map(|r| r.key.clone()).collect();
    let n = keys.len() as u32;
    let (lo, hi) = value_range(grouped.rows.iter().map(|r| r.sum));

    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if text == TextMode::Full {
        builder
            .caption(title, (FONT, 28))
            .x_label_area_size(140)
            .y_label_area_size(90);
    }
    let mut chart = builder.build_cartesian_2d((0u32..n).into_segmented(), lo..hi)?;

    if text == TextMode::Full {
        let formatter = |v: &SegmentValue<u32>| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                keys.get(*i as usize).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(keys.len())
            .x_label_formatter(&formatter)
            .x_label_style((FONT, 16).into_font().transform(FontTransform::Rotate90))
            .y_label_style((FONT, 16))
            .y_desc("Sum")
            .axis_desc_style((FONT, 18))
            .draw()?;
    }

    let ys: Vec<i32> = chart
        .as_coord_spec()
        .y_spec()
        .key_points(GRID_LINES)
        .into_iter()
        .map(|y| chart.backend_coord(&(SegmentValue::Exact(0), y)).1)
        .collect();
    draw_dashed_grid(area, chart.plotting_area().get_pixel_range(), &[], &ys)?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(SERIES_COLOR.filled())
            .margin(8)
            .data(grouped.rows.iter().enumerate().map(|(i, r)| (i as u32, r.sum))),
    )?;
    Ok(())
}

/// Line chart of the series, or a "No time series data" placeholder.
pub fn render_timeseries(series: &TimeSeries, title: &str) -> Result<Vec<u8>, RenderError> {
    if series.is_empty() {
        let mut canvas = Canvas::new(PLACEHOLDER_SIZE);
        canvas.paint_with_fallback(|area, text| draw_message(area, NO_TIMESERIES, None, text))?;
        return canvas.into_png();
    }
    let mut canvas = Canvas::new(TIMESERIES_SIZE);
    canvas.paint_with_fallback(|area, text| draw_timeseries(area, series, title, text))?;
    canvas.into_png()
}

/// Bar chart of group sums, or a framed "No data" placeholder.
pub fn render_bar(grouped: &GroupedSummary, title: &str) -> Result<Vec<u8>, RenderError> {
    let mut canvas = Canvas::new(BAR_SIZE);
    if grouped.is_empty() {
        canvas.paint_with_fallback(|area, text| draw_message(area, NO_DATA, Some(title), text))?;
    } else {
        canvas.paint_with_fallback(|area, text| draw_bar(area, grouped, title, text))?;
    }
    canvas.into_png()
}
