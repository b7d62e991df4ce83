//! Chart Plotter Module
//! Single-panel drawing primitives built on plotters: bars, lines,
//! histograms, box plots, scatter plots and the correlation heatmap.

use crate::stats::CorrelationMatrix;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use statrs::distribution::{Continuous, Normal};
use std::ops::Range;
use thiserror::Error;

/// Drawing surface every panel is rendered onto.
pub type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

pub const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
pub const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
pub const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
pub const ORANGE: RGBColor = RGBColor(255, 165, 0);
pub const FOREST_GREEN: RGBColor = RGBColor(34, 139, 34);
pub const PURPLE: RGBColor = RGBColor(128, 0, 128);
const NO_DATA_FILL: RGBColor = RGBColor(240, 240, 240);

// Endpoints and midpoint of the diverging heatmap palette.
const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

const CAPTION_FONT: (&str, u32) = ("sans-serif", 28);
const AXIS_DESC_FONT: (&str, u32) = ("sans-serif", 18);
const KDE_POINTS: usize = 200;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pixel buffer does not match the chart size for {0}")]
    Buffer(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

/// Axis labels and caption of one panel.
#[derive(Debug, Clone, Copy)]
pub struct PanelText<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
}

impl<'a> PanelText<'a> {
    pub fn new(title: &'a str, x_desc: &'a str, y_desc: &'a str) -> Self {
        Self {
            title,
            x_desc,
            y_desc,
        }
    }
}

/// Equal-width histogram bins over `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    pub start: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Bins {
    /// `None` for empty input or zero bins. A constant input gets a single
    /// unit-wide range centred on the value.
    pub fn compute(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let (mut lo, mut hi) = min_max(values)?;
        if hi <= lo {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Some(Self {
            start: lo,
            width,
            counts,
        })
    }

    pub fn end(&self) -> f64 {
        self.start + self.width * self.counts.len() as f64
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Gaussian kernel density estimate with Scott's bandwidth, sampled at
/// `points` evenly spaced positions over `range`.
///
/// Densities integrate to one; `None` for fewer than two values or zero
/// spread.
pub fn kde_curve(values: &[f64], range: Range<f64>, points: usize) -> Option<Vec<(f64, f64)>> {
    let n = values.len();
    if n < 2 || points < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    let bandwidth = std * (n as f64).powf(-0.2);
    if !(bandwidth > 0.0) {
        return None;
    }

    let kernel = Normal::new(0.0, 1.0).ok()?;
    let step = (range.end - range.start) / (points - 1) as f64;
    let curve = (0..points)
        .map(|i| {
            let x = range.start + i as f64 * step;
            let density = values
                .iter()
                .map(|v| kernel.pdf((x - v) / bandwidth))
                .sum::<f64>()
                / (n as f64 * bandwidth);
            (x, density)
        })
        .collect();
    Some(curve)
}

/// Diverging cool-to-warm color for a correlation in [-1, 1].
pub fn diverging_color(r: f64) -> RGBColor {
    let t = r.clamp(-1.0, 1.0);
    let (from, to, frac) = if t < 0.0 {
        (NEUTRAL, COOL, -t)
    } else {
        (NEUTRAL, WARM, t)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * frac).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Upper bound for an axis starting at zero.
fn headroom(max: f64) -> f64 {
    if max.is_finite() && max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Padded range around the data, never empty.
fn padded_range(values: &[f64]) -> Range<f64> {
    match min_max(values) {
        None => 0.0..1.0,
        Some((lo, hi)) if hi <= lo => (lo - 0.5)..(hi + 0.5),
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad)..(hi + pad)
        }
    }
}

fn segment_label(value: &SegmentValue<&String>) -> String {
    match value {
        SegmentValue::Exact(label) | SegmentValue::CenterOf(label) => (*label).clone(),
        SegmentValue::Last => String::new(),
    }
}

/// Creates the static chart panels.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Caption plus a centred "No data" notice.
    pub fn draw_no_data(area: &Panel<'_>, title: &str) -> Result<(), RenderError> {
        let inner = area.titled(title, CAPTION_FONT)?;
        let (w, h) = inner.dim_in_pixel();
        let style = ("sans-serif", 24)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        inner.draw(&Text::new(
            "No data".to_string(),
            (w as i32 / 2, h as i32 / 2),
            style,
        ))?;
        Ok(())
    }

    /// Categorical bar chart. Bars with no value are left out; colors cycle.
    pub fn draw_bars(
        area: &Panel<'_>,
        text: PanelText<'_>,
        labels: &[String],
        values: &[Option<f64>],
        colors: &[RGBColor],
    ) -> Result<(), RenderError> {
        if labels.is_empty() || values.iter().all(Option::is_none) {
            return Self::draw_no_data(area, text.title);
        }

        let max = values.iter().flatten().copied().fold(0.0, f64::max);
        let mut chart = ChartBuilder::on(area)
            .caption(text.title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(labels.into_segmented(), 0f64..headroom(max))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(BLACK.mix(0.15))
            .x_desc(text.x_desc)
            .y_desc(text.y_desc)
            .axis_desc_style(AXIS_DESC_FONT)
            .x_label_formatter(&segment_label)
            .draw()?;

        for (i, (label, value)) in labels.iter().zip(values).enumerate() {
            let Some(value) = value else {
                continue;
            };
            let color = colors.get(i % colors.len().max(1)).copied().unwrap_or(STEEL_BLUE);
            chart.draw_series(
                Histogram::vertical(&chart)
                    .style(color.mix(0.8).filled())
                    .margin(12)
                    .data(std::iter::once((label, *value))),
            )?;
        }
        Ok(())
    }

    /// Line with circle markers over an integer axis `x_min..=x_max`.
    pub fn draw_line(
        area: &Panel<'_>,
        text: PanelText<'_>,
        points: &[(i32, f64)],
        x_min: i32,
        x_max: i32,
        color: RGBColor,
    ) -> Result<(), RenderError> {
        if points.is_empty() {
            return Self::draw_no_data(area, text.title);
        }

        let max = points.iter().map(|p| p.1).fold(0.0, f64::max);
        let mut chart = ChartBuilder::on(area)
            .caption(text.title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, 0f64..headroom(max))?;

        chart
            .configure_mesh()
            .x_labels((x_max - x_min + 1) as usize)
            .bold_line_style(BLACK.mix(0.15))
            .x_desc(text.x_desc)
            .y_desc(text.y_desc)
            .axis_desc_style(AXIS_DESC_FONT)
            .draw()?;

        chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(3)))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 5, color.filled())))?;
        Ok(())
    }

    /// Frequency histogram, optionally overlaid with a KDE curve scaled to
    /// counts.
    pub fn draw_histogram(
        area: &Panel<'_>,
        text: PanelText<'_>,
        values: &[f64],
        bins: usize,
        color: RGBColor,
        density_overlay: bool,
    ) -> Result<(), RenderError> {
        let Some(hist) = Bins::compute(values, bins) else {
            return Self::draw_no_data(area, text.title);
        };

        let mut chart = ChartBuilder::on(area)
            .caption(text.title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(hist.start..hist.end(), 0f64..headroom(hist.max_count() as f64))?;

        chart
            .configure_mesh()
            .bold_line_style(BLACK.mix(0.15))
            .x_desc(text.x_desc)
            .y_desc(text.y_desc)
            .axis_desc_style(AXIS_DESC_FONT)
            .draw()?;

        chart.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
            let x0 = hist.start + i as f64 * hist.width;
            Rectangle::new(
                [(x0, 0.0), (x0 + hist.width, count as f64)],
                color.mix(0.7).filled(),
            )
        }))?;

        if density_overlay {
            if let Some(curve) = kde_curve(values, hist.start..hist.end(), KDE_POINTS) {
                let scale = values.len() as f64 * hist.width;
                chart.draw_series(LineSeries::new(
                    curve.into_iter().map(|(x, d)| (x, d * scale)),
                    color.stroke_width(3),
                ))?;
            }
        }
        Ok(())
    }

    /// One box per group with 1.5 IQR whiskers and outlier markers.
    pub fn draw_box_groups(
        area: &Panel<'_>,
        text: PanelText<'_>,
        groups: &[(String, Vec<f64>)],
        color: RGBColor,
    ) -> Result<(), RenderError> {
        if groups.iter().all(|(_, values)| values.is_empty()) {
            return Self::draw_no_data(area, text.title);
        }

        let labels: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();
        let quartiles: Vec<Option<Quartiles>> = groups
            .iter()
            .map(|(_, values)| (!values.is_empty()).then(|| Quartiles::new(values.as_slice())))
            .collect();

        let mut extent: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        for q in quartiles.iter().flatten() {
            extent.extend(q.values().iter().map(|&v| f64::from(v)));
        }
        let y_range = padded_range(&extent);

        let mut chart = ChartBuilder::on(area)
            .caption(text.title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(
                labels[..].into_segmented(),
                (y_range.start as f32)..(y_range.end as f32),
            )?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(BLACK.mix(0.15))
            .x_desc(text.x_desc)
            .y_desc(text.y_desc)
            .axis_desc_style(AXIS_DESC_FONT)
            .x_label_formatter(&segment_label)
            .draw()?;

        for ((label, values), q) in labels.iter().zip(groups.iter().map(|g| &g.1)).zip(&quartiles) {
            let Some(q) = q else {
                continue;
            };
            chart.draw_series(std::iter::once(
                Boxplot::new_vertical(SegmentValue::CenterOf(label), q)
                    .width(60)
                    .whisker_width(0.5)
                    .style(color.stroke_width(2)),
            ))?;

            let [low, _, _, _, high] = q.values();
            chart.draw_series(
                values
                    .iter()
                    .map(|&v| v as f32)
                    .filter(|&v| v < low || v > high)
                    .map(|v| Circle::new((SegmentValue::CenterOf(label), v), 2, BLACK.mix(0.4))),
            )?;
        }
        Ok(())
    }

    /// Scatter of (x, y) points.
    pub fn draw_scatter(
        area: &Panel<'_>,
        text: PanelText<'_>,
        points: &[(f64, f64)],
        color: RGBColor,
    ) -> Result<(), RenderError> {
        if points.is_empty() {
            return Self::draw_no_data(area, text.title);
        }

        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let y_max = min_max(&ys).map(|(_, hi)| hi).unwrap_or(1.0);

        let mut chart = ChartBuilder::on(area)
            .caption(text.title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(padded_range(&xs), 0f64..headroom(y_max))?;

        chart
            .configure_mesh()
            .bold_line_style(BLACK.mix(0.15))
            .x_desc(text.x_desc)
            .y_desc(text.y_desc)
            .axis_desc_style(AXIS_DESC_FONT)
            .draw()?;

        chart.draw_series(
            points
                .iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|&p| Circle::new(p, 2, color.mix(0.5).filled())),
        )?;
        Ok(())
    }

    /// Annotated heatmap of a correlation matrix. Undefined entries are drawn
    /// blank and labelled "n/a".
    pub fn draw_heatmap(
        area: &Panel<'_>,
        title: &str,
        matrix: &CorrelationMatrix,
    ) -> Result<(), RenderError> {
        let n = matrix.size();
        if n == 0 {
            return Self::draw_no_data(area, title);
        }

        let inner = area.titled(title, CAPTION_FONT)?;
        let (w, h) = inner.dim_in_pixel();
        let label_w = 170i32;
        let label_h = 50i32;
        let cell_w = ((w as i32 - label_w - 20) / n as i32).max(1);
        let cell_h = ((h as i32 - label_h - 10) / n as i32).max(1);

        let cell_font = ("sans-serif", 20).into_font();
        let label_font = ("sans-serif", 16).into_font();

        for row in 0..n {
            for col in 0..n {
                let x0 = label_w + col as i32 * cell_w;
                let y0 = row as i32 * cell_h;
                let value = matrix.get(row, col);
                let fill = value.map(diverging_color).unwrap_or(NO_DATA_FILL);
                inner.draw(&Rectangle::new(
                    [(x0, y0), (x0 + cell_w, y0 + cell_h)],
                    fill.filled(),
                ))?;
                inner.draw(&Rectangle::new(
                    [(x0, y0), (x0 + cell_w, y0 + cell_h)],
                    WHITE.stroke_width(2),
                ))?;

                let (annotation, ink) = match value {
                    Some(r) if r.abs() > 0.6 => (format!("{r:.2}"), cell_font.color(&WHITE)),
                    Some(r) => (format!("{r:.2}"), cell_font.color(&BLACK)),
                    None => ("n/a".to_string(), cell_font.color(&BLACK)),
                };
                inner.draw(&Text::new(
                    annotation,
                    (x0 + cell_w / 2, y0 + cell_h / 2),
                    ink.pos(Pos::new(HPos::Center, VPos::Center)),
                ))?;
            }
        }

        for (i, label) in matrix.labels.iter().enumerate() {
            inner.draw(&Text::new(
                label.to_string(),
                (label_w - 8, i as i32 * cell_h + cell_h / 2),
                label_font
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Right, VPos::Center)),
            ))?;
            inner.draw(&Text::new(
                label.to_string(),
                (label_w + i as i32 * cell_w + cell_w / 2, n as i32 * cell_h + 8),
                label_font
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Top)),
            ))?;
        }
        Ok(())
    }
}
