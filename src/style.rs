//! Per-kind defaults for chart and element styling.
//!
//! A node only stores the flags the user actually changed. Everything else is filled in here
//! at render time, so changing a default never rewrites saved documents.

use crate::node::{ChartKind, ChartStyle, ElementData, ElementKind};

pub const DEFAULT_STROKE: &str = "#8884d8";
pub const DEFAULT_FILL: &str = "#8884d8";
pub const SECONDARY_STROKE: &str = "#82ca9d";
pub const DEFAULT_TEXT_COLOR: &str = "#111827";
pub const DEFAULT_DIVIDER_COLOR: &str = "#d1d5db";

/// Series palette used for pies, funnels, treemaps and sankey links.
pub const PALETTE: [&str; 8] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff8042", "#0088fe", "#00c49f", "#ffbb28", "#a4de6c",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Monotone,
    Linear,
    Step,
}

impl Curve {
    /// Unknown curve names fall back to monotone, the interpolation charts start with.
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear" => Curve::Linear,
            "step" | "stepAfter" | "stepBefore" => Curve::Step,
            _ => Curve::Monotone,
        }
    }
}

/// A chart style with every flag decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub show_grid: bool,
    pub show_legend: bool,
    pub show_tooltip: bool,
    pub show_dots: bool,
    pub curve: Curve,
    pub stroke: String,
    pub fill: String,
    pub stroke_width: f64,
    pub fill_opacity: f64,
    pub bar_size: f64,
    /// Percent of half the short side of the plot area.
    pub inner_radius: f64,
    /// Percent of half the short side of the plot area.
    pub outer_radius: f64,
    /// Degrees, counter-clockwise from 3 o'clock.
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ResolvedStyle {
    /// Documented defaults for `kind`, before any user override.
    pub fn defaults(kind: &ChartKind) -> Self {
        let mut style = ResolvedStyle {
            show_grid: true,
            show_legend: true,
            show_tooltip: true,
            show_dots: false,
            curve: Curve::Monotone,
            stroke: DEFAULT_STROKE.to_string(),
            fill: DEFAULT_FILL.to_string(),
            stroke_width: 2.0,
            fill_opacity: 1.0,
            bar_size: 20.0,
            inner_radius: 0.0,
            outer_radius: 80.0,
            start_angle: 0.0,
            end_angle: 360.0,
        };
        match kind {
            ChartKind::Line | ChartKind::Scatter => style.show_dots = true,
            ChartKind::Area | ChartKind::Radar => style.fill_opacity = 0.6,
            ChartKind::RadialBar => {
                style.inner_radius = 20.0;
                style.start_angle = 180.0;
                style.end_angle = 0.0;
            }
            ChartKind::Funnel | ChartKind::Treemap | ChartKind::Sankey => style.show_grid = false,
            ChartKind::Bar
            | ChartKind::Pie
            | ChartKind::Composed
            | ChartKind::Unknown(_) => {}
        }
        style
    }

    /// Applies the flags present in `style` on top of the defaults for `kind`.
    pub fn resolve(kind: &ChartKind, style: &ChartStyle) -> Self {
        let d = ResolvedStyle::defaults(kind);
        ResolvedStyle {
            show_grid: style.show_grid.unwrap_or(d.show_grid),
            show_legend: style.show_legend.unwrap_or(d.show_legend),
            show_tooltip: style.show_tooltip.unwrap_or(d.show_tooltip),
            show_dots: style.show_dots.unwrap_or(d.show_dots),
            curve: style.curve.as_deref().map_or(d.curve, Curve::from_name),
            stroke: style.stroke.clone().unwrap_or(d.stroke),
            fill: style.fill.clone().unwrap_or(d.fill),
            stroke_width: positive_or(style.stroke_width, d.stroke_width),
            fill_opacity: style.fill_opacity.map_or(d.fill_opacity, |o| o.clamp(0.0, 1.0)),
            bar_size: positive_or(style.bar_size, d.bar_size),
            inner_radius: style.inner_radius.map_or(d.inner_radius, |r| r.clamp(0.0, 100.0)),
            outer_radius: style.outer_radius.map_or(d.outer_radius, |r| r.clamp(0.0, 100.0)),
            start_angle: style.start_angle.unwrap_or(d.start_angle),
            end_angle: style.end_angle.unwrap_or(d.end_angle),
        }
    }
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

/// Typography or divider look of an element node, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElementStyle {
    pub font_size: f64,
    pub font_weight: u16,
    pub color: String,
    pub align: TextAlign,
    pub thickness: f64,
    pub divider_color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl ResolvedElementStyle {
    pub fn resolve(element: &ElementData) -> Self {
        let (font_size, font_weight) = match element.kind {
            ElementKind::Title => (32.0, 700),
            ElementKind::SectionHeader => (22.0, 600),
            _ => (14.0, 400),
        };
        let align = match element.align.as_deref() {
            Some("center") => TextAlign::Center,
            Some("right") => TextAlign::Right,
            _ => TextAlign::Left,
        };
        ResolvedElementStyle {
            font_size: positive_or(element.font_size, font_size),
            font_weight: element.font_weight.unwrap_or(font_weight),
            color: element
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            align,
            thickness: positive_or(element.thickness, 2.0),
            divider_color: element
                .divider_color
                .clone()
                .unwrap_or_else(|| DEFAULT_DIVIDER_COLOR.to_string()),
        }
    }
}
