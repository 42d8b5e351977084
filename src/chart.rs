//! Chart strategies: one layout routine per chart kind.
//!
//! Each routine reads the node's records through the free-text field selectors (`xKey`,
//! `yKey`, `zKey`, `nameKey`) and lays out primitives inside the rectangle it was handed, so a
//! resized node simply redraws to fill its new size. Records whose selected fields are missing
//! or not numeric are skipped; a chart with nothing left to plot keeps its frame and title.

use std::collections::HashMap;

use serde_json::Value;

use crate::node::{ChartData, ChartKind, Record};
use crate::render::{Anchor, ChartDrawing, Paint, Point, Primitive, Rect, Stroke, TooltipTarget};
use crate::style::{Curve, PALETTE, ResolvedStyle, SECONDARY_STROKE};

const PADDING: f64 = 12.0;
const TITLE_BAND: f64 = 36.0;
const LEGEND_BAND: f64 = 24.0;
const AXIS_LEFT: f64 = 44.0;
const AXIS_BOTTOM: f64 = 22.0;
const GRID_LINES: usize = 5;
const SANKEY_NODE_WIDTH: f64 = 12.0;
const SANKEY_GAP: f64 = 8.0;

const AXIS_COLOR: &str = "#6b7280";
const GRID_COLOR: &str = "#e5e7eb";
const LABEL_COLOR: &str = "#374151";
const TRACK_COLOR: &str = "#f3f4f6";

/// Looks up a selected field. Blank or absent selectors select nothing.
pub fn field<'a>(record: &'a Record, key: Option<&str>) -> Option<&'a Value> {
    let key = key?.trim();
    if key.is_empty() {
        return None;
    }
    record.get(key)
}

/// Numeric value of a selected field. Numeric strings are accepted since uploaded CSV data
/// often keeps numbers as text.
pub fn number(record: &Record, key: Option<&str>) -> Option<f64> {
    let value = match field(record, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

/// Display text of a selected field.
pub fn text(record: &Record, key: Option<&str>) -> Option<String> {
    match field(record, key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lays out `data` inside `frame`.
pub fn draw(data: &ChartData, frame: Rect) -> ChartDrawing {
    let style = ResolvedStyle::resolve(&data.kind, &data.style);
    let top = if data.title.is_some() {
        TITLE_BAND
    } else {
        PADDING
    };
    let bottom = if style.show_legend {
        LEGEND_BAND + PADDING
    } else {
        PADDING
    };
    let body = frame.inset(top, PADDING, bottom, PADDING);
    let legend_area = Rect::new(body.x, body.bottom() + 4.0, body.w, LEGEND_BAND - 4.0);
    let ctx = Ctx {
        data,
        style: &style,
        frame,
        body,
        legend_area,
    };

    match &data.kind {
        ChartKind::Line | ChartKind::Area | ChartKind::Bar | ChartKind::Composed => {
            cartesian(&ctx)
        }
        ChartKind::Scatter => scatter(&ctx),
        ChartKind::Pie => pie(&ctx),
        ChartKind::Radar => radar(&ctx),
        ChartKind::RadialBar => radial_bar(&ctx),
        ChartKind::Funnel => funnel(&ctx),
        ChartKind::Treemap => treemap(&ctx),
        ChartKind::Sankey => sankey(&ctx),
        ChartKind::Unknown(_) => ctx.blank(body),
    }
}

struct Ctx<'a> {
    data: &'a ChartData,
    style: &'a ResolvedStyle,
    frame: Rect,
    body: Rect,
    legend_area: Rect,
}

impl Ctx<'_> {
    fn blank(&self, plot: Rect) -> ChartDrawing {
        ChartDrawing::empty(self.data.kind.clone(), self.data.title.clone(), self.frame, plot)
    }

    fn x_key(&self) -> Option<&str> {
        self.data.x_key.as_deref()
    }

    fn y_key(&self) -> Option<&str> {
        self.data.y_key.as_deref()
    }

    fn z_key(&self) -> Option<&str> {
        self.data.z_key.as_deref()
    }

    /// Category name for pie-like charts: `nameKey`, then `xKey`, then the row number.
    fn category(&self, index: usize, record: &Record) -> String {
        text(record, self.data.name_key.as_deref())
            .or_else(|| text(record, self.x_key()))
            .unwrap_or_else(|| format!("#{}", index + 1))
    }

    /// `(name, value)` pairs with a numeric `yKey`, in record order.
    fn named_values(&self) -> Vec<(String, f64)> {
        self.data
            .data
            .iter()
            .enumerate()
            .filter_map(|(i, r)| Some((self.category(i, r), number(r, self.y_key())?)))
            .collect()
    }

    fn finish(&self, drawing: &mut ChartDrawing, entries: &[(String, String)]) {
        if self.style.show_legend {
            drawing.legend = legend(entries, self.legend_area);
        }
        if !self.style.show_tooltip {
            drawing.tooltips.clear();
        }
    }
}

/// Category label, primary value, secondary value.
type Row = (String, Option<f64>, Option<f64>);

fn cartesian(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body.inset(0.0, 0.0, AXIS_BOTTOM, AXIS_LEFT);
    let mut drawing = ctx.blank(plot);
    let kind = &ctx.data.kind;
    let style = ctx.style;

    let primary = ctx.y_key();
    let secondary = match kind {
        ChartKind::Composed => ctx.z_key().or(primary),
        _ => None,
    };

    let rows: Vec<Row> = ctx
        .data
        .data
        .iter()
        .enumerate()
        .map(|(i, r)| {
            (
                text(r, ctx.x_key()).unwrap_or_else(|| (i + 1).to_string()),
                number(r, primary),
                secondary.and_then(|k| number(r, Some(k))),
            )
        })
        .filter(|(_, a, b)| a.is_some() || b.is_some())
        .collect();
    if rows.is_empty() {
        return drawing;
    }

    let (lo, hi) = value_domain(rows.iter().flat_map(|(_, a, b)| a.iter().chain(b.iter()).copied()));
    let scale_y = |v: f64| plot.bottom() - (v - lo) / (hi - lo) * plot.h;
    let band = plot.w / rows.len() as f64;
    let x_at = |i: usize| plot.x + band * (i as f64 + 0.5);
    let baseline = scale_y(0.0_f64.clamp(lo, hi));

    if style.show_grid {
        drawing.grid = horizontal_grid(plot, GRID_LINES);
        for i in 0..rows.len() {
            drawing.grid.push(Primitive::Line {
                from: (x_at(i), plot.y),
                to: (x_at(i), plot.bottom()),
                stroke: Stroke::new(GRID_COLOR, 1.0),
            });
        }
    }
    drawing.axes = axes(plot);
    drawing.axes.extend(y_ticks(plot, lo, hi));
    let label_step = (rows.len() as f64 / (plot.w / 48.0).max(1.0)).ceil().max(1.0) as usize;
    for (i, (label, _, _)) in rows.iter().enumerate().step_by(label_step) {
        drawing.axes.push(label_at((x_at(i), plot.bottom() + 15.0), label, 11.0, Anchor::Middle));
    }

    let line_points = |pick: &dyn Fn(&Row) -> Option<f64>| {
        rows.iter()
            .enumerate()
            .filter_map(|(i, row)| pick(row).map(|v| (x_at(i), scale_y(v))))
            .collect::<Vec<Point>>()
    };
    let stroke = Stroke::new(style.stroke.clone(), style.stroke_width);
    let dot_radius = 2.0 + style.stroke_width;

    match kind {
        ChartKind::Line => {
            let points = line_points(&|r: &Row| r.1);
            drawing.series.push(Primitive::Polyline {
                points: interpolate(&points, style.curve),
                stroke: stroke.clone(),
            });
            if style.show_dots {
                drawing.dots = dots(&points, dot_radius, &style.stroke);
            }
        }
        ChartKind::Area => {
            let points = line_points(&|r: &Row| r.1);
            let curve = interpolate(&points, style.curve);
            if let (Some(first), Some(last)) = (curve.first().copied(), curve.last().copied()) {
                let mut outline = Vec::with_capacity(curve.len() + 2);
                outline.push((first.0, baseline));
                outline.extend(curve.iter().copied());
                outline.push((last.0, baseline));
                drawing.series.push(Primitive::Polygon {
                    points: outline,
                    fill: Paint::translucent(style.fill.clone(), style.fill_opacity),
                    stroke: None,
                });
            }
            drawing.series.push(Primitive::Polyline {
                points: curve,
                stroke: stroke.clone(),
            });
            if style.show_dots {
                drawing.dots = dots(&points, dot_radius, &style.stroke);
            }
        }
        ChartKind::Bar | ChartKind::Composed => {
            let width = style.bar_size.min(band * 0.8);
            for (i, (_, value, _)) in rows.iter().enumerate() {
                if let Some(v) = value {
                    let y = scale_y(*v);
                    drawing.series.push(Primitive::Rect {
                        rect: Rect::new(x_at(i) - width / 2.0, y.min(baseline), width, (y - baseline).abs()),
                        fill: Some(Paint::translucent(style.fill.clone(), style.fill_opacity)),
                        stroke: None,
                    });
                }
            }
            if *kind == ChartKind::Composed {
                let points = line_points(&|r: &Row| r.2);
                drawing.series.push(Primitive::Polyline {
                    points: interpolate(&points, style.curve),
                    stroke: Stroke::new(SECONDARY_STROKE, style.stroke_width),
                });
                if style.show_dots {
                    drawing.dots = dots(&points, dot_radius, SECONDARY_STROKE);
                }
            }
        }
        _ => {}
    }

    drawing.tooltips = rows
        .iter()
        .enumerate()
        .map(|(i, (label, a, b))| {
            let mut parts = vec![label.clone()];
            if let Some(v) = a {
                parts.push(format!("{}: {}", primary.unwrap_or("value"), format_number(*v)));
            }
            if let (Some(v), Some(k)) = (b, secondary) {
                parts.push(format!("{}: {}", k, format_number(*v)));
            }
            TooltipTarget {
                area: Rect::new(x_at(i) - band / 2.0, plot.y, band, plot.h),
                text: parts.join("\n"),
            }
        })
        .collect();

    let mut entries = vec![(
        primary.unwrap_or("value").to_string(),
        if matches!(kind, ChartKind::Line) {
            style.stroke.clone()
        } else {
            style.fill.clone()
        },
    )];
    if let Some(k) = secondary {
        entries.push((k.to_string(), SECONDARY_STROKE.to_string()));
    }
    ctx.finish(&mut drawing, &entries);
    drawing
}

fn scatter(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body.inset(0.0, 0.0, AXIS_BOTTOM, AXIS_LEFT);
    let mut drawing = ctx.blank(plot);
    let style = ctx.style;

    let points: Vec<(f64, f64, Option<f64>)> = ctx
        .data
        .data
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            // Category x values are placed by row order.
            let x = number(r, ctx.x_key()).unwrap_or((i + 1) as f64);
            Some((x, number(r, ctx.y_key())?, number(r, ctx.z_key())))
        })
        .collect();
    if points.is_empty() {
        return drawing;
    }

    let (x_lo, x_hi) = spread_domain(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = spread_domain(points.iter().map(|p| p.1));
    let z_range = points
        .iter()
        .filter_map(|p| p.2)
        .fold(None, |acc: Option<(f64, f64)>, z| {
            Some(acc.map_or((z, z), |(lo, hi)| (lo.min(z), hi.max(z))))
        });
    let sx = |x: f64| plot.x + (x - x_lo) / (x_hi - x_lo) * plot.w;
    let sy = |y: f64| plot.bottom() - (y - y_lo) / (y_hi - y_lo) * plot.h;

    if style.show_grid {
        drawing.grid = horizontal_grid(plot, GRID_LINES);
        drawing.grid.extend(vertical_grid(plot, GRID_LINES));
    }
    drawing.axes = axes(plot);
    drawing.axes.extend(y_ticks(plot, y_lo, y_hi));
    for i in 0..=GRID_LINES {
        let t = i as f64 / GRID_LINES as f64;
        drawing.axes.push(label_at(
            (plot.x + t * plot.w, plot.bottom() + 15.0),
            &format_number(x_lo + t * (x_hi - x_lo)),
            11.0,
            Anchor::Middle,
        ));
    }

    for (x, y, z) in &points {
        let center = (sx(*x), sy(*y));
        let radius = match (z, z_range) {
            (Some(z), Some((lo, hi))) if hi > lo => 4.0 + 8.0 * (z - lo) / (hi - lo),
            _ => 5.0,
        };
        if style.show_dots {
            drawing.dots.push(Primitive::Circle {
                center,
                radius,
                fill: Paint::translucent(style.fill.clone(), style.fill_opacity),
            });
        } else {
            drawing.series.push(Primitive::Rect {
                rect: Rect::new(center.0 - 1.5, center.1 - 1.5, 3.0, 3.0),
                fill: Some(Paint::solid(style.fill.clone())),
                stroke: None,
            });
        }
        drawing.tooltips.push(TooltipTarget {
            area: Rect::new(center.0 - radius, center.1 - radius, radius * 2.0, radius * 2.0),
            text: format!(
                "{}: {}\n{}: {}",
                ctx.x_key().unwrap_or("x"),
                format_number(*x),
                ctx.y_key().unwrap_or("y"),
                format_number(*y)
            ),
        });
    }

    let entries = [(ctx.y_key().unwrap_or("value").to_string(), style.fill.clone())];
    ctx.finish(&mut drawing, &entries);
    drawing
}

fn pie(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);
    let style = ctx.style;

    let slices: Vec<(String, f64)> = ctx
        .named_values()
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    if slices.is_empty() || total <= 0.0 {
        return drawing;
    }

    let center = plot.center();
    let half = plot.w.min(plot.h) / 2.0;
    let outer = half * style.outer_radius / 100.0;
    let inner = half * style.inner_radius.min(style.outer_radius) / 100.0;
    let span = style.end_angle - style.start_angle;

    let mut angle = style.start_angle;
    let mut entries = Vec::with_capacity(slices.len());
    for (i, (name, value)) in slices.iter().enumerate() {
        let sweep = span * value / total;
        let color = PALETTE[i % PALETTE.len()];
        drawing.series.push(Primitive::Polygon {
            points: sector(center, inner, outer, angle, angle + sweep),
            fill: Paint::solid(color),
            stroke: Some(Stroke::new("#ffffff", 1.0)),
        });
        let mid = angle + sweep / 2.0;
        let at = polar(center, (inner + outer) / 2.0, mid);
        if value / total >= 0.05 {
            drawing.series.push(Primitive::Label {
                at,
                text: format!("{:.0}%", value / total * 100.0),
                size: 11.0,
                weight: 600,
                color: "#ffffff".to_string(),
                anchor: Anchor::Middle,
            });
        }
        drawing.tooltips.push(TooltipTarget {
            area: Rect::new(at.0 - 12.0, at.1 - 12.0, 24.0, 24.0),
            text: format!("{}: {}", name, format_number(*value)),
        });
        entries.push((name.clone(), color.to_string()));
        angle += sweep;
    }

    ctx.finish(&mut drawing, &entries);
    drawing
}

fn radar(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);
    let style = ctx.style;

    let axes_values = ctx.named_values();
    if axes_values.is_empty() {
        return drawing;
    }
    let n = axes_values.len();
    let center = plot.center();
    let radius = plot.w.min(plot.h) / 2.0 * style.outer_radius / 100.0;
    let max = axes_values
        .iter()
        .map(|(_, v)| *v)
        .fold(0.0_f64, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };
    let angle_of = |i: usize| 90.0 - 360.0 * i as f64 / n as f64;

    if style.show_grid {
        for ring in 1..=4 {
            let r = radius * ring as f64 / 4.0;
            let mut ring_points: Vec<Point> = (0..n).map(|i| polar(center, r, angle_of(i))).collect();
            if let Some(first) = ring_points.first().copied() {
                ring_points.push(first);
            }
            drawing.grid.push(Primitive::Polyline {
                points: ring_points,
                stroke: Stroke::new(GRID_COLOR, 1.0),
            });
        }
        for i in 0..n {
            drawing.grid.push(Primitive::Line {
                from: center,
                to: polar(center, radius, angle_of(i)),
                stroke: Stroke::new(GRID_COLOR, 1.0),
            });
        }
    }
    for (i, (name, _)) in axes_values.iter().enumerate() {
        drawing
            .axes
            .push(label_at(polar(center, radius + 14.0, angle_of(i)), name, 11.0, Anchor::Middle));
    }

    let points: Vec<Point> = axes_values
        .iter()
        .enumerate()
        .map(|(i, (_, v))| polar(center, radius * v.max(0.0) / max, angle_of(i)))
        .collect();
    drawing.series.push(Primitive::Polygon {
        points: points.clone(),
        fill: Paint::translucent(style.fill.clone(), style.fill_opacity),
        stroke: Some(Stroke::new(style.stroke.clone(), style.stroke_width)),
    });
    if style.show_dots {
        drawing.dots = dots(&points, 2.0 + style.stroke_width, &style.stroke);
    }
    drawing.tooltips = points
        .iter()
        .zip(&axes_values)
        .map(|(p, (name, v))| TooltipTarget {
            area: Rect::new(p.0 - 8.0, p.1 - 8.0, 16.0, 16.0),
            text: format!("{}: {}", name, format_number(*v)),
        })
        .collect();

    let entries = [(ctx.y_key().unwrap_or("value").to_string(), style.fill.clone())];
    ctx.finish(&mut drawing, &entries);
    drawing
}

fn radial_bar(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);
    let style = ctx.style;

    let bars: Vec<(String, f64)> = ctx
        .named_values()
        .into_iter()
        .filter(|(_, v)| *v >= 0.0)
        .collect();
    if bars.is_empty() {
        return drawing;
    }
    let max = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };

    let center = plot.center();
    let half = plot.w.min(plot.h) / 2.0;
    let outer = half * style.outer_radius / 100.0;
    let inner = (half * style.inner_radius / 100.0).min(outer);
    let ring = (outer - inner) / bars.len() as f64;
    let span = style.end_angle - style.start_angle;

    let mut entries = Vec::with_capacity(bars.len());
    for (i, (name, value)) in bars.iter().enumerate() {
        let r0 = inner + ring * i as f64 + ring * 0.1;
        let r1 = inner + ring * (i + 1) as f64 - ring * 0.1;
        let color = PALETTE[i % PALETTE.len()];
        if style.show_grid {
            drawing.grid.push(Primitive::Polygon {
                points: sector(center, r0, r1, style.start_angle, style.end_angle),
                fill: Paint::solid(TRACK_COLOR),
                stroke: None,
            });
        }
        let end = style.start_angle + span * value / max;
        drawing.series.push(Primitive::Polygon {
            points: sector(center, r0, r1, style.start_angle, end),
            fill: Paint::solid(color),
            stroke: None,
        });
        let at = polar(center, (r0 + r1) / 2.0, end);
        drawing.tooltips.push(TooltipTarget {
            area: Rect::new(at.0 - 8.0, at.1 - 8.0, 16.0, 16.0),
            text: format!("{}: {}", name, format_number(*value)),
        });
        entries.push((name.clone(), color.to_string()));
    }

    ctx.finish(&mut drawing, &entries);
    drawing
}

fn funnel(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);

    let stages: Vec<(String, f64)> = ctx
        .named_values()
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .collect();
    if stages.is_empty() {
        return drawing;
    }
    let max = stages.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let height = plot.h / stages.len() as f64;
    let cx = plot.x + plot.w / 2.0;
    let width_of = |v: f64| plot.w * v / max;

    let mut entries = Vec::with_capacity(stages.len());
    for (i, (name, value)) in stages.iter().enumerate() {
        let top = width_of(*value);
        let bottom = stages
            .get(i + 1)
            .map_or(top * 0.6, |(_, next)| width_of(*next));
        let y0 = plot.y + height * i as f64;
        let y1 = y0 + height;
        let color = PALETTE[i % PALETTE.len()];
        drawing.series.push(Primitive::Polygon {
            points: vec![
                (cx - top / 2.0, y0),
                (cx + top / 2.0, y0),
                (cx + bottom / 2.0, y1),
                (cx - bottom / 2.0, y1),
            ],
            fill: Paint::solid(color),
            stroke: Some(Stroke::new("#ffffff", 1.0)),
        });
        drawing.series.push(Primitive::Label {
            at: (cx, y0 + height / 2.0 + 4.0),
            text: name.clone(),
            size: 12.0,
            weight: 600,
            color: "#ffffff".to_string(),
            anchor: Anchor::Middle,
        });
        drawing.tooltips.push(TooltipTarget {
            area: Rect::new(cx - top / 2.0, y0, top, height),
            text: format!("{}: {}", name, format_number(*value)),
        });
        entries.push((name.clone(), color.to_string()));
    }

    ctx.finish(&mut drawing, &entries);
    drawing
}

fn treemap(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);

    let mut tiles: Vec<(String, f64)> = ctx
        .named_values()
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .collect();
    if tiles.is_empty() {
        return drawing;
    }
    tiles.sort_by(|a, b| b.1.total_cmp(&a.1));

    let values: Vec<f64> = tiles.iter().map(|(_, v)| *v).collect();
    let rects = squarify(&values, plot);
    let mut entries = Vec::with_capacity(tiles.len());
    for (i, ((name, value), rect)) in tiles.iter().zip(rects).enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        drawing.series.push(Primitive::Rect {
            rect,
            fill: Some(Paint::solid(color)),
            stroke: Some(Stroke::new("#ffffff", 2.0)),
        });
        if rect.w > 40.0 && rect.h > 18.0 {
            drawing.series.push(Primitive::Label {
                at: (rect.x + 6.0, rect.y + 16.0),
                text: name.clone(),
                size: 11.0,
                weight: 600,
                color: "#ffffff".to_string(),
                anchor: Anchor::Start,
            });
        }
        drawing.tooltips.push(TooltipTarget {
            area: rect,
            text: format!("{}: {}", name, format_number(*value)),
        });
        entries.push((name.clone(), color.to_string()));
    }

    ctx.finish(&mut drawing, &entries);
    drawing
}

/// Squarified treemap layout. `values` must be sorted largest first; the returned rectangles
/// are in the same order and exactly tile `area`.
pub fn squarify(values: &[f64], area: Rect) -> Vec<Rect> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 || area.w <= 0.0 || area.h <= 0.0 {
        return values.iter().map(|_| Rect::new(area.x, area.y, 0.0, 0.0)).collect();
    }
    let scale = area.w * area.h / total;
    let areas: Vec<f64> = values.iter().map(|v| v * scale).collect();

    let mut out = Vec::with_capacity(areas.len());
    let mut remaining = area;
    let mut start = 0;
    while start < areas.len() {
        let side = remaining.w.min(remaining.h);
        let mut end = start + 1;
        while end < areas.len()
            && worst_ratio(&areas[start..=end], side) <= worst_ratio(&areas[start..end], side)
        {
            end += 1;
        }
        let row = &areas[start..end];
        let row_sum: f64 = row.iter().sum();
        if remaining.w >= remaining.h {
            let col_w = if remaining.h > 0.0 { row_sum / remaining.h } else { 0.0 };
            let mut y = remaining.y;
            for a in row {
                let h = if col_w > 0.0 { a / col_w } else { 0.0 };
                out.push(Rect::new(remaining.x, y, col_w, h));
                y += h;
            }
            remaining = Rect::new(remaining.x + col_w, remaining.y, remaining.w - col_w, remaining.h);
        } else {
            let row_h = if remaining.w > 0.0 { row_sum / remaining.w } else { 0.0 };
            let mut x = remaining.x;
            for a in row {
                let w = if row_h > 0.0 { a / row_h } else { 0.0 };
                out.push(Rect::new(x, remaining.y, w, row_h));
                x += w;
            }
            remaining = Rect::new(remaining.x, remaining.y + row_h, remaining.w, remaining.h - row_h);
        }
        start = end;
    }
    out
}

fn worst_ratio(row: &[f64], side: f64) -> f64 {
    let sum: f64 = row.iter().sum();
    let max = row.iter().copied().fold(f64::MIN, f64::max);
    let min = row.iter().copied().fold(f64::MAX, f64::min);
    if sum <= 0.0 || side <= 0.0 || min <= 0.0 {
        return f64::INFINITY;
    }
    let side2 = side * side;
    let sum2 = sum * sum;
    (side2 * max / sum2).max(sum2 / (side2 * min))
}

fn sankey(ctx: &Ctx) -> ChartDrawing {
    let plot = ctx.body;
    let mut drawing = ctx.blank(plot);

    // Each record is one link: source from xKey, target from zKey (or nameKey), value from yKey.
    let target_key = ctx.z_key().or(ctx.data.name_key.as_deref());
    let links: Vec<(String, String, f64)> = ctx
        .data
        .data
        .iter()
        .filter_map(|r| {
            let source = text(r, ctx.x_key())?;
            let target = text(r, target_key)?;
            let value = number(r, ctx.y_key())?;
            (value > 0.0 && source != target).then_some((source, target, value))
        })
        .collect();
    if links.is_empty() {
        return drawing;
    }

    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (s, t, _) in &links {
        for name in [s, t] {
            if !index.contains_key(name) {
                index.insert(name.clone(), names.len());
                names.push(name.clone());
            }
        }
    }
    let n = names.len();
    let edges: Vec<(usize, usize, f64)> = links
        .iter()
        .map(|(s, t, v)| (index[s], index[t], *v))
        .collect();

    // Longest-path columns, bounded by the node count so cycles terminate.
    let mut depth = vec![0usize; n];
    for _ in 0..n {
        let mut changed = false;
        for &(s, t, _) in &edges {
            if depth[t] < depth[s] + 1 && depth[s] + 1 < n {
                depth[t] = depth[s] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    let columns = depth.iter().copied().max().unwrap_or(0) + 1;

    let mut inflow = vec![0.0; n];
    let mut outflow = vec![0.0; n];
    for &(s, t, v) in &edges {
        outflow[s] += v;
        inflow[t] += v;
    }
    let weight: Vec<f64> = (0..n).map(|i| f64::max(inflow[i], outflow[i])).collect();

    let mut column_nodes: Vec<Vec<usize>> = vec![Vec::new(); columns];
    for i in 0..n {
        column_nodes[depth[i]].push(i);
    }
    let k = column_nodes
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| {
            let total: f64 = c.iter().map(|&i| weight[i]).sum();
            let room = plot.h - SANKEY_GAP * (c.len().saturating_sub(1)) as f64;
            if total > 0.0 { room.max(1.0) / total } else { 0.0 }
        })
        .fold(f64::INFINITY, f64::min);
    let k = if k.is_finite() { k } else { 0.0 };

    let col_step = if columns > 1 {
        (plot.w - SANKEY_NODE_WIDTH) / (columns - 1) as f64
    } else {
        0.0
    };
    let mut node_rect = vec![Rect::new(plot.x, plot.y, 0.0, 0.0); n];
    for (col, members) in column_nodes.iter().enumerate() {
        let mut y = plot.y;
        for &i in members {
            let h = (weight[i] * k).max(1.0);
            node_rect[i] = Rect::new(plot.x + col_step * col as f64, y, SANKEY_NODE_WIDTH, h);
            y += h + SANKEY_GAP;
        }
    }

    let mut out_offset = vec![0.0; n];
    let mut in_offset = vec![0.0; n];
    for &(s, t, v) in &edges {
        let h = v * k;
        let sr = node_rect[s];
        let tr = node_rect[t];
        let sy = sr.y + out_offset[s];
        let ty = tr.y + in_offset[t];
        out_offset[s] += h;
        in_offset[t] += h;
        let x0 = sr.right();
        let x1 = tr.x;
        let top = ribbon((x0, sy), (x1, ty));
        let mut bottom = ribbon((x0, sy + h), (x1, ty + h));
        bottom.reverse();
        let mut points = top;
        points.extend(bottom);
        drawing.series.push(Primitive::Polygon {
            points,
            fill: Paint::translucent(PALETTE[s % PALETTE.len()], 0.4),
            stroke: None,
        });
        drawing.tooltips.push(TooltipTarget {
            area: Rect::new(x0.min(x1), sy.min(ty), (x1 - x0).abs(), h.max(4.0)),
            text: format!("{} → {}: {}", names[s], names[t], format_number(v)),
        });
    }

    let mut entries = Vec::with_capacity(n);
    for (i, rect) in node_rect.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        drawing.series.push(Primitive::Rect {
            rect: *rect,
            fill: Some(Paint::solid(color)),
            stroke: None,
        });
        let last_column = depth[i] + 1 == columns && columns > 1;
        let (x, anchor) = if last_column {
            (rect.x - 4.0, Anchor::End)
        } else {
            (rect.right() + 4.0, Anchor::Start)
        };
        drawing
            .series
            .push(label_at((x, rect.y + rect.h / 2.0 + 4.0), &names[i], 11.0, anchor));
        entries.push((names[i].clone(), color.to_string()));
    }

    ctx.finish(&mut drawing, &entries);
    drawing
}

/// Smooth S-shaped path between two link ends.
fn ribbon(from: Point, to: Point) -> Vec<Point> {
    const STEPS: usize = 16;
    (0..=STEPS)
        .map(|i| {
            let t = i as f64 / STEPS as f64;
            let s = t * t * (3.0 - 2.0 * t);
            (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * s)
        })
        .collect()
}

/// Value range for cartesian charts; always includes zero so bars have a baseline.
fn value_domain(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi - lo < f64::EPSILON {
        (lo, lo + 1.0)
    } else {
        (lo, hi)
    }
}

/// Value range spanning exactly the data, widened when all values are equal.
fn spread_domain(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        (0.0, 1.0)
    } else if hi - lo < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

/// Screen path through `points` for the given interpolation.
pub fn interpolate(points: &[Point], curve: Curve) -> Vec<Point> {
    match curve {
        Curve::Linear => points.to_vec(),
        Curve::Step => {
            let mut out = Vec::with_capacity(points.len() * 2);
            for pair in points.windows(2) {
                out.push(pair[0]);
                out.push((pair[1].0, pair[0].1));
            }
            out.extend(points.last().copied());
            out
        }
        Curve::Monotone => monotone(points),
    }
}

/// Monotone cubic interpolation (Fritsch-Carlson); never overshoots the data points.
fn monotone(points: &[Point]) -> Vec<Point> {
    const STEPS: usize = 8;
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let secants: Vec<f64> = points
        .windows(2)
        .map(|w| {
            let dx = w[1].0 - w[0].0;
            if dx.abs() < f64::EPSILON { 0.0 } else { (w[1].1 - w[0].1) / dx }
        })
        .collect();
    let mut tangents = vec![0.0; n];
    tangents[0] = secants[0];
    tangents[n - 1] = secants[n - 2];
    for i in 1..n - 1 {
        tangents[i] = if secants[i - 1] * secants[i] <= 0.0 {
            0.0
        } else {
            (secants[i - 1] + secants[i]) / 2.0
        };
    }
    for i in 0..n - 1 {
        if secants[i] == 0.0 {
            tangents[i] = 0.0;
            tangents[i + 1] = 0.0;
            continue;
        }
        let a = tangents[i] / secants[i];
        let b = tangents[i + 1] / secants[i];
        let s = a * a + b * b;
        if s > 9.0 {
            let t = 3.0 / s.sqrt();
            tangents[i] = t * a * secants[i];
            tangents[i + 1] = t * b * secants[i];
        }
    }

    let mut out = Vec::with_capacity((n - 1) * STEPS + 1);
    for i in 0..n - 1 {
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let h = x1 - x0;
        for step in 0..STEPS {
            let t = step as f64 / STEPS as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let y = (2.0 * t3 - 3.0 * t2 + 1.0) * y0
                + (t3 - 2.0 * t2 + t) * h * tangents[i]
                + (-2.0 * t3 + 3.0 * t2) * y1
                + (t3 - t2) * h * tangents[i + 1];
            out.push((x0 + h * t, y));
        }
    }
    out.push(points[n - 1]);
    out
}

/// Point at `radius` and `degrees` (counter-clockwise from 3 o'clock) around `center`.
fn polar(center: Point, radius: f64, degrees: f64) -> Point {
    let rad = degrees.to_radians();
    (center.0 + radius * rad.cos(), center.1 - radius * rad.sin())
}

/// Most segments used for one arc: a full turn at 4 degrees per segment.
const MAX_ARC_STEPS: usize = 90;

/// Outline of an annular sector; a zero inner radius gives a pie wedge.
///
/// The sweep is clamped to one full turn in either direction.
fn sector(center: Point, inner: f64, outer: f64, from: f64, to: f64) -> Vec<Point> {
    let sweep = to - from;
    let from = if from.is_finite() { from % 360.0 } else { 0.0 };
    let sweep = if sweep.is_finite() {
        sweep.clamp(-360.0, 360.0)
    } else {
        0.0
    };
    let steps = ((sweep.abs() / 4.0).ceil() as usize).clamp(1, MAX_ARC_STEPS);
    let arc = |r: f64| -> Vec<Point> {
        (0..=steps)
            .map(|i| polar(center, r, from + sweep * i as f64 / steps as f64))
            .collect()
    };
    let mut points = arc(outer);
    if inner > 0.0 {
        let mut back = arc(inner);
        back.reverse();
        points.extend(back);
    } else {
        points.push(center);
    }
    points
}

fn axes(plot: Rect) -> Vec<Primitive> {
    vec![
        Primitive::Line {
            from: (plot.x, plot.y),
            to: (plot.x, plot.bottom()),
            stroke: Stroke::new(AXIS_COLOR, 1.0),
        },
        Primitive::Line {
            from: (plot.x, plot.bottom()),
            to: (plot.right(), plot.bottom()),
            stroke: Stroke::new(AXIS_COLOR, 1.0),
        },
    ]
}

fn horizontal_grid(plot: Rect, lines: usize) -> Vec<Primitive> {
    (0..=lines)
        .map(|i| {
            let y = plot.y + plot.h * i as f64 / lines as f64;
            Primitive::Line {
                from: (plot.x, y),
                to: (plot.right(), y),
                stroke: Stroke::new(GRID_COLOR, 1.0),
            }
        })
        .collect()
}

fn vertical_grid(plot: Rect, lines: usize) -> Vec<Primitive> {
    (0..=lines)
        .map(|i| {
            let x = plot.x + plot.w * i as f64 / lines as f64;
            Primitive::Line {
                from: (x, plot.y),
                to: (x, plot.bottom()),
                stroke: Stroke::new(GRID_COLOR, 1.0),
            }
        })
        .collect()
}

fn y_ticks(plot: Rect, lo: f64, hi: f64) -> Vec<Primitive> {
    (0..=GRID_LINES)
        .map(|i| {
            let t = i as f64 / GRID_LINES as f64;
            label_at(
                (plot.x - 6.0, plot.bottom() - t * plot.h + 4.0),
                &format_number(lo + t * (hi - lo)),
                10.0,
                Anchor::End,
            )
        })
        .collect()
}

fn dots(points: &[Point], radius: f64, color: &str) -> Vec<Primitive> {
    points
        .iter()
        .map(|&center| Primitive::Circle {
            center,
            radius,
            fill: Paint::solid(color),
        })
        .collect()
}

fn legend(entries: &[(String, String)], area: Rect) -> Vec<Primitive> {
    let mut out = Vec::with_capacity(entries.len() * 2);
    let mut x = area.x;
    let y = area.y + area.h / 2.0;
    for (label, color) in entries {
        if x >= area.right() {
            break;
        }
        out.push(Primitive::Rect {
            rect: Rect::new(x, y - 5.0, 10.0, 10.0),
            fill: Some(Paint::solid(color.clone())),
            stroke: None,
        });
        out.push(label_at((x + 14.0, y + 4.0), label, 11.0, Anchor::Start));
        x += 14.0 + label.chars().count() as f64 * 6.5 + 12.0;
    }
    out
}

fn label_at(at: Point, text: &str, size: f64, anchor: Anchor) -> Primitive {
    Primitive::Label {
        at,
        text: text.to_string(),
        size,
        weight: 400,
        color: LABEL_COLOR.to_string(),
        anchor,
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
