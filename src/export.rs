//! Canvas downloads: PNG, PDF and JSON.
//!
//! Image exports frame every node with a fixed margin, regardless of where the user's camera
//! currently is. The live camera is swapped for the capture framing while the canvas is
//! painted and put back afterwards by [`CameraGuard`], whether the capture worked or not.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, info};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use regex::Regex;

use crate::codec;
use crate::document::{Bounds, GraphDocument};
use crate::error::ExportError;
use crate::node::Viewport;
use crate::render::{Anchor, Paint, Point, Primitive, Stroke, Visual, plan_scene};

/// Blank space kept around the outermost nodes in image exports.
pub const EXPORT_PADDING: f64 = 50.0;

/// A4 landscape in PDF points.
pub const PAGE_WIDTH: f64 = 842.0;
pub const PAGE_HEIGHT: f64 = 595.0;
/// 10 mm in PDF points.
pub const PAGE_MARGIN: f64 = 28.35;

const EDGE_COLOR: &str = "#b1b1b7";
const CARD_BORDER: &str = "#e5e7eb";

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex =
        Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid file name pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pdf,
    Json,
}

impl ExportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "pdf" => Some(ExportFormat::Pdf),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Json => "application/json",
        }
    }
}

/// A finished download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

/// Region covering every node plus [`EXPORT_PADDING`] on each side.
pub fn export_bounds(document: &GraphDocument) -> Result<Bounds, ExportError> {
    document
        .bounds()
        .map(|b| b.padded(EXPORT_PADDING))
        .ok_or(ExportError::EmptyCanvas)
}

/// Camera that shows `bounds` at its top-left corner at 100% zoom.
pub fn capture_viewport(bounds: &Bounds) -> Viewport {
    Viewport {
        x: -bounds.min_x,
        y: -bounds.min_y,
        zoom: 1.0,
    }
}

/// Holds the capture framing on the live camera and restores the previous one when dropped.
pub struct CameraGuard<'a> {
    camera: &'a mut Viewport,
    saved: Viewport,
}

impl<'a> CameraGuard<'a> {
    pub fn capture(camera: &'a mut Viewport, framing: Viewport) -> Self {
        let saved = *camera;
        *camera = framing;
        CameraGuard { camera, saved }
    }

    pub fn current(&self) -> Viewport {
        *self.camera
    }
}

impl Drop for CameraGuard<'_> {
    fn drop(&mut self) {
        *self.camera = self.saved;
    }
}

/// Runs `paint` with the camera switched to the capture framing of `bounds`.
pub fn with_capture<T>(
    camera: &mut Viewport,
    bounds: &Bounds,
    paint: impl FnOnce(Viewport) -> Result<T, ExportError>,
) -> Result<T, ExportError> {
    let guard = CameraGuard::capture(camera, capture_viewport(bounds));
    paint(guard.current())
}

/// Paints every node and drawable edge as an SVG document seen through `view`.
///
/// The image is `bounds` scaled by the view's zoom; canvas points land at
/// `point * zoom + (view.x, view.y)`.
pub fn render_svg(
    document: &GraphDocument,
    bounds: &Bounds,
    view: Viewport,
) -> Result<String, ExportError> {
    let view = view.sanitized();
    let width = (bounds.width() * view.zoom).ceil().max(1.0) as u32;
    let height = (bounds.height() * view.zoom).ceil().max(1.0) as u32;
    let scene = plan_scene(document, None);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        for edge in &scene.edges {
            paint(
                &root,
                &Primitive::Line {
                    from: edge.from,
                    to: edge.to,
                    stroke: Stroke::new(EDGE_COLOR, 1.5),
                },
                view,
            )?;
            if let Some(label) = &edge.label {
                let mid = ((edge.from.0 + edge.to.0) / 2.0, (edge.from.1 + edge.to.1) / 2.0);
                paint(
                    &root,
                    &Primitive::Label {
                        at: mid,
                        text: label.clone(),
                        size: 11.0,
                        weight: 400,
                        color: "#374151".to_string(),
                        anchor: Anchor::Middle,
                    },
                    view,
                )?;
            }
        }

        for node in &scene.nodes {
            if matches!(node.visual, Visual::Chart(_)) {
                paint(
                    &root,
                    &Primitive::Rect {
                        rect: node.rect,
                        fill: Some(Paint::solid("#ffffff")),
                        stroke: Some(Stroke::new(CARD_BORDER, 1.0)),
                    },
                    view,
                )?;
            }
            for primitive in node.visual.primitives(node.rect) {
                paint(&root, &primitive, view)?;
            }
        }

        root.present().map_err(draw_error)?;
    }
    debug!(
        "rendered {} nodes and {} edges to a {}x{} SVG",
        scene.nodes.len(),
        scene.edges.len(),
        width,
        height
    );
    Ok(svg)
}

fn draw_error<E: std::fmt::Display>(err: E) -> ExportError {
    ExportError::Draw(err.to_string())
}

fn paint<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    primitive: &Primitive,
    view: Viewport,
) -> Result<(), ExportError> {
    let at = |p: Point| -> (i32, i32) {
        (
            (p.0 * view.zoom + view.x).round() as i32,
            (p.1 * view.zoom + view.y).round() as i32,
        )
    };
    let px = |width: f64| stroke_px(width * view.zoom);
    match primitive {
        Primitive::Rect { rect, fill, stroke } => {
            let corners = [at((rect.x, rect.y)), at((rect.right(), rect.bottom()))];
            if let Some(fill) = fill {
                let style = parse_color(&fill.color).mix(fill.opacity).filled();
                root.draw(&Rectangle::new(corners, style)).map_err(draw_error)?;
            }
            if let Some(stroke) = stroke {
                let style = parse_color(&stroke.color).stroke_width(px(stroke.width));
                root.draw(&Rectangle::new(corners, style)).map_err(draw_error)?;
            }
        }
        Primitive::Line { from, to, stroke } => {
            let style = parse_color(&stroke.color).stroke_width(px(stroke.width));
            root.draw(&PathElement::new(vec![at(*from), at(*to)], style))
                .map_err(draw_error)?;
        }
        Primitive::Polyline { points, stroke } => {
            if points.len() >= 2 {
                let style = parse_color(&stroke.color).stroke_width(px(stroke.width));
                let path: Vec<(i32, i32)> = points.iter().map(|p| at(*p)).collect();
                root.draw(&PathElement::new(path, style)).map_err(draw_error)?;
            }
        }
        Primitive::Polygon {
            points,
            fill,
            stroke,
        } => {
            if points.len() >= 3 {
                let path: Vec<(i32, i32)> = points.iter().map(|p| at(*p)).collect();
                let style = parse_color(&fill.color).mix(fill.opacity).filled();
                root.draw(&Polygon::new(path.clone(), style)).map_err(draw_error)?;
                if let Some(stroke) = stroke {
                    let mut outline = path;
                    if let Some(first) = outline.first().copied() {
                        outline.push(first);
                    }
                    let style = parse_color(&stroke.color).stroke_width(px(stroke.width));
                    root.draw(&PathElement::new(outline, style)).map_err(draw_error)?;
                }
            }
        }
        Primitive::Circle {
            center,
            radius,
            fill,
        } => {
            let style = parse_color(&fill.color).mix(fill.opacity).filled();
            root.draw(&Circle::new(at(*center), (radius * view.zoom).round().max(1.0) as i32, style))
                .map_err(draw_error)?;
        }
        Primitive::Label {
            at: point,
            text,
            size,
            weight,
            color,
            anchor,
        } => {
            if text.is_empty() {
                return Ok(());
            }
            let font_style = if *weight >= 600 {
                FontStyle::Bold
            } else {
                FontStyle::Normal
            };
            let h = match anchor {
                Anchor::Start => HPos::Left,
                Anchor::Middle => HPos::Center,
                Anchor::End => HPos::Right,
            };
            let style = FontDesc::new(FontFamily::SansSerif, size * view.zoom, font_style)
                .color(&parse_color(color))
                .pos(Pos::new(h, VPos::Bottom));
            root.draw(&Text::new(text.clone(), at(*point), style))
                .map_err(draw_error)?;
        }
    }
    Ok(())
}

fn stroke_px(width: f64) -> u32 {
    width.round().max(1.0) as u32
}

/// Parses `#rgb` or `#rrggbb`. Anything else paints black.
pub fn parse_color(text: &str) -> RGBColor {
    let hex = text.trim().trim_start_matches('#');
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let parsed = match hex.len() {
        3 => {
            let mut it = hex.chars().map(|c| channel(&c.to_string()).map(|v| v * 17));
            match (it.next().flatten(), it.next().flatten(), it.next().flatten()) {
                (Some(r), Some(g), Some(b)) => Some(RGBColor(r, g, b)),
                _ => None,
            }
        }
        6 => match (
            hex.get(0..2).and_then(channel),
            hex.get(2..4).and_then(channel),
            hex.get(4..6).and_then(channel),
        ) {
            (Some(r), Some(g), Some(b)) => Some(RGBColor(r, g, b)),
            _ => None,
        },
        _ => None,
    };
    parsed.unwrap_or(BLACK)
}

/// Rasterises an SVG string at 1:1 scale on a white background.
pub fn svg_to_png(svg: &str) -> Result<Vec<u8>, ExportError> {
    use resvg::{tiny_skia, usvg};

    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt).map_err(|_| ExportError::SvgParse)?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or(ExportError::PixmapAlloc(size.width(), size.height()))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.encode_png().map_err(|_| ExportError::PngEncode)
}

/// Places a PNG on a single A4 landscape page, scaled to fit inside the margins and centred.
pub fn png_to_pdf(png: &[u8], width: f64, height: f64) -> Result<Vec<u8>, ExportError> {
    let avail_w = PAGE_WIDTH - 2.0 * PAGE_MARGIN;
    let avail_h = PAGE_HEIGHT - 2.0 * PAGE_MARGIN;
    let scale = (avail_w / width.max(1.0)).min(avail_h / height.max(1.0));
    let (w, h) = (width * scale, height * scale);
    let (x, y) = ((PAGE_WIDTH - w) / 2.0, (PAGE_HEIGHT - h) / 2.0);

    let page = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{pw}" height="{ph}" viewBox="0 0 {pw} {ph}"><image x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" xlink:href="data:image/png;base64,{data}"/></svg>"#,
        pw = PAGE_WIDTH,
        ph = PAGE_HEIGHT,
        data = STANDARD.encode(png),
    );

    let mut opt = svg2pdf::usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = svg2pdf::usvg::Tree::from_str(&page, &opt).map_err(|_| ExportError::SvgParse)?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|_| ExportError::PdfConvert)
}

/// Captures the canvas as a PNG sized to [`export_bounds`].
pub fn export_png(document: &GraphDocument, camera: &mut Viewport) -> Result<Vec<u8>, ExportError> {
    let bounds = export_bounds(document)?;
    with_capture(camera, &bounds, |framing| {
        let svg = render_svg(document, &bounds, framing)?;
        svg_to_png(&svg)
    })
}

/// Captures the canvas and lays it out on a single PDF page.
pub fn export_pdf(document: &GraphDocument, camera: &mut Viewport) -> Result<Vec<u8>, ExportError> {
    let bounds = export_bounds(document)?;
    let png = with_capture(camera, &bounds, |framing| {
        let svg = render_svg(document, &bounds, framing)?;
        svg_to_png(&svg)
    })?;
    png_to_pdf(&png, bounds.width().ceil(), bounds.height().ceil())
}

/// The document as pretty JSON. An empty canvas exports fine.
pub fn export_json(document: &GraphDocument) -> Vec<u8> {
    codec::encode(document).into_bytes()
}

/// `{canvasName}-{timestamp}.{ext}` with characters that are unsafe in file names replaced.
pub fn export_file_name(canvas_name: &str, extension: &str, now: DateTime<Utc>) -> String {
    let name = UNSAFE_FILE_CHARS.replace_all(canvas_name.trim(), "-");
    let name = if name.is_empty() { "canvas" } else { name.as_ref() };
    format!("{}-{}.{}", name, now.timestamp_millis(), extension)
}

/// Produces a download in `format`, restoring `camera` afterwards for the image formats.
pub fn export(
    document: &GraphDocument,
    camera: &mut Viewport,
    format: ExportFormat,
    canvas_name: &str,
    now: DateTime<Utc>,
) -> Result<ExportedFile, ExportError> {
    let bytes = match format {
        ExportFormat::Png => export_png(document, camera)?,
        ExportFormat::Pdf => export_pdf(document, camera)?,
        ExportFormat::Json => export_json(document),
    };
    let file_name = export_file_name(canvas_name, format.extension(), now);
    info!("exported {} ({} bytes)", file_name, bytes.len());
    Ok(ExportedFile {
        file_name,
        format,
        bytes,
    })
}
