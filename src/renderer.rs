use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, instrument};

use crate::config::RenderConfig;
use crate::detection::{CornerRect, Detection};
use crate::error::{Result, VisionError};

/// Boxes whose top edge is at or above this line get their label below
/// the edge so it stays on the surface.
pub const LABEL_FLIP_THRESHOLD: f64 = 30.0;
pub const LABEL_ABOVE_OFFSET: f64 = 10.0;
pub const LABEL_BELOW_OFFSET: f64 = 25.0;

const DEFAULT_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgba<u8>,
    pub line_width: u32,
    pub font_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0x25, 0x63, 0xeb, 0xff]),
            line_width: 4,
            font_size: 24.0,
        }
    }
}

impl OverlayStyle {
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            color: parse_hex_color(&config.color)?,
            line_width: config.line_width,
            font_size: config.font_size,
        })
    }
}

/// Parse `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Result<Rgba<u8>> {
    let invalid = || {
        VisionError::InvalidConfig(format!(
            "Invalid color '{}'. Expected #rrggbb or #rrggbbaa",
            text
        ))
    };

    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 0xff };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOp {
    StrokeRect(CornerRect),
    FillText { text: String, x: f64, baseline: f64 },
}

/// Baseline of a label for a box whose top edge is at `top`.
pub fn label_baseline(top: f64) -> f64 {
    if top > LABEL_FLIP_THRESHOLD {
        top - LABEL_ABOVE_OFFSET
    } else {
        top + LABEL_BELOW_OFFSET
    }
}

/// Instructions for the given detections, in order. Records without
/// usable geometry produce nothing.
pub fn plan_overlay(detections: &[Detection]) -> Vec<OverlayOp> {
    let mut ops = Vec::with_capacity(detections.len() * 2);

    for detection in detections {
        let Some(rect) = detection.corner_rect() else {
            debug!("Skipping '{}': no center-form geometry", detection.label);
            continue;
        };

        ops.push(OverlayOp::StrokeRect(rect));
        ops.push(OverlayOp::FillText {
            text: detection.label.clone(),
            x: rect.left,
            baseline: label_baseline(rect.top),
        });
    }

    ops
}

/// A 2D drawing target.
///
/// `resize` must clear the surface; that is what makes repeated renders
/// replace the previous overlay instead of accumulating on top of it.
pub trait Surface {
    fn resize(&mut self, width: u32, height: u32);

    /// Copy `image` onto the surface with its top-left corner at the origin.
    fn draw_image(&mut self, image: &RgbaImage);

    fn stroke_rect(&mut self, rect: &CornerRect, style: &OverlayStyle);

    fn fill_text(&mut self, text: &str, x: f64, baseline: f64, style: &OverlayStyle);
}

/// Show `source` on `surface` with one box and label per detection.
#[instrument(
    skip_all,
    fields(width = source.width(), height = source.height(), detections = detections.len())
)]
pub fn render<S: Surface + ?Sized>(
    surface: &mut S,
    source: &DynamicImage,
    detections: &[Detection],
    style: &OverlayStyle,
) {
    let pixels = source.to_rgba8();
    surface.resize(pixels.width(), pixels.height());
    surface.draw_image(&pixels);

    let ops = plan_overlay(detections);
    for op in &ops {
        match op {
            OverlayOp::StrokeRect(rect) => surface.stroke_rect(rect, style),
            OverlayOp::FillText { text, x, baseline } => {
                surface.fill_text(text, *x, *baseline, style)
            }
        }
    }

    debug!("Drew {} overlay operations", ops.len());
}

/// In-memory RGBA surface. Labels use the bundled DejaVu Sans unless
/// `render.font_path` points at another font.
pub struct RasterSurface {
    canvas: RgbaImage,
    font: FontArc,
}

impl RasterSurface {
    pub fn new() -> Result<Self> {
        let font = FontArc::try_from_slice(DEFAULT_FONT).map_err(|e| {
            VisionError::Render(format!("Failed to parse bundled label font: {}", e))
        })?;
        Ok(Self::with_font(font))
    }

    pub fn with_font(font: impl Into<FontArc>) -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            font: font.into(),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        match &config.font_path {
            Some(path) => {
                debug!("Using label font {}", path);
                Ok(Self::with_font(load_font(Path::new(path))?))
            }
            None => Self::new(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }
}

impl Surface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::new(width, height);
    }

    fn draw_image(&mut self, image: &RgbaImage) {
        image::imageops::replace(&mut self.canvas, image, 0, 0);
    }

    fn stroke_rect(&mut self, rect: &CornerRect, style: &OverlayStyle) {
        // Negative sizes flip the box; anything thinner than a pixel still
        // gets a one pixel wide outline.
        let (min_x, max_x) = ordered(to_pixels(rect.left), to_pixels(rect.right()));
        let (min_y, max_y) = ordered(to_pixels(rect.top), to_pixels(rect.bottom()));
        let width = (max_x - min_x).max(1);
        let height = (max_y - min_y).max(1);

        // The stroke straddles the rectangle's edge: half outside, half inside.
        let line = i64::from(style.line_width.max(1));
        let half = line / 2;
        let left = min_x - half;
        let top = min_y - half;
        let (canvas_w, canvas_h) = (
            i64::from(self.canvas.width()),
            i64::from(self.canvas.height()),
        );

        for inset in 0..line {
            let (x0, y0) = (left + inset, top + inset);
            let (x1, y1) = (
                x0 + width + line - 2 * inset - 1,
                y0 + height + line - 2 * inset - 1,
            );
            if x1 < x0 || y1 < y0 {
                break;
            }
            if x1 < 0 || y1 < 0 || x0 >= canvas_w || y0 >= canvas_h {
                continue;
            }

            // Edges beyond the canvas stay one pixel outside it.
            let (x0, y0) = (x0.max(-1), y0.max(-1));
            let (x1, y1) = (x1.min(canvas_w), y1.min(canvas_h));
            let outline = Rect::at(x0 as i32, y0 as i32)
                .of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
            draw_hollow_rect_mut(&mut self.canvas, outline, style.color);
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, baseline: f64, style: &OverlayStyle) {
        let font = &self.font;
        let scale = PxScale::from(style.font_size);
        let ascent = font.as_scaled(scale).ascent() as f64;
        let top = baseline - ascent;
        draw_text_mut(
            &mut self.canvas,
            style.color,
            to_pixels(x) as i32,
            to_pixels(top) as i32,
            scale,
            font,
            text,
        );
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path).map_err(|e| {
        VisionError::Render(format!(
            "Failed to read label font '{}': {}",
            path.display(),
            e
        ))
    })?;

    FontVec::try_from_vec(bytes).map_err(|e| {
        VisionError::Render(format!(
            "Failed to parse label font '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Round to whole pixels, keeping far-off coordinates in a range where
/// the stroke arithmetic cannot overflow.
fn to_pixels(v: f64) -> i64 {
    v.round().clamp(-1.0e9, 1.0e9) as i64
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
