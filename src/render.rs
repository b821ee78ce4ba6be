//! Frame annotation and JPEG encoding

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::config::RenderConfig;
use crate::detect::BoundingBox;

/// Box and label colour
pub const ANNOTATION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Gap between a box's top edge and its label baseline
const LABEL_OFFSET: f32 = 10.0;

/// Fallback label font, compiled in
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// Common install locations of a Devanagari font
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/truetype/lohit-devanagari/Lohit-Devanagari.ttf",
];

/// Render errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// Font file missing or unparsable
    #[error("font error: {0}")]
    Font(String),

    /// JPEG encoding failed
    #[error("encode error: {0}")]
    Encode(String),
}

/// Draws detections and encodes frames
///
/// Glyphs are looked up through a font chain: the configured font (or a
/// system Devanagari font when none is configured), then the bundled one.
pub struct Renderer {
    fonts: Vec<FontArc>,
    scale: PxScale,
    thickness: u32,
    jpeg_quality: u8,
    warned_fallback: AtomicBool,
}

impl Renderer {
    /// Build a renderer and its font chain
    ///
    /// # Errors
    ///
    /// Returns error if a configured font cannot be loaded
    pub fn new(config: &RenderConfig) -> Result<Self, RenderError> {
        let mut fonts = Vec::with_capacity(2);
        match config.font_path.as_deref() {
            Some(path) => fonts.push(load_font(path)?),
            None => fonts.extend(system_font()),
        }
        fonts.push(bundled_font()?);

        Ok(Self::with_fonts(config, fonts))
    }

    fn with_fonts(config: &RenderConfig, fonts: Vec<FontArc>) -> Self {
        Self {
            fonts,
            scale: PxScale::from(config.font_size),
            thickness: config.box_thickness.max(1),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
            warned_fallback: AtomicBool::new(false),
        }
    }

    /// Whether every visible character of `text` has a glyph in the chain
    #[must_use]
    pub fn can_render(&self, text: &str) -> bool {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| self.resolve(c).is_some())
    }

    /// Draw a detection box with its label above it
    ///
    /// `fallback` is drawn instead of `text` when no font covers `text`.
    pub fn draw(&self, image: &mut RgbImage, bbox: &BoundingBox, text: &str, fallback: &str) {
        draw_rect(image, bbox, self.thickness, ANNOTATION_COLOR);

        let label = if self.can_render(text) {
            text
        } else {
            if !self.warned_fallback.swap(true, Ordering::Relaxed) {
                tracing::warn!(text, fallback, "no font covers label, drawing detector label");
            }
            fallback
        };

        let baseline = (bbox.y_min - LABEL_OFFSET).max(0.0);
        self.draw_text(image, bbox.x_min, baseline, label, ANNOTATION_COLOR);
    }

    /// Encode to baseline JPEG
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, RenderError> {
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality)
            .encode_image(image)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    fn resolve(&self, c: char) -> Option<(&FontArc, GlyphId)> {
        self.fonts.iter().find_map(|font| {
            let id = font.glyph_id(c);
            (id.0 != 0).then_some((font, id))
        })
    }

    /// Rasterize `text` with its baseline at (`x`, `baseline`)
    ///
    /// Glyphs are blended by coverage. A label too close to the top edge is
    /// pushed down so it stays fully visible. Characters no font covers are
    /// skipped.
    fn draw_text(&self, image: &mut RgbImage, x: f32, baseline: f32, text: &str, color: Rgb<u8>) {
        let ascent = self
            .fonts
            .iter()
            .map(|font| font.as_scaled(self.scale).ascent())
            .fold(0.0, f32::max);
        let mut caret = point(x.max(0.0), baseline.max(ascent));
        let mut previous: Option<(&FontArc, GlyphId)> = None;

        for c in text.chars() {
            let Some((font, id)) = self.resolve(c) else {
                continue;
            };
            let scaled = font.as_scaled(self.scale);
            if let Some((prev_font, prev)) = previous
                && std::ptr::eq(prev_font, font)
            {
                caret.x += scaled.kern(prev, id);
            }
            previous = Some((font, id));

            let glyph = id.with_scale_and_position(self.scale, caret);
            caret.x += scaled.h_advance(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                #[allow(clippy::cast_possible_truncation)]
                let (px, py) = (
                    bounds.min.x as i64 + i64::from(gx),
                    bounds.min.y as i64 + i64::from(gy),
                );
                let (Ok(px), Ok(py)) = (u32::try_from(px), u32::try_from(py)) else {
                    return;
                };
                if px >= image.width() || py >= image.height() {
                    return;
                }
                blend(image.get_pixel_mut(px, py), color, coverage);
            });
        }
    }
}

fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let bytes = std::fs::read(path)
        .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))?;
    let font = FontArc::try_from_vec(bytes)
        .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), "label font loaded");
    Ok(font)
}

fn bundled_font() -> Result<FontArc, RenderError> {
    FontArc::try_from_slice(BUNDLED_FONT)
        .map_err(|e| RenderError::Font(format!("bundled font: {e}")))
}

fn system_font() -> Option<FontArc> {
    SYSTEM_FONTS
        .iter()
        .map(Path::new)
        .filter(|path| path.is_file())
        .find_map(|path| match load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::debug!(error = %e, "skipping system font");
                None
            }
        })
}

/// Outline a box, `thickness` pixels wide, clipped to the image
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn draw_rect(image: &mut RgbImage, bbox: &BoundingBox, thickness: u32, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let clamp_x = |v: f32| (v.max(0.0) as u32).min(width - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(height - 1);
    let (x0, x1) = (clamp_x(bbox.x_min), clamp_x(bbox.x_max));
    let (y0, y1) = (clamp_y(bbox.y_min), clamp_y(bbox.y_max));

    for t in 0..thickness {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            image.put_pixel(x, top, color);
            image.put_pixel(x, bottom, color);
        }

        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            image.put_pixel(left, y, color);
            image.put_pixel(right, y, color);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(pixel: &mut Rgb<u8>, color: Rgb<u8>, coverage: f32) {
    let alpha = coverage.clamp(0.0, 1.0);
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        let mixed = f32::from(*dst).mul_add(1.0 - alpha, f32::from(src) * alpha);
        *dst = mixed.round().clamp(0.0, 255.0) as u8;
    }
}
