use std::collections::HashMap;
use std::io::Cursor;

use anyhow::Context;
use image::imageops::FilterType;
use rayon::prelude::*;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::raster::blend::{BlendMode, blend_span};
use crate::raster::buffer::PremulImage;

/// Pixels to remove from each edge, in `[top, right, bottom, left]` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipInsets {
    /// Rows removed from the top.
    pub top: u32,
    /// Columns removed from the right.
    pub right: u32,
    /// Rows removed from the bottom.
    pub bottom: u32,
    /// Columns removed from the left.
    pub left: u32,
}

impl ClipInsets {
    /// From `[top, right, bottom, left]`.
    pub fn from_trbl([top, right, bottom, left]: [u32; 4]) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

/// Resample to exactly `width x height` (Lanczos3), ignoring aspect ratio.
pub fn scale_to(img: &PremulImage, width: u32, height: u32) -> LayercastResult<PremulImage> {
    if width == 0 || height == 0 {
        return Err(LayercastError::evaluation(format!(
            "cannot resize to {width}x{height}"
        )));
    }
    if img.is_empty() {
        return Err(LayercastError::evaluation("cannot resize an empty image"));
    }
    if (img.width, img.height) == (width, height) {
        return Ok(img.clone());
    }

    let src = image::RgbaImage::from_raw(img.width, img.height, img.data.clone())
        .ok_or_else(|| LayercastError::evaluation("pixel buffer does not match dimensions"))?;
    let mut data = image::imageops::resize(&src, width, height, FilterType::Lanczos3).into_raw();
    // Lanczos ringing can push a color channel above its alpha.
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        for c in px.iter_mut().take(3) {
            *c = (*c).min(a);
        }
    }
    PremulImage::from_raw(width, height, data)
}

/// Fit inside `width x height` preserving aspect ratio, centered on a transparent pad.
pub fn resize_contain(img: &PremulImage, width: u32, height: u32) -> LayercastResult<PremulImage> {
    if img.is_empty() {
        return Err(LayercastError::evaluation("cannot resize an empty image"));
    }
    let scale = (f64::from(width) / f64::from(img.width)).min(f64::from(height) / f64::from(img.height));
    let fit_w = ((f64::from(img.width) * scale).round() as u32).clamp(1, width.max(1));
    let fit_h = ((f64::from(img.height) * scale).round() as u32).clamp(1, height.max(1));
    let fitted = scale_to(img, fit_w, fit_h)?;
    if (fit_w, fit_h) == (width, height) {
        return Ok(fitted);
    }

    let mut out = PremulImage::transparent(width, height);
    let left = i64::from((width - fit_w) / 2);
    let top = i64::from((height - fit_h) / 2);
    composite_into(&mut out, &fitted, left, top, BlendMode::Source);
    Ok(out)
}

/// Fill `width x height` preserving aspect ratio, cropping the overflow around the center.
pub fn resize_cover(img: &PremulImage, width: u32, height: u32) -> LayercastResult<PremulImage> {
    if img.is_empty() {
        return Err(LayercastError::evaluation("cannot resize an empty image"));
    }
    let scale = (f64::from(width) / f64::from(img.width)).max(f64::from(height) / f64::from(img.height));
    let fill_w = ((f64::from(img.width) * scale).ceil() as u32).max(width);
    let fill_h = ((f64::from(img.height) * scale).ceil() as u32).max(height);
    let filled = scale_to(img, fill_w, fill_h)?;
    Ok(crop(
        &filled,
        (fill_w - width) / 2,
        (fill_h - height) / 2,
        width,
        height,
    ))
}

/// Outcome of [`chroma_key`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaOutcome {
    /// The dominant color was keyed out.
    Keyed {
        /// Dominant straight RGB.
        color: [u8; 3],
        /// Pixels made transparent.
        cleared: usize,
    },
    /// No visible color covered more than the threshold, or transparency already dominates.
    Skipped,
}

/// Make the dominant background color transparent.
///
/// The most frequent exact straight-RGB value among visible pixels is the dominant color (ties go
/// to the smaller packed RGB). Fully transparent pixels count as one extra bucket; when that
/// bucket is at least as large as the dominant color, nothing is keyed, so keying an already keyed
/// image is a no-op. Otherwise, if the dominant color covers more than `threshold` of all pixels,
/// every pixel whose RGB distance to it is below `tolerance * sqrt(3 * 255^2)` becomes fully
/// transparent.
pub fn chroma_key(img: &mut PremulImage, threshold: f64, tolerance: f64) -> ChromaOutcome {
    let total = img.data.len() / 4;
    if total == 0 {
        return ChromaOutcome::Skipped;
    }

    let mut counts: HashMap<u32, usize> = HashMap::new();
    let mut transparent = 0usize;
    for px in img.data.chunks_exact(4) {
        if px[3] == 0 {
            transparent += 1;
            continue;
        }
        *counts.entry(pack_rgb(straight_rgb(px))).or_insert(0) += 1;
    }

    let Some((packed, count)) = counts
        .into_iter()
        .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
    else {
        return ChromaOutcome::Skipped;
    };
    if transparent >= count || (count as f64) / (total as f64) <= threshold {
        return ChromaOutcome::Skipped;
    }

    let color = unpack_rgb(packed);
    let max_distance = (3.0f64 * 255.0 * 255.0).sqrt();
    let limit = tolerance * max_distance;
    let cleared = img
        .data
        .par_chunks_exact_mut(4)
        .map(|px| {
            if px[3] == 0 || rgb_distance(straight_rgb(px), color) >= limit {
                return 0usize;
            }
            px.fill(0);
            1
        })
        .sum();

    tracing::debug!(?color, cleared, "chroma key applied");
    ChromaOutcome::Keyed { color, cleared }
}

/// Remove `insets` from the edges. Fails when nothing would remain.
pub fn clip(img: &PremulImage, insets: ClipInsets) -> LayercastResult<PremulImage> {
    let width = i64::from(img.width) - i64::from(insets.left) - i64::from(insets.right);
    let height = i64::from(img.height) - i64::from(insets.top) - i64::from(insets.bottom);
    if width <= 0 || height <= 0 {
        return Err(LayercastError::evaluation(format!(
            "clip {insets:?} leaves nothing of a {}x{} image",
            img.width, img.height
        )));
    }
    Ok(crop(img, insets.left, insets.top, width as u32, height as u32))
}

/// Sub-rectangle starting at `(x, y)`, clamped to the image bounds.
pub fn crop(img: &PremulImage, x: u32, y: u32, width: u32, height: u32) -> PremulImage {
    let x = x.min(img.width);
    let y = y.min(img.height);
    let width = width.min(img.width - x);
    let height = height.min(img.height - y);
    if (x, y, width, height) == (0, 0, img.width, img.height) {
        return img.clone();
    }

    let stride = img.row_stride();
    let span = width as usize * 4;
    let mut data = Vec::with_capacity(span * height as usize);
    for row in y..y + height {
        let start = row as usize * stride + x as usize * 4;
        data.extend_from_slice(&img.data[start..start + span]);
    }
    PremulImage {
        width,
        height,
        data,
    }
}

/// Paint a `thickness`-pixel border of `color` just inside the image bounds.
pub fn draw_outline(img: &mut PremulImage, color: Rgba8Premul, thickness: u32) {
    let px = color.to_array();
    let (w, h) = (img.width, img.height);
    let t = thickness;
    let stride = img.row_stride();
    for y in 0..h {
        for x in 0..w {
            let on_edge = x < t || y < t || x + t >= w || y + t >= h;
            if on_edge {
                let idx = y as usize * stride + x as usize * 4;
                blend_span(&mut img.data[idx..idx + 4], &px, BlendMode::Over);
            }
        }
    }
}

/// Blend `src` onto `canvas` with its top-left at `(left, top)`.
///
/// Only the intersection of `src` with the canvas is touched, for every mode, including the
/// Porter-Duff ones that would otherwise affect the destination outside the source.
pub fn composite_into(
    canvas: &mut PremulImage,
    src: &PremulImage,
    left: i64,
    top: i64,
    mode: BlendMode,
) {
    if canvas.is_empty() || src.is_empty() {
        return;
    }
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = left
        .saturating_add(i64::from(src.width))
        .min(i64::from(canvas.width));
    let y1 = top
        .saturating_add(i64::from(src.height))
        .min(i64::from(canvas.height));
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let canvas_stride = canvas.row_stride();
    let src_stride = src.row_stride();
    let span = (x1 - x0) as usize * 4;
    let src_x = (x0 - left) as usize * 4;
    canvas
        .data
        .par_chunks_exact_mut(canvas_stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let src_y = (y as i64 - top) as usize;
            let s = src_y * src_stride + src_x;
            let d = x0 as usize * 4;
            blend_span(&mut row[d..d + span], &src.data[s..s + span], mode);
        });
}

/// Encode as straight-alpha RGBA PNG.
pub fn encode_png(img: &PremulImage) -> LayercastResult<Vec<u8>> {
    let mut straight = img.data.clone();
    unpremultiply_rgba8_in_place(&mut straight);
    let rgba = image::RgbaImage::from_raw(img.width, img.height, straight)
        .ok_or_else(|| LayercastError::evaluation("pixel buffer does not match dimensions"))?;

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}

fn straight_rgb(px: &[u8]) -> [u8; 3] {
    let a = u32::from(px[3]);
    if a == 255 || a == 0 {
        return [px[0], px[1], px[2]];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2])]
}

fn pack_rgb([r, g, b]: [u8; 3]) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

fn unpack_rgb(packed: u32) -> [u8; 3] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}

fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
#[path = "../../tests/unit/raster/ops.rs"]
mod tests;
