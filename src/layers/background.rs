use rayon::prelude::*;

use crate::assets::decode::decode_image;
use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::layers::model::{BackgroundConfig, BackgroundFit};
use crate::layers::placed::PlacedRaster;
use crate::layers::source::SourceLoader;
use crate::raster::buffer::PremulImage;
use crate::raster::ops::{resize_contain, resize_cover, scale_to};

/// Build the synthetic bottom layer covering `width x height` at the origin.
pub async fn synthesize_background(
    config: &BackgroundConfig,
    width: u32,
    height: u32,
    sources: &SourceLoader,
) -> LayercastResult<PlacedRaster> {
    if width == 0 || height == 0 {
        return Err(LayercastError::evaluation(format!(
            "background needs a non-empty canvas, got {width}x{height}"
        )));
    }
    let img = match config {
        BackgroundConfig::Color { color } => {
            PremulImage::filled(width, height, color.to_rgba8_premul())
        }
        BackgroundConfig::Gradient { from, to, angle } => linear_gradient(
            width,
            height,
            from.to_rgba8_premul(),
            to.to_rgba8_premul(),
            *angle,
        ),
        BackgroundConfig::Checkerboard {
            light,
            dark,
            cell_size,
        } => checkerboard(
            width,
            height,
            light.to_rgba8_premul(),
            dark.to_rgba8_premul(),
            *cell_size,
        ),
        BackgroundConfig::Image { url, fit } => {
            let bytes = sources.load(url).await?;
            let decoded = decode_image(&bytes)?;
            match fit {
                BackgroundFit::Cover => resize_cover(&decoded, width, height)?,
                BackgroundFit::Contain => resize_contain(&decoded, width, height)?,
                BackgroundFit::Fill => scale_to(&decoded, width, height)?,
            }
        }
    };
    Ok(PlacedRaster::new(img, 0, 0))
}

/// Interpolate premultiplied endpoints along the direction of `angle_deg`.
///
/// `t` is the pixel center projected onto the direction vector, normalized so the canvas corners
/// furthest along it land on 0 and 1.
pub(crate) fn linear_gradient(
    width: u32,
    height: u32,
    from: Rgba8Premul,
    to: Rgba8Premul,
    angle_deg: f64,
) -> PremulImage {
    let mut img = PremulImage::transparent(width, height);
    let angle = if angle_deg.is_finite() { angle_deg } else { 0.0 };
    let (dy, dx) = angle.to_radians().sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));
    let extent = (w * dx).abs() + (h * dy).abs();
    let from = from.to_array().map(f64::from);
    let to = to.to_array().map(f64::from);

    let stride = img.row_stride();
    img.data
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let cy = y as f64 + 0.5 - h / 2.0;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let cx = x as f64 + 0.5 - w / 2.0;
                let t = if extent > 0.0 {
                    (0.5 + (cx * dx + cy * dy) / extent).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                for ((out, a), b) in px.iter_mut().zip(from).zip(to) {
                    *out = (a + (b - a) * t).round() as u8;
                }
                // keep the premultiplied invariant under rounding
                px[0] = px[0].min(px[3]);
                px[1] = px[1].min(px[3]);
                px[2] = px[2].min(px[3]);
            }
        });
    img
}

pub(crate) fn checkerboard(
    width: u32,
    height: u32,
    light: Rgba8Premul,
    dark: Rgba8Premul,
    cell_size: u32,
) -> PremulImage {
    let cell = cell_size.max(1) as usize;
    let (light, dark) = (light.to_array(), dark.to_array());
    let mut img = PremulImage::transparent(width, height);
    let stride = img.row_stride();
    img.data
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let even = (x / cell + y / cell) % 2 == 0;
                px.copy_from_slice(if even { &light } else { &dark });
            }
        });
    img
}

#[cfg(test)]
#[path = "../../tests/unit/layers/background.rs"]
mod tests;
