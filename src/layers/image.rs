use std::sync::Arc;

use crate::assets::decode::{decode_image, probe_dimensions};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::layers::model::ImageLayer;
use crate::layers::placed::{DEBUG_IMAGE, DEBUG_OUTLINE_PX, PlacedRaster, to_canvas_px};
use crate::layers::source::SourceLoader;
use crate::raster::ops::{chroma_key, clip, draw_outline, resize_contain};

/// Largest source image, in pixels, decoded by default.
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 1 << 26;

/// Resolves [`ImageLayer`]s: fetch, resize, chroma key, clip.
#[derive(Debug)]
pub struct ImageLayerProcessor {
    sources: Arc<SourceLoader>,
    max_source_pixels: u64,
}

impl ImageLayerProcessor {
    /// Processor loading sources through `sources`.
    pub fn new(sources: Arc<SourceLoader>) -> Self {
        Self {
            sources,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }

    /// Reject sources whose header announces more than `max` pixels.
    pub fn with_max_source_pixels(mut self, max: u64) -> Self {
        self.max_source_pixels = max;
        self
    }

    /// Resolve one image layer.
    ///
    /// The source is resized to `width x floor(width / aspect)` (or the explicit height, contain
    /// fit). Chroma keying runs when both threshold and tolerance are set. Clip insets are in
    /// resized pixels and shift the placement by `(left, top)`. The header is read before any
    /// pixel is decoded: empty or oversized sources fail the layer.
    pub async fn process(&self, layer: &ImageLayer, debug: bool) -> LayercastResult<PlacedRaster> {
        if layer.width == 0 {
            return Err(LayercastError::evaluation("image layer width must be > 0"));
        }
        let bytes = self.sources.load(&layer.url).await?;
        let (natural_w, natural_h) = probe_dimensions(&bytes)?;
        let pixels = u64::from(natural_w) * u64::from(natural_h);
        if pixels == 0 {
            return Err(LayercastError::evaluation(format!(
                "image {} has no pixels",
                layer.url
            )));
        }
        if pixels > self.max_source_pixels {
            return Err(LayercastError::evaluation(format!(
                "image {} is {natural_w}x{natural_h}, over the {} pixel limit",
                layer.url, self.max_source_pixels
            )));
        }

        let aspect = f64::from(natural_w) / f64::from(natural_h);
        let height = match layer.height {
            Some(h) if h > 0 => h,
            _ => ((f64::from(layer.width) / aspect).floor() as u32).max(1),
        };
        let decoded = decode_image(&bytes)?;
        let mut img = resize_contain(&decoded, layer.width, height)?;

        if let (Some(threshold), Some(tolerance)) = (layer.chroma_threshold, layer.chroma_tolerance)
        {
            chroma_key(&mut img, threshold, tolerance);
        }

        let mut left = to_canvas_px(layer.position.x);
        let mut top = to_canvas_px(layer.position.y);
        if let Some(insets) = layer.clip {
            img = clip(&img, insets)?;
            left = left.saturating_add(i64::from(insets.left));
            top = top.saturating_add(i64::from(insets.top));
        }

        if debug {
            draw_outline(&mut img, DEBUG_IMAGE, DEBUG_OUTLINE_PX);
        }
        Ok(PlacedRaster::new(img, left, top).with_blend(layer.blend))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layers/image.rs"]
mod tests;
