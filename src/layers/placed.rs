use crate::foundation::core::{Rect, Rgba8Premul};
use crate::raster::blend::BlendMode;
use crate::raster::buffer::PremulImage;

pub(crate) const DEBUG_IMAGE: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};
pub(crate) const DEBUG_TEXT: Rgba8Premul = Rgba8Premul {
    r: 0,
    g: 0,
    b: 255,
    a: 255,
};
pub(crate) const DEBUG_WIDGET: Rgba8Premul = Rgba8Premul {
    r: 0,
    g: 200,
    b: 0,
    a: 255,
};
pub(crate) const DEBUG_OUTLINE_PX: u32 = 2;

/// A resolved layer ready for composition.
///
/// `left`/`top` are canvas coordinates of the top-left pixel and may be negative or lie past the
/// requested canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedRaster {
    /// Premultiplied pixels.
    pub image: PremulImage,
    /// Canvas x of the left edge.
    pub left: i64,
    /// Canvas y of the top edge.
    pub top: i64,
    /// Blend mode; `None` composites with over.
    pub blend: Option<BlendMode>,
}

impl PlacedRaster {
    /// Place `image` with its top-left corner at `(left, top)`.
    pub fn new(image: PremulImage, left: i64, top: i64) -> Self {
        Self {
            image,
            left,
            top,
            blend: None,
        }
    }

    /// Set the blend mode.
    pub fn with_blend(mut self, blend: Option<BlendMode>) -> Self {
        self.blend = blend;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height
    }

    /// Canvas-space bounds.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.left as f64,
            self.top as f64,
            self.left.saturating_add(i64::from(self.width())) as f64,
            self.top.saturating_add(i64::from(self.height())) as f64,
        )
    }
}

/// Largest offset magnitude a placement can carry. Anything this far out is off every canvas.
pub(crate) const MAX_CANVAS_OFFSET: i64 = 1 << 40;

pub(crate) fn to_canvas_px(v: f64) -> i64 {
    let limit = MAX_CANVAS_OFFSET as f64;
    v.round().clamp(-limit, limit) as i64
}
