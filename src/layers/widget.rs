use std::sync::Arc;

use crate::foundation::error::LayercastResult;
use crate::layers::model::WidgetLayer;
use crate::layers::placed::{DEBUG_OUTLINE_PX, DEBUG_WIDGET, PlacedRaster, to_canvas_px};
use crate::layers::text::escape_xml;
use crate::raster::blend::BlendMode;
use crate::raster::buffer::PremulImage;
use crate::raster::ops::{composite_into, draw_outline};
use crate::raster::svg::SvgRasterizer;
use crate::widgets::bridge::{WidgetBridge, WidgetRenderOptions};

const LABEL_HEIGHT: u32 = 16;
const LABEL_FONT_PX: u32 = 11;

/// Resolves [`WidgetLayer`]s through the [`WidgetBridge`].
pub struct WidgetLayerProcessor {
    bridge: Arc<WidgetBridge>,
    rasterizer: Arc<dyn SvgRasterizer>,
}

impl std::fmt::Debug for WidgetLayerProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetLayerProcessor")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl WidgetLayerProcessor {
    /// `rasterizer` draws the debug name label; widget bodies go through the bridge's own.
    pub fn new(bridge: Arc<WidgetBridge>, rasterizer: Arc<dyn SvgRasterizer>) -> Self {
        Self { bridge, rasterizer }
    }

    /// Render one widget layer. In debug mode the raster gets an outline and its widget name in
    /// the top-left corner.
    pub fn process(&self, layer: &WidgetLayer, debug: bool) -> LayercastResult<PlacedRaster> {
        let opts = WidgetRenderOptions {
            width: layer.width,
            height: layer.height,
            scale: layer.scale,
        };
        let mut img = self.bridge.render(&layer.name, &layer.props, opts)?;
        if debug {
            draw_outline(&mut img, DEBUG_WIDGET, DEBUG_OUTLINE_PX);
            self.draw_label(&mut img, &layer.name);
        }

        Ok(PlacedRaster::new(
            img,
            to_canvas_px(layer.position.x),
            to_canvas_px(layer.position.y),
        )
        .with_blend(layer.blend))
    }

    fn draw_label(&self, img: &mut PremulImage, name: &str) {
        let width = (name.chars().count() as u32 * 7 + 8).min(img.width);
        let height = LABEL_HEIGHT.min(img.height);
        if width == 0 || height == 0 {
            return;
        }
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="{width}" height="{height}" fill="rgb(0,200,0)"/><text x="4" y="{baseline}" font-size="{LABEL_FONT_PX}" font-family="sans-serif" fill="#ffffff">{text}</text></svg>"##,
            baseline = LABEL_HEIGHT - 4,
            text = escape_xml(name),
        );
        match self.rasterizer.rasterize(&svg, width, height) {
            Ok(label) => composite_into(img, &label, 0, 0, BlendMode::Over),
            Err(err) => tracing::warn!(widget = %name, error = %err, "debug label failed to render"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layers/widget.rs"]
mod tests;
