use std::sync::Arc;

use parking_lot::RwLock;

use crate::fonts::catalog::FontCatalog;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::PremulImage;
use crate::raster::svg::SvgRasterizer;
use crate::widgets::registry::{RenderContext, WidgetFont, WidgetProps, WidgetRegistry};

pub(crate) const DEFAULT_WIDGET_WIDTH: u32 = 300;
pub(crate) const DEFAULT_WIDGET_HEIGHT: u32 = 200;

/// Size overrides for one widget render.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WidgetRenderOptions {
    /// Layout width; the registry default when `None` or zero.
    pub width: Option<u32>,
    /// Layout height; the registry default when `None` or zero.
    pub height: Option<u32>,
    /// Uniform scale applied at layout time (default 1).
    pub scale: Option<f64>,
}

/// Renders registered widgets to pixels.
///
/// A scale other than 1 wraps the widget markup in a container of
/// `round(width * scale) x round(height * scale)` that scales the vector content, so text and
/// shapes are rasterized at the final resolution instead of being resampled.
pub struct WidgetBridge {
    registry: Arc<WidgetRegistry>,
    catalog: Arc<FontCatalog>,
    rasterizer: Arc<dyn SvgRasterizer>,
    default_size: (u32, u32),
    fonts: RwLock<Option<Arc<[WidgetFont]>>>,
}

impl std::fmt::Debug for WidgetBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetBridge")
            .field("widgets", &self.registry.len())
            .field("default_size", &self.default_size)
            .finish_non_exhaustive()
    }
}

impl WidgetBridge {
    /// Bridge rendering widgets of `registry` through `rasterizer`.
    pub fn new(
        registry: Arc<WidgetRegistry>,
        catalog: Arc<FontCatalog>,
        rasterizer: Arc<dyn SvgRasterizer>,
    ) -> Self {
        Self {
            registry,
            catalog,
            rasterizer,
            default_size: (DEFAULT_WIDGET_WIDTH, DEFAULT_WIDGET_HEIGHT),
            fonts: RwLock::new(None),
        }
    }

    /// Size used when neither the layer nor the registration gives one.
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = (width, height);
        self
    }

    /// Registry widgets are resolved against.
    pub fn registry(&self) -> &Arc<WidgetRegistry> {
        &self.registry
    }

    /// Render widget `name` with `props` merged over its registered defaults.
    #[tracing::instrument(level = "debug", skip(self, props), fields(widget = %name))]
    pub fn render(
        &self,
        name: &str,
        props: &WidgetProps,
        opts: WidgetRenderOptions,
    ) -> LayercastResult<PremulImage> {
        let entry = self.registry.resolve(name)?;

        let mut merged = entry.default_props.clone();
        for (key, value) in props {
            merged.insert(key.clone(), value.clone());
        }

        let width = positive(opts.width)
            .or(positive(entry.default_width))
            .unwrap_or(self.default_size.0);
        let height = positive(opts.height)
            .or(positive(entry.default_height))
            .unwrap_or(self.default_size.1);
        let scale = opts.scale.unwrap_or(1.0);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(LayercastError::evaluation(format!(
                "widget scale must be finite and > 0, got {scale}"
            )));
        }

        let fonts = self.fonts();
        let ctx = RenderContext {
            width,
            height,
            fonts: &fonts,
        };
        let markup = entry.widget().render(&merged, &ctx)?;

        if scale == 1.0 {
            tracing::debug!(width, height, "rasterizing widget");
            return self.rasterizer.rasterize(&markup, width, height);
        }
        let (markup, out_w, out_h) = scale_container(&markup, width, height, scale);
        tracing::debug!(width, height, scale, out_w, out_h, "rasterizing scaled widget");
        self.rasterizer.rasterize(&markup, out_w, out_h)
    }

    /// Forget the cached font list; the next render rebuilds it from the catalog.
    pub fn clear_font_cache(&self) {
        *self.fonts.write() = None;
    }

    fn fonts(&self) -> Arc<[WidgetFont]> {
        if let Some(fonts) = self.fonts.read().as_ref() {
            return Arc::clone(fonts);
        }
        let fonts: Arc<[WidgetFont]> = self
            .catalog
            .all_fonts()
            .into_iter()
            .filter(|desc| match self.catalog.binary(desc) {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!(font = %desc.name, error = %err, "font unavailable to widgets");
                    false
                }
            })
            .map(|desc| WidgetFont {
                name: desc.name.clone(),
                weight: desc.renderer_weight(),
                style: desc.style,
            })
            .collect();
        if fonts.is_empty() {
            tracing::warn!("no catalog fonts loaded, widgets fall back to rasterizer defaults");
        }
        *self.fonts.write() = Some(Arc::clone(&fonts));
        fonts
    }
}

fn positive(v: Option<u32>) -> Option<u32> {
    v.filter(|&v| v > 0)
}

/// Wrap `inner` in an outer document of the scaled size that scales its content by `scale`.
pub(crate) fn scale_container(inner: &str, width: u32, height: u32, scale: f64) -> (String, u32, u32) {
    let out_w = ((f64::from(width) * scale).round() as u32).max(1);
    let out_h = ((f64::from(height) * scale).round() as u32).max(1);
    let inner = strip_xml_prolog(inner);
    let markup = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{out_w}" height="{out_h}" viewBox="0 0 {out_w} {out_h}"><g transform="scale({scale})">{inner}</g></svg>"#
    );
    (markup, out_w, out_h)
}

fn strip_xml_prolog(markup: &str) -> &str {
    let trimmed = markup.trim_start();
    match trimmed.strip_prefix("<?xml") {
        Some(rest) => rest.find("?>").map_or(trimmed, |end| rest[end + 2..].trim_start()),
        None => trimmed,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/widgets/bridge.rs"]
mod tests;
