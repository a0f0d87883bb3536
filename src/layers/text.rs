use std::fmt::Write as _;
use std::sync::Arc;

use crate::fonts::catalog::css_family_list;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::layers::model::{TextAlign, TextLayer};
use crate::layers::placed::{DEBUG_OUTLINE_PX, DEBUG_TEXT, PlacedRaster, to_canvas_px};
use crate::raster::ops::draw_outline;
use crate::raster::svg::SvgRasterizer;
use crate::text::shaper::{FontQuery, TextShaper};

pub(crate) const DEFAULT_LINE_HEIGHT: f64 = 1.2;
const DEFAULT_COLOR: &str = "#000000";

/// Block geometry computed before rendering.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TextBlock {
    pub(crate) lines: Vec<String>,
    pub(crate) line_height_px: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl TextBlock {
    /// Whole-pixel size of the rendered raster, at least 1x1.
    pub(crate) fn raster_size(&self) -> (u32, u32) {
        (
            (self.width.ceil() as u32).max(1),
            (self.height.ceil() as u32).max(1),
        )
    }

    /// Horizontal shift from `position.x` to the raster's left edge. Also the `x` the lines are
    /// anchored at inside the raster.
    pub(crate) fn anchor_offset(&self, align: TextAlign) -> f64 {
        let width = f64::from(self.raster_size().0);
        match align {
            TextAlign::Left => 0.0,
            TextAlign::Center => width / 2.0,
            TextAlign::Right => width,
        }
    }
}

/// Resolves [`TextLayer`]s into rasterized text blocks.
pub struct TextLayerProcessor {
    shaper: Arc<TextShaper>,
    rasterizer: Arc<dyn SvgRasterizer>,
    default_family: String,
    default_line_height: f64,
    embed_font_faces: bool,
}

impl std::fmt::Debug for TextLayerProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLayerProcessor")
            .field("default_family", &self.default_family)
            .field("default_line_height", &self.default_line_height)
            .field("embed_font_faces", &self.embed_font_faces)
            .finish_non_exhaustive()
    }
}

impl TextLayerProcessor {
    /// Processor falling back to `default_family` when a layer names none.
    pub fn new(
        shaper: Arc<TextShaper>,
        rasterizer: Arc<dyn SvgRasterizer>,
        default_family: impl Into<String>,
    ) -> Self {
        Self {
            shaper,
            rasterizer,
            default_family: default_family.into(),
            default_line_height: DEFAULT_LINE_HEIGHT,
            embed_font_faces: true,
        }
    }

    /// Line height multiplier for layers that carry none (default 1.2).
    pub fn with_default_line_height(mut self, line_height: f64) -> Self {
        self.default_line_height = line_height;
        self
    }

    /// Whether fragments carry `@font-face` rules for the resolved fonts (default: yes).
    pub fn with_embedded_font_faces(mut self, enabled: bool) -> Self {
        self.embed_font_faces = enabled;
        self
    }

    /// Resolve one text layer.
    ///
    /// Lines are wrapped by the shaper and measured one by one. The block is
    /// `lines * font_size * line_height` tall and `max_width` wide when given, otherwise as wide
    /// as the longest line plus twice the stroke width. Baselines sit at
    /// `(i + 1) * line_px - (line_px - font_size) / 2`.
    pub fn process(&self, layer: &TextLayer, debug: bool) -> LayercastResult<PlacedRaster> {
        let query = self.query(layer)?;
        let block = self.layout(layer, &query)?;

        let (raster_w, raster_h) = block.raster_size();
        let markup = self.markup(layer, &query, &block, raster_w, raster_h);
        let mut img = self.rasterizer.rasterize(&markup, raster_w, raster_h)?;
        if debug {
            draw_outline(&mut img, DEBUG_TEXT, DEBUG_OUTLINE_PX);
        }

        let left = to_canvas_px(layer.position.x - block.anchor_offset(layer.text_align));
        let top = to_canvas_px(layer.position.y);
        Ok(PlacedRaster::new(img, left, top).with_blend(layer.blend))
    }

    fn query(&self, layer: &TextLayer) -> LayercastResult<FontQuery> {
        if !layer.font_size.is_finite() || layer.font_size <= 0.0 {
            return Err(LayercastError::evaluation(format!(
                "text font size must be finite and > 0, got {}",
                layer.font_size
            )));
        }
        let family = layer
            .font_family
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(&self.default_family);
        Ok(FontQuery::new(family, layer.font_size)
            .with_weight(layer.effective_weight())
            .with_style(layer.effective_style()))
    }

    pub(crate) fn layout(&self, layer: &TextLayer, query: &FontQuery) -> LayercastResult<TextBlock> {
        let max_width = layer.max_width.filter(|w| w.is_finite() && *w > 0.0);
        let lines = self.shaper.wrap(&layer.text, max_width, query)?;
        let line_widths = self.shaper.measure_lines(&lines, query)?;

        let multiplier = layer
            .line_height
            .filter(|l| l.is_finite() && *l > 0.0)
            .unwrap_or(self.default_line_height);
        let line_height_px = layer.font_size * multiplier;
        let height = lines.len() as f64 * line_height_px;
        let width = match max_width {
            Some(w) => w,
            None => {
                let widest = line_widths.iter().copied().fold(0.0, f64::max);
                widest + 2.0 * layer.effective_stroke_width()
            }
        };

        Ok(TextBlock {
            lines,
            line_height_px,
            width,
            height,
        })
    }

    fn markup(
        &self,
        layer: &TextLayer,
        query: &FontQuery,
        block: &TextBlock,
        width: u32,
        height: u32,
    ) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        if self.embed_font_faces {
            let css = self.font_faces(query);
            if !css.is_empty() {
                let _ = write!(svg, "<defs><style>{css}</style></defs>");
            }
        }

        let x = block.anchor_offset(layer.text_align);
        let anchor = match layer.text_align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let family = escape_xml(&css_family_list(&query.family));
        let fill = escape_xml(layer.color.as_deref().unwrap_or(DEFAULT_COLOR));
        let stroke_width = layer.effective_stroke_width();
        let stroke = match layer.stroke_color.as_deref() {
            Some(color) if stroke_width > 0.0 => format!(
                r#" stroke="{}" stroke-width="{stroke_width}" stroke-linejoin="round" paint-order="stroke""#,
                escape_xml(color)
            ),
            _ => String::new(),
        };

        let line_px = block.line_height_px;
        for (i, line) in block.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = (i as f64 + 1.0) * line_px - (line_px - layer.font_size) / 2.0;
            let _ = write!(
                svg,
                r#"<text x="{x}" y="{y}" text-anchor="{anchor}" font-family="{family}" font-size="{size}" font-weight="{weight}" font-style="{style}" fill="{fill}"{stroke} xml:space="preserve">{text}</text>"#,
                size = layer.font_size,
                weight = query.weight,
                style = query.style.as_css(),
                text = escape_xml(line),
            );
        }
        svg.push_str("</svg>");
        svg
    }

    fn font_faces(&self, query: &FontQuery) -> String {
        let catalog = self.shaper.catalog();
        let mut seen = std::collections::HashSet::new();
        catalog
            .resolve_family_list(&query.family, query.weight, query.style)
            .iter()
            .filter(|desc| seen.insert(desc.path.clone()))
            .map(|desc| catalog.font_face_css(desc))
            .filter(|css| !css.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/layers/text.rs"]
mod tests;
