use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::color::ColorDef;
use crate::fonts::catalog::FontStyle;
use crate::foundation::core::Position;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::blend::BlendMode;
use crate::raster::ops::ClipInsets;
use crate::widgets::registry::WidgetProps;

/// One visual element. Array order is compositing order, first is bottom-most.
///
/// Deserialization dispatches on `type` (`image`, `text`, `widget`, or the `component` alias);
/// a missing `type` means `image`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    /// Remote bitmap.
    Image(ImageLayer),
    /// Styled text block.
    Text(TextLayer),
    /// Registered widget.
    Widget(WidgetLayer),
}

impl Layer {
    /// Short kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Text(_) => "text",
            Self::Widget(_) => "widget",
        }
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let mut map = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            other => return Err(D::Error::custom(format!("layer must be an object, got {other}"))),
        };
        let kind = match map.remove("type") {
            None | Some(Value::Null) => "image".to_owned(),
            Some(Value::String(s)) => s,
            Some(other) => return Err(D::Error::custom(format!("layer type must be a string, got {other}"))),
        };
        let body = Value::Object(map);
        match kind.as_str() {
            "image" => serde_json::from_value(body).map(Self::Image),
            "text" => serde_json::from_value(body).map(Self::Text),
            "widget" | "component" => serde_json::from_value(body).map(Self::Widget),
            other => {
                return Err(D::Error::custom(format!(
                    "unknown layer type \"{other}\" (expected image, text or widget)"
                )));
            }
        }
        .map_err(|err| D::Error::custom(format!("invalid {kind} layer: {err}")))
    }
}

/// Remote bitmap resized to `width` (height follows the natural aspect unless given).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    /// Source URL.
    pub url: String,
    /// Target width in pixels.
    #[serde(deserialize_with = "de_px")]
    pub width: u32,
    /// Target height; contain-fit with transparent padding when given.
    #[serde(default, deserialize_with = "de_opt_px", skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Top-left corner on the canvas.
    pub position: Position,
    /// `[top, right, bottom, left]` pixels removed after resize.
    #[serde(
        default,
        deserialize_with = "de_clip",
        serialize_with = "ser_clip",
        skip_serializing_if = "Option::is_none"
    )]
    pub clip: Option<ClipInsets>,
    /// Minimum dominant-color pixel fraction (0..1) that triggers chroma keying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_threshold: Option<f64>,
    /// Keying radius as a fraction (0..1) of the largest RGB distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_tolerance: Option<f64>,
    /// Blend mode (default over).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<BlendMode>,
}

/// Horizontal anchoring of text lines around `position.x`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Lines start at `position.x`.
    #[default]
    Left,
    /// Lines are centered on `position.x`.
    Center,
    /// Lines end at `position.x`.
    Right,
}

/// Numeric font weight; accepts numbers, numeric strings, `bold` and `normal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FontWeight(pub u16);

impl<'de> Deserialize<'de> for FontWeight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) if n.is_finite() && (1.0..=1000.0).contains(&n) => {
                Ok(Self(n.round() as u16))
            }
            Repr::Num(n) => Err(D::Error::custom(format!("font weight {n} out of range"))),
            Repr::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "bold" => Ok(Self(700)),
                "normal" | "regular" => Ok(Self(400)),
                other => other
                    .parse::<u16>()
                    .ok()
                    .filter(|w| (1..=1000).contains(w))
                    .map(Self)
                    .ok_or_else(|| D::Error::custom(format!("invalid font weight \"{s}\""))),
            },
        }
    }
}

/// Text block, optionally wrapped at `max_width`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// Content; `\n` starts a new paragraph.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Anchor point; `y` is the top of the block.
    pub position: Position,
    /// Any CSS color; the default is black.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Comma-separated fallback list; the compositor default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Explicit weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    /// Explicit style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<FontStyle>,
    /// Shorthand for weight 700; overrides `font_weight` when true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    /// Shorthand for italic; overrides `font_style` when true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    /// Line anchoring.
    #[serde(default)]
    pub text_align: TextAlign,
    /// Wrap width; also the block width when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    /// Multiple of `font_size`; the compositor default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    /// Outline color (CSS).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    /// Outline width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Blend mode (default over).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<BlendMode>,
}

impl TextLayer {
    /// Weight after the `bold` shorthand.
    pub fn effective_weight(&self) -> u16 {
        match self.bold {
            Some(true) => 700,
            _ => self.font_weight.map_or(400, |w| w.0),
        }
    }

    /// Style after the `italic` shorthand.
    pub fn effective_style(&self) -> FontStyle {
        match self.italic {
            Some(true) => FontStyle::Italic,
            _ => self.font_style.unwrap_or_default(),
        }
    }

    /// Stroke width when a visible stroke is requested, else zero.
    pub fn effective_stroke_width(&self) -> f64 {
        match (self.stroke_color.as_deref(), self.stroke_width) {
            (Some(_), Some(w)) if w.is_finite() && w > 0.0 => w,
            _ => 0.0,
        }
    }
}

/// Registered widget rendered at an optional explicit size and scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetLayer {
    /// Registered widget name.
    pub name: String,
    /// Props merged over the registered defaults.
    #[serde(default)]
    pub props: WidgetProps,
    /// Top-left corner on the canvas.
    pub position: Position,
    /// Layout width override.
    #[serde(default, deserialize_with = "de_opt_px", skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Layout height override.
    #[serde(default, deserialize_with = "de_opt_px", skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Layout-time scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Blend mode (default over).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<BlendMode>,
}

/// How an image background fills the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundFit {
    /// Fill, cropping overflow.
    #[default]
    Cover,
    /// Fit inside, transparent padding.
    Contain,
    /// Stretch to the canvas.
    Fill,
}

/// Bottom-most synthetic layer. A bare color string or object is shorthand for `{type: color}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum BackgroundConfig {
    /// Flat fill.
    #[allow(missing_docs)]
    Color { color: ColorDef },
    /// Linear blend from `from` to `to`; `angle` in degrees, 0 runs left to right, 90 top to bottom.
    #[allow(missing_docs)]
    Gradient {
        from: ColorDef,
        to: ColorDef,
        angle: f64,
    },
    /// Two-color tiles of `cell_size` pixels, `light` at the origin.
    #[allow(missing_docs)]
    Checkerboard {
        light: ColorDef,
        dark: ColorDef,
        cell_size: u32,
    },
    /// Remote image fitted to the canvas.
    #[allow(missing_docs)]
    Image { url: String, fit: BackgroundFit },
}

impl<'de> Deserialize<'de> for BackgroundConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
        enum Tagged {
            Color {
                color: ColorDef,
            },
            Gradient {
                from: ColorDef,
                to: ColorDef,
                #[serde(default)]
                angle: f64,
            },
            Checkerboard {
                #[serde(default = "default_light")]
                light: ColorDef,
                #[serde(default = "default_dark")]
                dark: ColorDef,
                #[serde(default = "default_cell")]
                cell_size: u32,
            },
            Image {
                url: String,
                #[serde(default)]
                fit: BackgroundFit,
            },
        }

        fn default_light() -> ColorDef {
            ColorDef::rgba(1.0, 1.0, 1.0, 1.0)
        }
        fn default_dark() -> ColorDef {
            ColorDef::rgba(0.8, 0.8, 0.8, 1.0)
        }
        fn default_cell() -> u32 {
            16
        }

        let value = Value::deserialize(deserializer)?;
        let tagged = match &value {
            Value::Object(map) if map.contains_key("type") => true,
            _ => false,
        };
        if !tagged {
            let color = ColorDef::deserialize(value).map_err(D::Error::custom)?;
            return Ok(Self::Color { color });
        }
        Ok(match Tagged::deserialize(value).map_err(D::Error::custom)? {
            Tagged::Color { color } => Self::Color { color },
            Tagged::Gradient { from, to, angle } => Self::Gradient { from, to, angle },
            Tagged::Checkerboard {
                light,
                dark,
                cell_size,
            } => Self::Checkerboard {
                light,
                dark,
                cell_size,
            },
            Tagged::Image { url, fit } => Self::Image { url, fit },
        })
    }
}

/// Output canvas. `w x h` is the size before the uniform `size` scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasSpec {
    /// Width before scaling.
    pub w: i64,
    /// Height before scaling.
    pub h: i64,
    /// Uniform post-composite scale (default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Outline every placed raster and label widgets.
    #[serde(default)]
    pub debug: bool,
    /// Bottom-most fill (a solid color or an image), drawn under every layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundConfig>,
    /// Scale for widget layers that carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl CanvasSpec {
    /// Canvas of `w x h` with every option at its default.
    pub fn new(w: i64, h: i64) -> Self {
        Self {
            w,
            h,
            size: None,
            debug: false,
            background: None,
            scale: None,
        }
    }

    /// `size`, defaulting to 1.
    pub fn size_factor(&self) -> f64 {
        self.size.unwrap_or(1.0)
    }

    /// Final `(floor(w * size), floor(h * size))`.
    pub fn output_dimensions(&self) -> (u32, u32) {
        let s = self.size_factor();
        let dim = |v: i64| ((v as f64) * s).floor().max(0.0) as u32;
        (dim(self.w), dim(self.h))
    }
}

/// A whole compositing request: canvas fields at the top level plus `layers` (or the legacy
/// `images` key).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Canvas fields.
    #[serde(flatten)]
    pub canvas: CanvasSpec,
    /// Layers, bottom first.
    #[serde(default, alias = "images")]
    pub layers: Vec<Layer>,
}

impl MergeRequest {
    /// Request from parts.
    pub fn new(canvas: CanvasSpec, layers: Vec<Layer>) -> Self {
        Self { canvas, layers }
    }

    /// Parse strict JSON. Malformed input is a validation error.
    pub fn from_json(input: &str) -> LayercastResult<Self> {
        serde_json::from_str(input)
            .map_err(|err| LayercastError::validation(format!("invalid request: {err}")))
    }

    /// Serialize back to canonical JSON, the form output cache keys are hashed from.
    pub fn to_json(&self) -> LayercastResult<String> {
        serde_json::to_string(self).map_err(|err| LayercastError::serde(err.to_string()))
    }

    /// Apply the canvas-level widget `scale` to widget layers without one.
    pub(crate) fn apply_global_scale(&mut self) {
        let Some(scale) = self.canvas.scale else {
            return;
        };
        for layer in &mut self.layers {
            if let Layer::Widget(w) = layer {
                if w.scale.is_none() {
                    tracing::debug!(widget = %w.name, scale, "applying canvas widget scale");
                    w.scale = Some(scale);
                }
            }
        }
    }
}

fn px_from_f64<E: serde::de::Error>(v: f64) -> Result<u32, E> {
    if !v.is_finite() || v < 0.0 || v > f64::from(u32::MAX) {
        return Err(E::custom(format!("pixel value {v} out of range")));
    }
    Ok(v.round() as u32)
}

fn de_px<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    px_from_f64(f64::deserialize(deserializer)?)
}

fn de_opt_px<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(px_from_f64)
        .transpose()
}

fn de_clip<'de, D>(deserializer: D) -> Result<Option<ClipInsets>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some([t, r, b, l]) = Option::<[f64; 4]>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(ClipInsets::from_trbl([
        px_from_f64(t)?,
        px_from_f64(r)?,
        px_from_f64(b)?,
        px_from_f64(l)?,
    ])))
}

fn ser_clip<S>(clip: &Option<ClipInsets>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    clip.map(|c| [c.top, c.right, c.bottom, c.left])
        .serialize(serializer)
}

#[cfg(test)]
#[path = "../../tests/unit/layers/model.rs"]
mod tests;
