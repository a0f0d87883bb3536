//! Layercast flattens layered requests into a single PNG.
//!
//! A request is a canvas (`w x h`, an optional uniform `size` scale, an optional background) and
//! an ordered list of layers:
//!
//! - **image** layers fetch a remote bitmap, fit it to the requested width, and optionally chroma
//!   key and clip it
//! - **text** layers wrap and measure styled text against registered fonts and rasterize it
//! - **widget** layers render a registered vector widget with merged props
//!
//! Every layer is resolved independently and concurrently. A layer that fails is logged and left
//! out; only invalid canvases abort a run. Pixels are premultiplied RGBA8 throughout.
//!
//! The entry point is [`Compositor`]:
//!
//! ```no_run
//! # async fn demo() -> layercast::LayercastResult<()> {
//! use layercast::{Compositor, CompositorOpts, MergeRequest};
//!
//! let compositor = Compositor::new(CompositorOpts::default())?;
//! let request = MergeRequest::from_json(
//!     r##"{"w": 800, "h": 600, "background": "#fff",
//!         "layers": [{"type": "text", "text": "Hello", "position": [50, 50], "fontSize": 32}]}"##,
//! )?;
//! let png = compositor.compose_request(request).await?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assets;
mod cache;
mod compose;
mod fonts;
mod foundation;
mod layers;
mod raster;
mod text;
mod widgets;

pub use crate::foundation::core::{Position, Rect, Rgba8Premul};
pub use crate::foundation::error::{ErrorReport, LayercastError, LayercastResult};

pub use crate::assets::color::ColorDef;
pub use crate::assets::decode::{decode_image, probe_dimensions};
pub use crate::assets::fetch::{Fetcher, HttpFetcher};
pub use crate::cache::durable::{
    DurableCache, DurableStore, FsDurableStore, InMemoryDurableStore, PutOutcome, content_key,
};
pub use crate::cache::memory::MemoryCache;
pub use crate::compose::compositor::{Compositor, CompositorBuilder};
pub use crate::compose::opts::CompositorOpts;
pub use crate::fonts::catalog::{FontCatalog, FontDescriptor, FontFormat, FontStyle, FontSummary};
pub use crate::fonts::face::FaceDescriptor;
pub use crate::fonts::storage::{FontStorage, FsFontStorage, InMemoryFontStorage};
pub use crate::layers::background::synthesize_background;
pub use crate::layers::image::{DEFAULT_MAX_SOURCE_PIXELS, ImageLayerProcessor};
pub use crate::layers::model::{
    BackgroundConfig, BackgroundFit, CanvasSpec, FontWeight, ImageLayer, Layer, MergeRequest,
    TextAlign, TextLayer, WidgetLayer,
};
pub use crate::layers::placed::PlacedRaster;
pub use crate::layers::source::SourceLoader;
pub use crate::layers::text::TextLayerProcessor;
pub use crate::layers::widget::WidgetLayerProcessor;
pub use crate::raster::blend::BlendMode;
pub use crate::raster::buffer::PremulImage;
pub use crate::raster::ops::{
    ChromaOutcome, ClipInsets, chroma_key, clip, composite_into, crop, draw_outline, encode_png,
    resize_contain, resize_cover, scale_to,
};
pub use crate::raster::svg::{ResvgRasterizer, SvgRasterizer};
pub use crate::text::shaper::{FontQuery, TextShaper, wrap_lines};
pub use crate::widgets::bridge::{WidgetBridge, WidgetRenderOptions};
pub use crate::widgets::registry::{
    RegisteredWidget, RenderContext, Widget, WidgetFont, WidgetProps, WidgetRegistry,
};
