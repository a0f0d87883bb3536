use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raster::svg::MAX_DIM;
use crate::widgets::bridge::{DEFAULT_WIDGET_HEIGHT, DEFAULT_WIDGET_WIDTH};

/// Options controlling a [`Compositor`](crate::Compositor).
///
/// Every field has a default, so partial JSON deserializes:
///
/// ```
/// let opts: layercast::CompositorOpts = serde_json::from_str(r#"{"memoryCapacity": 64}"#).unwrap();
/// assert_eq!(opts.memory_capacity, 64);
/// assert_eq!(opts.max_dimension, 16_384);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompositorOpts {
    /// Entry bound of the memory tier (sources and outputs each get their own).
    pub memory_capacity: usize,
    /// Memory tier entry lifetime, in seconds.
    pub memory_ttl_secs: u64,
    /// Directory of the filesystem durable tier. `None` disables it unless a store is supplied to
    /// the builder.
    pub durable_dir: Option<PathBuf>,
    /// Per-request timeout of the default HTTP fetcher, in seconds.
    pub fetch_timeout_secs: u64,
    /// User agent of the default HTTP fetcher.
    pub user_agent: Option<String>,
    /// Largest accepted canvas side, before and after the `size` scale.
    pub max_dimension: u32,
    /// Family list used by text layers that name none.
    pub default_font_family: String,
    /// Line height multiplier used by text layers that give none.
    pub default_line_height: f64,
    /// Widget layout width when neither the layer nor the registration gives one.
    pub default_widget_width: u32,
    /// Widget layout height when neither the layer nor the registration gives one.
    pub default_widget_height: u32,
    /// Keep encoded outputs in the memory tier keyed by the request content.
    pub cache_outputs: bool,
    /// Embed `@font-face` rules into text fragments.
    pub embed_font_faces: bool,
    /// Deadline used by [`Compositor::compose_with_timeout`](crate::Compositor::compose_with_timeout),
    /// in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            memory_capacity: 500,
            memory_ttl_secs: 300,
            durable_dir: None,
            fetch_timeout_secs: 30,
            user_agent: None,
            max_dimension: MAX_DIM,
            default_font_family: "Noto Sans SC, DIN Pro, sans-serif".to_owned(),
            default_line_height: 1.2,
            default_widget_width: DEFAULT_WIDGET_WIDTH,
            default_widget_height: DEFAULT_WIDGET_HEIGHT,
            cache_outputs: true,
            embed_font_faces: true,
            request_timeout_ms: 30_000,
        }
    }
}

impl CompositorOpts {
    pub(crate) fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    pub(crate) fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/opts.rs"]
mod tests;
