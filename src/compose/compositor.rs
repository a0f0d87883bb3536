use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::assets::fetch::{Fetcher, HttpFetcher};
use crate::cache::durable::{DurableCache, DurableStore, FsDurableStore};
use crate::cache::memory::MemoryCache;
use crate::compose::opts::CompositorOpts;
use crate::fonts::catalog::{FontCatalog, split_family_list};
use crate::fonts::storage::FsFontStorage;
use crate::foundation::core::Rect;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::content_hash_hex;
use crate::layers::background::synthesize_background;
use crate::layers::image::ImageLayerProcessor;
use crate::layers::model::{CanvasSpec, Layer, MergeRequest};
use crate::layers::placed::PlacedRaster;
use crate::layers::source::SourceLoader;
use crate::layers::text::TextLayerProcessor;
use crate::layers::widget::WidgetLayerProcessor;
use crate::raster::blend::BlendMode;
use crate::raster::buffer::PremulImage;
use crate::raster::ops::{composite_into, crop, encode_png, scale_to};
use crate::raster::svg::{ResvgRasterizer, SvgRasterizer};
use crate::text::shaper::TextShaper;
use crate::widgets::bridge::WidgetBridge;
use crate::widgets::registry::WidgetRegistry;

/// Assembles a [`Compositor`] from its collaborators.
///
/// Anything not supplied falls back to a default: the catalog with the stock font registrations
/// over `./fonts`, an empty widget registry, [`HttpFetcher`], a [`FsDurableStore`] when
/// [`CompositorOpts::durable_dir`] is set, and [`ResvgRasterizer`].
#[derive(Default)]
pub struct CompositorBuilder {
    opts: CompositorOpts,
    catalog: Option<Arc<FontCatalog>>,
    widgets: Option<Arc<WidgetRegistry>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    durable: Option<Arc<dyn DurableStore>>,
    rasterizer: Option<Arc<dyn SvgRasterizer>>,
}

impl CompositorBuilder {
    /// Builder over `opts`.
    pub fn new(opts: CompositorOpts) -> Self {
        Self {
            opts,
            ..Self::default()
        }
    }

    /// Font catalog shared by text measurement, text rendering and widgets.
    pub fn with_font_catalog(mut self, catalog: Arc<FontCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Registry widget layers are resolved against.
    pub fn with_widget_registry(mut self, registry: Arc<WidgetRegistry>) -> Self {
        self.widgets = Some(registry);
        self
    }

    /// Source of remote bytes for image layers and image backgrounds.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Durable tier; overrides [`CompositorOpts::durable_dir`].
    pub fn with_durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Rasterizer for text fragments and widget markup.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn SvgRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Finish. Fails only when the default HTTP client cannot be constructed or an option is
    /// out of range.
    pub fn build(self) -> LayercastResult<Compositor> {
        let opts = self.opts;
        if opts.max_dimension == 0 {
            return Err(LayercastError::validation("max_dimension must be > 0"));
        }
        if !opts.default_line_height.is_finite() || opts.default_line_height <= 0.0 {
            return Err(LayercastError::validation(
                "default_line_height must be finite and > 0",
            ));
        }

        let catalog = self.catalog.unwrap_or_else(|| {
            Arc::new(FontCatalog::with_default_fonts(Arc::new(
                FsFontStorage::default(),
            )))
        });
        let registry = self.widgets.unwrap_or_default();
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(f) => f,
            None => Arc::new(HttpFetcher::new(
                opts.fetch_timeout(),
                opts.user_agent.as_deref(),
            )?),
        };
        let durable = self.durable.or_else(|| {
            opts.durable_dir
                .as_ref()
                .map(|dir| Arc::new(FsDurableStore::new(dir)) as Arc<dyn DurableStore>)
        });
        let rasterizer = self.rasterizer.unwrap_or_else(|| {
            let family = split_family_list(&opts.default_font_family)
                .into_iter()
                .next()
                .unwrap_or_else(|| "sans-serif".to_owned());
            Arc::new(ResvgRasterizer::new(catalog.clone(), family))
        });

        let sources = Arc::new(SourceLoader::new(
            fetcher,
            durable.map(DurableCache::new),
            opts.memory_capacity,
            opts.memory_ttl(),
        ));
        let shaper = Arc::new(TextShaper::new(catalog.clone()));
        let texts = TextLayerProcessor::new(shaper, rasterizer.clone(), &opts.default_font_family)
            .with_default_line_height(opts.default_line_height)
            .with_embedded_font_faces(opts.embed_font_faces);
        let bridge = Arc::new(
            WidgetBridge::new(registry.clone(), catalog.clone(), rasterizer.clone())
                .with_default_size(opts.default_widget_width, opts.default_widget_height),
        );

        Ok(Compositor {
            inner: Arc::new(Inner {
                images: ImageLayerProcessor::new(sources.clone()),
                texts,
                widgets: WidgetLayerProcessor::new(bridge, rasterizer),
                outputs: MemoryCache::new(opts.memory_capacity, opts.memory_ttl()),
                sources,
                catalog,
                registry,
                opts,
            }),
        })
    }
}

/// Encoded output of one run. `complete` is false when any layer or the background was dropped.
struct RunOutput {
    png: Vec<u8>,
    complete: bool,
}

struct Inner {
    opts: CompositorOpts,
    catalog: Arc<FontCatalog>,
    registry: Arc<WidgetRegistry>,
    sources: Arc<SourceLoader>,
    images: ImageLayerProcessor,
    texts: TextLayerProcessor,
    widgets: WidgetLayerProcessor,
    outputs: MemoryCache<Arc<[u8]>>,
}

/// Flattens layered requests into PNG bytes.
///
/// A run validates the canvas, resolves every layer concurrently, composites the survivors in
/// layer order on a canvas large enough to hold all of them, crops to `w x h`, applies the `size`
/// scale and encodes. Layers that fail to resolve are logged and left out. Only
/// [fatal](LayercastError::is_fatal) errors are returned.
///
/// Cloning is cheap; clones share caches and collaborators.
#[derive(Clone)]
pub struct Compositor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("opts", &self.inner.opts)
            .field("fonts", &self.inner.catalog.len())
            .field("widgets", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl Compositor {
    /// Compositor with default collaborators.
    pub fn new(opts: CompositorOpts) -> LayercastResult<Self> {
        CompositorBuilder::new(opts).build()
    }

    /// Start a [`CompositorBuilder`].
    pub fn builder(opts: CompositorOpts) -> CompositorBuilder {
        CompositorBuilder::new(opts)
    }

    /// Options this compositor was built with.
    pub fn opts(&self) -> &CompositorOpts {
        &self.inner.opts
    }

    /// Shared font catalog.
    pub fn font_catalog(&self) -> &Arc<FontCatalog> {
        &self.inner.catalog
    }

    /// Shared widget registry; widgets registered after construction are visible to later runs.
    pub fn widget_registry(&self) -> &Arc<WidgetRegistry> {
        &self.inner.registry
    }

    /// Drop cached outputs and in-memory sources. The durable tier is untouched.
    pub fn clear_caches(&self) {
        self.inner.outputs.clear();
        self.inner.sources.clear_memory();
    }

    /// Composite `layers` (bottom first) onto `canvas`.
    pub async fn compose(&self, canvas: CanvasSpec, layers: Vec<Layer>) -> LayercastResult<Vec<u8>> {
        self.compose_request(MergeRequest::new(canvas, layers)).await
    }

    /// Composite a parsed request.
    #[tracing::instrument(
        level = "info",
        skip(self, request),
        fields(w = request.canvas.w, h = request.canvas.h, layers = request.layers.len())
    )]
    pub async fn compose_request(&self, mut request: MergeRequest) -> LayercastResult<Vec<u8>> {
        self.validate(&request)?;
        request.apply_global_scale();

        let cache_key = self.output_key(&request);
        if let Some(key) = cache_key.as_deref()
            && let Some(hit) = self.inner.outputs.get(key)
        {
            tracing::debug!(key, "output cache hit");
            return Ok(hit.to_vec());
        }

        let run = self.run(&request).await?;
        match cache_key {
            Some(key) if run.complete => {
                self.inner.outputs.insert(key, Arc::from(run.png.as_slice()));
            }
            Some(_) => tracing::debug!("output not cached, some layers were dropped"),
            None => {}
        }
        Ok(run.png)
    }

    /// [`Compositor::compose_request`] bounded by [`CompositorOpts::request_timeout_ms`].
    pub async fn compose_with_timeout(&self, request: MergeRequest) -> LayercastResult<Vec<u8>> {
        self.compose_with_deadline(request, self.inner.opts.request_timeout())
            .await
    }

    /// [`Compositor::compose_request`] bounded by `deadline`.
    ///
    /// The run is spawned on the current tokio runtime. On timeout its result is abandoned but the
    /// task keeps going, so its fetches still land in the caches.
    pub async fn compose_with_deadline(
        &self,
        request: MergeRequest,
        deadline: Duration,
    ) -> LayercastResult<Vec<u8>> {
        let this = self.clone();
        let handle = tokio::spawn(async move { this.compose_request(request).await });
        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(LayercastError::Other(anyhow!("compositing task failed: {join}"))),
            Err(_) => {
                tracing::warn!(?deadline, "compositing timed out, abandoning result");
                Err(LayercastError::Timeout(deadline))
            }
        }
    }

    fn validate(&self, request: &MergeRequest) -> LayercastResult<()> {
        let canvas = &request.canvas;
        let max = i64::from(self.inner.opts.max_dimension);
        if canvas.w <= 0 || canvas.h <= 0 {
            return Err(LayercastError::validation(format!(
                "canvas dimensions must be > 0, got {}x{}",
                canvas.w, canvas.h
            )));
        }
        if canvas.w > max || canvas.h > max {
            return Err(LayercastError::validation(format!(
                "canvas {}x{} exceeds the maximum of {max}x{max}",
                canvas.w, canvas.h
            )));
        }
        let size = canvas.size_factor();
        if !size.is_finite() || size <= 0.0 {
            return Err(LayercastError::validation(format!(
                "size must be finite and > 0, got {size}"
            )));
        }
        let (out_w, out_h) = canvas.output_dimensions();
        if out_w == 0 || out_h == 0 || i64::from(out_w) > max || i64::from(out_h) > max {
            return Err(LayercastError::validation(format!(
                "scaled output {out_w}x{out_h} must be between 1 and {max} on each side"
            )));
        }
        if request.layers.is_empty() && canvas.background.is_none() {
            return Err(LayercastError::validation(
                "request needs at least one layer or a background",
            ));
        }
        Ok(())
    }

    fn output_key(&self, request: &MergeRequest) -> Option<String> {
        if !self.inner.opts.cache_outputs {
            return None;
        }
        match request.to_json() {
            Ok(json) => Some(format!("out:{}", content_hash_hex(json.as_bytes()))),
            Err(err) => {
                tracing::warn!(error = %err, "request not serializable, output cache skipped");
                None
            }
        }
    }

    async fn run(&self, request: &MergeRequest) -> LayercastResult<RunOutput> {
        let canvas = &request.canvas;
        let debug = canvas.debug;
        let (w, h) = (canvas.w as u32, canvas.h as u32);

        let background = async {
            let Some(config) = canvas.background.as_ref() else {
                return None;
            };
            match synthesize_background(config, w, h, &self.inner.sources).await {
                Ok(placed) => Some(placed),
                Err(err) => {
                    tracing::warn!(error = %err, "background dropped");
                    None
                }
            }
        };
        let layers = futures::future::join_all(
            request
                .layers
                .iter()
                .enumerate()
                .map(|(index, layer)| self.resolve_layer(index, layer, debug)),
        );
        let (background, layers) = futures::join!(background, layers);

        let placed: Vec<PlacedRaster> = background
            .into_iter()
            .chain(layers.into_iter().flatten())
            .collect();
        let requested = request.layers.len() + usize::from(canvas.background.is_some());
        tracing::debug!(resolved = placed.len(), requested, "layers resolved");

        let surface = self.flatten(&placed, w, h);
        let cropped = crop(&surface, 0, 0, w, h);
        let (out_w, out_h) = canvas.output_dimensions();
        let output = if (out_w, out_h) == (w, h) {
            cropped
        } else {
            scale_to(&cropped, out_w, out_h)?
        };
        Ok(RunOutput {
            png: encode_png(&output)?,
            complete: placed.len() == requested,
        })
    }

    #[tracing::instrument(level = "debug", skip(self, layer, debug), fields(kind = layer.kind()))]
    async fn resolve_layer(&self, index: usize, layer: &Layer, debug: bool) -> Option<PlacedRaster> {
        let result = match layer {
            Layer::Image(l) => self.inner.images.process(l, debug).await,
            Layer::Text(l) => self.inner.texts.process(l, debug),
            Layer::Widget(l) => self.inner.widgets.process(l, debug),
        };
        match result {
            Ok(placed) => Some(placed),
            Err(err) => {
                tracing::warn!(index, kind = layer.kind(), error = %err, "layer dropped");
                None
            }
        }
    }

    /// Composite `placed` in order onto a transparent surface covering the canvas and every raster.
    fn flatten(&self, placed: &[PlacedRaster], w: u32, h: u32) -> PremulImage {
        let extent = placed
            .iter()
            .map(PlacedRaster::bounds)
            .fold(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)), |acc, r| {
                acc.union(r)
            });
        // Pixels past the configured canvas are cropped away, so the surface only has to reach
        // the limit for oversized extents.
        let limit = f64::from(self.inner.opts.max_dimension.max(w).max(h));
        let surface_w = extent.x1.ceil().min(limit).max(f64::from(w)) as u32;
        let surface_h = extent.y1.ceil().min(limit).max(f64::from(h)) as u32;
        if f64::from(surface_w) < extent.x1 || f64::from(surface_h) < extent.y1 {
            tracing::debug!(?extent, surface_w, surface_h, "working surface clamped");
        }

        let mut surface = PremulImage::transparent(surface_w, surface_h);
        for p in placed {
            composite_into(
                &mut surface,
                &p.image,
                p.left,
                p.top,
                p.blend.unwrap_or(BlendMode::Over),
            );
        }
        surface
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compositor.rs"]
mod tests;
