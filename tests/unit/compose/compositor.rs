use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::json;

use super::*;
use crate::cache::durable::InMemoryDurableStore;
use crate::fonts::storage::InMemoryFontStorage;
use crate::widgets::registry::{RegisteredWidget, RenderContext, WidgetProps};

#[derive(Default)]
struct MapFetcher {
    files: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl Fetcher for MapFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, LayercastResult<Vec<u8>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(LayercastError::fetch(url, "connection reset"));
            }
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| LayercastError::fetch(url, "not found"))
        })
    }
}

#[derive(Default)]
struct Recording {
    sizes: Mutex<Vec<(u32, u32)>>,
}

impl SvgRasterizer for Recording {
    fn rasterize(&self, _svg: &str, width: u32, height: u32) -> LayercastResult<PremulImage> {
        self.sizes.lock().push((width, height));
        Ok(PremulImage::filled(
            width,
            height,
            crate::foundation::core::Rgba8Premul {
                r: 0,
                g: 0,
                b: 255,
                a: 255,
            },
        ))
    }
}

fn blank(_props: &WidgetProps, ctx: &RenderContext<'_>) -> LayercastResult<String> {
    Ok(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}"/>"#,
        ctx.width, ctx.height
    ))
}

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(w, h, image::Rgba(rgba)))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

struct Fixture {
    compositor: Compositor,
    fetcher: Arc<MapFetcher>,
    rasterizer: Arc<Recording>,
}

fn fixture(opts: CompositorOpts, delay: Option<Duration>) -> Fixture {
    let mut files = HashMap::new();
    files.insert("https://x/red.png".to_owned(), png(4, 4, [255, 0, 0, 255]));
    let fetcher = Arc::new(MapFetcher {
        files,
        delay,
        calls: AtomicUsize::new(0),
        failures_left: AtomicUsize::new(0),
    });
    let rasterizer = Arc::new(Recording::default());
    let registry = Arc::new(WidgetRegistry::new());
    registry.register(RegisteredWidget::new("Blank", blank)).unwrap();
    let catalog = Arc::new(FontCatalog::new(Arc::new(InMemoryFontStorage::new())));
    let compositor = Compositor::builder(opts)
        .with_font_catalog(catalog)
        .with_widget_registry(registry)
        .with_fetcher(fetcher.clone())
        .with_durable_store(Arc::new(InMemoryDurableStore::new()))
        .with_rasterizer(rasterizer.clone())
        .build()
        .unwrap();
    Fixture {
        compositor,
        fetcher,
        rasterizer,
    }
}

fn request(value: serde_json::Value) -> MergeRequest {
    serde_json::from_value(value).unwrap()
}

fn decode(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

#[tokio::test]
async fn invalid_canvases_are_fatal_validation_errors() {
    let f = fixture(CompositorOpts::default(), None);
    let layer = json!([{"url": "https://x/red.png", "position": [0, 0], "width": 4}]);
    for canvas in [
        json!({"w": 0, "h": 10, "layers": layer}),
        json!({"w": 10, "h": -1, "layers": layer}),
        json!({"w": 20_000, "h": 10, "layers": layer}),
        json!({"w": 10, "h": 10, "size": 0, "layers": layer}),
        json!({"w": 10, "h": 10, "size": 0.01, "layers": layer}),
        json!({"w": 10, "h": 10, "layers": []}),
    ] {
        let err = f.compositor.compose_request(request(canvas)).await.unwrap_err();
        assert!(matches!(err, LayercastError::Validation(_)), "{err}");
        assert!(err.is_fatal());
    }
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn background_alone_is_a_valid_request() {
    let f = fixture(CompositorOpts::default(), None);
    let out = f
        .compositor
        .compose_request(request(json!({"w": 6, "h": 3, "background": "#00ff00"})))
        .await
        .unwrap();
    let img = decode(&out);
    assert_eq!(img.dimensions(), (6, 3));
    assert_eq!(img.get_pixel(5, 2).0, [0, 255, 0, 255]);
}

#[tokio::test]
async fn failed_layers_are_dropped_not_fatal() {
    let f = fixture(CompositorOpts::default(), None);
    let out = f
        .compositor
        .compose_request(request(json!({
            "w": 8, "h": 8,
            "layers": [
                {"url": "https://x/missing.png", "position": [0, 0], "width": 8},
                {"type": "widget", "name": "Unknown", "position": [0, 0]},
                {"url": "https://x/red.png", "position": [4, 4], "width": 4}
            ]
        })))
        .await
        .unwrap();
    let img = decode(&out);
    assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn repeated_requests_hit_the_output_cache() {
    let f = fixture(CompositorOpts::default(), None);
    let req = json!({"w": 10, "h": 10, "layers": [{"type": "widget", "name": "Blank", "position": [0, 0]}]});
    let a = f.compositor.compose_request(request(req.clone())).await.unwrap();
    let b = f.compositor.compose_request(request(req.clone())).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(f.rasterizer.sizes.lock().len(), 1);

    f.compositor.clear_caches();
    f.compositor.compose_request(request(req)).await.unwrap();
    assert_eq!(f.rasterizer.sizes.lock().len(), 2);
}

#[tokio::test]
async fn output_cache_can_be_disabled() {
    let opts = CompositorOpts {
        cache_outputs: false,
        ..CompositorOpts::default()
    };
    let f = fixture(opts, None);
    let req = json!({"w": 10, "h": 10, "layers": [{"type": "widget", "name": "Blank", "position": [0, 0]}]});
    f.compositor.compose_request(request(req.clone())).await.unwrap();
    f.compositor.compose_request(request(req)).await.unwrap();
    assert_eq!(f.rasterizer.sizes.lock().len(), 2);
}

#[tokio::test]
async fn canvas_scale_reaches_widgets_without_their_own() {
    let f = fixture(CompositorOpts::default(), None);
    f.compositor
        .compose_request(request(json!({
            "w": 10, "h": 10, "scale": 2,
            "layers": [
                {"type": "widget", "name": "Blank", "position": [0, 0], "width": 10, "height": 5},
                {"type": "component", "name": "Blank", "position": [0, 0], "width": 10, "height": 5, "scale": 1}
            ]
        })))
        .await
        .unwrap();
    let mut sizes = f.rasterizer.sizes.lock().clone();
    sizes.sort();
    assert_eq!(sizes, vec![(10, 5), (20, 10)]);
}

#[tokio::test]
async fn sources_are_fetched_once_across_requests() {
    let f = fixture(CompositorOpts::default(), None);
    for w in [4, 5] {
        f.compositor
            .compose_request(request(json!({
                "w": w, "h": 4,
                "layers": [{"url": "https://x/red.png", "position": [0, 0], "width": 4}]
            })))
            .await
            .unwrap();
    }
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_runs_time_out_but_keep_warming_caches() {
    let f = fixture(CompositorOpts::default(), Some(Duration::from_millis(200)));
    let req = json!({
        "w": 4, "h": 4,
        "layers": [{"url": "https://x/red.png", "position": [0, 0], "width": 4}]
    });
    let err = f
        .compositor
        .compose_with_deadline(request(req.clone()), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, LayercastError::Timeout(_)));
    assert!(err.is_fatal());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let out = f
        .compositor
        .compose_with_deadline(request(req), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(decode(&out).dimensions(), (4, 4));
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn builder_rejects_nonsense_options() {
    let opts = CompositorOpts {
        max_dimension: 0,
        ..CompositorOpts::default()
    };
    let err = Compositor::builder(opts)
        .with_fetcher(Arc::new(MapFetcher::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, LayercastError::Validation(_)));
}

#[tokio::test]
async fn layers_far_off_canvas_are_cropped_away() {
    let f = fixture(CompositorOpts::default(), None);
    let out = f
        .compositor
        .compose_request(request(json!({
            "w": 8, "h": 8,
            "layers": [
                {"url": "https://x/red.png", "position": [1e19, 0], "width": 4},
                {"url": "https://x/red.png", "position": [-1e19, -1e300], "width": 4,
                 "clip": [1, 1, 1, 1]},
                {"url": "https://x/red.png", "position": [2, 2], "width": 4}
            ]
        })))
        .await
        .unwrap();
    let img = decode(&out);
    assert_eq!(img.dimensions(), (8, 8));
    assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn degraded_outputs_are_not_cached() {
    let f = fixture(CompositorOpts::default(), None);
    f.fetcher.failures_left.store(1, Ordering::SeqCst);
    let req = json!({
        "w": 4, "h": 4, "background": "#00ff00",
        "layers": [{"url": "https://x/red.png", "position": [0, 0], "width": 4}]
    });

    let first = decode(&f.compositor.compose_request(request(req.clone())).await.unwrap());
    assert_eq!(first.get_pixel(1, 1).0, [0, 255, 0, 255]);

    let second = decode(&f.compositor.compose_request(request(req.clone())).await.unwrap());
    assert_eq!(second.get_pixel(1, 1).0, [255, 0, 0, 255]);
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 2);

    // the complete render is cached
    f.compositor.compose_request(request(req)).await.unwrap();
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 2);
}
