use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;

use super::*;
use crate::assets::fetch::Fetcher;

struct MapFetcher(HashMap<String, Vec<u8>>);

impl Fetcher for MapFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, LayercastResult<Vec<u8>>> {
        Box::pin(async move {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| LayercastError::fetch(url, "not found"))
        })
    }
}

fn loader() -> SourceLoader {
    let mut img = image::RgbaImage::from_pixel(40, 10, image::Rgba([0, 0, 255, 255]));
    for y in 0..10 {
        for x in 15..25 {
            img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
        }
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    let mut files = HashMap::new();
    files.insert("https://x/wide.png".to_owned(), buf);
    SourceLoader::new(
        Arc::new(MapFetcher(files)),
        None,
        16,
        Duration::from_secs(60),
    )
}

fn config(value: serde_json::Value) -> BackgroundConfig {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn bare_color_fills_the_canvas() {
    let placed = synthesize_background(&config(json!("#ff000080")), 3, 2, &loader())
        .await
        .unwrap();
    assert_eq!((placed.left, placed.top), (0, 0));
    assert_eq!((placed.width(), placed.height()), (3, 2));
    assert!(placed.image.data.chunks_exact(4).all(|px| px == [128, 0, 0, 128]));
}

#[test]
fn horizontal_gradient_runs_left_to_right() {
    let black = Rgba8Premul { r: 0, g: 0, b: 0, a: 255 };
    let white = Rgba8Premul { r: 255, g: 255, b: 255, a: 255 };
    let img = linear_gradient(100, 4, black, white, 0.0);
    assert_eq!(img.pixel(0, 0), Some([1, 1, 1, 255]));
    assert_eq!(img.pixel(99, 3), Some([254, 254, 254, 255]));
    let row: Vec<u8> = (0..100).map(|x| img.pixel(x, 2).unwrap()[0]).collect();
    assert!(row.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(img.pixel(50, 0), img.pixel(50, 3));
}

#[test]
fn vertical_gradient_runs_top_to_bottom() {
    let clear = Rgba8Premul::transparent();
    let red = Rgba8Premul { r: 255, g: 0, b: 0, a: 255 };
    let img = linear_gradient(4, 50, clear, red, 90.0);
    let top = img.pixel(0, 0).unwrap();
    let bottom = img.pixel(0, 49).unwrap();
    assert!(top[3] < 10 && bottom[3] > 245);
    assert_eq!(img.pixel(0, 25), img.pixel(3, 25));
    assert!(img.data.chunks_exact(4).all(|px| px[0] <= px[3]));
}

#[test]
fn checkerboard_alternates_cells_from_light_origin() {
    let light = Rgba8Premul { r: 255, g: 255, b: 255, a: 255 };
    let dark = Rgba8Premul { r: 10, g: 10, b: 10, a: 255 };
    let img = checkerboard(8, 8, light, dark, 4);
    assert_eq!(img.pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(img.pixel(3, 3), Some([255, 255, 255, 255]));
    assert_eq!(img.pixel(4, 0), Some([10, 10, 10, 255]));
    assert_eq!(img.pixel(0, 4), Some([10, 10, 10, 255]));
    assert_eq!(img.pixel(7, 7), Some([255, 255, 255, 255]));
}

#[tokio::test]
async fn checkerboard_defaults_apply() {
    let placed = synthesize_background(&config(json!({"type": "checkerboard"})), 32, 16, &loader())
        .await
        .unwrap();
    assert_eq!(placed.image.pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(placed.image.pixel(16, 0), Some([204, 204, 204, 255]));
}

#[tokio::test]
async fn image_cover_crops_around_the_center() {
    let cfg = config(json!({"type": "image", "url": "https://x/wide.png"}));
    let placed = synthesize_background(&cfg, 10, 10, &loader()).await.unwrap();
    assert_eq!((placed.width(), placed.height()), (10, 10));
    let center = placed.image.pixel(5, 5).unwrap();
    assert!(center[0] > 200 && center[2] < 50);
}

#[tokio::test]
async fn image_contain_pads_transparently() {
    let cfg = config(json!({"type": "image", "url": "https://x/wide.png", "fit": "contain"}));
    let placed = synthesize_background(&cfg, 40, 40, &loader()).await.unwrap();
    assert_eq!(placed.image.pixel(20, 0), Some([0, 0, 0, 0]));
    assert_eq!(placed.image.pixel(0, 20).unwrap()[3], 255);
}

#[tokio::test]
async fn image_fill_stretches() {
    let cfg = config(json!({"type": "image", "url": "https://x/wide.png", "fit": "fill"}));
    let placed = synthesize_background(&cfg, 8, 8, &loader()).await.unwrap();
    let edge = placed.image.pixel(0, 4).unwrap();
    assert!(edge[2] > 200 && edge[3] >= 250);
}

#[tokio::test]
async fn missing_image_is_a_fetch_error() {
    let cfg = config(json!({"type": "image", "url": "https://x/none.png"}));
    let err = synthesize_background(&cfg, 8, 8, &loader()).await.unwrap_err();
    assert!(matches!(err, LayercastError::Fetch { .. }));
}

#[tokio::test]
async fn empty_canvas_is_rejected() {
    let err = synthesize_background(&config(json!("white")), 0, 8, &loader())
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
}
