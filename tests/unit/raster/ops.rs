use super::*;

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn solid(w: u32, h: u32, px: [u8; 4]) -> PremulImage {
    PremulImage::filled(w, h, Rgba8Premul {
        r: px[0],
        g: px[1],
        b: px[2],
        a: px[3],
    })
}

fn paint(img: &mut PremulImage, x: u32, y: u32, px: [u8; 4]) {
    let idx = (y as usize * img.width as usize + x as usize) * 4;
    img.data[idx..idx + 4].copy_from_slice(&px);
}

#[test]
fn scale_to_reaches_exact_size_and_keeps_solid_color() {
    let out = scale_to(&solid(4, 2, RED), 9, 5).unwrap();
    assert_eq!((out.width, out.height), (9, 5));
    assert_eq!(out.pixel(4, 2).unwrap(), RED);
    assert!(scale_to(&solid(4, 2, RED), 0, 5).is_err());
}

#[test]
fn contain_pads_transparently_around_centered_fit() {
    let out = resize_contain(&solid(10, 10, RED), 20, 10).unwrap();
    assert_eq!((out.width, out.height), (20, 10));
    assert_eq!(out.pixel(0, 5).unwrap(), [0, 0, 0, 0]);
    assert_eq!(out.pixel(10, 5).unwrap(), RED);
    assert_eq!(out.pixel(19, 5).unwrap(), [0, 0, 0, 0]);
}

#[test]
fn cover_fills_target_completely() {
    let out = resize_cover(&solid(10, 20, BLUE), 30, 30).unwrap();
    assert_eq!((out.width, out.height), (30, 30));
    assert!(out.data.chunks_exact(4).all(|px| px == BLUE));
}

#[test]
fn clip_yields_reduced_raster() {
    let mut img = solid(10, 8, RED);
    paint(&mut img, 3, 1, BLUE);
    let out = clip(&img, ClipInsets::from_trbl([1, 2, 3, 3])).unwrap();
    assert_eq!((out.width, out.height), (10 - 3 - 2, 8 - 1 - 3));
    assert_eq!(out.pixel(0, 0).unwrap(), BLUE);
    assert_eq!(out.pixel(1, 0).unwrap(), RED);
}

#[test]
fn clip_removing_everything_is_an_error() {
    let img = solid(4, 4, RED);
    assert!(clip(&img, ClipInsets::from_trbl([0, 2, 0, 2])).is_err());
    assert!(clip(&img, ClipInsets::from_trbl([5, 0, 0, 0])).is_err());
}

#[test]
fn crop_clamps_to_bounds() {
    let out = crop(&solid(4, 4, RED), 2, 3, 10, 10);
    assert_eq!((out.width, out.height), (2, 1));
}

#[test]
fn chroma_key_removes_dominant_color_within_tolerance() {
    let mut img = solid(10, 10, GREEN);
    for x in 0..10 {
        paint(&mut img, x, 0, RED);
    }
    paint(&mut img, 5, 5, [0, 250, 5, 255]);

    let outcome = chroma_key(&mut img, 0.5, 0.1);
    assert_eq!(
        outcome,
        ChromaOutcome::Keyed {
            color: [0, 255, 0],
            cleared: 90
        }
    );
    assert_eq!(img.pixel(5, 5).unwrap(), [0, 0, 0, 0]);
    assert_eq!(img.pixel(3, 0).unwrap(), RED);
}

#[test]
fn chroma_key_respects_threshold() {
    let mut img = solid(10, 10, GREEN);
    for y in 0..5 {
        for x in 0..10 {
            paint(&mut img, x, y, RED);
        }
    }
    let before = img.clone();
    assert_eq!(chroma_key(&mut img, 0.5, 0.2), ChromaOutcome::Skipped);
    assert_eq!(img, before);
}

#[test]
fn chroma_key_is_idempotent() {
    let mut img = solid(10, 10, GREEN);
    for y in 0..4 {
        for x in 0..10 {
            paint(&mut img, x, y, RED);
        }
    }
    assert!(matches!(
        chroma_key(&mut img, 0.3, 0.1),
        ChromaOutcome::Keyed { cleared: 60, .. }
    ));
    let keyed = img.clone();
    assert_eq!(chroma_key(&mut img, 0.3, 0.1), ChromaOutcome::Skipped);
    assert_eq!(img, keyed);
}

#[test]
fn chroma_key_tie_prefers_smaller_rgb() {
    let mut img = solid(2, 1, RED);
    paint(&mut img, 1, 0, BLUE);
    let outcome = chroma_key(&mut img, 0.4, 0.01);
    assert_eq!(
        outcome,
        ChromaOutcome::Keyed {
            color: [0, 0, 255],
            cleared: 1
        }
    );
}

#[test]
fn composite_into_clips_to_canvas_and_preserves_order() {
    let mut canvas = PremulImage::transparent(4, 4);
    composite_into(&mut canvas, &solid(3, 3, RED), -1, -1, BlendMode::Over);
    composite_into(&mut canvas, &solid(2, 2, BLUE), 1, 1, BlendMode::Over);
    assert_eq!(canvas.pixel(0, 0).unwrap(), RED);
    assert_eq!(canvas.pixel(1, 1).unwrap(), BLUE);
    assert_eq!(canvas.pixel(2, 2).unwrap(), BLUE);
    assert_eq!(canvas.pixel(3, 3).unwrap(), [0, 0, 0, 0]);
    composite_into(&mut canvas, &solid(2, 2, GREEN), 10, 10, BlendMode::Over);
    assert_eq!(canvas.pixel(3, 3).unwrap(), [0, 0, 0, 0]);
}

#[test]
fn composite_into_ignores_extreme_offsets() {
    let mut canvas = PremulImage::transparent(4, 4);
    composite_into(&mut canvas, &solid(2, 2, RED), i64::MAX, 0, BlendMode::Over);
    composite_into(&mut canvas, &solid(2, 2, RED), 0, i64::MAX - 1, BlendMode::Over);
    composite_into(&mut canvas, &solid(2, 2, RED), i64::MIN, i64::MIN, BlendMode::Over);
    assert!(canvas.data.iter().all(|&b| b == 0));
}

#[test]
fn porter_duff_modes_stay_inside_source_bounds() {
    let mut canvas = solid(4, 1, BLUE);
    composite_into(&mut canvas, &solid(1, 1, RED), 0, 0, BlendMode::Clear);
    assert_eq!(canvas.pixel(0, 0).unwrap(), [0, 0, 0, 0]);
    assert_eq!(canvas.pixel(1, 0).unwrap(), BLUE);
}

#[test]
fn outline_paints_border_only() {
    let mut img = PremulImage::transparent(5, 5);
    draw_outline(&mut img, Rgba8Premul::from_straight_rgba(255, 0, 0, 255), 1);
    assert_eq!(img.pixel(0, 2).unwrap(), RED);
    assert_eq!(img.pixel(4, 4).unwrap(), RED);
    assert_eq!(img.pixel(2, 2).unwrap(), [0, 0, 0, 0]);
}

#[test]
fn encode_png_round_trips_through_decoder() {
    let mut img = solid(3, 2, RED);
    paint(&mut img, 0, 0, [64, 0, 0, 128]);
    let png = encode_png(&img).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (3, 2));
    assert_eq!(decoded.get_pixel(1, 1).0, RED);
    assert_eq!(decoded.get_pixel(0, 0).0, [128, 0, 0, 128]);
}
