use super::*;

fn blend(dst: [u8; 4], src: [u8; 4], mode: BlendMode) -> [u8; 4] {
    let mut d = dst.to_vec();
    blend_span(&mut d, &src, mode);
    [d[0], d[1], d[2], d[3]]
}

#[test]
fn over_opaque_source_replaces_destination() {
    assert_eq!(
        blend([10, 20, 30, 255], [200, 100, 50, 255], BlendMode::Over),
        [200, 100, 50, 255]
    );
}

#[test]
fn over_transparent_source_is_noop() {
    assert_eq!(
        blend([10, 20, 30, 255], [0, 0, 0, 0], BlendMode::Over),
        [10, 20, 30, 255]
    );
}

#[test]
fn over_half_alpha_mixes() {
    assert_eq!(
        blend([0, 0, 0, 255], [128, 0, 0, 128], BlendMode::Over),
        [128, 0, 0, 255]
    );
}

#[test]
fn multiply_opaque_is_multiply() {
    assert_eq!(
        blend([128, 128, 128, 255], [128, 0, 0, 255], BlendMode::Multiply),
        [64, 0, 0, 255]
    );
}

#[test]
fn screen_and_difference_opaque() {
    assert_eq!(
        blend([255, 0, 0, 255], [0, 0, 255, 255], BlendMode::Screen),
        [255, 0, 255, 255]
    );
    assert_eq!(
        blend([200, 50, 0, 255], [50, 50, 0, 255], BlendMode::Difference),
        [150, 0, 0, 255]
    );
}

#[test]
fn porter_duff_operators() {
    let dst = [0, 0, 255, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(blend(dst, src, BlendMode::Clear), [0, 0, 0, 0]);
    assert_eq!(blend(dst, src, BlendMode::Source), src);
    assert_eq!(blend(dst, src, BlendMode::Dest), dst);
    assert_eq!(blend(dst, src, BlendMode::DestOver), dst);
    assert_eq!(blend(dst, src, BlendMode::Xor), [0, 0, 0, 0]);
    assert_eq!(blend([0, 0, 0, 0], src, BlendMode::In), [0, 0, 0, 0]);
    assert_eq!(blend([0, 0, 0, 0], src, BlendMode::Out), src);
    assert_eq!(blend(dst, [0, 0, 0, 0], BlendMode::DestIn), [0, 0, 0, 0]);
    assert_eq!(blend(dst, src, BlendMode::DestOut), [0, 0, 0, 0]);
}

#[test]
fn add_saturates_channels() {
    assert_eq!(
        blend([200, 100, 0, 255], [100, 100, 0, 255], BlendMode::Add),
        [255, 200, 0, 255]
    );
}

#[test]
fn saturate_only_fills_remaining_coverage() {
    assert_eq!(
        blend([0, 0, 255, 255], [255, 0, 0, 255], BlendMode::Saturate),
        [0, 0, 255, 255]
    );
    assert_eq!(
        blend([0, 0, 0, 0], [255, 0, 0, 255], BlendMode::Saturate),
        [255, 0, 0, 255]
    );
}

#[test]
fn names_parse_with_aliases_and_unknown_falls_back() {
    assert_eq!("colour-dodge".parse::<BlendMode>().unwrap(), BlendMode::ColorDodge);
    assert_eq!("Colour-Burn".parse::<BlendMode>().unwrap(), BlendMode::ColorBurn);
    assert_eq!("dest-atop".parse::<BlendMode>().unwrap(), BlendMode::DestAtop);
    assert!("sparkle".parse::<BlendMode>().is_err());

    let m: BlendMode = serde_json::from_value(serde_json::json!("sparkle")).unwrap();
    assert_eq!(m, BlendMode::Over);
    let m: BlendMode = serde_json::from_value(serde_json::json!("hard-light")).unwrap();
    assert_eq!(m, BlendMode::HardLight);
    assert_eq!(serde_json::to_value(BlendMode::SoftLight).unwrap(), "soft-light");
}

#[test]
fn every_mode_round_trips_its_name() {
    use BlendMode::*;
    for mode in [
        Clear, Source, Over, In, Out, Atop, Dest, DestOver, DestIn, DestOut, DestAtop, Xor, Add,
        Saturate, Multiply, Screen, Overlay, Darken, Lighten, ColorDodge, ColorBurn, HardLight,
        SoftLight, Difference, Exclusion,
    ] {
        assert_eq!(mode.as_str().parse::<BlendMode>().unwrap(), mode);
    }
}
