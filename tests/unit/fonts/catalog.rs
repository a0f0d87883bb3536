use super::*;
use crate::fonts::storage::InMemoryFontStorage;

fn catalog() -> FontCatalog {
    let storage = InMemoryFontStorage::new()
        .with_file("NotoSansSC-Regular.ttf", b"noto".to_vec())
        .with_file("dinpro_bold.otf", b"din".to_vec());
    FontCatalog::with_default_fonts(Arc::new(storage))
}

#[test]
fn exact_key_then_base_key_fallback() {
    let c = catalog();
    let din = c.resolve("DIN Pro", 700, FontStyle::Normal).unwrap();
    assert_eq!(din.path, "dinpro_bold.otf");

    // Weight/style mismatch still resolves through the name-only key.
    let din = c.resolve("din pro", 400, FontStyle::Italic).unwrap();
    assert_eq!(din.name, "DIN Pro");

    assert!(c.resolve("Comic Sans", 400, FontStyle::Normal).is_none());
}

#[test]
fn aliases_are_case_insensitive_and_unquoted() {
    let c = catalog();
    for alias in ["DIN", "din-pro", "'DINPro'", " \"dinpro\" "] {
        let f = c.resolve(alias, 700, FontStyle::Normal).unwrap();
        assert_eq!(f.name, "DIN Pro", "alias {alias}");
    }
    assert_eq!(
        c.resolve("noto-sans-sc", 400, FontStyle::Normal).unwrap().name,
        "Noto Sans SC"
    );
}

#[test]
fn base_key_is_claimed_by_first_registration() {
    let storage = InMemoryFontStorage::new();
    let mut c = FontCatalog::new(Arc::new(storage));
    c.register(FontDescriptor::new("Inter", "inter-regular.ttf", FontFormat::TrueType));
    c.register(
        FontDescriptor::new("Inter", "inter-bold.ttf", FontFormat::TrueType).with_weight(700),
    );

    assert_eq!(
        c.resolve("Inter", 700, FontStyle::Normal).unwrap().path,
        "inter-bold.ttf"
    );
    assert_eq!(
        c.resolve("Inter", 300, FontStyle::Normal).unwrap().path,
        "inter-regular.ttf"
    );
    assert_eq!(c.all_fonts().len(), 2);
}

#[test]
fn family_list_resolves_in_order_and_skips_misses() {
    let c = catalog();
    let fonts = c.resolve_family_list("Missing, 'DIN Pro', Noto Sans SC, sans-serif", 400, FontStyle::Normal);
    let names: Vec<_> = fonts.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["DIN Pro", "Noto Sans SC"]);
}

#[test]
fn binary_is_loaded_lazily_and_cached() {
    let c = catalog();
    let noto = c.resolve("Noto Sans SC", 400, FontStyle::Normal).unwrap();
    let a = c.binary(&noto).unwrap();
    let b = c.binary(&noto).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(&*a, b"noto");

    c.clear_binary_cache();
    let again = c.binary(&noto).unwrap();
    assert!(!Arc::ptr_eq(&a, &again));
}

#[test]
fn face_css_embeds_base64_binary() {
    let c = catalog();
    let din = c.resolve("DIN", 700, FontStyle::Normal).unwrap();
    let face = c.face_descriptor(&din).unwrap();
    assert_eq!(face.mime_type, "font/otf");
    assert_eq!(face.format, "opentype");
    assert_eq!(face.data_base64, "ZGlu");

    let css = face.to_css();
    assert!(css.contains("font-family: 'DIN Pro'"));
    assert!(css.contains("data:font/otf;charset=utf-8;base64,ZGlu"));
    assert!(css.contains("format('opentype')"));
    assert!(css.contains("font-weight: 700"));
}

#[test]
fn unreadable_font_yields_empty_css() {
    let mut c = FontCatalog::new(Arc::new(InMemoryFontStorage::new()));
    c.register(FontDescriptor::new("Ghost", "ghost.ttf", FontFormat::TrueType));
    let ghost = c.resolve("Ghost", 400, FontStyle::Normal).unwrap();
    assert_eq!(c.font_face_css(&ghost), "");
    assert_eq!(c.all_font_faces_css(), "");
}

#[test]
fn renderer_weight_snaps_invalid_values() {
    let f = FontDescriptor::new("X", "x.ttf", FontFormat::TrueType).with_weight(650);
    assert_eq!(f.renderer_weight(), 400);
    let f = f.with_weight(900);
    assert_eq!(f.renderer_weight(), 900);
}

#[test]
fn summaries_and_css_family_list() {
    let c = catalog();
    let json = serde_json::to_value(c.summaries()).unwrap();
    assert_eq!(json[1]["name"], "DIN Pro");
    assert_eq!(json[1]["format"], "opentype");
    assert_eq!(json[1]["aliases"][2], "DIN");

    assert_eq!(
        css_family_list("Noto Sans SC, \"DIN Pro\", sans-serif"),
        "'Noto Sans SC', 'DIN Pro', sans-serif"
    );
}

#[test]
fn descriptor_deserializes_with_defaults() {
    let d: FontDescriptor =
        serde_json::from_str(r#"{"name": "X", "path": "x.otf", "format": "opentype", "style": "oblique"}"#)
            .unwrap();
    assert_eq!(d.weight, 400);
    assert_eq!(d.style, FontStyle::Italic);
    assert_eq!(d.format, FontFormat::OpenType);
    assert!(d.aliases.is_empty());
}
