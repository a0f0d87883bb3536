use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        LayercastError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        LayercastError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
    assert!(
        LayercastError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert!(LayercastError::cache("x").to_string().contains("cache error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = LayercastError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn widget_not_found_lists_available_names() {
    let err = LayercastError::WidgetNotFound {
        name: "Missing".to_owned(),
        available: vec!["LiveBadge".to_owned(), "RewardsCard".to_owned()],
    };
    let msg = err.to_string();
    assert!(msg.contains("\"Missing\""));
    assert!(msg.contains("LiveBadge, RewardsCard"));
}

#[test]
fn only_validation_and_timeout_are_fatal() {
    assert!(LayercastError::validation("w must be > 0").is_fatal());
    assert!(LayercastError::Timeout(std::time::Duration::from_secs(1)).is_fatal());
    assert!(!LayercastError::evaluation("decode").is_fatal());
    assert!(!LayercastError::fetch("http://x", "404").is_fatal());
    assert!(
        !LayercastError::FontResolution {
            family: "Nope".to_owned()
        }
        .is_fatal()
    );
}

#[test]
fn report_serializes_without_empty_details() {
    let report = LayercastError::evaluation("bad").report();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["error"], "evaluation error: bad");
    assert!(json.get("details").is_none());

    let report = LayercastError::validation("w must be > 0").report();
    assert!(report.details.is_some());
}
