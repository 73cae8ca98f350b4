use retro_core::errors::{ErrorInfo, RetroError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("path", "events.json")
        .with_context("offset", "42")
}

#[test]
fn config_error_surface() {
    let err = RetroError::Config(sample_info("invalid-energy-range", "E1 <= E0"));
    assert_eq!(err.info().code, "invalid-energy-range");
    assert!(err.info().context.contains_key("path"));
}

#[test]
fn decay_error_keeps_engine_code() {
    let err = RetroError::Decay(
        ErrorInfo::new("engine-failure", "bad momentum").with_context("engine_code", "3"),
    );
    assert_eq!(err.info().context.get("engine_code").map(String::as_str), Some("3"));
    assert!(err.to_string().starts_with("decay error:"));
}

#[test]
fn log_error_display_lists_context_and_hint() {
    let err = RetroError::Log(
        sample_info("corrupt-record", "expected value").with_hint("truncate the log at offset"),
    );
    let text = err.to_string();
    assert!(text.contains("code: corrupt-record"));
    assert!(text.contains("offset=42"));
    assert!(text.contains("hint: truncate the log at offset"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = RetroError::Primary(ErrorInfo::new("stderr", "segfault"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "Primary");
    assert_eq!(json["detail"]["code"], "stderr");
    let restored: RetroError = serde_json::from_value(json).unwrap();
    assert_eq!(restored, err);
}

#[test]
fn io_shorthand_records_path() {
    let source = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = RetroError::io("card-read", &source, "card.yaml");
    assert_eq!(err.info().context["path"], "card.yaml");
    assert!(matches!(err, RetroError::Io(_)));
}
