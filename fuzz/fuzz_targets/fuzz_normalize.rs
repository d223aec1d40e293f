#![no_main]

use libfuzzer_sys::fuzz_target;
use vv_normalize::{detect_kind, normalize_diagram, normalize_diagram_text};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 8192 {
        return;
    }

    let normalized = normalize_diagram(text);

    if text.is_empty() {
        assert!(normalized.is_empty());
    }

    // Normalizing twice changes nothing.
    let again = normalize_diagram_text(normalized.as_str());
    assert_eq!(again, normalized.as_str(), "normalize must be idempotent");

    // No literal `\n` survives.
    assert!(!normalized.as_str().contains("\\n"));

    // The reported kind is the one the text starts with.
    if let Some(kind) = normalized.kind() {
        assert_eq!(detect_kind(normalized.as_str()), Some(kind));
    }
});
