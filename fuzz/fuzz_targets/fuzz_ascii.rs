#![no_main]

use libfuzzer_sys::fuzz_target;
use vv_normalize::normalize_ascii;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 8192 {
        return;
    }

    let normalized = normalize_ascii(text);
    assert!(!normalized.contains("\\n"));
    assert_eq!(normalized.trim(), normalized);
});
