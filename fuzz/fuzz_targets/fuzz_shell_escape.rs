#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_ssh_inspector::{quote, quote_path};

fuzz_target!(|data: &str| {
    let escaped = quote(data);

    // 1. Result is wrapped in single quotes
    assert!(escaped.starts_with('\''), "Must start with quote");
    assert!(escaped.ends_with('\''), "Must end with quote");
    assert!(escaped.len() >= 2, "Must have at least 2 chars");

    // 2. Every inner quote is part of a '\'' sequence
    let inner = &escaped[1..escaped.len() - 1];
    assert_eq!(
        inner.replace("'\\''", "").matches('\'').count(),
        0,
        "Unescaped quote in {escaped}"
    );

    // 3. Stripping the escapes gives back the input
    assert_eq!(inner.replace("'\\''", "'"), data);

    // 4. Paths never start with an option dash once quoted
    let quoted_path = quote_path(data);
    assert!(!quoted_path.starts_with("'-"));
});
