#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_ssh_inspector::validate_path;

fuzz_target!(|data: &str| {
    let Ok(path) = validate_path(data) else {
        return;
    };

    // 1. A `..` component is always rejected
    assert!(
        !data.split('/').any(|c| c == ".."),
        "Path with '..' component must be rejected: {data}"
    );

    // 2. Accepted paths never lead with a `..` component and carry no NUL
    assert_ne!(path.as_str().split('/').next(), Some(".."));
    assert!(!path.as_str().contains('\0'));

    // 3. Validation is idempotent
    let again = validate_path(path.as_str()).expect("validated path must validate again");
    assert_eq!(again.as_str(), path.as_str());
});
