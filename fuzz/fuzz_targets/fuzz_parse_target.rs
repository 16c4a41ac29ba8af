#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_ssh_inspector::parse_target;

fuzz_target!(|data: &str| {
    let Ok(target) = parse_target(data) else {
        return;
    };

    // 1. The hosts keyword carries neither host nor path
    if target.is_list_hosts {
        assert!(target.host.is_none());
        assert!(target.path.is_empty());
        assert!(data.trim().eq_ignore_ascii_case("hosts"));
        return;
    }

    // 2. Otherwise both segments are present and trimmed
    let host = target.host.expect("host must be set");
    assert!(!host.is_empty());
    assert!(!target.path.is_empty());
    assert_eq!(host, host.trim());
    assert_eq!(target.path, target.path.trim());

    // 3. The host never contains the separator; the path may
    assert!(!host.contains(':'));
});
