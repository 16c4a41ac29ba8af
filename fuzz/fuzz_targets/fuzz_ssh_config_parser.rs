#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_ssh_inspector::parse_ssh_config_content;

fuzz_target!(|data: &str| {
    // Simulates malformed or malicious ~/.ssh/config files
    let hosts = parse_ssh_config_content(data);

    // 1. Empty input must produce empty output
    if data.lines().all(|l| l.trim().is_empty() || l.trim().starts_with('#')) {
        assert!(hosts.is_empty(), "Empty/comment-only config must produce no hosts");
    }

    // 2. Every record has a name, an address and a user
    for (alias, host) in &hosts {
        assert!(!alias.is_empty());
        assert_eq!(alias, &host.name);
        assert!(!host.address.is_empty());
        assert!(!host.user.is_empty());
    }

    // 3. Wildcard aliases never appear
    for alias in hosts.keys() {
        assert!(!alias.contains('*'), "Wildcard hosts must be skipped");
        assert!(!alias.contains('?'), "Wildcard hosts must be skipped");
    }
});
