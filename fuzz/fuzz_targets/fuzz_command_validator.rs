#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_ssh_inspector::security::{MAX_COMMAND_BYTES, MAX_COMMAND_TOKENS};
use mcp_ssh_inspector::validate_command;

fuzz_target!(|data: &str| {
    let result = validate_command(data);

    // 1. Empty commands must always be rejected
    if data.trim().is_empty() {
        assert!(result.is_err(), "Empty command should be rejected");
    }

    // 2. Accepted commands respect the size bounds
    if let Ok(command) = result {
        assert!(data.len() <= MAX_COMMAND_BYTES);
        assert!(!command.tokens().is_empty());
        assert!(command.tokens().len() <= MAX_COMMAND_TOKENS);
        assert!(command.tokens().iter().all(|t| !t.contains('\0')));
    }
});
