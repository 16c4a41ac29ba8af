//! Property-based tests for target parsing, validation and quoting.
//!
//! Complements the fuzz targets with shrinking and deterministic replay.

use proptest::prelude::*;

use mcp_ssh_inspector::domain::shell;
use mcp_ssh_inspector::domain::{parse_target, truncate_utf8};
use mcp_ssh_inspector::security::{validate_command, validate_host_name, validate_path};

// ===== Target Parsing Properties =====

proptest! {
    /// Anything without a colon, other than the hosts keyword, is rejected.
    #[test]
    fn no_separator_is_rejected(s in "[^:]*") {
        prop_assume!(!s.trim().eq_ignore_ascii_case("hosts"));
        prop_assert!(parse_target(&s).is_err());
    }

    /// A blank host or blank path is rejected.
    #[test]
    fn blank_segment_is_rejected(seg in "[a-z0-9/._-]{1,20}", blank in "[ \t]*") {
        let empty_host = format!("{blank}:{seg}");
        let empty_path = format!("{seg}:{blank}");
        prop_assert!(parse_target(&empty_host).is_err());
        prop_assert!(parse_target(&empty_path).is_err());
    }

    /// Only the first colon separates; the path keeps the rest.
    #[test]
    fn split_on_first_colon(host in "[a-z][a-z0-9-]{0,15}", path in "/[a-z0-9:/]{0,30}") {
        let target = parse_target(&format!("{host}:{path}")).unwrap();
        prop_assert_eq!(target.host.as_deref(), Some(host.as_str()));
        prop_assert_eq!(target.path, path);
        prop_assert!(!target.is_list_hosts);
    }
}

// ===== Path Validation Properties =====

proptest! {
    /// A `..` component anywhere is rejected.
    #[test]
    fn traversal_is_rejected(
        prefix in "(/?[a-z]{1,8}){0,4}",
        suffix in "(/[a-z]{1,8}){0,4}",
    ) {
        let path = format!("{prefix}/..{suffix}");
        prop_assert!(validate_path(&path).is_err(), "accepted {}", path);
    }

    /// Accepted paths never lead with a `..` component and validate to
    /// themselves.
    #[test]
    fn validation_is_idempotent(raw in "[~]?[a-z./ -]{1,40}") {
        if let Ok(path) = validate_path(&raw) {
            prop_assert_ne!(path.as_str().split('/').next(), Some(".."));
            let again = validate_path(path.as_str()).unwrap();
            prop_assert_eq!(again.as_str(), path.as_str());
        }
    }

    /// Absolute paths stay absolute.
    #[test]
    fn absolute_stays_absolute(raw in "/[a-z/.]{0,40}") {
        if let Ok(path) = validate_path(&raw) {
            prop_assert!(path.as_str().starts_with('/'));
            prop_assert!(!path.as_str().contains("//"));
        }
    }
}

// ===== Command Validation Properties =====

proptest! {
    /// Plain words survive tokenization unchanged.
    #[test]
    fn plain_words_round_trip(words in prop::collection::vec("[a-zA-Z0-9_./-]{1,12}", 1..20)) {
        let command = validate_command(&words.join(" ")).unwrap();
        prop_assert_eq!(command.tokens(), words.as_slice());
    }

    /// Quoting every token and re-splitting gives the same tokens back.
    #[test]
    fn quoted_tokens_round_trip(words in prop::collection::vec("[^\\x00]{1,12}", 1..10)) {
        let line = shell::quote_all(&words);
        let command = validate_command(&line).unwrap();
        prop_assert_eq!(command.tokens(), words.as_slice());
    }

    /// Input containing NUL is always rejected.
    #[test]
    fn nul_is_rejected(a in "[a-z ]{0,10}", b in "[a-z ]{0,10}") {
        let line = format!("{a}\0{b}");
        prop_assert!(validate_command(&line).is_err());
    }
}

// ===== Host Name and Quoting Properties =====

proptest! {
    /// Shell metacharacters in a host name are rejected.
    #[test]
    fn metachar_host_rejected(
        left in "[a-z]{0,8}",
        meta in prop::sample::select(vec![';', '|', '&', '$', '`', '/', ' ', '\n']),
        right in "[a-z]{0,8}",
    ) {
        let name = format!("{left}{meta}{right}");
        prop_assert!(validate_host_name(&name).is_err());
    }

    /// Single-quoted output is always wrapped and never empty.
    #[test]
    fn quote_always_wrapped(s in "\\PC*") {
        let escaped = shell::quote(&s);
        prop_assert!(escaped.starts_with('\''));
        prop_assert!(escaped.ends_with('\''));
        prop_assert!(escaped.len() >= 2);
    }

    /// Quoted paths never begin with an option dash.
    #[test]
    fn quoted_path_never_an_option(s in "-[a-z-]{0,10}") {
        prop_assert!(shell::quote_path(&s).starts_with("'./-"));
    }

    /// Truncation never exceeds the limit and always yields valid UTF-8.
    #[test]
    fn truncation_bounded(s in "\\PC{0,64}", max in 0usize..80) {
        let (text, cut) = truncate_utf8(s.as_bytes(), max);
        prop_assert!(text.len() <= max);
        prop_assert_eq!(cut, s.len() > max);
        prop_assert!(s.starts_with(&text));
    }
}
