//! Host records from an ssh_config-style file.
//!
//! Understands `Host`, `HostName`, `Port`, `User` and `IdentityFile`. A
//! `Host *` block supplies defaults for the blocks that follow or precede it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::types::{DEFAULT_PORT, DEFAULT_USER, HostRecord};

/// Parse an ssh_config-style file into host records keyed by alias.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn parse_ssh_config(path: &Path) -> std::io::Result<HashMap<String, HostRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_ssh_config_content(&content))
}

/// Parse ssh_config content.
///
/// Wildcard aliases are skipped, as are blocks that never name an address.
/// A malformed port falls back to the default instead of failing the load.
#[must_use]
pub fn parse_ssh_config_content(content: &str) -> HashMap<String, HostRecord> {
    let mut blocks: Vec<(Vec<String>, PartialHost)> = Vec::new();
    let mut global_defaults = PartialHost::default();
    let mut in_global = false;

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = parse_directive(line) else {
            continue;
        };

        if key.eq_ignore_ascii_case("Host") {
            let aliases: Vec<String> = value.split_whitespace().map(String::from).collect();
            in_global = aliases.iter().any(|a| a == "*");

            let concrete: Vec<String> = aliases
                .into_iter()
                .filter(|a| !a.contains('*') && !a.contains('?') && !a.starts_with('!'))
                .collect();

            // A pattern-only block (other than `*`) is ignored entirely
            blocks.push((concrete, PartialHost::default()));
        } else if in_global {
            apply_directive(&mut global_defaults, &key, value);
        } else if let Some((_, host)) = blocks.last_mut() {
            apply_directive(host, &key, value);
        }
    }

    let mut hosts = HashMap::new();
    for (aliases, partial) in blocks {
        for alias in aliases {
            match partial.to_host_record(&alias, &global_defaults) {
                Some(record) => {
                    hosts.insert(alias, record);
                }
                None => debug!(host = %alias, "Host has no address, skipping"),
            }
        }
    }

    hosts
}

#[derive(Default, Clone)]
struct PartialHost {
    hostname: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    identity_file: Option<String>,
}

impl PartialHost {
    fn to_host_record(&self, alias: &str, defaults: &Self) -> Option<HostRecord> {
        let address = self
            .hostname
            .as_ref()
            .or(defaults.hostname.as_ref())
            .cloned()?;

        Some(HostRecord {
            name: alias.to_string(),
            address,
            port: self.port.or(defaults.port).unwrap_or(DEFAULT_PORT),
            user: self
                .user
                .as_ref()
                .or(defaults.user.as_ref())
                .cloned()
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            identity_file: self
                .identity_file
                .as_ref()
                .or(defaults.identity_file.as_ref())
                .cloned(),
        })
    }
}

/// Split a directive line into (key, value).
fn parse_directive(line: &str) -> Option<(String, &str)> {
    // "Key=Value"
    if let Some((key, value)) = line.split_once('=') {
        let key = key.trim();
        let value = value.trim();
        if !key.is_empty() && !key.contains(char::is_whitespace) && !value.is_empty() {
            return Some((key.to_string(), value));
        }
    }

    // "Key Value"
    let mut parts = line.splitn(2, char::is_whitespace);
    let key = parts.next()?.trim().to_string();
    let value = parts.next()?.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn apply_directive(host: &mut PartialHost, key: &str, value: &str) {
    let value = value.trim_matches('"').trim();
    if value.is_empty() {
        return;
    }
    match key.to_ascii_lowercase().as_str() {
        "hostname" => host.hostname = Some(value.to_string()),
        "port" => match value.parse::<u16>() {
            Ok(port) if port > 0 => host.port = Some(port),
            _ => warn!(value = %value, "Invalid port in host configuration, using default"),
        },
        "user" => host.user = Some(value.to_string()),
        "identityfile" => host.identity_file = Some(value.to_string()),
        _ => {
            // Unsupported directives (ForwardAgent, ProxyJump, ...) are ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        assert!(parse_ssh_config_content("").is_empty());
    }

    #[test]
    fn test_parse_comments_only() {
        let content = "# This is a comment\n# Another comment\n";
        assert!(parse_ssh_config_content(content).is_empty());
    }

    #[test]
    fn test_parse_single_host() {
        let content = "\
Host db1
    HostName 10.0.0.5
    User admin
    Port 2222
    IdentityFile ~/.ssh/db1_ed25519
";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts.len(), 1);

        let host = &hosts["db1"];
        assert_eq!(host.name, "db1");
        assert_eq!(host.address, "10.0.0.5");
        assert_eq!(host.user, "admin");
        assert_eq!(host.port, 2222);
        assert_eq!(host.identity_file.as_deref(), Some("~/.ssh/db1_ed25519"));
    }

    #[test]
    fn test_defaults_port_and_user() {
        let hosts = parse_ssh_config_content("Host web\n  HostName web.internal\n");
        let host = &hosts["web"];
        assert_eq!(host.port, 22);
        assert_eq!(host.user, "root");
        assert!(host.identity_file.is_none());
    }

    #[test]
    fn test_parse_multiple_hosts() {
        let content = "\
Host server1
    HostName 10.0.0.1
    User deploy

Host server2
    HostName 10.0.0.2
    Port 2222
";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts["server1"].address, "10.0.0.1");
        assert_eq!(hosts["server2"].port, 2222);
    }

    #[test]
    fn test_host_without_address_is_skipped() {
        let content = "\
Host orphan
    User admin

Host real
    HostName 10.0.0.9
";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts.len(), 1);
        assert!(hosts.contains_key("real"));
    }

    #[test]
    fn test_malformed_port_falls_back_to_default() {
        let content = "Host db\n  HostName 10.0.0.5\n  Port twenty-two\n";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts["db"].port, 22);
    }

    #[test]
    fn test_port_out_of_range_falls_back_to_default() {
        let content = "Host db\n  HostName 10.0.0.5\n  Port 70000\n";
        assert_eq!(parse_ssh_config_content(content)["db"].port, 22);
    }

    #[test]
    fn test_wildcard_hosts_skipped() {
        let content = "\
Host prod-*
    User deploy
    HostName 10.1.1.1

Host myserver
    HostName 10.0.0.1
";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts.len(), 1);
        assert!(hosts.contains_key("myserver"));
    }

    #[test]
    fn test_global_defaults_applied() {
        let content = "\
Host *
    User global_user
    Port 2222

Host myserver
    HostName 10.0.0.1
";
        let host = &parse_ssh_config_content(content)["myserver"];
        assert_eq!(host.user, "global_user");
        assert_eq!(host.port, 2222);
    }

    #[test]
    fn test_trailing_global_block_still_applies() {
        let content = "\
Host myserver
    HostName 10.0.0.1

Host *
    User fallback
";
        assert_eq!(parse_ssh_config_content(content)["myserver"].user, "fallback");
    }

    #[test]
    fn test_host_overrides_defaults() {
        let content = "\
Host *
    User global_user

Host myserver
    HostName 10.0.0.1
    User specific_user
";
        assert_eq!(
            parse_ssh_config_content(content)["myserver"].user,
            "specific_user"
        );
    }

    #[test]
    fn test_multiple_aliases_share_a_block() {
        let content = "Host app app-primary\n  HostName 10.0.0.7\n";
        let hosts = parse_ssh_config_content(content);
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts["app"].address, "10.0.0.7");
        assert_eq!(hosts["app-primary"].name, "app-primary");
    }

    #[test]
    fn test_equals_syntax_and_case_insensitive_keys() {
        let content = "Host=db\nHOSTNAME=10.0.0.5\nport = 2200\n";
        let host = &parse_ssh_config_content(content)["db"];
        assert_eq!(host.address, "10.0.0.5");
        assert_eq!(host.port, 2200);
    }

    #[test]
    fn test_quoted_identity_file() {
        let content = "Host db\n  HostName 10.0.0.5\n  IdentityFile \"~/.ssh/my key\"\n";
        let host = &parse_ssh_config_content(content)["db"];
        assert_eq!(host.identity_file.as_deref(), Some("~/.ssh/my key"));
    }

    #[test]
    fn test_parse_ssh_config_missing_file() {
        let result = parse_ssh_config(Path::new("/nonexistent/ssh_config"));
        assert!(result.is_err());
    }
}
