use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::types::Settings;
use crate::error::{InspectError, Result};

pub const ENV_MAX_FILE_SIZE: &str = "SSH_INSPECT_MAX_FILE_SIZE";
pub const ENV_COMMAND_TIMEOUT: &str = "SSH_INSPECT_COMMAND_TIMEOUT";
pub const ENV_IDLE_TIMEOUT: &str = "SSH_INSPECT_IDLE_TIMEOUT";
pub const ENV_POOL_MAX_SIZE: &str = "SSH_INSPECT_POOL_MAX_SIZE";
pub const ENV_BIND_ADDRESS: &str = "SSH_INSPECT_BIND_ADDRESS";
pub const ENV_PORT: &str = "SSH_INSPECT_PORT";

/// Load settings from a YAML file and apply environment overrides.
///
/// With `path == None` the default location is tried and silently skipped
/// when absent. An explicitly requested file must exist.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly requested file does not exist or cannot be read
/// - The YAML content cannot be parsed
/// - The resulting settings fail validation (e.g. an invalid policy regex)
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            if !path.exists() {
                return Err(InspectError::ConfigNotFound {
                    path: path.display().to_string(),
                });
            }
            read_settings_file(path)?
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                read_settings_file(&path)?
            } else {
                debug!(path = %path.display(), "No settings file, using defaults");
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings)?;

    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_saphyr::from_str(&content)?;
    info!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

/// Patch settings from environment-style variables.
///
/// Values that do not parse, or are out of range, are ignored in favour of
/// the current value.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = positive::<usize>(&lookup, ENV_MAX_FILE_SIZE) {
        settings.limits.max_file_size = v;
    }
    if let Some(v) = positive::<u64>(&lookup, ENV_COMMAND_TIMEOUT) {
        settings.limits.command_timeout_seconds = v;
    }
    if let Some(v) = positive::<u64>(&lookup, ENV_IDLE_TIMEOUT) {
        settings.pool.idle_timeout_seconds = v;
    }
    if let Some(v) = positive::<usize>(&lookup, ENV_POOL_MAX_SIZE) {
        settings.pool.max_size = v;
    }
    if let Some(raw) = lookup(ENV_BIND_ADDRESS) {
        let raw = raw.trim();
        if raw.parse::<IpAddr>().is_ok() {
            settings.server.bind_address = raw.to_string();
        } else {
            warn!(var = ENV_BIND_ADDRESS, value = %raw, "Ignoring invalid bind address");
        }
    }
    if let Some(v) = positive::<u16>(&lookup, ENV_PORT) {
        settings.server.port = v;
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + Default + PartialOrd,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            warn!(var = key, value = %raw, "Ignoring invalid override");
            None
        }
    }
}

fn validate_settings(settings: &Settings) -> Result<()> {
    let limits = &settings.limits;
    let pool = &settings.pool;

    require_positive("limits.command_timeout_seconds", limits.command_timeout_seconds)?;
    require_positive("limits.max_file_size", limits.max_file_size)?;
    require_positive(
        "limits.connection_timeout_seconds",
        limits.connection_timeout_seconds,
    )?;
    require_positive("limits.tree_max_depth", limits.tree_max_depth)?;
    require_positive("pool.max_size", pool.max_size)?;
    require_positive("pool.idle_timeout_seconds", pool.idle_timeout_seconds)?;
    require_positive(
        "pool.eviction_interval_seconds",
        pool.eviction_interval_seconds,
    )?;
    require_positive("pool.close_timeout_seconds", pool.close_timeout_seconds)?;
    require_positive(
        "server.max_concurrent_requests",
        settings.server.max_concurrent_requests,
    )?;

    for pattern in &settings.policy.allow {
        regex::Regex::new(pattern).map_err(|e| InspectError::ConfigInvalid {
            field: "policy.allow".to_string(),
            reason: format!("Invalid regex '{pattern}': {e}"),
        })?;
    }

    for pattern in &settings.policy.deny {
        regex::Regex::new(pattern).map_err(|e| InspectError::ConfigInvalid {
            field: "policy.deny".to_string(),
            reason: format!("Invalid regex '{pattern}': {e}"),
        })?;
    }

    Ok(())
}

fn require_positive<T: Default + PartialEq>(field: &str, value: T) -> Result<()> {
    if value == T::default() {
        return Err(InspectError::ConfigInvalid {
            field: field.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Get the default settings path
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcp-ssh-inspector")
        .join("config.yaml")
}
