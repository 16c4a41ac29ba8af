//! Allow/deny rules over validated commands

use regex::Regex;
use tracing::error;

use super::validator::ValidatedCommand;
use crate::config::{PolicyConfig, PolicyMode};
use crate::error::ValidationError;

/// Compiled command policy.
///
/// The deny-list always applies. In strict mode the command must also
/// match an allow pattern. Patterns see the tokens joined by single spaces.
pub struct CommandPolicy {
    mode: PolicyMode,
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl CommandPolicy {
    /// Compile the configured patterns. Invalid patterns are logged and skipped.
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            mode: config.mode,
            allow: compile(&config.allow, "allow"),
            deny: compile(&config.deny, "deny"),
        }
    }

    /// A policy with no rules at all
    #[must_use]
    pub const fn permit_all() -> Self {
        Self {
            mode: PolicyMode::Permissive,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    /// Check a command against the rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PolicyDenied`] when a deny pattern matches,
    /// or when strict mode finds no allow pattern.
    pub fn check(&self, command: &ValidatedCommand) -> Result<(), ValidationError> {
        let line = command.display_line();

        if let Some(pattern) = self.deny.iter().find(|p| p.is_match(&line)) {
            return Err(ValidationError::PolicyDenied {
                reason: format!("matches deny pattern {pattern}"),
            });
        }

        if self.mode == PolicyMode::Strict && !self.allow.iter().any(|p| p.is_match(&line)) {
            return Err(ValidationError::PolicyDenied {
                reason: "not in allow list (strict mode)".to_string(),
            });
        }

        Ok(())
    }
}

fn compile(patterns: &[String], list: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                error!(list, pattern = %pattern, error = %e, "Invalid policy regex pattern");
                None
            }
        })
        .collect()
}
