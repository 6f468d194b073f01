#![forbid(unsafe_code)]

//! Binder configuration.
//!
//! # Environment Variables
//! - `TETHER_MAX_DEPTH` (usize, > 0): nesting limit for traversing object
//!   values into nested paths.
//! - `TETHER_ACTIVATE_ROOT` (usize or `none`): root index whose values are
//!   pushed to every group right after binding.
//! - `TETHER_REBIND` (bool): whether state groups rebuild their nested
//!   groups when their value changes.
//!
//! With the `policy-config` feature the same fields can be loaded from a
//! TOML document:
//!
//! ```toml
//! max_depth = 8
//! activate_root = 0
//! rebind = true
//! ```

use std::env;
use std::fmt;

const ENV_MAX_DEPTH: &str = "TETHER_MAX_DEPTH";
const ENV_ACTIVATE_ROOT: &str = "TETHER_ACTIVATE_ROOT";
const ENV_REBIND: &str = "TETHER_REBIND";

/// Default nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Tunables for [`Binder`](crate::binder::Binder).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct BinderConfig {
    /// Maximum object nesting below a root.
    pub max_depth: usize,
    /// Root whose values seed every group after binding.
    pub activate_root: Option<usize>,
    /// Rebuild nested groups when a state group's value changes.
    pub rebind: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            activate_root: None,
            rebind: true,
        }
    }
}

/// Configuration parse diagnostics.
#[derive(Debug, Clone)]
pub struct BinderConfigParse {
    pub config: BinderConfig,
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl BinderConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_activate_root(mut self, root: Option<usize>) -> Self {
        self.activate_root = root;
        self
    }

    #[must_use]
    pub fn with_rebind(mut self, rebind: bool) -> Self {
        self.rebind = rebind;
        self
    }

    /// Parse config from environment variables, ignoring bad values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> BinderConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.max_depth == 0 {
            errors.push(ConfigError::new(
                "max_depth",
                "0",
                "expected positive integer",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load from a TOML document. Missing fields keep their defaults.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)
            .map_err(|e| ConfigError::new("toml", source.trim(), e.to_string()))?;
        match config.validate() {
            Ok(()) => Ok(config),
            Err(mut errors) => Err(errors.remove(0)),
        }
    }
}

fn from_env_with<F>(mut get: F) -> BinderConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = BinderConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_MAX_DEPTH) {
        match parse_usize(&value).filter(|d| *d > 0) {
            Some(parsed) => config.max_depth = parsed,
            None => errors.push(ConfigError::new(
                "max_depth",
                value,
                "expected positive integer",
            )),
        }
    }

    if let Some(value) = get(ENV_ACTIVATE_ROOT) {
        let trimmed = value.trim().to_ascii_lowercase();
        if trimmed.is_empty() || trimmed == "none" {
            config.activate_root = None;
        } else {
            match parse_usize(&trimmed) {
                Some(parsed) => config.activate_root = Some(parsed),
                None => errors.push(ConfigError::new(
                    "activate_root",
                    value,
                    "expected root index or none",
                )),
            }
        }
    }

    if let Some(value) = get(ENV_REBIND) {
        match parse_bool(&value) {
            Some(parsed) => config.rebind = parsed,
            None => errors.push(ConfigError::new(
                "rebind",
                value,
                "expected bool (1/0/true/false)",
            )),
        }
    }

    for error in &errors {
        tracing::warn!(field = error.field, value = %error.value, "{}", error.message);
    }
    BinderConfigParse { config, errors }
}

#[inline]
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[inline]
fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(pairs: &[(&str, &str)]) -> BinderConfigParse {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_env_yields_defaults() {
        let parsed = parse(&[]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config, BinderConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let parsed = parse(&[
            ("TETHER_MAX_DEPTH", " 4 "),
            ("TETHER_ACTIVATE_ROOT", "1"),
            ("TETHER_REBIND", "off"),
        ]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config.max_depth, 4);
        assert_eq!(parsed.config.activate_root, Some(1));
        assert!(!parsed.config.rebind);
    }

    #[test]
    fn bad_values_are_reported_and_ignored() {
        let parsed = parse(&[
            ("TETHER_MAX_DEPTH", "0"),
            ("TETHER_ACTIVATE_ROOT", "first"),
            ("TETHER_REBIND", "maybe"),
        ]);
        let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["max_depth", "activate_root", "rebind"]);
        assert_eq!(parsed.config, BinderConfig::default());
    }

    #[test]
    fn activate_root_none_clears() {
        let parsed = parse(&[("TETHER_ACTIVATE_ROOT", "None")]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config.activate_root, None);
    }

    #[test]
    fn validate_rejects_zero_depth() {
        let errors = BinderConfig::default()
            .with_max_depth(0)
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "max_depth=0 (expected positive integer)");
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_policy_loads_partial_documents() {
        let config = BinderConfig::from_toml_str("max_depth = 3\nactivate_root = 0\n").unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.activate_root, Some(0));
        assert!(config.rebind);
        assert!(BinderConfig::from_toml_str("max_depth = 0").is_err());
        assert!(BinderConfig::from_toml_str("unknown = 1").is_err());
    }
}
