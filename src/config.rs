//! TOML-based export configuration.

use std::fs;
use std::path::Path;

use chrono::TimeDelta;
use serde::Deserialize;
use thiserror::Error;

use crate::matching::{FanOutPolicy, MatchOptions};
use crate::source::Scalar;

/// Top-level export configuration parsed from TOML.
///
/// All fields have defaults, so an empty file is a valid configuration.
/// Load with [`ExportConfig::from_toml_file`] and check with
/// [`ExportConfig::validate`] before use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Manifest defaults and identifier column.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Multi-horizon export parameters.
    #[serde(default)]
    pub lookahead: LookaheadConfig,
    /// Point matcher parameters.
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Defaults applied when the source metadata lacks a column.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Metadata column holding the entity identifier.
    pub id_column: String,
    /// Explicit series resolution in seconds. Derived from the time index when unset.
    pub resolution_seconds: Option<f64>,
    pub normalization_factor: Scalar,
    pub category: String,
    pub simulation: String,
    pub name: String,
    /// Fill value for `scaling_factor_multiplier`; left absent when unset.
    pub scaling_factor_multiplier: Option<Scalar>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            id_column: "component_name".to_string(),
            resolution_seconds: None,
            normalization_factor: Scalar::Integer(1),
            category: "Generator".to_string(),
            simulation: String::new(),
            name: "max_active_power".to_string(),
            scaling_factor_multiplier: None,
        }
    }
}

impl MetadataConfig {
    /// Explicit resolution as a time delta, if configured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `resolution_seconds` is not a positive
    /// duration representable as a `TimeDelta`.
    pub fn resolution(&self) -> Result<Option<TimeDelta>, ConfigError> {
        self.resolution_seconds
            .map(|secs| seconds_to_delta("metadata.resolution_seconds", secs))
            .transpose()
    }
}

/// Multi-horizon export parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookaheadConfig {
    /// Resolution used when `metadata.resolution_seconds` is unset.
    pub default_resolution_seconds: f64,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            default_resolution_seconds: 3600.0,
        }
    }
}

/// Point matcher parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Maximum number of source points allowed to share one nearest target.
    pub max_fan_out: usize,
    /// What to do when `max_fan_out` is exceeded.
    pub on_violation: FanOutPolicy,
    pub latitude_column: String,
    pub longitude_column: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let options = MatchOptions::default();
        Self {
            max_fan_out: options.max_fan_out,
            on_violation: options.on_violation,
            latitude_column: options.latitude_column,
            longitude_column: options.longitude_column,
        }
    }
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            max_fan_out: self.max_fan_out,
            on_violation: self.on_violation,
            latitude_column: self.latitude_column.clone(),
            longitude_column: self.longitude_column.clone(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"matching.max_fan_out"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ExportConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let m = &self.metadata;
        if m.id_column.trim().is_empty() {
            errors.push(ConfigError::new("metadata.id_column", "must not be empty"));
        }
        if let Err(e) = m.resolution() {
            errors.push(e);
        }

        if let Err(e) = seconds_to_delta(
            "lookahead.default_resolution_seconds",
            self.lookahead.default_resolution_seconds,
        ) {
            errors.push(e);
        }

        let mt = &self.matching;
        if mt.max_fan_out == 0 {
            errors.push(ConfigError::new("matching.max_fan_out", "must be > 0"));
        }
        if mt.latitude_column.trim().is_empty() {
            errors.push(ConfigError::new(
                "matching.latitude_column",
                "must not be empty",
            ));
        }
        if mt.longitude_column.trim().is_empty() {
            errors.push(ConfigError::new(
                "matching.longitude_column",
                "must not be empty",
            ));
        }

        errors
    }

    /// Resolution for multi-horizon export: the explicit one, else the lookahead default.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the chosen value is out of range.
    pub fn lookahead_resolution(&self) -> Result<TimeDelta, ConfigError> {
        match self.metadata.resolution()? {
            Some(delta) => Ok(delta),
            None => seconds_to_delta(
                "lookahead.default_resolution_seconds",
                self.lookahead.default_resolution_seconds,
            ),
        }
    }
}

fn seconds_to_delta(field: &str, secs: f64) -> Result<TimeDelta, ConfigError> {
    let millis = (secs * 1000.0).round();
    // i64::MAX as f64 rounds up, so the bound is exclusive
    if !(millis.is_finite() && millis > 0.0 && millis < i64::MAX as f64) {
        return Err(ConfigError::new(field, format!("must be a positive, in-range number of seconds, got {secs}")));
    }
    TimeDelta::try_milliseconds(millis as i64)
        .ok_or_else(|| ConfigError::new(field, format!("{secs} seconds is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let cfg = ExportConfig::default();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "default should be valid: {errors:?}");
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[metadata]
id_column = "plant"
resolution_seconds = 300
normalization_factor = "max"
category = "RenewableDispatch"
simulation = "naris"
name = "max_active_power"
scaling_factor_multiplier = "get_max_active_power"

[lookahead]
default_resolution_seconds = 1800

[matching]
max_fan_out = 3
on_violation = "warn"
latitude_column = "lat"
longitude_column = "lon"
"#;
        let cfg = ExportConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| &*c.metadata.id_column), Some("plant"));
        assert_eq!(
            cfg.as_ref().map(|c| c.metadata.normalization_factor.clone()),
            Some(Scalar::Text("max".into()))
        );
        assert_eq!(cfg.as_ref().map(|c| c.matching.max_fan_out), Some(3));
        assert_eq!(
            cfg.as_ref().map(|c| c.matching.on_violation),
            Some(FanOutPolicy::Warn)
        );
        assert_eq!(
            cfg.as_ref().and_then(|c| c.metadata.resolution().ok()),
            Some(Some(TimeDelta::minutes(5)))
        );
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[matching]
max_fan_out = 5
bogus_field = true
"#;
        assert!(ExportConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_policy_rejected() {
        let toml = r#"
[matching]
on_violation = "rebalance"
"#;
        assert!(ExportConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_zero_fan_out() {
        let mut cfg = ExportConfig::default();
        cfg.matching.max_fan_out = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "matching.max_fan_out"));
    }

    #[test]
    fn validation_catches_negative_resolution() {
        let mut cfg = ExportConfig::default();
        cfg.metadata.resolution_seconds = Some(-60.0);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "metadata.resolution_seconds"));
    }

    #[test]
    fn validation_catches_blank_columns() {
        let mut cfg = ExportConfig::default();
        cfg.metadata.id_column = " ".into();
        cfg.matching.latitude_column = String::new();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[matching]
max_fan_out = 9
"#;
        let cfg = ExportConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.matching.max_fan_out), Some(9));
        // untouched fields keep defaults
        assert_eq!(
            cfg.as_ref().map(|c| &*c.matching.latitude_column),
            Some("latitude")
        );
        assert_eq!(
            cfg.as_ref().map(|c| &*c.metadata.category),
            Some("Generator")
        );
    }

    #[test]
    fn lookahead_resolution_prefers_explicit() {
        let mut cfg = ExportConfig::default();
        assert_eq!(cfg.lookahead_resolution().ok(), Some(TimeDelta::hours(1)));
        cfg.metadata.resolution_seconds = Some(900.0);
        assert_eq!(cfg.lookahead_resolution().ok(), Some(TimeDelta::minutes(15)));
    }

    #[test]
    fn unvalidated_extreme_resolution_is_an_error() {
        for secs in [-1e300, 1e300, f64::NAN, f64::NEG_INFINITY, -60.0, 0.0] {
            let mut cfg = ExportConfig::default();
            cfg.metadata.resolution_seconds = Some(secs);
            let err = cfg.metadata.resolution().err();
            assert_eq!(
                err.as_ref().map(|e| e.field.as_str()),
                Some("metadata.resolution_seconds"),
                "{secs}"
            );
            assert!(cfg.lookahead_resolution().is_err());
        }

        let mut cfg = ExportConfig::default();
        cfg.lookahead.default_resolution_seconds = -9.3e18;
        let err = cfg.lookahead_resolution().err();
        assert_eq!(
            err.map(|e| e.field),
            Some("lookahead.default_resolution_seconds".to_string())
        );
    }
}
