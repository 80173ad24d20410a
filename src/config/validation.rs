//! Configuration validation rules that produce warnings rather than errors

use crate::{
    error::Result,
    models::{Config, TestConfig},
};
use colored::Colorize;
use std::time::Duration;

/// Bursts above this size may run into per-process socket limits
pub const LARGE_BURST_THRESHOLD: i64 = 1000;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks from `Config::validate`, then collect warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_base_url(&config.base_url));
        warnings.extend(Self::validate_burst(&config.test_config()));
        Ok(warnings)
    }

    fn validate_base_url(base_url: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let Ok(parsed) = url::Url::parse(base_url) else {
            return warnings;
        };

        if parsed.scheme() == "http" {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Base URL '{}' uses plain http; HTTP/3 statistics are only reported over https", base_url),
            ));
        }

        if parsed.query().is_some() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Query string of base URL '{}' is ignored", base_url),
            ));
        }

        warnings
    }

    /// Advisory checks on the resolved burst
    pub fn validate_burst(config: &TestConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.request_count > LARGE_BURST_THRESHOLD {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "A burst of {} concurrent requests may exhaust sockets or file descriptors",
                    config.request_count
                ),
            ));
        }

        if config.initial_endpoint_delay_secs < 0.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Negative endpoint delay {}s is treated as 0",
                    config.initial_endpoint_delay_secs
                ),
            ));
        }

        if config.initial_launch_delay_ms < 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Negative launch delay {}ms is treated as 0", config.initial_launch_delay_ms),
            ));
        }

        let span = config.planned_launch_span();
        if span > Duration::from_secs(60) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Launch pauses alone add up to {:.1}s", span.as_secs_f64()),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let label = format!("[{}]", self.level.as_str());
        let label = if !use_color {
            label
        } else {
            match self.level {
                ValidationLevel::Info => label.blue().to_string(),
                ValidationLevel::Warning => label.yellow().to_string(),
            }
        };
        format!("{} {}", label, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTestParams;

    #[test]
    fn test_default_config_warns_about_plain_http() {
        let warnings = validate_config(&Config::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, ValidationLevel::Warning);
        assert!(warnings[0].message.contains("plain http"));
    }

    #[test]
    fn test_https_base_url_has_no_warnings() {
        let config = Config { base_url: "https://example.com".into(), ..Config::default() };
        assert!(validate_config(&config).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = Config { base_url: "not a url".into(), ..Config::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_large_burst_warning() {
        let config = Config {
            base_url: "https://example.com".into(),
            burst: RawTestParams { request_count: Some("5000".into()), ..Default::default() },
            ..Config::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("exhaust sockets")));
    }

    #[test]
    fn test_long_launch_span_warning() {
        let config = TestConfig {
            request_count: 100,
            initial_launch_delay_ms: 1000,
            ..TestConfig::default()
        };
        let warnings = ConfigValidator::validate_burst(&config);
        assert!(warnings.iter().any(|w| w.message.contains("99.0s")));
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Info, "hello".into());
        assert_eq!(warning.format(false), "[INFO] hello");
    }
}
