//! # Operator Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::constants::MAX_DURATION_SECS;
use std::time::Duration;
use thiserror::Error;

/// Errors raised when the loaded settings cannot drive the operator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TARGET_POLL_CONCURRENCY must be at least 1")]
    ZeroConcurrency,
    #[error("TARGET_POLL_INTERVAL_SECS must be at least 1")]
    ZeroPollInterval,
    #[error("TARGET_FETCH_TIMEOUT_SECS must be at least 1")]
    ZeroFetchTimeout,
    #[error("{field} must not exceed {max} seconds, got {value}")]
    DurationTooLong {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("unsupported LOG_FORMAT {0:?}, expected \"text\" or \"json\"")]
    UnsupportedLogFormat(String),
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::UnsupportedLogFormat(value.to_string())),
        }
    }
}

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct OperatorSettings {
    /// Namespace of the operator and the collector DaemonSet
    pub operator_namespace: String,
    /// Namespace holding the OperatorConfig singleton
    pub public_namespace: String,
    /// Name of the OperatorConfig singleton
    pub operator_config_name: String,
    /// Name of the collector DaemonSet
    pub collector_name: String,
    /// Container in collector pods that serves the targets API
    pub collector_container_name: String,
    /// Named container port of the targets API
    pub collector_port_name: String,
    /// Minimum time between the start of two poll cycles (seconds)
    pub target_poll_interval_secs: u64,
    /// Worker pool size for collector fetches
    pub target_poll_concurrency: usize,
    /// Deadline per collector fetch (seconds)
    pub target_fetch_timeout_secs: u64,
    /// HTTP port for metrics and health endpoints
    pub metrics_port: u16,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Log format (text, json)
    pub log_format: String,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            public_namespace: DEFAULT_PUBLIC_NAMESPACE.to_string(),
            operator_config_name: DEFAULT_OPERATOR_CONFIG_NAME.to_string(),
            collector_name: DEFAULT_COLLECTOR_NAME.to_string(),
            collector_container_name: DEFAULT_COLLECTOR_CONTAINER_NAME.to_string(),
            collector_port_name: DEFAULT_COLLECTOR_PORT_NAME.to_string(),
            target_poll_interval_secs: DEFAULT_TARGET_POLL_INTERVAL_SECS,
            target_poll_concurrency: DEFAULT_TARGET_POLL_CONCURRENCY,
            target_fetch_timeout_secs: DEFAULT_TARGET_FETCH_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl OperatorSettings {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            operator_namespace: lookup_str(&lookup, "OPERATOR_NAMESPACE", defaults.operator_namespace),
            public_namespace: lookup_str(&lookup, "PUBLIC_NAMESPACE", defaults.public_namespace),
            operator_config_name: lookup_str(
                &lookup,
                "OPERATOR_CONFIG_NAME",
                defaults.operator_config_name,
            ),
            collector_name: lookup_str(&lookup, "COLLECTOR_NAME", defaults.collector_name),
            collector_container_name: lookup_str(
                &lookup,
                "COLLECTOR_CONTAINER_NAME",
                defaults.collector_container_name,
            ),
            collector_port_name: lookup_str(
                &lookup,
                "COLLECTOR_PORT_NAME",
                defaults.collector_port_name,
            ),
            target_poll_interval_secs: lookup_or_default(
                &lookup,
                "TARGET_POLL_INTERVAL_SECS",
                defaults.target_poll_interval_secs,
            ),
            target_poll_concurrency: lookup_or_default(
                &lookup,
                "TARGET_POLL_CONCURRENCY",
                defaults.target_poll_concurrency,
            ),
            target_fetch_timeout_secs: lookup_or_default(
                &lookup,
                "TARGET_FETCH_TIMEOUT_SECS",
                defaults.target_fetch_timeout_secs,
            ),
            metrics_port: lookup_or_default(&lookup, "METRICS_PORT", defaults.metrics_port),
            log_level: lookup_str(&lookup, "LOG_LEVEL", defaults.log_level),
            log_format: lookup_str(&lookup, "LOG_FORMAT", defaults.log_format),
        }
    }

    /// Reject settings the operator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_poll_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.target_poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.target_fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        for (field, value) in [
            ("TARGET_POLL_INTERVAL_SECS", self.target_poll_interval_secs),
            ("TARGET_FETCH_TIMEOUT_SECS", self.target_fetch_timeout_secs),
        ] {
            if value > MAX_DURATION_SECS {
                return Err(ConfigError::DurationTooLong {
                    field,
                    value,
                    max: MAX_DURATION_SECS,
                });
            }
        }
        for (field, value) in [
            ("OPERATOR_NAMESPACE", &self.operator_namespace),
            ("PUBLIC_NAMESPACE", &self.public_namespace),
            ("OPERATOR_CONFIG_NAME", &self.operator_config_name),
            ("COLLECTOR_NAME", &self.collector_name),
            ("COLLECTOR_CONTAINER_NAME", &self.collector_container_name),
            ("COLLECTOR_PORT_NAME", &self.collector_port_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyName(field));
            }
        }
        self.log_format()?;
        Ok(())
    }

    /// Parsed log format
    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        LogFormat::parse(&self.log_format)
    }

    /// Get minimum poll interval duration
    pub fn target_poll_interval(&self) -> Duration {
        Duration::from_secs(self.target_poll_interval_secs)
    }

    /// Get collector fetch deadline
    pub fn target_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.target_fetch_timeout_secs)
    }
}

/// Read a value or return default value when missing or unparsable
fn lookup_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a value as string or return default
fn lookup_str<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or(default)
}
