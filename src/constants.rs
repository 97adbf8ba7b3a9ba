//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::OperatorSettings`]).

/// Default HTTP server port for metrics and health endpoints
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Namespace the collector DaemonSet and the operator run in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "mp-system";

/// Namespace holding user-facing singletons such as the OperatorConfig
pub const DEFAULT_PUBLIC_NAMESPACE: &str = "mp-public";

/// Name of the singleton OperatorConfig resource
pub const DEFAULT_OPERATOR_CONFIG_NAME: &str = "config";

/// Name of the collector DaemonSet
pub const DEFAULT_COLLECTOR_NAME: &str = "collector";

/// Name of the Prometheus container inside collector pods
pub const DEFAULT_COLLECTOR_CONTAINER_NAME: &str = "prometheus";

/// Name of the container port serving the Prometheus HTTP API
pub const DEFAULT_COLLECTOR_PORT_NAME: &str = "prom-metrics";

/// Minimum time between the start of two poll cycles (seconds)
pub const DEFAULT_TARGET_POLL_INTERVAL_SECS: u64 = 10;

/// Number of workers fetching collector targets concurrently
pub const DEFAULT_TARGET_POLL_CONCURRENCY: usize = 4;

/// Deadline for a single collector targets request (seconds)
pub const DEFAULT_TARGET_FETCH_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted for the poll interval and the fetch timeout (seconds)
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Maximum number of sample targets kept per sample group
pub const MAX_SAMPLE_TARGETS: usize = 5;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "target-status-operator";

/// Path of the Prometheus targets API on a collector
pub const TARGETS_API_PATH: &str = "/api/v1/targets";
