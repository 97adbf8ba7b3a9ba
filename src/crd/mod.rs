//! # Custom Resource Definitions
//!
//! CRD types the operator reads and whose status it writes.
//!
//! ## Module Structure
//!
//! - `monitoring.rs` - PodMonitoring, ClusterPodMonitoring, ClusterNodeMonitoring
//!   and the capability trait shared by them
//! - `operator_config.rs` - OperatorConfig singleton and its feature flags
//! - `status.rs` - Conditions and scrape endpoint status types

mod monitoring;
mod operator_config;
mod status;

// Re-export all public types
pub use monitoring::{
    ClusterNodeMonitoring, ClusterNodeMonitoringSpec, ClusterPodMonitoring,
    ClusterPodMonitoringSpec, MonitoringRef, MonitoringResource, MonitoringSelector,
    PodMonitoring, PodMonitoringSpec, ScrapeEndpoint,
};
pub use operator_config::{OperatorConfig, OperatorConfigSpec, OperatorFeatures, TargetStatusSpec};
pub use status::{
    format_time, MonitoringCondition, MonitoringStatus, SampleGroup, SampleTarget,
    ScrapeEndpointStatus, CONDITION_CONFIGURATION_CREATE_SUCCESS, CONDITION_FALSE,
    CONDITION_TRUE,
};
