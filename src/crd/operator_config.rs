//! # OperatorConfig
//!
//! Cluster-wide operator settings managed by users. A single instance is
//! expected (default `mp-public/config`); its absence means "all features off".

use serde::{Deserialize, Serialize};

/// OperatorConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: monitoring.managedprometheus.io/v1
/// kind: OperatorConfig
/// metadata:
///   name: config
///   namespace: mp-public
/// spec:
///   features:
///     targetStatus:
///       enabled: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "OperatorConfig",
    group = "monitoring.managedprometheus.io",
    version = "v1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigSpec {
    /// Optional operator features
    #[serde(default)]
    pub features: OperatorFeatures,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorFeatures {
    /// Report scrape target health on monitoring resources
    #[serde(default)]
    pub target_status: TargetStatusSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatusSpec {
    /// Poll collectors and populate `status.endpointStatuses`
    #[serde(default)]
    pub enabled: bool,
}

impl OperatorConfig {
    #[must_use]
    pub fn target_status_enabled(&self) -> bool {
        self.spec.features.target_status.enabled
    }
}
