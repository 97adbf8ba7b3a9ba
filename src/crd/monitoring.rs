//! # Monitoring Resources
//!
//! The custom resources that declare scrape endpoints and receive target
//! status: `PodMonitoring` (namespaced), `ClusterPodMonitoring` and
//! `ClusterNodeMonitoring` (cluster-scoped).
//!
//! The status poller never depends on a concrete kind. It works with
//! [`MonitoringRef`] (which resource) and [`MonitoringResource`] (what can be
//! read and written on it).

use crate::crd::MonitoringStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One scrape endpoint of a monitored workload
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeEndpoint {
    /// Name or number of the port to scrape
    pub port: String,
    /// HTTP path to scrape, defaults to `/metrics`
    #[serde(default)]
    pub path: Option<String>,
    /// Scrape interval, e.g. `30s`
    #[serde(default)]
    pub interval: Option<String>,
    /// Scrape timeout, must not exceed the interval
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// PodMonitoring Custom Resource Definition
///
/// Scrapes pods selected in its own namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: monitoring.managedprometheus.io/v1
/// kind: PodMonitoring
/// metadata:
///   name: frontend
///   namespace: shop
/// spec:
///   selector:
///     matchLabels:
///       app: frontend
///   endpoints:
///   - port: metrics
///     interval: 30s
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PodMonitoring",
    group = "monitoring.managedprometheus.io",
    version = "v1",
    namespaced,
    status = "crate::crd::MonitoringStatus",
    shortname = "pm"
)]
#[serde(rename_all = "camelCase")]
pub struct PodMonitoringSpec {
    /// Pods to scrape
    #[serde(default)]
    pub selector: MonitoringSelector,
    /// Endpoints to scrape on the selected pods
    pub endpoints: Vec<ScrapeEndpoint>,
}

/// ClusterPodMonitoring Custom Resource Definition
///
/// Like PodMonitoring but selects pods across all namespaces.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterPodMonitoring",
    group = "monitoring.managedprometheus.io",
    version = "v1",
    status = "crate::crd::MonitoringStatus",
    shortname = "cpm"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPodMonitoringSpec {
    #[serde(default)]
    pub selector: MonitoringSelector,
    pub endpoints: Vec<ScrapeEndpoint>,
}

/// ClusterNodeMonitoring Custom Resource Definition
///
/// Scrapes node-level endpoints (for example the kubelet) of selected nodes.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterNodeMonitoring",
    group = "monitoring.managedprometheus.io",
    version = "v1",
    status = "crate::crd::MonitoringStatus",
    shortname = "cnm"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNodeMonitoringSpec {
    #[serde(default)]
    pub selector: MonitoringSelector,
    pub endpoints: Vec<ScrapeEndpoint>,
}

/// Reference to one monitoring resource, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MonitoringRef {
    PodMonitoring { namespace: String, name: String },
    ClusterPodMonitoring { name: String },
    ClusterNodeMonitoring { name: String },
}

impl MonitoringRef {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MonitoringRef::PodMonitoring { .. } => "PodMonitoring",
            MonitoringRef::ClusterPodMonitoring { .. } => "ClusterPodMonitoring",
            MonitoringRef::ClusterNodeMonitoring { .. } => "ClusterNodeMonitoring",
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self {
            MonitoringRef::PodMonitoring { namespace, .. } => Some(namespace),
            MonitoringRef::ClusterPodMonitoring { .. }
            | MonitoringRef::ClusterNodeMonitoring { .. } => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MonitoringRef::PodMonitoring { name, .. }
            | MonitoringRef::ClusterPodMonitoring { name }
            | MonitoringRef::ClusterNodeMonitoring { name } => name,
        }
    }
}

/// Renders the scrape pool key of the resource, e.g. `PodMonitoring/ns/name`
impl fmt::Display for MonitoringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind(), namespace, self.name()),
            None => write!(f, "{}/{}", self.kind(), self.name()),
        }
    }
}

/// Capabilities the status poller needs from a monitoring resource
pub trait MonitoringResource:
    kube::Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Reference to this object, `None` if it has no name (or no namespace when namespaced)
    fn monitoring_ref(&self) -> Option<MonitoringRef>;

    fn monitoring_status(&self) -> Option<&MonitoringStatus>;

    /// Status for in-place updates, created empty when absent
    fn monitoring_status_mut(&mut self) -> &mut MonitoringStatus;
}

macro_rules! impl_monitoring_resource {
    ($kind:ty, |$obj:ident| $reference:expr) => {
        impl MonitoringResource for $kind {
            fn monitoring_ref(&self) -> Option<MonitoringRef> {
                let $obj = self;
                $reference
            }

            fn monitoring_status(&self) -> Option<&MonitoringStatus> {
                self.status.as_ref()
            }

            fn monitoring_status_mut(&mut self) -> &mut MonitoringStatus {
                self.status.get_or_insert_with(MonitoringStatus::default)
            }
        }
    };
}

impl_monitoring_resource!(PodMonitoring, |obj| Some(MonitoringRef::PodMonitoring {
    namespace: obj.metadata.namespace.clone()?,
    name: obj.metadata.name.clone()?,
}));
impl_monitoring_resource!(ClusterPodMonitoring, |obj| Some(
    MonitoringRef::ClusterPodMonitoring {
        name: obj.metadata.name.clone()?,
    }
));
impl_monitoring_resource!(ClusterNodeMonitoring, |obj| Some(
    MonitoringRef::ClusterNodeMonitoring {
        name: obj.metadata.name.clone()?,
    }
));
