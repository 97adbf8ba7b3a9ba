//! # Resource Store
//!
//! The slice of the Kubernetes API the target status poller needs: the
//! operator config singleton, existence of monitoring resources, collector
//! pods, and merge patches on the status subresource.
//!
//! [`KubeStore`] talks to the API server. Tests swap in an in-memory store.

use crate::config::OperatorSettings;
use crate::constants::FIELD_MANAGER;
use crate::crd::{
    ClusterNodeMonitoring, ClusterPodMonitoring, MonitoringCondition, MonitoringRef,
    OperatorConfig, PodMonitoring, ScrapeEndpointStatus,
};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The collector DaemonSet has an empty pod selector
    #[error("DaemonSet {namespace}/{name} has an empty pod selector")]
    MissingSelector { namespace: String, name: String },
}

/// Merge patch that replaces `status.endpointStatuses` and nothing else
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatusPatch {
    status: EndpointStatusFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointStatusFields {
    endpoint_statuses: Vec<ScrapeEndpointStatus>,
}

impl EndpointStatusPatch {
    #[must_use]
    pub fn new(endpoint_statuses: Vec<ScrapeEndpointStatus>) -> Self {
        Self {
            status: EndpointStatusFields { endpoint_statuses },
        }
    }

    #[must_use]
    pub fn endpoint_statuses(&self) -> &[ScrapeEndpointStatus] {
        &self.status.endpoint_statuses
    }
}

/// Merge patch that replaces `status.observedGeneration` and `status.conditions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionPatch {
    status: ConditionFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConditionFields {
    observed_generation: Option<i64>,
    conditions: Vec<MonitoringCondition>,
}

impl ConditionPatch {
    #[must_use]
    pub fn new(observed_generation: Option<i64>, conditions: Vec<MonitoringCondition>) -> Self {
        Self {
            status: ConditionFields {
                observed_generation,
                conditions,
            },
        }
    }
}

/// Kubernetes operations used by the poller
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// The operator config singleton, `None` when it does not exist
    async fn operator_config(&self) -> Result<Option<OperatorConfig>, StoreError>;

    /// Whether at least one monitoring resource of any kind exists
    async fn has_monitoring_resources(&self) -> Result<bool, StoreError>;

    /// Pods selected by the collector DaemonSet, empty when the DaemonSet does not exist
    async fn collector_pods(&self) -> Result<Vec<Pod>, StoreError>;

    async fn patch_endpoint_statuses(
        &self,
        resource: &MonitoringRef,
        patch: &EndpointStatusPatch,
    ) -> Result<(), StoreError>;

    async fn patch_conditions(
        &self,
        resource: &MonitoringRef,
        patch: &ConditionPatch,
    ) -> Result<(), StoreError>;
}

/// [`ResourceStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    operator_namespace: String,
    public_namespace: String,
    operator_config_name: String,
    collector_name: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("operator_namespace", &self.operator_namespace)
            .field("public_namespace", &self.public_namespace)
            .field("operator_config_name", &self.operator_config_name)
            .field("collector_name", &self.collector_name)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, settings: &OperatorSettings) -> Self {
        Self {
            client,
            operator_namespace: settings.operator_namespace.clone(),
            public_namespace: settings.public_namespace.clone(),
            operator_config_name: settings.operator_config_name.clone(),
            collector_name: settings.collector_name.clone(),
        }
    }

    async fn patch_monitoring_status<P>(
        &self,
        resource: &MonitoringRef,
        patch: &P,
    ) -> Result<(), StoreError>
    where
        P: Serialize + Debug + Send + Sync,
    {
        let result = match resource {
            MonitoringRef::PodMonitoring { namespace, name } => {
                let api: Api<PodMonitoring> = Api::namespaced(self.client.clone(), namespace);
                patch_status(&api, name, patch).await
            }
            MonitoringRef::ClusterPodMonitoring { name } => {
                let api: Api<ClusterPodMonitoring> = Api::all(self.client.clone());
                patch_status(&api, name, patch).await
            }
            MonitoringRef::ClusterNodeMonitoring { name } => {
                let api: Api<ClusterNodeMonitoring> = Api::all(self.client.clone());
                patch_status(&api, name, patch).await
            }
        };

        match result {
            Err(kube::Error::Api(e)) if e.code == 404 => Err(StoreError::NotFound {
                resource: resource.to_string(),
            }),
            other => other.map_err(StoreError::from),
        }
    }
}

async fn patch_status<K, P>(api: &Api<K>, name: &str, patch: &P) -> Result<(), kube::Error>
where
    K: Clone + DeserializeOwned + Debug,
    P: Serialize + Debug,
{
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(())
}

async fn any_exists<K>(api: Api<K>) -> Result<bool, StoreError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let list = api.list_metadata(&ListParams::default().limit(1)).await?;
    Ok(!list.items.is_empty())
}

/// Render a pod selector as a label selector query
///
/// `matchLabels` become `key=value`, `matchExpressions` use the set-based
/// forms (`key in (a,b)`, `key notin (a,b)`, `key`, `!key`).
/// Returns `None` when the selector selects nothing.
pub fn label_selector(selector: &LabelSelector) -> Option<String> {
    let labels = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(key, value)| format!("{key}={value}"));
    let expressions = selector
        .match_expressions
        .iter()
        .flatten()
        .map(|requirement| {
            let values = requirement.values.as_deref().unwrap_or_default().join(",");
            match requirement.operator.as_str() {
                "In" => format!("{} in ({values})", requirement.key),
                "NotIn" => format!("{} notin ({values})", requirement.key),
                "DoesNotExist" => format!("!{}", requirement.key),
                _ => requirement.key.clone(),
            }
        });

    let query = labels.chain(expressions).collect::<Vec<_>>().join(",");
    (!query.is_empty()).then_some(query)
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn operator_config(&self) -> Result<Option<OperatorConfig>, StoreError> {
        let api: Api<OperatorConfig> = Api::namespaced(self.client.clone(), &self.public_namespace);
        Ok(api.get_opt(&self.operator_config_name).await?)
    }

    async fn has_monitoring_resources(&self) -> Result<bool, StoreError> {
        if any_exists(Api::<PodMonitoring>::all(self.client.clone())).await? {
            return Ok(true);
        }
        if any_exists(Api::<ClusterPodMonitoring>::all(self.client.clone())).await? {
            return Ok(true);
        }
        any_exists(Api::<ClusterNodeMonitoring>::all(self.client.clone())).await
    }

    async fn collector_pods(&self) -> Result<Vec<Pod>, StoreError> {
        let daemon_sets: Api<DaemonSet> =
            Api::namespaced(self.client.clone(), &self.operator_namespace);
        let Some(daemon_set) = daemon_sets.get_opt(&self.collector_name).await? else {
            debug!(
                namespace = %self.operator_namespace,
                name = %self.collector_name,
                "collector DaemonSet not found"
            );
            return Ok(Vec::new());
        };

        let selector = daemon_set
            .spec
            .and_then(|spec| label_selector(&spec.selector))
            .ok_or_else(|| StoreError::MissingSelector {
                namespace: self.operator_namespace.clone(),
                name: self.collector_name.clone(),
            })?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.operator_namespace);
        let list = pods.list(&ListParams::default().labels(&selector)).await?;
        Ok(list.items)
    }

    async fn patch_endpoint_statuses(
        &self,
        resource: &MonitoringRef,
        patch: &EndpointStatusPatch,
    ) -> Result<(), StoreError> {
        self.patch_monitoring_status(resource, patch).await
    }

    async fn patch_conditions(
        &self,
        resource: &MonitoringRef,
        patch: &ConditionPatch,
    ) -> Result<(), StoreError> {
        self.patch_monitoring_status(resource, patch).await
    }
}
