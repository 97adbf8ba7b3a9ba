//! Common test utilities for target status integration tests
//!
//! Provides an in-memory `ResourceStore` that applies JSON merge patches the
//! way the API server does, a scripted `TargetFetcher`, and builders for
//! collector pods, targets and monitoring resources.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec, PodStatus};
use kube::api::ObjectMeta;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use target_status_operator::config::OperatorSettings;
use target_status_operator::crd::{
    MonitoringRef, MonitoringResource, MonitoringSelector, OperatorConfig, OperatorConfigSpec,
    OperatorFeatures, PodMonitoring, PodMonitoringSpec, ScrapeEndpoint, TargetStatusSpec,
};
use target_status_operator::target_status::{
    CollectorEndpoint, ConditionPatch, EndpointStatusPatch, FetchError, ResourceStore,
    StoreError, TargetFetcher, TargetHealth, TargetRecord,
};
use tokio_util::sync::CancellationToken;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // We use ring as the crypto provider (matches main application)
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub const CONTAINER: &str = "prometheus";
pub const PORT_NAME: &str = "prom-metrics";
pub const PORT: i32 = 19090;

/// Settings pointing at the test container and port
pub fn settings(concurrency: usize) -> OperatorSettings {
    OperatorSettings {
        collector_container_name: CONTAINER.to_string(),
        collector_port_name: PORT_NAME.to_string(),
        target_poll_concurrency: concurrency,
        ..OperatorSettings::default()
    }
}

/// Running collector pod exposing the targets API on the named port
pub fn collector_pod(name: &str, ip: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("mp-system".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CONTAINER.to_string(),
                ports: Some(vec![ContainerPort {
                    name: Some(PORT_NAME.to_string()),
                    container_port: PORT,
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            pod_ip: Some(ip.to_string()),
            ..Default::default()
        }),
    }
}

pub fn collector_endpoint(name: &str) -> CollectorEndpoint {
    CollectorEndpoint {
        pod_name: name.to_string(),
        pod_ip: Some("10.0.0.1".to_string()),
        port: 19090,
    }
}

pub fn target(pool: &str, instance: &str, health: TargetHealth, error: &str) -> TargetRecord {
    TargetRecord {
        scrape_pool: pool.to_string(),
        health,
        last_error: error.to_string(),
        labels: BTreeMap::from([("instance".to_string(), instance.to_string())]),
        last_scrape_duration: 0.0123,
    }
}

pub fn operator_config(enabled: bool) -> OperatorConfig {
    let mut config = OperatorConfig::new(
        "config",
        OperatorConfigSpec {
            features: OperatorFeatures {
                target_status: TargetStatusSpec { enabled },
            },
        },
    );
    config.metadata.namespace = Some("mp-public".to_string());
    config
}

pub fn pod_monitoring(namespace: &str, name: &str) -> PodMonitoring {
    let mut pm = PodMonitoring::new(
        name,
        PodMonitoringSpec {
            selector: MonitoringSelector::default(),
            endpoints: vec![ScrapeEndpoint {
                port: "metrics".to_string(),
                path: None,
                interval: Some("30s".to_string()),
                timeout: None,
            }],
        },
    );
    pm.metadata.namespace = Some(namespace.to_string());
    pm.metadata.generation = Some(1);
    pm
}

/// Apply an RFC 7386 JSON merge patch
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(existing) = target {
        for (key, value) in fields {
            if value.is_null() {
                existing.remove(key);
            } else {
                merge_patch(existing.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// In-memory [`ResourceStore`]
///
/// Monitoring resources are kept as JSON keyed by their scrape pool key, so
/// patches are applied exactly as serialized.
#[derive(Debug, Default)]
pub struct FakeStore {
    config: Mutex<Option<OperatorConfig>>,
    pods: Mutex<Vec<Pod>>,
    resources: Mutex<BTreeMap<String, Value>>,
    pub operator_config_calls: AtomicUsize,
    pub patches: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, config: OperatorConfig) -> Self {
        *self.config.lock().unwrap() = Some(config);
        self
    }

    pub fn with_pods(self, pods: Vec<Pod>) -> Self {
        *self.pods.lock().unwrap() = pods;
        self
    }

    pub fn with_resource<K: MonitoringResource>(self, resource: &K) -> Self {
        self.insert(resource);
        self
    }

    pub fn insert<K: MonitoringResource>(&self, resource: &K) {
        let key = resource.monitoring_ref().unwrap().to_string();
        let value = serde_json::to_value(resource).unwrap();
        self.resources.lock().unwrap().insert(key, value);
    }

    /// Stored JSON of a resource
    pub fn raw(&self, reference: &MonitoringRef) -> Option<Value> {
        self.resources
            .lock()
            .unwrap()
            .get(&reference.to_string())
            .cloned()
    }

    pub fn get<K: MonitoringResource>(&self, reference: &MonitoringRef) -> Option<K> {
        self.raw(reference)
            .map(|value| serde_json::from_value(value).unwrap())
    }

    pub fn activations(&self) -> usize {
        self.operator_config_calls.load(Ordering::SeqCst)
    }

    fn apply(&self, reference: &MonitoringRef, patch: Value) -> Result<(), StoreError> {
        let key = reference.to_string();
        let mut resources = self.resources.lock().unwrap();
        let stored = resources.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            resource: key.clone(),
        })?;
        merge_patch(stored, &patch);
        self.patches.lock().unwrap().push(key);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn operator_config(&self) -> Result<Option<OperatorConfig>, StoreError> {
        self.operator_config_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.lock().unwrap().clone())
    }

    async fn has_monitoring_resources(&self) -> Result<bool, StoreError> {
        Ok(!self.resources.lock().unwrap().is_empty())
    }

    async fn collector_pods(&self) -> Result<Vec<Pod>, StoreError> {
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn patch_endpoint_statuses(
        &self,
        resource: &MonitoringRef,
        patch: &EndpointStatusPatch,
    ) -> Result<(), StoreError> {
        self.apply(resource, serde_json::to_value(patch).unwrap())
    }

    async fn patch_conditions(
        &self,
        resource: &MonitoringRef,
        patch: &ConditionPatch,
    ) -> Result<(), StoreError> {
        self.apply(resource, serde_json::to_value(patch).unwrap())
    }
}

/// [`TargetFetcher`] answering from a fixed script keyed by pod name
///
/// Pods without a script entry and pods listed as failing return an error;
/// pods listed as panicking panic.
/// Tracks how many fetches run at once.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    targets: HashMap<String, Vec<TargetRecord>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fetched: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(mut self, pod: &str, targets: Vec<TargetRecord>) -> Self {
        self.targets.insert(pod.to_string(), targets);
        self
    }

    pub fn failing(mut self, pod: &str) -> Self {
        self.failing.insert(pod.to_string());
        self
    }

    /// The fetch for `pod` panics, taking its worker down with it
    pub fn panicking(mut self, pod: &str) -> Self {
        self.panicking.insert(pod.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Share a scripted fetcher as the trait object the poller takes
pub fn shared(fetcher: &Arc<ScriptedFetcher>) -> Arc<dyn TargetFetcher> {
    Arc::<ScriptedFetcher>::clone(fetcher)
}

#[async_trait]
impl TargetFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        endpoint: &CollectorEndpoint,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetRecord>, FetchError> {
        let pod = endpoint.pod_name.clone();
        self.fetched.lock().unwrap().push(pod.clone());
        assert!(!self.panicking.contains(&pod), "scripted panic for {pod}");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let cancelled = tokio::select! {
            biased;
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(self.delay) => false,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            return Err(FetchError::Cancelled { pod });
        }
        if self.failing.contains(&pod) {
            return Err(FetchError::Status { pod, status: 503 });
        }
        self.targets
            .get(&pod)
            .cloned()
            .ok_or(FetchError::Status { pod, status: 404 })
    }
}
