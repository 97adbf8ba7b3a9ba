//! # Target Status Cycle Tests
//!
//! End-to-end cycles against the in-memory store:
//! - Endpoint statuses are written to the owning resource
//! - Missing owners are reported without stopping other patches
//! - Malformed scrape pools are reported while valid pools are still written
//! - Conditions survive endpoint status patches and vice versa
//! - Polling is gated on the operator config and existing resources

mod common;

use common::{
    collector_pod, operator_config, pod_monitoring, settings, shared, target, FakeStore,
    ScriptedFetcher,
};
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use target_status_operator::crd::{
    MonitoringCondition, MonitoringRef, MonitoringResource, PodMonitoring, ScrapeEndpointStatus,
    CONDITION_CONFIGURATION_CREATE_SUCCESS, CONDITION_TRUE,
};
use target_status_operator::target_status::{
    update_condition, ResourceStore, TargetHealth, TargetStatusError, TargetStatusUpdater,
};
use tokio_util::sync::CancellationToken;

fn updater(store: &Arc<FakeStore>, fetcher: &Arc<ScriptedFetcher>) -> TargetStatusUpdater {
    let resources: Arc<dyn ResourceStore> = Arc::<FakeStore>::clone(store);
    TargetStatusUpdater::new(resources, shared(fetcher), settings(4))
}

fn pm_ref(namespace: &str, name: &str) -> MonitoringRef {
    MonitoringRef::PodMonitoring {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn endpoint_statuses(pm: &PodMonitoring) -> Vec<ScrapeEndpointStatus> {
    pm.monitoring_status()
        .map(|status| status.endpoint_statuses.clone())
        .unwrap_or_default()
}

fn one_collector() -> Vec<Pod> {
    vec![collector_pod("collector-0", "10.0.0.1")]
}

#[tokio::test]
async fn test_single_target_written_to_owner() {
    common::init_rustls();
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![target(
            "PodMonitoring/ns1/name1/metrics",
            "10.1.0.7:8080",
            TargetHealth::Up,
            "",
        )],
    ));

    let report = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.collectors, 1);
    assert_eq!(report.unreachable, 0);
    assert_eq!(report.patched, 1);

    let pm: PodMonitoring = store.get(&pm_ref("ns1", "name1")).unwrap();
    let statuses = endpoint_statuses(&pm);
    assert_eq!(statuses.len(), 1);
    let endpoint = &statuses[0];
    assert_eq!(endpoint.name, "PodMonitoring/ns1/name1/metrics");
    assert_eq!(endpoint.active_targets, 1);
    assert_eq!(endpoint.unhealthy_targets, 0);
    assert_eq!(endpoint.collectors_fraction, "1");
    assert!(endpoint.last_update_time.is_some());
    assert_eq!(endpoint.sample_groups.len(), 1);
    assert_eq!(endpoint.sample_groups[0].count, 1);
    assert_eq!(endpoint.sample_groups[0].last_error(), None);
    assert_eq!(
        endpoint.sample_groups[0].sample_targets[0].instance(),
        "10.1.0.7:8080"
    );
}

#[tokio::test]
async fn test_missing_owner_does_not_stop_other_patches() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "present")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![
            target("PodMonitoring/ns1/gone/metrics", "a:1", TargetHealth::Up, ""),
            target("PodMonitoring/ns1/present/metrics", "b:1", TargetHealth::Up, ""),
        ],
    ));

    let err = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();

    let TargetStatusError::Aggregate(aggregate) = err else {
        panic!("expected an aggregate error");
    };
    assert_eq!(aggregate.len(), 1);
    assert!(matches!(
        &aggregate.errors()[0],
        TargetStatusError::Patch { kind: "PodMonitoring", key, .. } if key == "PodMonitoring/ns1/gone"
    ));

    let present: PodMonitoring = store.get(&pm_ref("ns1", "present")).unwrap();
    assert_eq!(endpoint_statuses(&present).len(), 1);
    assert_eq!(
        *store.patches.lock().unwrap(),
        vec!["PodMonitoring/ns1/present".to_string()]
    );
}

#[tokio::test]
async fn test_malformed_pools_reported_alongside_patches() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "present")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![
            target("Bogus/ns1/x/metrics", "a:1", TargetHealth::Up, ""),
            target("PodMonitoring/ns1/truncated", "b:1", TargetHealth::Up, ""),
            target("PodMonitoring/ns1/truncated", "c:1", TargetHealth::Down, "timeout"),
            target("PodMonitoring/ns1/present/metrics", "d:1", TargetHealth::Up, ""),
        ],
    ));

    let err = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();

    let TargetStatusError::Aggregate(aggregate) = err else {
        panic!("expected an aggregate error");
    };
    assert_eq!(aggregate.len(), 2, "one error per distinct bad pool");
    assert!(aggregate.errors().iter().any(|e| matches!(
        e,
        TargetStatusError::UnknownScrapeKind { kind, .. } if kind == "Bogus"
    )));
    assert!(aggregate.errors().iter().any(|e| matches!(
        e,
        TargetStatusError::MalformedScrapePool { pool, .. } if pool == "PodMonitoring/ns1/truncated"
    )));

    let present: PodMonitoring = store.get(&pm_ref("ns1", "present")).unwrap();
    let statuses = endpoint_statuses(&present);
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].active_targets, 1);
    assert_eq!(
        *store.patches.lock().unwrap(),
        vec!["PodMonitoring/ns1/present".to_string()]
    );
}

#[tokio::test]
async fn test_endpoint_patch_leaves_conditions_untouched() {
    let mut pm = pod_monitoring("ns1", "name1");
    let condition = MonitoringCondition::new(CONDITION_CONFIGURATION_CREATE_SUCCESS, CONDITION_TRUE)
        .with_reason("Generated", "scrape configuration generated");
    pm.monitoring_status_mut().set_monitoring_condition(
        1,
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        condition,
    );

    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pm),
    );
    let reference = pm_ref("ns1", "name1");
    let before = store.raw(&reference).unwrap()["status"]["conditions"].clone();
    let generation_before = store.raw(&reference).unwrap()["status"]["observedGeneration"].clone();

    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![target(
            "PodMonitoring/ns1/name1/metrics",
            "a:1",
            TargetHealth::Down,
            "connection refused",
        )],
    ));
    updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let after = store.raw(&reference).unwrap();
    assert_eq!(
        serde_json::to_string(&after["status"]["conditions"]).unwrap(),
        serde_json::to_string(&before).unwrap()
    );
    assert_eq!(after["status"]["observedGeneration"], generation_before);
    assert_eq!(after["status"]["endpointStatuses"][0]["unhealthyTargets"], 1);
}

#[tokio::test]
async fn test_should_poll_gates() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let cases = [
        (None, true, false),
        (Some(false), true, false),
        (Some(true), false, false),
        (Some(true), true, true),
    ];

    for (enabled, with_resource, expected) in cases {
        let mut store = FakeStore::new();
        if let Some(enabled) = enabled {
            store = store.with_config(operator_config(enabled));
        }
        if with_resource {
            store = store.with_resource(&pod_monitoring("ns1", "name1"));
        }
        let store = Arc::new(store);

        let should_poll = updater(&store, &fetcher).should_poll().await.unwrap();
        assert_eq!(
            should_poll, expected,
            "config {enabled:?}, resource present {with_resource}"
        );
    }
}

#[tokio::test]
async fn test_collectors_without_port_fail_before_fetching() {
    let mut pod = collector_pod("collector-0", "10.0.0.1");
    if let Some(spec) = pod.spec.as_mut() {
        spec.containers[0].ports = None;
    }
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(vec![pod])
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new());

    let err = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TargetStatusError::PortUndiscoverable { .. }));
    assert_eq!(fetcher.calls(), 0);
    assert!(store.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_running_collectors_is_a_quiet_cycle() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new());

    let report = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.collectors, 0);
    assert_eq!(fetcher.calls(), 0);
    assert!(store.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reserved_jobs_are_not_patched() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![target("kubelet/cadvisor", "node-a", TargetHealth::Up, "")],
    ));

    let report = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.patched, 0);
    assert_eq!(report.skipped, 1);
    assert!(store.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_collector_halves_fraction() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(vec![
                collector_pod("collector-0", "10.0.0.1"),
                collector_pod("collector-1", "10.0.0.2"),
            ])
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_targets(
                "collector-0",
                vec![target(
                    "PodMonitoring/ns1/name1/metrics",
                    "a:1",
                    TargetHealth::Up,
                    "",
                )],
            )
            .failing("collector-1"),
    );

    let report = updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.collectors, 2);
    assert_eq!(report.unreachable, 1);
    let pm: PodMonitoring = store.get(&pm_ref("ns1", "name1")).unwrap();
    assert_eq!(endpoint_statuses(&pm)[0].collectors_fraction, "0.5");
}

#[tokio::test]
async fn test_cancelled_cycle_writes_nothing() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets("collector-0", vec![]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = updater(&store, &fetcher).run_cycle(&cancel).await.unwrap_err();

    assert!(matches!(err, TargetStatusError::Cancelled));
    assert!(store.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_condition_update_skips_unchanged_writes() {
    let store = Arc::new(
        FakeStore::new()
            .with_config(operator_config(true))
            .with_pods(one_collector())
            .with_resource(&pod_monitoring("ns1", "name1")),
    );
    let fetcher = Arc::new(ScriptedFetcher::new().with_targets(
        "collector-0",
        vec![target(
            "PodMonitoring/ns1/name1/metrics",
            "a:1",
            TargetHealth::Up,
            "",
        )],
    ));
    updater(&store, &fetcher)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let reference = pm_ref("ns1", "name1");
    let endpoints_before = store.raw(&reference).unwrap()["status"]["endpointStatuses"].clone();
    let mut pm: PodMonitoring = store.get(&reference).unwrap();
    let condition = || MonitoringCondition::new(CONDITION_CONFIGURATION_CREATE_SUCCESS, CONDITION_TRUE);

    assert!(update_condition(&*store, &mut pm, condition()).await.unwrap());
    assert!(!update_condition(&*store, &mut pm, condition()).await.unwrap());
    assert_eq!(store.patches.lock().unwrap().len(), 2);

    let stored = store.raw(&reference).unwrap();
    assert_eq!(stored["status"]["endpointStatuses"], endpoints_before);
    assert_eq!(stored["status"]["observedGeneration"], 1);
    assert_eq!(stored["status"]["conditions"][0]["status"], "True");
}

#[tokio::test]
async fn test_condition_update_requires_a_name() {
    let store = FakeStore::new();
    let mut pm = pod_monitoring("ns1", "name1");
    pm.metadata.name = None;

    let err = update_condition(
        &store,
        &mut pm,
        MonitoringCondition::new(CONDITION_CONFIGURATION_CREATE_SUCCESS, CONDITION_TRUE),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, TargetStatusError::UnnamedResource { .. }));
}
