//! # Concurrent Poll Executor
//!
//! Fans out one fetch per collector pod over a fixed pool of workers and
//! fans the outcomes back in.
//!
//! ```text
//! producer ──► jobs (closed after the last pod) ──► worker × C ──► results
//! ```
//!
//! The results channel closes once every worker has dropped its sender, so
//! draining it yields exactly one outcome per pod.

use crate::observability::metrics;
use crate::target_status::error::TargetStatusError;
use crate::target_status::fetcher::{CollectorEndpoint, TargetFetcher, TargetRecord};
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Result of polling one collector
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Targets(Vec<TargetRecord>),
    /// The fetch failed; still counts as an attempted collector
    Unreachable,
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Running")
}

fn named_port(pod: &Pod, container: &str, port_name: &str) -> Option<u16> {
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .filter(|c| c.name == container)
        .flat_map(|c| c.ports.iter().flatten())
        .find(|p| p.name.as_deref() == Some(port_name))
        .and_then(|p| u16::try_from(p.container_port).ok())
}

fn has_container(pod: &Pod, container: &str) -> bool {
    pod.spec
        .as_ref()
        .is_some_and(|spec| spec.containers.iter().any(|c| c.name == container))
}

/// Select running collector pods and the port serving their targets API
///
/// The port is taken from the first pod exposing `port_name` on `container`
/// and used for every pod. No candidate pods is not an error. Candidate pods
/// of which none exposes the port fail the cycle before any request is made.
pub fn resolve_collector_endpoints(
    pods: &[Pod],
    container: &str,
    port_name: &str,
) -> Result<Vec<CollectorEndpoint>, TargetStatusError> {
    let candidates: Vec<&Pod> = pods
        .iter()
        .filter(|pod| is_running(pod) && has_container(pod, container))
        .collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let port = candidates
        .iter()
        .find_map(|pod| named_port(pod, container, port_name))
        .ok_or_else(|| TargetStatusError::PortUndiscoverable {
            container: container.to_string(),
            port_name: port_name.to_string(),
        })?;

    Ok(candidates
        .into_iter()
        .map(|pod| CollectorEndpoint {
            pod_name: pod.metadata.name.clone().unwrap_or_default(),
            pod_ip: pod.status.as_ref().and_then(|status| status.pod_ip.clone()),
            port,
        })
        .collect())
}

/// Fetch the targets of every endpoint with at most `concurrency` requests in flight
///
/// Returns one outcome per endpoint, in completion order. Outcomes lost to a
/// failed worker are filled in as [`FetchOutcome::Unreachable`].
pub async fn poll_collectors(
    endpoints: Vec<CollectorEndpoint>,
    fetcher: Arc<dyn TargetFetcher>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<FetchOutcome> {
    if endpoints.is_empty() {
        return Vec::new();
    }
    let expected = endpoints.len();
    let workers = concurrency.max(1);

    let (job_tx, job_rx) = mpsc::channel::<CollectorEndpoint>(workers);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<FetchOutcome>(workers);

    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        for endpoint in endpoints {
            if job_tx.send(endpoint).await.is_err() {
                break;
            }
        }
        // job_tx drops here and closes the queue
    });

    for worker in 0..workers {
        let jobs = Arc::clone(&job_rx);
        let results = result_tx.clone();
        let fetcher = Arc::clone(&fetcher);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            loop {
                let job = jobs.lock().await.recv().await;
                let Some(endpoint) = job else {
                    break;
                };
                metrics::increment_collector_fetches();
                let outcome = match fetcher.fetch(&endpoint, &cancel).await {
                    Ok(targets) => {
                        debug!(worker, pod = %endpoint.pod_name, targets = targets.len(), "collector polled");
                        FetchOutcome::Targets(targets)
                    }
                    Err(e) => {
                        warn!(worker, pod = %endpoint.pod_name, error = %e, "collector unreachable");
                        metrics::increment_collector_fetch_failures();
                        FetchOutcome::Unreachable
                    }
                };
                if results.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut outcomes = Vec::with_capacity(expected);
    while let Some(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "collector poll worker failed");
        }
    }

    // A panicked worker loses its in-flight outcome; that collector counts as unreachable.
    if outcomes.len() < expected {
        warn!(
            expected,
            received = outcomes.len(),
            "collector poll lost outcomes, counting them as unreachable"
        );
        outcomes.resize(expected, FetchOutcome::Unreachable);
    }
    outcomes
}
