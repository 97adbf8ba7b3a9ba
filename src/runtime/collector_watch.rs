//! # Collector Watch
//!
//! Watches the collector DaemonSet and requests an immediate target status
//! poll whenever it is applied or deleted, so fresh collector pods are
//! reported without waiting for the next interval.

use crate::target_status::PollTrigger;
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::apps::v1::DaemonSet;
use kube::Api;
use kube_runtime::watcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Whether a watch event should re-trigger polling
///
/// Initial listing events are ignored; the scheduler polls on start anyway.
pub fn should_retrigger(event: &watcher::Event<DaemonSet>) -> bool {
    match event {
        watcher::Event::Apply(_) | watcher::Event::Delete(_) => true,
        watcher::Event::Init | watcher::Event::InitApply(_) | watcher::Event::InitDone => false,
    }
}

/// Start watching the collector DaemonSet in the background
pub fn start_collector_watch(
    client: kube::Client,
    namespace: &str,
    name: &str,
    trigger: PollTrigger,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let namespace = namespace.to_string();
    let name = name.to_string();
    tokio::spawn(async move {
        let daemon_sets: Api<DaemonSet> = Api::namespaced(client, &namespace);

        info!(
            "Starting watch for collector DaemonSet '{}' in namespace '{}'",
            name, namespace
        );

        // Field selector so only our DaemonSet is watched
        let watcher_config = watcher::Config::default().fields(&format!("metadata.name={name}"));
        let stream = watcher(daemon_sets, watcher_config);
        pin_mut!(stream);

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = stream.next() => event,
            };

            match event {
                Some(Ok(event)) => {
                    if should_retrigger(&event) {
                        let queued = trigger.trigger();
                        debug!(daemonset = %name, queued, "collector changed, target status poll requested");
                    }
                }
                Some(Err(e)) => {
                    error!("Error watching collector DaemonSet: {}", e);
                    // Continue watching - stream will retry automatically
                }
                None => {
                    warn!("Collector DaemonSet watch stream ended");
                    break;
                }
            }
        }

        info!("Collector DaemonSet watch stopped");
    })
}
