//! # Target Status Updater
//!
//! One poll cycle end to end: resolve collectors, poll them, aggregate
//! their targets and patch the owning resources.

use crate::config::OperatorSettings;
use crate::observability::metrics;
use crate::target_status::aggregator::{build_endpoint_statuses, collectors_ratio};
use crate::target_status::error::{AggregateError, TargetStatusError};
use crate::target_status::executor::{poll_collectors, resolve_collector_endpoints};
use crate::target_status::fetcher::TargetFetcher;
use crate::target_status::patcher::patch_endpoint_statuses;
use crate::target_status::store::ResourceStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

/// Summary of a completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Collectors attempted
    pub collectors: usize,
    pub unreachable: usize,
    /// Resources whose endpoint statuses were written
    pub patched: usize,
    /// Owner keys without a resource
    pub skipped: usize,
}

pub struct TargetStatusUpdater {
    store: Arc<dyn ResourceStore>,
    fetcher: Arc<dyn TargetFetcher>,
    settings: OperatorSettings,
}

impl std::fmt::Debug for TargetStatusUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetStatusUpdater")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TargetStatusUpdater {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        fetcher: Arc<dyn TargetFetcher>,
        settings: OperatorSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            settings,
        }
    }

    /// Whether a cycle should run now
    ///
    /// Requires the feature to be enabled in the operator config and at least
    /// one monitoring resource to exist. A missing operator config means disabled.
    pub async fn should_poll(&self) -> Result<bool, TargetStatusError> {
        match self.store.operator_config().await? {
            Some(config) if config.target_status_enabled() => {}
            Some(_) => {
                debug!("target status disabled in operator config");
                return Ok(false);
            }
            None => {
                debug!("operator config not found, target status disabled");
                return Ok(false);
            }
        }
        Ok(self.store.has_monitoring_resources().await?)
    }

    /// Run one poll, aggregate and patch cycle now
    ///
    /// Independent failures (malformed pools, failed patches) do not stop the
    /// cycle; they are returned together as [`TargetStatusError::Aggregate`].
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, TargetStatusError> {
        let started = Instant::now();
        metrics::increment_poll_cycles();

        let result = self
            .cycle(cancel)
            .instrument(info_span!("target_status.cycle"))
            .await;

        metrics::observe_poll_cycle_duration(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_poll_cycle_errors();
        }
        result
    }

    async fn cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, TargetStatusError> {
        let pods = self.store.collector_pods().await?;
        let endpoints = resolve_collector_endpoints(
            &pods,
            &self.settings.collector_container_name,
            &self.settings.collector_port_name,
        )?;
        if endpoints.is_empty() {
            debug!("no running collector pods");
            return Ok(CycleReport::default());
        }

        let outcomes = poll_collectors(
            endpoints,
            Arc::clone(&self.fetcher),
            self.settings.target_poll_concurrency,
            cancel,
        )
        .await;
        // Outcomes of a cancelled poll are all unreachable and must not be written.
        if cancel.is_cancelled() {
            return Err(TargetStatusError::Cancelled);
        }

        let aggregation = build_endpoint_statuses(&outcomes, Utc::now());
        if let Some(ratio) = collectors_ratio(aggregation.total, aggregation.failed) {
            metrics::set_collectors_fraction(ratio);
        }

        let patched = patch_endpoint_statuses(self.store.as_ref(), &aggregation.statuses).await;
        let report = CycleReport {
            collectors: aggregation.total,
            unreachable: aggregation.failed,
            patched: patched.patched,
            skipped: patched.skipped,
        };
        info!(
            collectors = report.collectors,
            unreachable = report.unreachable,
            patched = report.patched,
            skipped = report.skipped,
            "target status cycle finished"
        );

        let mut errors = AggregateError::new(aggregation.errors);
        errors.extend(patched.errors);
        errors.into_result().map(|()| report)
    }
}
