//! # Endpoint Status Aggregator
//!
//! Folds the flat list of targets reported by all collectors into one
//! [`ScrapeEndpointStatus`] per scrape pool, grouped by owning resource key.
//!
//! Output is fully determined by the input multiset: arrival order only
//! affects intermediate state, every list is sorted before it is returned.

use crate::constants::MAX_SAMPLE_TARGETS;
use crate::crd::{format_time, SampleGroup, SampleTarget, ScrapeEndpointStatus};
use crate::target_status::error::TargetStatusError;
use crate::target_status::executor::FetchOutcome;
use crate::target_status::fetcher::{TargetHealth, TargetRecord};
use crate::target_status::scrape_pool::parse_scrape_pool;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Endpoint statuses of one cycle, keyed by owner key (`PodMonitoring/ns/name`, ...)
#[derive(Debug, Default)]
pub struct Aggregation {
    pub statuses: BTreeMap<String, Vec<ScrapeEndpointStatus>>,
    /// Collectors attempted
    pub total: usize,
    /// Collectors that were unreachable
    pub failed: usize,
    /// Targets whose scrape pool could not be parsed, one error per distinct pool
    pub errors: Vec<TargetStatusError>,
}

/// `(total - failed) / total`, `None` when `total` is zero
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    reason = "collector counts are far below 2^52"
)]
pub fn collectors_ratio(total: usize, failed: usize) -> Option<f64> {
    (total > 0).then(|| total.saturating_sub(failed) as f64 / total as f64)
}

/// [`collectors_ratio`] as the shortest decimal that round-trips (`1`, `0.6`)
#[must_use]
pub fn collectors_fraction(total: usize, failed: usize) -> Option<String> {
    collectors_ratio(total, failed).map(|ratio| ratio.to_string())
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    count: i32,
    samples: Vec<SampleTarget>,
}

#[derive(Debug)]
struct EndpointAccumulator {
    active: i64,
    unhealthy: i64,
    groups: HashMap<String, GroupAccumulator>,
}

/// Ordering of sample targets, `instance` first
fn sample_order(a: &SampleTarget, b: &SampleTarget) -> Ordering {
    a.instance()
        .cmp(b.instance())
        .then_with(|| a.labels.cmp(&b.labels))
        .then_with(|| a.last_scrape_duration_seconds.cmp(&b.last_scrape_duration_seconds))
        .then_with(|| a.last_error.cmp(&b.last_error))
        .then_with(|| a.health.cmp(&b.health))
}

fn sample_target(record: &TargetRecord) -> SampleTarget {
    SampleTarget {
        labels: record.labels.clone(),
        last_error: (!record.last_error.is_empty()).then(|| record.last_error.clone()),
        last_scrape_duration_seconds: record.last_scrape_duration.to_string(),
        health: record.health.as_str().to_string(),
    }
}

impl EndpointAccumulator {
    fn new() -> Self {
        Self {
            active: 0,
            unhealthy: 0,
            groups: HashMap::new(),
        }
    }

    fn add(&mut self, record: &TargetRecord) {
        self.active += 1;
        if record.health != TargetHealth::Up {
            self.unhealthy += 1;
        }

        let group = self.groups.entry(record.last_error.clone()).or_default();
        group.count += 1;
        group.samples.push(sample_target(record));
        // Keep the smallest samples so the result does not depend on arrival order.
        if group.samples.len() > MAX_SAMPLE_TARGETS {
            group.samples.sort_by(sample_order);
            group.samples.truncate(MAX_SAMPLE_TARGETS);
        }
    }

    fn finish(self, name: String, fraction: &str, now: &str) -> ScrapeEndpointStatus {
        let mut groups: Vec<(String, GroupAccumulator)> = self.groups.into_iter().collect();
        // Errors ascending, the error-free group last.
        groups.sort_by(|(a, _), (b, _)| (a.is_empty(), a).cmp(&(b.is_empty(), b)));

        let sample_groups = groups
            .into_iter()
            .map(|(_, mut group)| {
                group.samples.sort_by(sample_order);
                SampleGroup {
                    sample_targets: group.samples,
                    count: group.count,
                }
            })
            .collect();

        ScrapeEndpointStatus {
            name,
            active_targets: self.active,
            unhealthy_targets: self.unhealthy,
            last_update_time: Some(now.to_string()),
            collectors_fraction: fraction.to_string(),
            sample_groups,
        }
    }
}

/// Build the endpoint statuses of one cycle
///
/// Records with a malformed scrape pool are reported in
/// [`Aggregation::errors`] and left out; the rest are still aggregated.
pub fn build_endpoint_statuses(outcomes: &[FetchOutcome], now: DateTime<Utc>) -> Aggregation {
    let total = outcomes.len();
    let failed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, FetchOutcome::Unreachable))
        .count();
    let Some(fraction) = collectors_fraction(total, failed) else {
        return Aggregation::default();
    };

    // key -> pool -> accumulator
    let mut endpoints: HashMap<String, HashMap<String, EndpointAccumulator>> = HashMap::new();
    let mut bad_pools = BTreeSet::new();
    let mut errors = Vec::new();

    let records = outcomes.iter().flat_map(|outcome| match outcome {
        FetchOutcome::Targets(targets) => targets.as_slice(),
        FetchOutcome::Unreachable => [].as_slice(),
    });
    for record in records {
        let parsed = match parse_scrape_pool(&record.scrape_pool) {
            Ok(parsed) => parsed,
            Err(e) => {
                if bad_pools.insert(record.scrape_pool.clone()) {
                    errors.push(e);
                }
                continue;
            }
        };
        endpoints
            .entry(parsed.key)
            .or_default()
            .entry(record.scrape_pool.clone())
            .or_insert_with(EndpointAccumulator::new)
            .add(record);
    }

    let now = format_time(now);
    let statuses = endpoints
        .into_iter()
        .map(|(key, pools)| {
            let mut list: Vec<ScrapeEndpointStatus> = pools
                .into_iter()
                .map(|(pool, acc)| acc.finish(pool, &fraction, &now))
                .collect();
            list.sort_by(|a, b| a.name.cmp(&b.name));
            (key, list)
        })
        .collect();

    Aggregation {
        statuses,
        total,
        failed,
        errors,
    }
}
