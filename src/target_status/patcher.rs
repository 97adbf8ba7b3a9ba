//! # Status Patcher
//!
//! Writes each owner's endpoint statuses with a merge patch that touches
//! `status.endpointStatuses` only. Resources are patched one after the other
//! and a failure on one never stops the rest.

use crate::crd::ScrapeEndpointStatus;
use crate::observability::metrics;
use crate::target_status::error::TargetStatusError;
use crate::target_status::scrape_pool::resolve_owner;
use crate::target_status::store::{EndpointStatusPatch, ResourceStore};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct PatchOutcome {
    /// Resources whose endpoint statuses were written
    pub patched: usize,
    /// Keys without an owning resource (reserved jobs)
    pub skipped: usize,
    pub errors: Vec<TargetStatusError>,
}

/// Patch the endpoint statuses of every owner key in `statuses`
pub async fn patch_endpoint_statuses(
    store: &dyn ResourceStore,
    statuses: &BTreeMap<String, Vec<ScrapeEndpointStatus>>,
) -> PatchOutcome {
    let mut outcome = PatchOutcome::default();

    for (key, endpoints) in statuses {
        let owner = match resolve_owner(key) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                debug!(key = %key, "no owning resource, skipping");
                outcome.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cannot resolve owner of endpoint statuses");
                outcome.errors.push(e);
                continue;
            }
        };

        let patch = EndpointStatusPatch::new(endpoints.clone());
        match store.patch_endpoint_statuses(&owner, &patch).await {
            Ok(()) => {
                debug!(kind = owner.kind(), key = %key, endpoints = endpoints.len(), "endpoint statuses patched");
                outcome.patched += 1;
            }
            Err(source) => {
                warn!(
                    kind = owner.kind(),
                    key = %key,
                    error = %source,
                    "patching endpoint statuses failed"
                );
                metrics::increment_patch_failures(owner.kind());
                outcome.errors.push(TargetStatusError::Patch {
                    kind: owner.kind(),
                    key: key.clone(),
                    source,
                });
            }
        }
    }

    outcome
}
