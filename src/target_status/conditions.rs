//! # Monitoring Conditions
//!
//! Records a condition on a monitoring resource and writes
//! `observedGeneration` and `conditions` back when they changed.
//! Endpoint statuses are left alone.

use crate::crd::{MonitoringCondition, MonitoringResource};
use crate::target_status::error::TargetStatusError;
use crate::target_status::store::{ConditionPatch, ResourceStore};
use chrono::Utc;
use kube::Resource;
use tracing::debug;

/// Set `condition` on `resource` and patch it when anything changed
///
/// `resource` is updated in place. Returns whether a patch was sent.
pub async fn update_condition<K: MonitoringResource>(
    store: &dyn ResourceStore,
    resource: &mut K,
    condition: MonitoringCondition,
) -> Result<bool, TargetStatusError> {
    let reference = resource
        .monitoring_ref()
        .ok_or_else(|| TargetStatusError::UnnamedResource {
            kind: K::kind(&()).into_owned(),
        })?;
    let generation = resource.meta().generation.unwrap_or_default();

    let status = resource.monitoring_status_mut();
    if !status.set_monitoring_condition(generation, Utc::now(), condition) {
        debug!(kind = reference.kind(), key = %reference, "conditions unchanged, skipping status write");
        return Ok(false);
    }

    let patch = ConditionPatch::new(status.observed_generation, status.conditions.clone());
    store
        .patch_conditions(&reference, &patch)
        .await
        .map_err(|source| TargetStatusError::Patch {
            kind: reference.kind(),
            key: reference.to_string(),
            source,
        })?;
    Ok(true)
}
