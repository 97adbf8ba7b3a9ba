//! # Monitoring Status
//!
//! Status types shared by every monitoring resource kind: reconciliation
//! conditions and the per-endpoint scrape target summaries written by the
//! target status poller.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition type reported once scrape configuration was generated for a resource
pub const CONDITION_CONFIGURATION_CREATE_SUCCESS: &str = "ConfigurationCreateSuccess";

/// Condition status values
pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

/// Render a timestamp the way Kubernetes serializes `metav1.Time`
#[must_use]
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Status of a PodMonitoring, ClusterPodMonitoring or ClusterNodeMonitoring
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    /// Generation of the spec the conditions were computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<MonitoringCondition>,
    /// Scrape target health per endpoint, rebuilt on every poll cycle
    #[serde(default)]
    pub endpoint_statuses: Vec<ScrapeEndpointStatus>,
}

/// Condition of a monitoring resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringCondition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last time the condition was written
    #[serde(default)]
    pub last_update_time: Option<String>,
    /// Last time the status value flipped
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl MonitoringCondition {
    pub fn new(r#type: &str, status: &str) -> Self {
        Self {
            r#type: r#type.to_string(),
            status: status.to_string(),
            last_update_time: None,
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: &str, message: &str) -> Self {
        self.reason = Some(reason.to_string());
        self.message = Some(message.to_string());
        self
    }
}

impl MonitoringStatus {
    /// Record `condition` for the given spec generation
    ///
    /// The last update time is always refreshed. The last transition time
    /// only moves when the condition status flips (or the condition is new).
    /// Returns `true` when the generation or the condition state changed and
    /// the status therefore needs to be written.
    pub fn set_monitoring_condition(
        &mut self,
        generation: i64,
        now: DateTime<Utc>,
        mut condition: MonitoringCondition,
    ) -> bool {
        let mut changed = false;
        if self.observed_generation != Some(generation) {
            self.observed_generation = Some(generation);
            changed = true;
        }

        let now = format_time(now);
        condition.last_update_time = Some(now.clone());

        match self
            .conditions
            .iter_mut()
            .find(|existing| existing.r#type == condition.r#type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time.clone();
                    if existing.reason != condition.reason || existing.message != condition.message
                    {
                        changed = true;
                    }
                } else {
                    condition.last_transition_time = Some(now);
                    changed = true;
                }
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(now);
                self.conditions.push(condition);
                changed = true;
            }
        }

        changed
    }
}

/// Scrape target health summary for one endpoint of a monitoring resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeEndpointStatus {
    /// Full scrape pool name, e.g. `PodMonitoring/ns/name/metrics`
    pub name: String,
    /// Number of active targets
    #[serde(default)]
    pub active_targets: i64,
    /// Number of active targets that are not healthy
    #[serde(default)]
    pub unhealthy_targets: i64,
    /// When this summary was computed
    #[serde(default)]
    pub last_update_time: Option<String>,
    /// Fraction of collectors that answered the poll, as a decimal string
    #[serde(default)]
    pub collectors_fraction: String,
    /// Targets grouped by last error, the error-free group last
    #[serde(default)]
    pub sample_groups: Vec<SampleGroup>,
}

/// Targets sharing one error value
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleGroup {
    /// At most five representative targets, ordered by `instance` label
    #[serde(default)]
    pub sample_targets: Vec<SampleTarget>,
    /// Total number of targets in the group, including those not sampled
    #[serde(default)]
    pub count: i32,
}

impl SampleGroup {
    /// Error shared by every target of the group, `None` for healthy scrapes
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.sample_targets
            .first()
            .and_then(|target| target.last_error.as_deref())
    }
}

/// One observed scrape target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleTarget {
    /// Target labels after relabeling
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Last scrape error, absent when the last scrape succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Duration of the last scrape in seconds, as a decimal string
    #[serde(default)]
    pub last_scrape_duration_seconds: String,
    /// Health reported by the collector (up, down, unknown)
    #[serde(default)]
    pub health: String,
}

impl SampleTarget {
    /// The `instance` label used for ordering
    #[must_use]
    pub fn instance(&self) -> &str {
        self.labels.get("instance").map_or("", String::as_str)
    }
}
