//! # Scrape Pool Keys
//!
//! Scrape pool names are generated from the monitoring resources and encode
//! their owner:
//!
//! - `kind` or `kind/group` for reserved jobs without a resource (`kubelet`)
//! - `kind/name/group...` for cluster-scoped resources
//! - `kind/namespace/name/group...` for namespaced resources
//!
//! The `key` part identifies the owning resource and is always a byte-exact
//! prefix of the pool name.

use crate::crd::MonitoringRef;
use crate::target_status::error::TargetStatusError;

/// Jobs generated by the operator itself that have no backing resource
pub const RESERVED_JOBS: &[&str] = &["kubelet"];

/// Owning kind encoded in the first segment of a scrape pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeKind {
    PodMonitoring,
    ClusterPodMonitoring,
    ClusterNodeMonitoring,
    /// A reserved job, the payload is its name
    Reserved(&'static str),
}

impl ScrapeKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "PodMonitoring" => Some(ScrapeKind::PodMonitoring),
            "ClusterPodMonitoring" => Some(ScrapeKind::ClusterPodMonitoring),
            "ClusterNodeMonitoring" => Some(ScrapeKind::ClusterNodeMonitoring),
            other => RESERVED_JOBS
                .iter()
                .copied()
                .find(|job| *job == other)
                .map(ScrapeKind::Reserved),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeKind::PodMonitoring => "PodMonitoring",
            ScrapeKind::ClusterPodMonitoring => "ClusterPodMonitoring",
            ScrapeKind::ClusterNodeMonitoring => "ClusterNodeMonitoring",
            ScrapeKind::Reserved(job) => job,
        }
    }

    /// Number of `/`-separated segments that form the key
    fn key_segments(self) -> usize {
        match self {
            ScrapeKind::PodMonitoring => 3,
            ScrapeKind::ClusterPodMonitoring | ScrapeKind::ClusterNodeMonitoring => 2,
            ScrapeKind::Reserved(_) => 1,
        }
    }
}

/// Parsed identity of a scrape pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapePoolKey {
    pub kind: ScrapeKind,
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// Residual part after the key, usually the endpoint port. Empty for a bare reserved job.
    pub group: String,
    /// Prefix of the pool that identifies the owner
    pub key: String,
}

impl ScrapePoolKey {
    /// Resource that owns the pool, `None` for reserved jobs
    #[must_use]
    pub fn owner(&self) -> Option<MonitoringRef> {
        let name = self.name.clone()?;
        match self.kind {
            ScrapeKind::PodMonitoring => Some(MonitoringRef::PodMonitoring {
                namespace: self.namespace.clone()?,
                name,
            }),
            ScrapeKind::ClusterPodMonitoring => Some(MonitoringRef::ClusterPodMonitoring { name }),
            ScrapeKind::ClusterNodeMonitoring => {
                Some(MonitoringRef::ClusterNodeMonitoring { name })
            }
            ScrapeKind::Reserved(_) => None,
        }
    }
}

fn malformed(pool: &str, reason: impl Into<String>) -> TargetStatusError {
    TargetStatusError::MalformedScrapePool {
        pool: pool.to_string(),
        reason: reason.into(),
    }
}

fn leading_kind(pool: &str) -> Result<ScrapeKind, TargetStatusError> {
    let segment = pool.split('/').next().unwrap_or_default();
    ScrapeKind::from_segment(segment).ok_or_else(|| TargetStatusError::UnknownScrapeKind {
        kind: segment.to_string(),
        pool: pool.to_string(),
    })
}

/// Parse a scrape pool name into its owner key and group
pub fn parse_scrape_pool(pool: &str) -> Result<ScrapePoolKey, TargetStatusError> {
    let kind = leading_kind(pool)?;
    let key_segments = kind.key_segments();

    // Byte offset of the `/` closing the key, if any.
    let key_end = pool.match_indices('/').nth(key_segments - 1).map(|(i, _)| i);

    let (key, group) = match (kind, key_end) {
        (ScrapeKind::Reserved(_), None) => (pool, ""),
        (ScrapeKind::Reserved(job), Some(end)) => {
            let group = &pool[end + 1..];
            if group.is_empty() || group.contains('/') {
                return Err(malformed(pool, format!("expected {job} or {job}/<group>")));
            }
            (&pool[..end], group)
        }
        (_, None) => {
            return Err(malformed(
                pool,
                format!("{} pools need {} segments before the group", kind.as_str(), key_segments),
            ));
        }
        (_, Some(end)) => (&pool[..end], &pool[end + 1..]),
    };

    if group.is_empty() && !matches!(kind, ScrapeKind::Reserved(_)) {
        return Err(malformed(pool, "empty group"));
    }

    let mut parts = key.split('/').skip(1).map(str::to_string);
    let (namespace, name) = match kind {
        ScrapeKind::PodMonitoring => (parts.next(), parts.next()),
        ScrapeKind::ClusterPodMonitoring | ScrapeKind::ClusterNodeMonitoring => {
            (None, parts.next())
        }
        ScrapeKind::Reserved(_) => (None, None),
    };
    if namespace.as_deref() == Some("") || name.as_deref() == Some("") {
        return Err(malformed(pool, "empty namespace or name"));
    }

    Ok(ScrapePoolKey {
        kind,
        namespace,
        name,
        group: group.to_string(),
        key: key.to_string(),
    })
}

/// Resolve a key produced by [`parse_scrape_pool`] back to its resource
///
/// Returns `Ok(None)` for reserved jobs, which have no resource to update.
pub fn resolve_owner(key: &str) -> Result<Option<MonitoringRef>, TargetStatusError> {
    let kind = leading_kind(key)?;
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() != kind.key_segments() || segments.iter().any(|s| s.is_empty()) {
        return Err(malformed(
            key,
            format!("{} keys have {} segments", kind.as_str(), kind.key_segments()),
        ));
    }

    Ok(match kind {
        ScrapeKind::PodMonitoring => Some(MonitoringRef::PodMonitoring {
            namespace: segments[1].to_string(),
            name: segments[2].to_string(),
        }),
        ScrapeKind::ClusterPodMonitoring => Some(MonitoringRef::ClusterPodMonitoring {
            name: segments[1].to_string(),
        }),
        ScrapeKind::ClusterNodeMonitoring => Some(MonitoringRef::ClusterNodeMonitoring {
            name: segments[1].to_string(),
        }),
        ScrapeKind::Reserved(_) => None,
    })
}
