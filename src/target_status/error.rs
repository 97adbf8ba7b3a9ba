//! # Errors
//!
//! Error taxonomy of the target status poller.

use crate::target_status::store::StoreError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetStatusError {
    /// A scrape pool or key does not follow the generated format
    #[error("malformed scrape pool {pool:?}: {reason}")]
    MalformedScrapePool { pool: String, reason: String },

    /// The leading segment of a scrape pool names no known kind
    #[error("unknown scrape pool kind {kind:?} in {pool:?}")]
    UnknownScrapeKind { kind: String, pool: String },

    /// Collector pods exist but none exposes the targets API port
    #[error("no collector pod exposes port {port_name:?} on container {container:?}")]
    PortUndiscoverable { container: String, port_name: String },

    #[error("resource store request failed: {0}")]
    Store(#[from] StoreError),

    /// Writing the status of one resource failed
    #[error("patching status of {kind} {key:?} failed: {source}")]
    Patch {
        kind: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// The resource has no name (or no namespace when namespaced)
    #[error("{kind} without a name cannot be patched")]
    UnnamedResource { kind: String },

    #[error("target status cycle cancelled")]
    Cancelled,

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Independent failures collected over one poll cycle
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<TargetStatusError>,
}

impl AggregateError {
    #[must_use]
    pub fn new(errors: Vec<TargetStatusError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[TargetStatusError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), TargetStatusError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(TargetStatusError::Aggregate(self))
        }
    }
}

impl Extend<TargetStatusError> for AggregateError {
    fn extend<T: IntoIterator<Item = TargetStatusError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) during target status update", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
