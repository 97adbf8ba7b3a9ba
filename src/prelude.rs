//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use target_status_operator::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (PodMonitoring, MonitoringStatus, OperatorConfig, etc.)
//! - The store and fetcher traits with their Kubernetes and HTTP implementations
//! - The updater, scheduler and trigger
//! - Config and error types

// CRD types - most commonly used
pub use crate::crd::*;

// Seams - implement these to run the poller against something other than a cluster
pub use crate::target_status::{ResourceStore, TargetFetcher};

pub use crate::target_status::{
    HttpTargetFetcher, KubeStore, PollScheduler, PollTrigger, TargetStatusUpdater,
};

// Config types
pub use crate::config::{LogFormat, OperatorSettings};

// Common error types
pub use crate::target_status::{AggregateError, FetchError, StoreError, TargetStatusError};
