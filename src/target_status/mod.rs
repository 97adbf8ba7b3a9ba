//! # Target Status
//!
//! Polls every collector pod for its active scrape targets and writes a
//! per-endpoint health summary into the status of the owning
//! PodMonitoring, ClusterPodMonitoring or ClusterNodeMonitoring.
//!
//! ## Module Structure
//!
//! - `scheduler.rs` - Self-rearming poll loop and its single-slot trigger
//! - `updater.rs` - One full cycle: should-poll check, poll, aggregate, patch
//! - `executor.rs` - Collector endpoint resolution and the bounded worker pool
//! - `fetcher.rs` - HTTP client for the collector targets API
//! - `aggregator.rs` - Folds targets into endpoint statuses
//! - `patcher.rs` - Merge patches of `status.endpointStatuses`
//! - `scrape_pool.rs` - Scrape pool name grammar and owner resolution
//! - `conditions.rs` - Condition updates that skip no-op writes
//! - `store.rs` - Kubernetes access behind the `ResourceStore` trait
//! - `error.rs` - Error types

pub mod aggregator;
pub mod conditions;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod patcher;
pub mod scheduler;
pub mod scrape_pool;
pub mod store;
pub mod updater;

pub use aggregator::{build_endpoint_statuses, collectors_fraction, Aggregation};
pub use conditions::update_condition;
pub use error::{AggregateError, TargetStatusError};
pub use executor::{poll_collectors, resolve_collector_endpoints, FetchOutcome};
pub use fetcher::{
    CollectorEndpoint, FetchError, HttpTargetFetcher, TargetFetcher, TargetHealth, TargetRecord,
};
pub use patcher::{patch_endpoint_statuses, PatchOutcome};
pub use scheduler::{PollScheduler, PollTrigger};
pub use scrape_pool::{parse_scrape_pool, resolve_owner, ScrapeKind, ScrapePoolKey};
pub use store::{ConditionPatch, EndpointStatusPatch, KubeStore, ResourceStore, StoreError};
pub use updater::{CycleReport, TargetStatusUpdater};
