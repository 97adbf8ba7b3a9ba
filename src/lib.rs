//! Target Status Operator Library
//!
//! This library provides the target status subsystem of a managed-Prometheus
//! operator: it polls collector pods for their active scrape targets and
//! reconciles the result into the status of monitoring resources.
//! Tests are included in the module files (e.g., target_status/aggregator.rs).
//!
//! ## Quick Start
//!
//! ```rust
//! use target_status_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

// Re-export modules so they can be tested
pub mod config;
pub mod constants;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod target_status;
