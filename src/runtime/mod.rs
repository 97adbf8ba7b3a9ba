//! # Runtime
//!
//! Background tasks around the poll scheduler.
//!
//! - `collector_watch`: re-triggers polling when the collector DaemonSet changes

pub mod collector_watch;

pub use collector_watch::{should_retrigger, start_collector_watch};
