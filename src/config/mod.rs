//! # Configuration
//!
//! Operator settings loaded from the environment.

mod operator;

pub use operator::{ConfigError, LogFormat, OperatorSettings};
