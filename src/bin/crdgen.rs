//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from the Rust type
//! definitions in `target_status_operator::crd`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/monitoring.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The generated CRDs include the OpenAPI schema and the status subresource
//! of the three monitoring kinds.

use kube::core::CustomResourceExt;
use target_status_operator::crd::{
    ClusterNodeMonitoring, ClusterPodMonitoring, OperatorConfig, PodMonitoring,
};

fn main() {
    let crds = [
        PodMonitoring::crd(),
        ClusterPodMonitoring::crd(),
        ClusterNodeMonitoring::crd(),
        OperatorConfig::crd(),
    ];

    // Print header comments warning that this file should not be edited manually
    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("#");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
