//! Terraform provider for KUDO
//!
//! Exposes the `kudo_operator` and `kudo_instance` resources. Operators are
//! installed from KUDO package repositories, instances are driven through
//! the KUDO controller, and every handler blocks until the controller has
//! reconciled the change it made.

pub mod cli;
pub mod client;
pub mod config;
pub mod provider;
pub mod resources;
pub mod utils;

pub use client::KudoClient;
pub use config::ProviderConfig;
pub use provider::{KudoMeta, KudoProvider};

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the provider outside of the wrapped clients
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Unexpected ID format ({0:?}), expected \"namespace/name\"")]
    InvalidId(String),

    #[error("missing required parameters for operator version {operator_version}: {}", .missing.join(", "))]
    MissingParameters {
        operator_version: String,
        missing: Vec<String>,
    },

    #[error("plan {plan} of instance {namespace}/{name} failed: {message}")]
    PlanFailed {
        namespace: String,
        name: String,
        plan: String,
        message: String,
    },

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("no Kubernetes host configured: set `host` or provide a kubeconfig")]
    NoHost,
}
