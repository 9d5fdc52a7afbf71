//! KUDO controller installation manifests

pub mod certs;
pub mod config;
pub mod manifests;

pub use certs::WebhookCertificates;
pub use config::Options;
pub use manifests::{controller_selector, manifests, Manifest, CONTROLLER_NAME};
