//! Installation options

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "kudo-system";
pub const DEFAULT_SERVICE_ACCOUNT: &str = "kudo-manager";
pub const DEFAULT_IMAGE: &str = "kudobuilder/controller";

/// How the KUDO controller is installed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Options {
    /// KUDO version, without the leading `v`
    pub version: String,

    /// Namespace the controller runs in
    pub namespace: String,

    /// Full controller image reference, tag included
    pub image: String,

    pub service_account: String,

    pub termination_grace_period: i64,

    pub image_pull_policy: String,

    /// Generate a CA for the admission webhook instead of relying on cert-manager
    pub self_signed_webhook_ca: bool,
}

impl Options {
    /// Options for `version`, tagging `image` with `v<version>`
    pub fn new(image: &str, version: &str) -> Self {
        let version = version.trim_start_matches('v').to_string();
        Self {
            image: format!("{image}:v{version}"),
            version,
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_service_account(mut self, service_account: &str) -> Self {
        self.service_account = service_account.to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(anyhow!("KUDO version cannot be empty"));
        }
        if self.namespace.is_empty() {
            return Err(anyhow!("Namespace cannot be empty"));
        }
        if self.service_account.is_empty() {
            return Err(anyhow!("Service account cannot be empty"));
        }
        if self.termination_grace_period < 0 {
            return Err(anyhow!(
                "Termination grace period cannot be negative: {}",
                self.termination_grace_period
            ));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            termination_grace_period: 300,
            image_pull_policy: "Always".to_string(),
            self_signed_webhook_ca: true,
        }
    }
}
