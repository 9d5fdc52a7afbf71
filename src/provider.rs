//! The `kudo` provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use kudo_tfplugin::traits::ResourceMap;
use kudo_tfplugin::{Provider, ResourceData, Schema};

use crate::client::KudoClient;
use crate::config::{kube_config, provider_schema, ProviderConfig};
use crate::resources::{InstanceResource, OperatorResource};

/// Reported to the cluster when Terraform does not send its version
pub const DEFAULT_TERRAFORM_VERSION: &str = "0.11+compatible";

/// Registry address of the provider
pub const PROVIDER_ADDRESS: &str = "registry.terraform.io/kudobuilder/kudo";

/// Everything the resource handlers need once the provider is configured
#[derive(Clone)]
pub struct KudoMeta {
    pub kudo: KudoClient,
    /// Where the repository settings are read from
    pub repo_home: PathBuf,
}

pub struct KudoProvider;

#[async_trait]
impl Provider for KudoProvider {
    type Meta = KudoMeta;

    fn schema(&self) -> Schema {
        provider_schema()
    }

    fn resources(&self) -> ResourceMap<KudoMeta> {
        let mut resources: ResourceMap<KudoMeta> = BTreeMap::new();
        resources.insert("kudo_operator".to_string(), Box::new(OperatorResource));
        resources.insert("kudo_instance".to_string(), Box::new(InstanceResource));
        resources
    }

    async fn configure(&self, data: &ResourceData, terraform_version: &str) -> Result<KudoMeta> {
        let terraform_version = if terraform_version.is_empty() {
            DEFAULT_TERRAFORM_VERSION
        } else {
            terraform_version
        };

        let cfg = ProviderConfig::from_data(data);
        debug!("Provider configuration {:?}", redacted(&cfg));

        let config = kube_config(&cfg, terraform_version).await?;
        info!("Connecting to Kubernetes at {}", config.cluster_url);
        let client = kube::Client::try_from(config).context("Failed to build Kubernetes client")?;
        let kudo = KudoClient::new(client);

        let opts = cfg.init_options();
        kudo.install_kudo(&opts)
            .await
            .context("Error installing KUDO")?;
        if cfg.wait {
            kudo.wait_for_controller(&opts.namespace, cfg.wait_timeout)
                .await
                .context("Error waiting for KUDO")?;
        }

        Ok(KudoMeta {
            kudo,
            repo_home: kudo_repo::kudo_home(),
        })
    }
}

/// Copy of the configuration safe to log
fn redacted(cfg: &ProviderConfig) -> ProviderConfig {
    let hide = |v: &Option<String>| v.as_ref().map(|_| "<redacted>".to_string());
    ProviderConfig {
        password: hide(&cfg.password),
        client_key: hide(&cfg.client_key),
        token: hide(&cfg.token),
        ..cfg.clone()
    }
}
