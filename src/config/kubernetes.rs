//! Kubernetes connection settings

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{HeaderValue, USER_AGENT};
use kube::config::{AuthInfo, KubeConfigOptions, Kubeconfig};
use std::path::PathBuf;
use tracing::{debug, info};

use super::ProviderConfig;
use crate::ProviderError;

/// Build the client configuration for a provider block
///
/// The kubeconfig file is tried first (when enabled), then the in-cluster
/// service account. Whatever was found is then overridden by the static
/// connection attributes of the block. Requests identify themselves as
/// coming from `terraform_version`.
pub async fn kube_config(cfg: &ProviderConfig, terraform_version: &str) -> Result<kube::Config> {
    let mut config = None;
    if cfg.load_config_file {
        config = load_config_file(cfg).await?;
    }
    if config.is_none() {
        config = in_cluster_config()?;
    }

    let mut config = match (config, &cfg.host) {
        (Some(config), _) => config,
        (None, Some(host)) => kube::Config::new(
            with_scheme(host)
                .parse()
                .with_context(|| format!("Invalid host {host:?}"))?,
        ),
        (None, None) => return Err(ProviderError::NoHost.into()),
    };

    apply_overrides(&mut config, cfg)?;
    config.headers.push((USER_AGENT, user_agent(terraform_version)?));
    Ok(config)
}

fn user_agent(terraform_version: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("HashiCorp/1.0 Terraform/{terraform_version}"))
        .with_context(|| format!("Invalid Terraform version {terraform_version:?}"))
}

async fn load_config_file(cfg: &ProviderConfig) -> Result<Option<kube::Config>> {
    let path = PathBuf::from(
        shellexpand::full(&cfg.config_path)
            .with_context(|| format!("Failed to expand config path {:?}", cfg.config_path))?
            .into_owned(),
    );
    if !path.exists() {
        debug!("Kubeconfig {:?} not found", path);
        return Ok(None);
    }

    info!("Loading kubeconfig {:?}", path);
    let kubeconfig = Kubeconfig::read_from(&path)
        .with_context(|| format!("Failed to read kubeconfig {:?}", path))?;
    let options = KubeConfigOptions {
        context: cfg.config_context.clone(),
        cluster: cfg.config_context_cluster.clone(),
        user: cfg.config_context_auth_info.clone(),
    };

    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("Failed to load kubeconfig {:?}", path))?;
    Ok(Some(config))
}

fn in_cluster_config() -> Result<Option<kube::Config>> {
    if std::env::var_os("KUBERNETES_SERVICE_HOST").is_none() {
        debug!("Not running in a cluster");
        return Ok(None);
    }
    let config = kube::Config::incluster().context("Failed to configure")?;
    Ok(Some(config))
}

fn with_scheme(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn apply_overrides(config: &mut kube::Config, cfg: &ProviderConfig) -> Result<()> {
    if let Some(host) = &cfg.host {
        config.cluster_url = with_scheme(host)
            .parse()
            .with_context(|| format!("Invalid host {host:?}"))?;
    }
    if cfg.insecure {
        config.accept_invalid_certs = true;
    }
    if let Some(ca) = &cfg.cluster_ca_certificate {
        let certs = pem::parse_many(ca).context("Invalid cluster_ca_certificate")?;
        config.root_cert = Some(certs.into_iter().map(|c| c.into_contents()).collect());
    }

    let mut auth = serde_json::Map::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            auth.insert(key.to_string(), serde_json::Value::String(value));
        }
    };
    put("username", cfg.username.clone());
    put("password", cfg.password.clone());
    put("token", cfg.token.clone());
    put(
        "client-certificate-data",
        cfg.client_certificate.as_ref().map(|c| STANDARD.encode(c)),
    );
    put(
        "client-key-data",
        cfg.client_key.as_ref().map(|k| STANDARD.encode(k)),
    );
    if auth.is_empty() {
        return Ok(());
    }

    let overrides: AuthInfo = serde_json::from_value(serde_json::Value::Object(auth))
        .context("Invalid authentication settings")?;
    let current = &mut config.auth_info;
    if overrides.username.is_some() {
        current.username = overrides.username;
    }
    if overrides.password.is_some() {
        current.password = overrides.password;
    }
    if overrides.token.is_some() {
        current.token = overrides.token;
    }
    if overrides.client_certificate_data.is_some() {
        current.client_certificate_data = overrides.client_certificate_data;
    }
    if overrides.client_key_data.is_some() {
        current.client_key_data = overrides.client_key_data;
    }
    Ok(())
}
