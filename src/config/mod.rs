//! Provider configuration block

use std::time::Duration;

use kudo_tfplugin::validation::{not_empty, positive_number};
use kudo_tfplugin::{Attribute, AttributeType, ResourceData, Schema, Value};

mod kubernetes;

pub use kubernetes::kube_config;

pub const DEFAULT_KUDO_VERSION: &str = "0.14.0";

/// Schema of the `provider "kudo"` block
pub fn provider_schema() -> Schema {
    Schema::new()
        .with_attribute(
            Attribute::optional_string("config_path")
                .env_default(&["KUBE_CONFIG", "KUBECONFIG"], "~/.kube/config")
                .description("Path to the kube config file, defaults to ~/.kube/config"),
        )
        .with_attribute(
            Attribute::optional_string("host")
                .description("Explicit host to connect to Kubernetes"),
        )
        .with_attribute(
            Attribute::optional_bool("insecure")
                .env_default(&["KUBE_INSECURE"], false)
                .description(
                    "Whether server should be accessed without verifying the TLS certificate.",
                ),
        )
        .with_attribute(
            Attribute::optional_string("username")
                .env_default(&["KUBE_USER"], "")
                .description("The username to use for HTTP basic authentication."),
        )
        .with_attribute(
            Attribute::optional_string("password")
                .sensitive()
                .env_default(&["KUBE_PASSWORD"], "")
                .description("The password to use for HTTP basic authentication."),
        )
        .with_attribute(
            Attribute::optional_string("client_certificate")
                .env_default(&["KUBE_CLIENT_CERT_DATA"], "")
                .description("PEM-encoded client certificate for TLS authentication."),
        )
        .with_attribute(
            Attribute::optional_string("client_key")
                .sensitive()
                .env_default(&["KUBE_CLIENT_KEY_DATA"], "")
                .description("PEM-encoded client certificate key for TLS authentication."),
        )
        .with_attribute(
            Attribute::optional_string("cluster_ca_certificate")
                .env_default(&["KUBE_CLUSTER_CA_CERT_DATA"], "")
                .description("PEM-encoded root certificates bundle for TLS authentication."),
        )
        .with_attribute(
            Attribute::optional_string("config_context").env_default(&["KUBE_CTX"], ""),
        )
        .with_attribute(
            Attribute::optional_string("config_context_auth_info")
                .env_default(&["KUBE_CTX_AUTH_INFO"], ""),
        )
        .with_attribute(
            Attribute::optional_string("config_context_cluster")
                .env_default(&["KUBE_CTX_CLUSTER"], ""),
        )
        .with_attribute(
            Attribute::optional_string("token")
                .sensitive()
                .env_default(&["KUBE_TOKEN"], "")
                .description("Token to authenticate a service account"),
        )
        .with_attribute(
            Attribute::optional_bool("load_config_file")
                .env_default(&["KUBE_LOAD_CONFIG_FILE"], true)
                .description("Load local kubeconfig."),
        )
        .with_attribute(
            Attribute::optional_string("image")
                .default_value(kudo_init::config::DEFAULT_IMAGE)
                .description("Override KUDO controller base image"),
        )
        .with_attribute(
            Attribute::optional_string("service_account")
                .default_value(kudo_init::config::DEFAULT_SERVICE_ACCOUNT)
                .description("Override the default serviceAccount kudo-manager"),
        )
        .with_attribute(
            Attribute::optional_bool("wait")
                .default_value(false)
                .description("Block until KUDO manager is running and ready to receive requests"),
        )
        .with_attribute(
            Attribute::new("wait_timeout", AttributeType::Number)
                .optional()
                .default_value(300i64)
                .validate_with(positive_number)
                .description("Wait timeout in seconds."),
        )
        .with_attribute(
            Attribute::optional_string("kudo_version")
                .default_value(DEFAULT_KUDO_VERSION)
                .validate_with(not_empty)
                .description("KUDO version to install"),
        )
        .with_attribute(
            Attribute::optional_string("namespace")
                .default_value(kudo_init::config::DEFAULT_NAMESPACE)
                .validate_with(not_empty)
                .description("Namespace to install KUDO into"),
        )
}

/// Typed view of a configured provider block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub config_path: String,
    pub load_config_file: bool,
    pub config_context: Option<String>,
    pub config_context_auth_info: Option<String>,
    pub config_context_cluster: Option<String>,

    pub host: Option<String>,
    pub insecure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_certificate: Option<String>,
    pub client_key: Option<String>,
    pub cluster_ca_certificate: Option<String>,
    pub token: Option<String>,

    pub image: String,
    pub service_account: String,
    pub wait: bool,
    pub wait_timeout: Duration,
    pub kudo_version: String,
    pub namespace: String,
}

fn non_empty(data: &ResourceData, key: &str) -> Option<String> {
    data.get_ok(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl ProviderConfig {
    /// Read the block; defaults have been applied already
    pub fn from_data(data: &ResourceData) -> Self {
        Self {
            config_path: data.get_str("config_path"),
            load_config_file: data.get_bool("load_config_file"),
            config_context: non_empty(data, "config_context"),
            config_context_auth_info: non_empty(data, "config_context_auth_info"),
            config_context_cluster: non_empty(data, "config_context_cluster"),
            host: non_empty(data, "host"),
            insecure: data.get_bool("insecure"),
            username: non_empty(data, "username"),
            password: non_empty(data, "password"),
            client_certificate: non_empty(data, "client_certificate"),
            client_key: non_empty(data, "client_key"),
            cluster_ca_certificate: non_empty(data, "cluster_ca_certificate"),
            token: non_empty(data, "token"),
            image: non_empty(data, "image")
                .unwrap_or_else(|| kudo_init::config::DEFAULT_IMAGE.to_string()),
            service_account: non_empty(data, "service_account")
                .unwrap_or_else(|| kudo_init::config::DEFAULT_SERVICE_ACCOUNT.to_string()),
            wait: data.get_bool("wait"),
            wait_timeout: Duration::from_secs(data.get_i64("wait_timeout").max(0) as u64),
            kudo_version: non_empty(data, "kudo_version")
                .unwrap_or_else(|| DEFAULT_KUDO_VERSION.to_string()),
            namespace: non_empty(data, "namespace")
                .unwrap_or_else(|| kudo_init::config::DEFAULT_NAMESPACE.to_string()),
        }
    }

    /// Installation options for the KUDO controller
    pub fn init_options(&self) -> kudo_init::Options {
        kudo_init::Options::new(&self.image, &self.kudo_version)
            .with_namespace(&self.namespace)
            .with_service_account(&self.service_account)
    }
}
