//! Objects making up a KUDO controller installation

use anyhow::{anyhow, Result};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, Namespace, ObjectFieldSelector, PodSpec,
    PodTemplateSpec, ResourceRequirements, Secret, SecretVolumeSource, Service, ServiceAccount,
    ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::core::ApiResource;
use kube::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::certs::WebhookCertificates;
use crate::config::Options;

pub const CONTROLLER_NAME: &str = "kudo-controller-manager";
pub const SERVICE_NAME: &str = "kudo-controller-manager-service";
pub const WEBHOOK_SECRET_NAME: &str = "kudo-webhook-server-secret";
pub const CLUSTER_ROLE_BINDING_NAME: &str = "kudo-manager-rolebinding";
pub const WEBHOOK_CONFIGURATION_NAME: &str = "kudo-manager-instance-admission-webhook-config";
pub const WEBHOOK_NAME: &str = "instance-admission.kudo.dev";
pub const WEBHOOK_PATH: &str = "/admit-kudo-dev-v1beta1-instance";
pub const WEBHOOK_PORT: i32 = 9443;
const CERT_DIR: &str = "/tmp/cert";

/// Labels of the controller pods
pub fn controller_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "kudo-manager".to_string()),
        ("control-plane".to_string(), "controller-manager".to_string()),
    ])
}

/// Label selector string matching the controller pods
pub fn controller_selector() -> String {
    controller_labels()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// One object to apply, erased to its JSON form
#[derive(Debug, Clone)]
pub struct Manifest {
    pub api_resource: ApiResource,
    pub name: String,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub object: serde_json::Value,
}

impl Manifest {
    pub fn from_resource<K>(object: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let api_resource = ApiResource::erase::<K>(&());
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| anyhow!("{} manifest has no name", api_resource.kind))?;

        Ok(Self {
            namespace: object.meta().namespace.clone(),
            object: serde_json::to_value(object)?,
            name,
            api_resource,
        })
    }

    pub fn kind(&self) -> &str {
        &self.api_resource.kind
    }
}

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

/// Every object of the installation, in apply order
pub fn manifests(opts: &Options) -> Result<Vec<Manifest>> {
    opts.validate()?;

    let certs = if opts.self_signed_webhook_ca {
        Some(WebhookCertificates::generate(SERVICE_NAME, &opts.namespace)?)
    } else {
        None
    };

    let mut manifests = vec![Manifest::from_resource(&namespace(opts))?];
    for crd in kudo_crd::crds() {
        manifests.push(Manifest::from_resource(&crd)?);
    }
    manifests.push(Manifest::from_resource(&service_account(opts))?);
    manifests.push(Manifest::from_resource(&cluster_role_binding(opts))?);
    if let Some(certs) = &certs {
        manifests.push(Manifest::from_resource(&webhook_secret(opts, certs))?);
    }
    manifests.push(Manifest::from_resource(&service(opts))?);
    manifests.push(Manifest::from_resource(&statefulset(opts))?);
    manifests.push(Manifest::from_resource(&webhook_configuration(
        opts,
        certs.as_ref(),
    ))?);

    debug!(
        "Rendered {} KUDO manifests for {}",
        manifests.len(),
        opts.image
    );
    Ok(manifests)
}

pub fn namespace(opts: &Options) -> Namespace {
    let mut ns_meta = meta(&opts.namespace, None);
    ns_meta.labels = Some(BTreeMap::from([
        ("app".to_string(), "kudo-manager".to_string()),
        ("controller-tools.k8s.io".to_string(), "1.0".to_string()),
    ]));
    Namespace {
        metadata: ns_meta,
        ..Default::default()
    }
}

pub fn service_account(opts: &Options) -> ServiceAccount {
    let mut sa_meta = meta(&opts.service_account, Some(&opts.namespace));
    sa_meta.labels = Some(BTreeMap::from([(
        "app".to_string(),
        "kudo-manager".to_string(),
    )]));
    ServiceAccount {
        metadata: sa_meta,
        ..Default::default()
    }
}

pub fn cluster_role_binding(opts: &Options) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: meta(CLUSTER_ROLE_BINDING_NAME, None),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: "cluster-admin".to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: opts.service_account.clone(),
            namespace: Some(opts.namespace.clone()),
            ..Default::default()
        }]),
    }
}

pub fn webhook_secret(opts: &Options, certs: &WebhookCertificates) -> Secret {
    Secret {
        metadata: meta(WEBHOOK_SECRET_NAME, Some(&opts.namespace)),
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(BTreeMap::from([
            (
                "tls.crt".to_string(),
                ByteString(certs.cert_pem.as_bytes().to_vec()),
            ),
            (
                "tls.key".to_string(),
                ByteString(certs.key_pem.as_bytes().to_vec()),
            ),
        ])),
        ..Default::default()
    }
}

pub fn service(opts: &Options) -> Service {
    let mut svc_meta = meta(SERVICE_NAME, Some(&opts.namespace));
    svc_meta.labels = Some(controller_labels());
    Service {
        metadata: svc_meta,
        spec: Some(ServiceSpec {
            selector: Some(controller_labels()),
            ports: Some(vec![ServicePort {
                name: Some("kudo".to_string()),
                port: 443,
                target_port: Some(IntOrString::String("webhook-server".to_string())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn statefulset(opts: &Options) -> StatefulSet {
    let mut sts_meta = meta(CONTROLLER_NAME, Some(&opts.namespace));
    sts_meta.labels = Some(controller_labels());

    let env = vec![
        EnvVar {
            name: "POD_NAMESPACE".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.namespace".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        EnvVar {
            name: "SECRET_NAME".to_string(),
            value: Some(WEBHOOK_SECRET_NAME.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "ENABLE_WEBHOOKS".to_string(),
            value: Some("true".to_string()),
            ..Default::default()
        },
    ];

    let container = Container {
        name: "manager".to_string(),
        image: Some(opts.image.clone()),
        image_pull_policy: Some(opts.image_pull_policy.clone()),
        command: Some(vec!["/root/manager".to_string()]),
        env: Some(env),
        ports: Some(vec![ContainerPort {
            name: Some("webhook-server".to_string()),
            container_port: WEBHOOK_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("100m".to_string())),
                ("memory".to_string(), Quantity("50Mi".to_string())),
            ])),
            ..Default::default()
        }),
        volume_mounts: Some(vec![VolumeMount {
            name: "cert".to_string(),
            mount_path: CERT_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        ..Default::default()
    };

    StatefulSet {
        metadata: sts_meta,
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: Some(SERVICE_NAME.to_string()),
            selector: LabelSelector {
                match_labels: Some(controller_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(controller_labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    service_account_name: Some(opts.service_account.clone()),
                    termination_grace_period_seconds: Some(opts.termination_grace_period),
                    volumes: Some(vec![Volume {
                        name: "cert".to_string(),
                        secret: Some(SecretVolumeSource {
                            secret_name: Some(WEBHOOK_SECRET_NAME.to_string()),
                            default_mode: Some(420),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn webhook_configuration(
    opts: &Options,
    certs: Option<&WebhookCertificates>,
) -> MutatingWebhookConfiguration {
    let mut webhook_meta = meta(WEBHOOK_CONFIGURATION_NAME, None);
    if certs.is_none() {
        webhook_meta.annotations = Some(BTreeMap::from([(
            "cert-manager.io/inject-ca-from".to_string(),
            format!("{}/kudo-webhook-server-certificate", opts.namespace),
        )]));
    }

    MutatingWebhookConfiguration {
        metadata: webhook_meta,
        webhooks: Some(vec![MutatingWebhook {
            name: WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1beta1".to_string()],
            side_effects: "None".to_string(),
            failure_policy: Some("Fail".to_string()),
            match_policy: Some("Equivalent".to_string()),
            rules: Some(vec![RuleWithOperations {
                operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                api_groups: Some(vec![kudo_crd::GROUP.to_string()]),
                api_versions: Some(vec![kudo_crd::VERSION.to_string()]),
                resources: Some(vec!["instances".to_string()]),
                scope: Some("Namespaced".to_string()),
            }]),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: SERVICE_NAME.to_string(),
                    namespace: opts.namespace.clone(),
                    path: Some(WEBHOOK_PATH.to_string()),
                    port: Some(443),
                }),
                ca_bundle: certs.map(|c| ByteString(c.ca_pem.as_bytes().to_vec())),
                ..Default::default()
            },
            ..Default::default()
        }]),
    }
}
