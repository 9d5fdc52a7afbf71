//! `kudo_instance`: a running instance of an installed operator version

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource as KubeResource;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

use kudo_crd::{Instance, InstanceSpec};
use kudo_tfplugin::{Attribute, AttributeType, Resource, ResourceData, ResourceDiff, Schema};

use super::INSTANCE_TIMEOUT;
use crate::client::KudoClient;
use crate::provider::KudoMeta;
use crate::utils::{deduplicate, id, id_parts};

/// Grace period before the first status poll of a new instance
pub const CREATE_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Attributes derived from the instance parameters
const PARAMETER_DEPENDENT: &[&str] = &[
    "pods",
    "services",
    "statefulsets",
    "deployments",
    "configmaps",
    "pvcs",
    "output_parameters",
];

pub struct InstanceResource;

/// Whether two string maps agree, a missing key counting as empty
pub fn same_entries(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
    let lookup = |m: &BTreeMap<String, String>, k: &str| m.get(k).cloned().unwrap_or_default();
    a.iter().all(|(k, v)| *v == lookup(b, k)) && b.iter().all(|(k, v)| *v == lookup(a, k))
}

/// Operator version defaults overlaid with the instance's own parameters
pub fn effective_parameters(
    defaults: BTreeMap<String, String>,
    parameters: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults;
    merged.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Names of the objects labelled as belonging to an instance
async fn owned_names<K>(kudo: &KudoClient, namespace: &str, instance: &str) -> Result<Vec<String>>
where
    K: KubeResource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let mut names = kudo
        .list_names::<K>(namespace, &format!("instance={instance}"))
        .await?;
    names.extend(
        kudo.list_names::<K>(namespace, &format!("kudo.dev/instance={instance}"))
            .await?,
    );
    debug!(
        "Found {} {} of instance {}/{}",
        names.len(),
        K::plural(&()),
        namespace,
        instance
    );
    Ok(deduplicate(names))
}

/// `operator_version_namespace`, falling back to the instance namespace
fn operator_version_namespace(data: &mut ResourceData, namespace: &str) -> String {
    match data.get_ok("operator_version_namespace").and_then(|v| v.as_str()) {
        Some(ns) => ns.to_string(),
        None => {
            data.set("operator_version_namespace", namespace);
            namespace.to_string()
        }
    }
}

#[async_trait]
impl Resource<KudoMeta> for InstanceResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .with_attribute(Attribute::string_map("parameters").optional())
            .with_attribute(Attribute::string_map("output_parameters").computed())
            .with_attribute(Attribute::required_string("name"))
            .with_attribute(Attribute::optional_string("namespace").default_value("default"))
            .with_attribute(Attribute::string_map("labels").optional())
            .with_attribute(Attribute::required_string("operator_version_name"))
            .with_attribute(
                Attribute::optional_string("operator_version_namespace").default_value("default"),
            )
            .with_attribute(Attribute::computed_string_list("pods"))
            .with_attribute(Attribute::computed_string_list("services"))
            .with_attribute(Attribute::computed_string_list("deployments"))
            .with_attribute(Attribute::computed_string_list("statefulsets"))
            .with_attribute(Attribute::computed_string_list("configmaps"))
            .with_attribute(Attribute::computed_string_list("pvcs"))
            .with_attribute(
                Attribute::new("cleanup_pvcs", AttributeType::Bool)
                    .optional()
                    .default_value(true)
                    .description(
                        "If true, deleting the object in terraform will cleanup StatefulSet PVCs",
                    ),
            )
    }

    fn customize_diff(&self, diff: &mut ResourceDiff) -> Result<()> {
        diff.computed_if_changed("parameters", PARAMETER_DEPENDENT);
        Ok(())
    }

    fn import(&self, import_id: &str) -> Result<ResourceData> {
        let (namespace, name) = id_parts(import_id)?;
        let mut data = ResourceData::default();
        data.set("namespace", namespace);
        data.set("name", name);
        data.set_id(import_id);
        Ok(data)
    }

    async fn create(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let name = data.get_str("name");
        let namespace = data.get_str("namespace");
        let ov_namespace = operator_version_namespace(data, &namespace);

        let mut instance = Instance::new(
            &name,
            InstanceSpec {
                parameters: data.get_string_map("parameters"),
                ..Default::default()
            },
        );
        instance.metadata.namespace = Some(namespace.clone());
        instance.metadata.labels = Some(data.get_string_map("labels"));
        instance.spec.operator_version.name = Some(data.get_str("operator_version_name"));
        instance.spec.operator_version.namespace = Some(ov_namespace);

        meta.kudo
            .create_instance(&instance)
            .await
            .context("Error installing instance")?;
        data.set_id(id(&namespace, &name));

        tokio::time::sleep(CREATE_SETTLE_DELAY).await;
        meta.kudo
            .wait_for_instance(&name, &namespace, None, INSTANCE_TIMEOUT)
            .await?;
        self.read(data, meta).await
    }

    async fn read(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let name = data.get_str("name");
        let namespace = data.get_str("namespace");
        operator_version_namespace(data, &namespace);

        let Some(instance) = meta.kudo.get_instance(&name, &namespace).await? else {
            info!("Instance {}/{} is gone", namespace, name);
            data.set_id("");
            return Ok(());
        };
        data.set("labels", instance.metadata.labels.clone().unwrap_or_default());

        let ov_name = instance.operator_version_name();
        let ov_namespace = instance.operator_version_namespace();
        let ov = meta
            .kudo
            .get_operator_version(&ov_name, &ov_namespace)
            .await
            .context("could not get OperatorVersion")?
            .ok_or_else(|| anyhow!("Could not find OV {ov_namespace}/{ov_name}"))?;

        let parameters = &instance.spec.parameters;
        data.set(
            "output_parameters",
            effective_parameters(ov.parameter_defaults(), parameters),
        );
        data.set("parameters", parameters.clone());
        data.set("operator_version_name", ov_name);
        data.set("operator_version_namespace", ov_namespace);
        data.set_id(id(&namespace, &name));

        let kudo = &meta.kudo;
        let (pods, services, deployments, statefulsets, configmaps, pvcs) = futures::try_join!(
            owned_names::<Pod>(kudo, &namespace, &name),
            owned_names::<Service>(kudo, &namespace, &name),
            owned_names::<Deployment>(kudo, &namespace, &name),
            owned_names::<StatefulSet>(kudo, &namespace, &name),
            owned_names::<ConfigMap>(kudo, &namespace, &name),
            owned_names::<PersistentVolumeClaim>(kudo, &namespace, &name),
        )?;
        data.set("pods", pods);
        data.set("services", services);
        data.set("deployments", deployments);
        data.set("statefulsets", statefulsets);
        data.set("configmaps", configmaps);
        data.set("pvcs", pvcs);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let name = data.get_str("name");
        let namespace = data.get_str("namespace");
        operator_version_namespace(data, &namespace);
        let ov_name = data.get_str("operator_version_name");
        let parameters = data.get_string_map("parameters");
        let labels = data.get_string_map("labels");

        let old = meta
            .kudo
            .get_instance(&name, &namespace)
            .await?
            .ok_or_else(|| anyhow!("Calling Update on non-existent Instance {namespace}/{name}"))?;

        let new_plan = !same_entries(&old.spec.parameters, &parameters);
        let old_labels = old.metadata.labels.clone().unwrap_or_default();
        if !new_plan && same_entries(&old_labels, &labels) {
            debug!("Instance {}/{} unchanged", namespace, name);
            return self.read(data, meta).await;
        }

        let patch = json!({
            "spec": {
                "parameters": parameters,
                "operatorVersion": {"name": ov_name},
            },
            "metadata": {"labels": labels},
        });
        meta.kudo
            .patch_instance(&name, &namespace, &patch)
            .await
            .context("Error updating instance")?;

        if new_plan {
            meta.kudo
                .wait_for_instance(&name, &namespace, Some(&old), INSTANCE_TIMEOUT)
                .await?;
        }
        self.read(data, meta).await
    }

    async fn delete(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let name = data.get_str("name");
        let namespace = data.get_str("namespace");

        if meta.kudo.get_instance(&name, &namespace).await?.is_some() {
            meta.kudo.delete_instance(&name, &namespace).await?;
            meta.kudo
                .wait_until_gone::<Instance>(&name, &namespace, INSTANCE_TIMEOUT)
                .await?;
        }

        if !data.get_bool("cleanup_pvcs") {
            return Ok(());
        }
        for pvc in data.get_string_list("pvcs") {
            if meta
                .kudo
                .get::<PersistentVolumeClaim>(&pvc, &namespace)
                .await?
                .is_none()
            {
                continue;
            }
            info!("Deleting PVC {}/{} of instance {}", namespace, pvc, name);
            meta.kudo
                .delete::<PersistentVolumeClaim>(&pvc, &namespace)
                .await?;
            meta.kudo
                .wait_until_gone::<PersistentVolumeClaim>(&pvc, &namespace, INSTANCE_TIMEOUT)
                .await?;
        }
        Ok(())
    }

    async fn exists(&self, data: &ResourceData, meta: &KudoMeta) -> Result<bool> {
        Ok(meta
            .kudo
            .get_instance(&data.get_str("name"), &data.get_str("namespace"))
            .await?
            .is_some())
    }
}
