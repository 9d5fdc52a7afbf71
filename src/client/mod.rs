//! KUDO API client
//!
//! Thin wrapper around a [`kube::Client`] for the three KUDO resource kinds,
//! plus the package installation and the plan wait loop that every resource
//! handler blocks on.

use anyhow::{Context, Result};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

use kudo_crd::{ExecutionStatus, Instance, Operator, OperatorVersion};
use kudo_repo::Resources;

use crate::ProviderError;

mod bootstrap;

/// Interval between two status polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Page size of the child object listings
pub const LIST_LIMIT: u32 = 100;

/// How a package gets installed
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Install only the Operator and OperatorVersion
    pub skip_instance: bool,
    /// Instance name; the package default when empty
    pub instance_name: String,
    pub namespace: String,
    pub parameters: BTreeMap<String, String>,
    /// Wait for the instance plan to finish, up to this long
    pub wait: Option<Duration>,
}

#[derive(Clone)]
pub struct KudoClient {
    client: Client,
}

impl KudoClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub async fn get_instance(&self, name: &str, namespace: &str) -> Result<Option<Instance>> {
        self.api::<Instance>(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get instance {namespace}/{name}"))
    }

    pub async fn get_operator_version(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<OperatorVersion>> {
        self.api::<OperatorVersion>(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get operator version {namespace}/{name}"))
    }

    pub async fn get_operator(&self, name: &str, namespace: &str) -> Result<Option<Operator>> {
        self.api::<Operator>(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get operator {namespace}/{name}"))
    }

    /// Install the objects of a package
    ///
    /// Operator and OperatorVersion are created only when absent, so that
    /// installing a second instance of an operator reuses them. The instance
    /// itself must not exist yet.
    pub async fn install_package(
        &self,
        resources: &Resources,
        opts: &InstallOptions,
    ) -> Result<Option<Instance>> {
        let namespace = opts.namespace.as_str();
        let operator_name = resources.operator_name();
        let ov_name = resources.operator_version_name();

        if self.get_operator(&operator_name, namespace).await?.is_none() {
            let mut operator = resources.operator.clone();
            operator.metadata.namespace = Some(namespace.to_string());
            self.api::<Operator>(namespace)
                .create(&PostParams::default(), &operator)
                .await
                .with_context(|| format!("Failed to install operator {operator_name}"))?;
            info!("Operator {}/{} created", namespace, operator_name);
        } else {
            debug!("Operator {}/{} already installed", namespace, operator_name);
        }

        let ov = match self.get_operator_version(&ov_name, namespace).await? {
            Some(ov) => {
                debug!("Operator version {}/{} already installed", namespace, ov_name);
                ov
            }
            None => {
                let mut ov = resources.operator_version.clone();
                ov.metadata.namespace = Some(namespace.to_string());
                let ov = self
                    .api::<OperatorVersion>(namespace)
                    .create(&PostParams::default(), &ov)
                    .await
                    .with_context(|| format!("Failed to install operator version {ov_name}"))?;
                info!("Operator version {}/{} created", namespace, ov_name);
                ov
            }
        };

        if opts.skip_instance {
            return Ok(None);
        }

        let missing = ov.missing_parameters(&opts.parameters);
        if !missing.is_empty() {
            return Err(ProviderError::MissingParameters {
                operator_version: ov_name,
                missing,
            }
            .into());
        }

        let mut instance = resources.instance.clone();
        if !opts.instance_name.is_empty() {
            instance.metadata.name = Some(opts.instance_name.clone());
        }
        instance.metadata.namespace = Some(namespace.to_string());
        instance.spec.operator_version.name = Some(ov_name.clone());
        instance.spec.parameters = opts.parameters.clone();
        let instance_name = instance.name_any();

        if self.get_instance(&instance_name, namespace).await?.is_some() {
            anyhow::bail!(
                "cannot install instance {instance_name} of operator {ov_name} because an \
                 instance of that name already exists in namespace {namespace}"
            );
        }
        self.create_instance(&instance).await?;

        match opts.wait {
            Some(timeout) => self
                .wait_for_instance(&instance_name, namespace, None, timeout)
                .await
                .map(Some),
            None => Ok(Some(instance)),
        }
    }

    pub async fn create_instance(&self, instance: &Instance) -> Result<Instance> {
        let namespace = instance.namespace().unwrap_or_default();
        let name = instance.name_any();
        let created = self
            .api::<Instance>(&namespace)
            .create(&PostParams::default(), instance)
            .await
            .with_context(|| format!("Failed to create instance {namespace}/{name}"))?;
        info!("Instance {}/{} created", namespace, name);
        Ok(created)
    }

    /// Merge-patch an instance
    pub async fn patch_instance(
        &self,
        name: &str,
        namespace: &str,
        patch: &serde_json::Value,
    ) -> Result<Instance> {
        debug!("Patching instance {}/{}: {}", namespace, name, patch);
        self.api::<Instance>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to update instance {namespace}/{name}"))
    }

    /// Delete an instance together with everything it owns
    pub async fn delete_instance(&self, name: &str, namespace: &str) -> Result<()> {
        self.api::<Instance>(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
            .with_context(|| format!("Failed to delete instance {namespace}/{name}"))?;
        info!("Instance {}/{} deleted", namespace, name);
        Ok(())
    }

    pub async fn delete_operator_version(&self, name: &str, namespace: &str) -> Result<()> {
        self.api::<OperatorVersion>(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .with_context(|| format!("Failed to delete operator version {namespace}/{name}"))?;
        info!("Operator version {}/{} deleted", namespace, name);
        Ok(())
    }

    pub async fn get<K>(&self, name: &str, namespace: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get {} {namespace}/{name}", K::kind(&())))
    }

    /// Foreground-delete a namespaced object of any built-in kind
    pub async fn delete<K>(&self, name: &str, namespace: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
            .with_context(|| format!("Failed to delete {} {namespace}/{name}", K::kind(&())))?;
        Ok(())
    }

    /// Names of the objects matching a label selector, first page only
    pub async fn list_names<K>(&self, namespace: &str, selector: &str) -> Result<Vec<String>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let params = ListParams::default().labels(selector).limit(LIST_LIMIT);
        let list = self
            .api::<K>(namespace)
            .list(&params)
            .await
            .with_context(|| {
                format!("Failed to list {} in {namespace} ({selector})", K::plural(&()))
            })?;
        Ok(list.items.iter().map(ResourceExt::name_any).collect())
    }

    /// Block until the instance has finished a plan
    ///
    /// With `old`, only a plan whose UID differs from the one `old` last ran
    /// counts, so that a plan triggered by an update is not mistaken for the
    /// one that completed before it.
    pub async fn wait_for_instance(
        &self,
        name: &str,
        namespace: &str,
        old: Option<&Instance>,
        timeout: Duration,
    ) -> Result<Instance> {
        let old_uid = old
            .and_then(Instance::last_executed_plan_status)
            .map(|plan| plan.uid().to_string());

        tokio::time::timeout(timeout, self.poll_instance(name, namespace, old_uid))
            .await
            .map_err(|_| ProviderError::Timeout {
                what: format!("instance {namespace}/{name}"),
                timeout,
            })?
    }

    async fn poll_instance(
        &self,
        name: &str,
        namespace: &str,
        old_uid: Option<String>,
    ) -> Result<Instance> {
        loop {
            if let Some(instance) = self.get_instance(name, namespace).await? {
                if let Some(plan) = instance.last_executed_plan_status() {
                    let is_new = old_uid.as_deref() != Some(plan.uid());
                    debug!(
                        "Instance {}/{} plan {:?}: {:?} (new: {})",
                        namespace,
                        name,
                        plan.name,
                        plan.execution_status(),
                        is_new
                    );
                    if is_new && plan.execution_status() == ExecutionStatus::FatalError {
                        return Err(ProviderError::PlanFailed {
                            namespace: namespace.to_string(),
                            name: name.to_string(),
                            plan: plan.name.clone(),
                            message: plan.message.clone().unwrap_or_default(),
                        }
                        .into());
                    }
                    if is_new && plan.is_terminal() {
                        info!("Instance {}/{} finished plan {:?}", namespace, name, plan.name);
                        return Ok(instance);
                    }
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Block until a namespaced object no longer exists
    pub async fn wait_until_gone<K>(
        &self,
        name: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api = self.api::<K>(namespace);
        let wait = async {
            while api
                .get_opt(name)
                .await
                .with_context(|| format!("Failed to get {} {namespace}/{name}", K::kind(&())))?
                .is_some()
            {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Ok::<_, anyhow::Error>(())
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ProviderError::Timeout {
                what: format!("{} {namespace}/{name} to be deleted", K::kind(&())),
                timeout,
            })?
    }
}
