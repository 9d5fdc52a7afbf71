//! `kudo_operator`: an operator package installed from a repository

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

use kudo_repo::{PackageResolver, RepositoryClient, Resources};
use async_trait::async_trait;
use kudo_tfplugin::{Attribute, AttributeType, Resource, ResourceData, Schema};

use super::OPERATOR_INSTALL_TIMEOUT;
use crate::client::InstallOptions;
use crate::provider::KudoMeta;
use crate::utils::id;

pub struct OperatorResource;

impl OperatorResource {
    /// Resolve the package for the configured operator
    ///
    /// Records the name of the repository actually used, so that an empty
    /// `repo` ends up holding the current repository context.
    async fn resolve(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<Resources> {
        let name = data.get_str("operator_name");
        let version = data.get_str("operator_version");

        let repository = RepositoryClient::from_settings(&meta.repo_home, &data.get_str("repo"))
            .context("could not build operator repository")?;
        data.set("repo", repository.config().name.as_str());

        PackageResolver::new(repository)
            .resolve(&name, "", &version)
            .await
            .with_context(|| format!("failed to resolve operator package for: {name}"))
    }
}

#[async_trait]
impl Resource<KudoMeta> for OperatorResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .with_attribute(Attribute::required_string("operator_name"))
            .with_attribute(Attribute::optional_string("operator_version").computed())
            .with_attribute(Attribute::optional_bool("skip_instance").default_value(true))
            .with_attribute(
                Attribute::optional_string("operator_namespace")
                    .default_value("default")
                    .description("Namespace to install the Operator Version"),
            )
            .with_attribute(
                Attribute::optional_string("repo")
                    .computed()
                    .description("Name of Repository in KUDO repo config file"),
            )
            .with_attribute(
                Attribute::string_map("parameters")
                    .optional()
                    .default_value(BTreeMap::<String, String>::new()),
            )
            .with_attribute(Attribute::new("object_name", AttributeType::String).computed())
    }

    async fn create(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let name = data.get_str("operator_name");
        let namespace = data.get_str("operator_namespace");
        debug!(
            "[{}] Operator namespace {:?}, repo {:?}, version {:?}",
            name,
            namespace,
            data.get_str("repo"),
            data.get_str("operator_version")
        );

        let resources = self.resolve(data, meta).await?;
        let ov = &resources.operator_version;
        info!("[{}] Version pulled from repo: {}", name, ov.spec.version);

        let ov_name = resources.operator_version_name();
        data.set("operator_version", ov.spec.version.as_str());
        data.set_id(id(&ov_name, &namespace));
        data.set("object_name", ov_name.as_str());

        meta.kudo
            .install_package(
                &resources,
                &InstallOptions {
                    skip_instance: data.get_bool("skip_instance"),
                    instance_name: name,
                    namespace,
                    parameters: data.get_string_map("parameters"),
                    wait: Some(OPERATOR_INSTALL_TIMEOUT),
                },
            )
            .await?;
        self.read(data, meta).await
    }

    async fn read(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let namespace = data.get_str("operator_namespace");
        let version = data.get_str("operator_version");
        let ov_name = data.get_str("object_name");
        if version.is_empty() || ov_name.is_empty() {
            debug!(
                "No operator version ({:?}) or object name ({:?}), not installed yet",
                version, ov_name
            );
            data.set_id("");
            return Ok(());
        }

        let Some(ov) = meta.kudo.get_operator_version(&ov_name, &namespace).await? else {
            info!("Operator version {}/{} is gone", namespace, ov_name);
            data.set_id("");
            return Ok(());
        };

        data.set("operator_version", ov.spec.version.as_str());
        data.set(
            "operator_name",
            ov.spec.operator.name.clone().unwrap_or_default(),
        );
        data.set("object_name", ov_name.as_str());
        Ok(())
    }

    /// Install the new version next to the old one; instances are upgraded separately
    async fn update(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let namespace = data.get_str("operator_namespace");
        let resources = self.resolve(data, meta).await?;

        meta.kudo
            .install_package(
                &resources,
                &InstallOptions {
                    skip_instance: true,
                    instance_name: data.get_str("operator_name"),
                    namespace: namespace.clone(),
                    parameters: BTreeMap::new(),
                    wait: Some(OPERATOR_INSTALL_TIMEOUT),
                },
            )
            .await?;

        let ov_name = resources.operator_version_name();
        data.set("operator_version", resources.operator_version.spec.version.as_str());
        data.set("object_name", ov_name.as_str());
        data.set_id(id(&ov_name, &namespace));
        self.read(data, meta).await
    }

    async fn delete(&self, data: &mut ResourceData, meta: &KudoMeta) -> Result<()> {
        let ov_name = data.get_str("object_name");
        let namespace = data.get_str("operator_namespace");
        if ov_name.is_empty() {
            return Ok(());
        }
        if meta
            .kudo
            .get_operator_version(&ov_name, &namespace)
            .await?
            .is_none()
        {
            debug!("Operator version {}/{} already deleted", namespace, ov_name);
            return Ok(());
        }
        meta.kudo.delete_operator_version(&ov_name, &namespace).await
    }

    async fn exists(&self, data: &ResourceData, meta: &KudoMeta) -> Result<bool> {
        let Some(ov_name) = data.get_ok("object_name").and_then(|v| v.as_str()) else {
            return Ok(false);
        };
        let namespace = data.get_str("operator_namespace");
        Ok(meta
            .kudo
            .get_operator_version(ov_name, &namespace)
            .await?
            .is_some())
    }
}
