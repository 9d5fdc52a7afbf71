//! Operator packages: reading the package files and turning them into resources
//!
//! A package is a directory (or a gzipped tarball of one) holding
//! `operator.yaml`, an optional `params.yaml` and the `templates/` folder.

use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::ObjectReference;
use kudo_crd::{
    operator_version_name, Instance, InstanceSpec, Maintainer, Operator, OperatorSpec,
    OperatorVersion, OperatorVersionSpec, Parameter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RepoError, RepoResult};

pub const OPERATOR_FILE: &str = "operator.yaml";
pub const PARAMS_FILE: &str = "params.yaml";
pub const TEMPLATES_DIR: &str = "templates";

/// Label put on the Instance of a package
pub const OPERATOR_LABEL: &str = "kudo.dev/operator";

/// Contents of `operator.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperatorFile {
    #[serde(default)]
    pub api_version: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(alias = "version")]
    pub operator_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kudo_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plans: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_manifest: Option<String>,
}

/// Contents of `params.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParamsFile {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub parameters: Vec<PackageParameter>,
}

/// A parameter as written in `params.yaml`; defaults may be any YAML value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageParameter {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl PackageParameter {
    /// Convert to the OperatorVersion form, where defaults are strings
    ///
    /// Scalars keep their YAML text; lists and maps are stored as JSON.
    pub fn to_parameter(&self) -> RepoResult<Parameter> {
        let default = match &self.default {
            None | Some(serde_yaml::Value::Null) => None,
            Some(serde_yaml::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(serde_json::to_string(other).map_err(|e| {
                RepoError::InvalidPackage(format!(
                    "default of parameter {:?} cannot be rendered: {}",
                    self.name, e
                ))
            })?),
        };

        Ok(Parameter {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            required: self.required,
            default,
            trigger: self.trigger.clone(),
            value_type: self.value_type.clone(),
            immutable: self.immutable,
        })
    }
}

/// The files of a package, parsed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageFiles {
    pub operator: OperatorFile,
    pub params: ParamsFile,
    /// Template sources keyed by their path below `templates/`
    pub templates: BTreeMap<String, String>,
}

/// The objects a package installs
#[derive(Debug, Clone, PartialEq)]
pub struct Resources {
    pub operator: Operator,
    pub operator_version: OperatorVersion,
    pub instance: Instance,
}

impl Resources {
    pub fn operator_name(&self) -> String {
        self.operator.metadata.name.clone().unwrap_or_default()
    }

    pub fn operator_version_name(&self) -> String {
        self.operator_version.metadata.name.clone().unwrap_or_default()
    }
}

enum PackageEntry {
    Operator,
    Params,
    Template(String),
}

/// Place a file of the package by its path relative to the package root
///
/// Tarballs often wrap the package in a single top-level folder, so only
/// the path from `templates/` or the file name on is significant.
fn classify(path: &Path) -> Option<PackageEntry> {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(pos) = parts.iter().position(|p| p == TEMPLATES_DIR) {
        let rest = &parts[pos + 1..];
        return (!rest.is_empty()).then(|| PackageEntry::Template(rest.join("/")));
    }

    match parts.last().map(String::as_str) {
        Some(OPERATOR_FILE) if parts.len() <= 2 => Some(PackageEntry::Operator),
        Some(PARAMS_FILE) if parts.len() <= 2 => Some(PackageEntry::Params),
        _ => None,
    }
}

impl PackageFiles {
    /// Read an unpacked package directory
    pub fn from_dir(dir: &Path) -> RepoResult<Self> {
        debug!("Reading package directory {:?}", dir);

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| RepoError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let Some(kind) = classify(relative) else {
                debug!("Ignoring package file {:?}", relative);
                continue;
            };
            let content = std::fs::read_to_string(entry.path())?;
            files.push((kind, content));
        }

        Self::from_files(files)
    }

    /// Read a gzipped package tarball
    pub fn from_tarball(bytes: &[u8]) -> RepoResult<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));

        let mut files = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.into_owned();
            let Some(kind) = classify(&path) else {
                debug!("Ignoring package file {:?}", path);
                continue;
            };
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            files.push((kind, content));
        }

        Self::from_files(files)
    }

    fn from_files(files: Vec<(PackageEntry, String)>) -> RepoResult<Self> {
        let mut operator = None;
        let mut params = None;
        let mut templates = BTreeMap::new();

        for (kind, content) in files {
            match kind {
                PackageEntry::Operator => {
                    operator = Some(serde_yaml::from_str::<OperatorFile>(&content)?)
                }
                PackageEntry::Params => {
                    params = Some(serde_yaml::from_str::<ParamsFile>(&content)?)
                }
                PackageEntry::Template(name) => {
                    templates.insert(name, content);
                }
            }
        }

        let operator = operator
            .ok_or_else(|| RepoError::InvalidPackage(format!("{OPERATOR_FILE} is missing")))?;
        if operator.name.is_empty() {
            return Err(RepoError::InvalidPackage(format!(
                "{OPERATOR_FILE} has no operator name"
            )));
        }
        if operator.operator_version.is_empty() {
            return Err(RepoError::InvalidPackage(format!(
                "{OPERATOR_FILE} has no operator version"
            )));
        }

        Ok(Self {
            operator,
            params: params.unwrap_or_default(),
            templates,
        })
    }

    /// Build the Operator, OperatorVersion and default Instance of the package
    pub fn into_resources(self) -> RepoResult<Resources> {
        let op = self.operator;
        let ov_name = operator_version_name(&op.name, &op.app_version, &op.operator_version);

        let parameters = self
            .params
            .parameters
            .iter()
            .map(PackageParameter::to_parameter)
            .collect::<RepoResult<Vec<_>>>()?;

        let operator = Operator::new(
            &op.name,
            OperatorSpec {
                description: op.description,
                kudo_version: op.kudo_version,
                kubernetes_version: op.kubernetes_version,
                maintainers: op.maintainers,
                url: op.url,
                namespace_manifest: op.namespace_manifest,
            },
        );

        let operator_version = OperatorVersion::new(
            &ov_name,
            OperatorVersionSpec {
                operator: ObjectReference {
                    name: Some(op.name.clone()),
                    kind: Some("Operator".to_string()),
                    ..Default::default()
                },
                version: op.operator_version,
                app_version: op.app_version,
                templates: self.templates,
                tasks: op.tasks,
                parameters,
                plans: op.plans,
                upgradable_from: Vec::new(),
            },
        );

        let mut instance = Instance::new(
            &format!("{}-instance", op.name),
            InstanceSpec {
                operator_version: ObjectReference {
                    name: Some(ov_name),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        instance.metadata.labels = Some(BTreeMap::from([(
            OPERATOR_LABEL.to_string(),
            op.name.clone(),
        )]));

        Ok(Resources {
            operator,
            operator_version,
            instance,
        })
    }
}
