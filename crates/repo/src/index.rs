//! Repository index (`index.yaml`)

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// One published release of an operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub name: String,

    #[serde(alias = "version")]
    pub operator_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    #[serde(default)]
    pub urls: Vec<String>,

    /// Hex-encoded sha256 of the tarball
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kudo_version: Option<String>,
}

impl PackageVersion {
    fn semver(&self) -> Option<Version> {
        Version::parse(self.operator_version.trim_start_matches('v')).ok()
    }

    fn app_semver(&self) -> Option<Version> {
        Version::parse(self.app_version.trim_start_matches('v')).ok()
    }
}

/// The repository index: every release of every operator, keyed by operator name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub entries: BTreeMap<String, Vec<PackageVersion>>,
}

impl IndexFile {
    pub fn parse(content: &[u8]) -> RepoResult<Self> {
        Ok(serde_yaml::from_slice(content)?)
    }

    /// Select a release of `name`
    ///
    /// Empty `app_version` or `operator_version` match any value. Among the
    /// matching releases the highest operator version wins, ties broken by
    /// the highest app version.
    pub fn find(
        &self,
        name: &str,
        app_version: &str,
        operator_version: &str,
        repository: &str,
    ) -> RepoResult<&PackageVersion> {
        let versions = self
            .entries
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RepoError::OperatorNotFound {
                name: name.to_string(),
                repository: repository.to_string(),
            })?;

        let selected = versions
            .iter()
            .filter(|v| operator_version.is_empty() || v.operator_version == operator_version)
            .filter(|v| app_version.is_empty() || v.app_version == app_version)
            .max_by(|a, b| {
                a.semver()
                    .cmp(&b.semver())
                    .then_with(|| a.app_semver().cmp(&b.app_semver()))
            });

        match selected {
            Some(version) => {
                debug!(
                    "Selected {} operator version {:?} (app version {:?})",
                    name, version.operator_version, version.app_version
                );
                Ok(version)
            }
            None => Err(RepoError::VersionNotFound {
                name: name.to_string(),
                requested: describe_request(app_version, operator_version),
            }),
        }
    }
}

fn describe_request(app_version: &str, operator_version: &str) -> String {
    match (app_version, operator_version) {
        ("", "") => "any version".to_string(),
        ("", ov) => format!("operator version {ov}"),
        (app, "") => format!("app version {app}"),
        (app, ov) => format!("app version {app} and operator version {ov}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const INDEX: &str = r#"
apiVersion: v1
entries:
  kafka:
  - name: kafka
    appVersion: 2.4.0
    operatorVersion: 1.2.0
    urls:
    - https://kudo-repository.storage.googleapis.com/kafka-2.4.0-1.2.0.tgz
  - name: kafka
    appVersion: 2.5.0
    operatorVersion: 1.3.1
    digest: 7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069
    urls:
    - kafka-2.5.0-1.3.1.tgz
  - name: kafka
    appVersion: 2.4.1
    operatorVersion: 1.3.1
    urls:
    - kafka-2.4.1-1.3.1.tgz
  - name: kafka
    appVersion: 2.5.0
    operatorVersion: 1.10.0
    urls:
    - kafka-2.5.0-1.10.0.tgz
  zookeeper:
  - name: zookeeper
    version: 0.3.0
    urls:
    - zookeeper-0.3.0.tgz
"#;

    fn index() -> IndexFile {
        IndexFile::parse(INDEX.as_bytes()).unwrap()
    }

    #[rstest]
    #[case("", "", "2.5.0", "1.10.0")]
    #[case("", "1.3.1", "2.5.0", "1.3.1")]
    #[case("2.4.1", "", "2.4.1", "1.3.1")]
    #[case("2.4.0", "1.2.0", "2.4.0", "1.2.0")]
    fn test_find(
        #[case] app: &str,
        #[case] ov: &str,
        #[case] expected_app: &str,
        #[case] expected_ov: &str,
    ) {
        let index = index();
        let found = index.find("kafka", app, ov, "community").unwrap();
        assert_eq!(found.app_version, expected_app);
        assert_eq!(found.operator_version, expected_ov);
    }

    #[test]
    fn test_legacy_version_key() {
        let index = index();
        let zk = index.find("zookeeper", "", "", "community").unwrap();
        assert_eq!(zk.operator_version, "0.3.0");
        assert!(zk.app_version.is_empty());
    }

    #[test]
    fn test_unknown_operator() {
        let err = index().find("cassandra", "", "", "community").unwrap_err();
        assert!(matches!(err, RepoError::OperatorNotFound { .. }));
        assert!(err.to_string().contains("cassandra"));
    }

    #[test]
    fn test_unknown_version() {
        let err = index().find("kafka", "", "9.9.9", "community").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no version of operator \"kafka\" matches operator version 9.9.9"
        );
    }
}
