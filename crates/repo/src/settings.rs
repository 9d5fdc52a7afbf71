//! Repository settings file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RepoError, RepoResult};

pub const DEFAULT_REPOSITORY_NAME: &str = "community";
pub const DEFAULT_REPOSITORY_URL: &str = "https://kudo-repository.storage.googleapis.com/v1";

/// A named operator repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfiguration {
    pub name: String,
    pub url: String,
}

impl Default for RepositoryConfiguration {
    fn default() -> Self {
        Self {
            name: DEFAULT_REPOSITORY_NAME.to_string(),
            url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }
}

/// Contents of `repositories.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Repositories {
    #[serde(default)]
    pub api_version: String,

    /// Repository used when none is named
    #[serde(default)]
    pub context: String,

    #[serde(default)]
    pub repositories: Vec<RepositoryConfiguration>,
}

impl Default for Repositories {
    fn default() -> Self {
        Self {
            api_version: "v1".to_string(),
            context: DEFAULT_REPOSITORY_NAME.to_string(),
            repositories: vec![RepositoryConfiguration::default()],
        }
    }
}

impl Repositories {
    /// Load the settings file; a missing file yields the default settings
    pub fn load(path: &Path) -> RepoResult<Self> {
        if !path.exists() {
            debug!("No repository settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let repositories: Repositories = serde_yaml::from_str(&content)?;
        Ok(repositories)
    }

    /// Repository by name; an empty name selects the current context
    pub fn get(&self, name: &str) -> RepoResult<&RepositoryConfiguration> {
        let name = match (name, self.context.as_str()) {
            ("", "") => DEFAULT_REPOSITORY_NAME,
            ("", context) => context,
            (name, _) => name,
        };

        self.repositories
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RepoError::UnknownRepository(name.to_string()))
    }
}

/// KUDO home directory: `$KUDO_HOME`, else `~/.kudo`
pub fn kudo_home() -> PathBuf {
    match std::env::var("KUDO_HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(shellexpand::tilde(&home).into_owned()),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kudo"),
    }
}

/// Location of the settings file below a KUDO home
pub fn repositories_file(home: &Path) -> PathBuf {
    home.join("repository").join("repositories.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_community() {
        let temp_dir = TempDir::new().unwrap();
        let repos = Repositories::load(&repositories_file(temp_dir.path())).unwrap();

        let community = repos.get("").unwrap();
        assert_eq!(community.name, "community");
        assert_eq!(community.url, DEFAULT_REPOSITORY_URL);
    }

    #[test]
    fn test_load_with_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = repositories_file(temp_dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
apiVersion: v1
context: local
repositories:
- name: community
  url: https://kudo-repository.storage.googleapis.com/v1
- name: local
  url: http://localhost:8080
"#,
        )
        .unwrap();

        let repos = Repositories::load(&path).unwrap();
        assert_eq!(repos.get("").unwrap().url, "http://localhost:8080");
        assert_eq!(repos.get("community").unwrap().name, "community");
        assert!(matches!(
            repos.get("missing"),
            Err(RepoError::UnknownRepository(name)) if name == "missing"
        ));
    }
}
