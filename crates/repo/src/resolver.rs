//! Resolving an operator reference to a package
//!
//! A reference is tried as a local directory, a local tarball, an http(s)
//! URL and finally as an operator name in the repository.

use std::path::Path;
use tracing::debug;

use crate::client::RepositoryClient;
use crate::error::RepoResult;
use crate::package::{PackageFiles, Resources};

pub struct PackageResolver {
    repository: RepositoryClient,
}

impl PackageResolver {
    pub fn new(repository: RepositoryClient) -> Self {
        Self { repository }
    }

    pub async fn resolve(
        &self,
        name: &str,
        app_version: &str,
        operator_version: &str,
    ) -> RepoResult<Resources> {
        self.resolve_files(name, app_version, operator_version)
            .await?
            .into_resources()
    }

    pub async fn resolve_files(
        &self,
        name: &str,
        app_version: &str,
        operator_version: &str,
    ) -> RepoResult<PackageFiles> {
        let path = Path::new(name);
        if path.is_dir() {
            debug!("Resolved {:?} as a package directory", name);
            return PackageFiles::from_dir(path);
        }
        if path.is_file() {
            debug!("Resolved {:?} as a package tarball", name);
            return PackageFiles::from_tarball(&std::fs::read(path)?);
        }
        if name.starts_with("http://") || name.starts_with("https://") {
            debug!("Resolved {:?} as a package URL", name);
            return PackageFiles::from_tarball(&self.repository.fetch(name).await?);
        }

        debug!(
            "Resolving {:?} from repository {:?}",
            name,
            self.repository.config().name
        );
        self.repository
            .get_package_files(name, app_version, operator_version)
            .await
    }
}
