//! HTTP client for an operator repository

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{RepoError, RepoResult};
use crate::index::{IndexFile, PackageVersion};
use crate::package::{PackageFiles, Resources};
use crate::settings::{repositories_file, Repositories, RepositoryConfiguration};

pub const INDEX_FILE: &str = "index.yaml";

/// Client for one configured repository
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    config: RepositoryConfiguration,
    http: reqwest::Client,
}

impl RepositoryClient {
    pub fn new(config: RepositoryConfiguration) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Client for the repository `name` (or the current context) of the settings below `home`
    pub fn from_settings(home: &Path, name: &str) -> RepoResult<Self> {
        let repositories = Repositories::load(&repositories_file(home))?;
        let config = repositories.get(name)?.clone();
        debug!("Using repository {:?} at {}", config.name, config.url);
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &RepositoryConfiguration {
        &self.config
    }

    /// Resolve a possibly relative URL against the repository URL
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    pub(crate) async fn fetch(&self, url: &str) -> RepoResult<Vec<u8>> {
        let http_err = |source| RepoError::Http {
            url: url.to_string(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await.map_err(http_err)?.to_vec())
    }

    pub async fn download_index(&self) -> RepoResult<IndexFile> {
        let bytes = self.fetch(&self.url(INDEX_FILE)).await?;
        IndexFile::parse(&bytes)
    }

    /// Download the tarball of a release, verifying its digest when the index has one
    pub async fn download_package(&self, version: &PackageVersion) -> RepoResult<Vec<u8>> {
        let url = version
            .urls
            .first()
            .map(|u| self.url(u))
            .ok_or_else(|| RepoError::MissingUrl(version.name.clone()))?;

        info!("Downloading package {}", url);
        let bytes = self.fetch(&url).await?;

        if let Some(expected) = version.digest.as_deref().filter(|d| !d.is_empty()) {
            let actual = hex::encode(Sha256::digest(&bytes));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(RepoError::DigestMismatch {
                    url,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(bytes)
    }

    /// Find a release of `name` in the index and download it
    pub async fn get_package_files(
        &self,
        name: &str,
        app_version: &str,
        operator_version: &str,
    ) -> RepoResult<PackageFiles> {
        let index = self.download_index().await?;
        let version = index.find(name, app_version, operator_version, &self.config.name)?;
        let bytes = self.download_package(version).await?;
        PackageFiles::from_tarball(&bytes)
    }

    pub async fn get_package(
        &self,
        name: &str,
        app_version: &str,
        operator_version: &str,
    ) -> RepoResult<Resources> {
        self.get_package_files(name, app_version, operator_version)
            .await?
            .into_resources()
    }
}
