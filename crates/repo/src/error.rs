//! Repository error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("no repository named {0:?} in the repository settings")]
    UnknownRepository(String),

    #[error("operator {name:?} not found in repository {repository:?}")]
    OperatorNotFound { name: String, repository: String },

    #[error("no version of operator {name:?} matches {requested}")]
    VersionNotFound { name: String, requested: String },

    #[error("package entry {0:?} has no download URL")]
    MissingUrl(String),

    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
