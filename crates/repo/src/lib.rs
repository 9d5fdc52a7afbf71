//! KUDO operator repositories and packages

pub mod client;
pub mod error;
pub mod index;
pub mod package;
pub mod resolver;
pub mod settings;

pub use client::RepositoryClient;
pub use error::{RepoError, RepoResult};
pub use index::{IndexFile, PackageVersion};
pub use package::{PackageFiles, Resources};
pub use resolver::PackageResolver;
pub use settings::{kudo_home, repositories_file, Repositories, RepositoryConfiguration};
