//! Provider trait

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use super::resource::Resource;
use crate::data::ResourceData;
use crate::schema::Schema;

/// Resources keyed by their Terraform type name
pub type ResourceMap<M> = BTreeMap<String, Box<dyn Resource<M>>>;

/// A Terraform provider: a configuration block plus a set of resource types
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// State shared by all resource handlers once configured
    type Meta: Send + Sync + 'static;

    /// Provider configuration schema
    fn schema(&self) -> Schema;

    /// Resource types served by this provider
    fn resources(&self) -> ResourceMap<Self::Meta>;

    /// Build the meta from the provider block; defaults are already applied
    async fn configure(&self, config: &ResourceData, terraform_version: &str)
        -> Result<Self::Meta>;
}
