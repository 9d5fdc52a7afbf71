//! Resource lifecycle trait

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::data::ResourceData;
use crate::diff::ResourceDiff;
use crate::schema::Schema;

/// A managed resource type
///
/// `M` is the provider meta produced by `Provider::configure`, typically the
/// set of API clients the handlers talk to.
#[async_trait]
pub trait Resource<M>: Send + Sync {
    /// Resource schema, without the implicit `id` attribute
    fn schema(&self) -> Schema;

    /// Create the remote object and record its ID
    async fn create(&self, data: &mut ResourceData, meta: &M) -> Result<()>;

    /// Refresh `data` from the remote object; clear the ID if it is gone
    async fn read(&self, data: &mut ResourceData, meta: &M) -> Result<()>;

    /// Apply planned changes to the remote object
    async fn update(&self, data: &mut ResourceData, meta: &M) -> Result<()>;

    /// Delete the remote object
    async fn delete(&self, data: &mut ResourceData, meta: &M) -> Result<()>;

    /// Whether the remote object still exists, checked before every refresh
    async fn exists(&self, data: &ResourceData, meta: &M) -> Result<bool>;

    /// Adjust the planned values of a create or update
    fn customize_diff(&self, _diff: &mut ResourceDiff) -> Result<()> {
        Ok(())
    }

    /// Build the data needed to read an existing object from an import ID
    fn import(&self, id: &str) -> Result<ResourceData> {
        Err(anyhow!("resource does not support import (ID {id:?})"))
    }
}
